//! Service group: a fixed set of units started together and stopped as one.
//!
//! Units run as taskvisor tasks with [`RestartPolicy::Never`]. Whenever any
//! unit returns (terminated, failed or self-stopped) the group stop signal
//! fires and every other unit is cancelled. After a stop, the group waits at
//! most [`GroupConfig::grace`] for the rest before giving up.
mod handle;
mod service;
mod state;

pub use handle::GroupHandle;
pub use service::{Service, ServiceRef};
pub use state::UnitState;

use std::{sync::Arc, time::Duration};

use taskvisor::{
    BackoffPolicy, RestartPolicy, RuntimeError, Subscribe, Supervisor, SupervisorConfig, TaskFn,
    TaskRef, TaskSpec,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::{
    error::CoreError,
    metrics::{MetricsHandle, noop_metrics},
};

/// Default shutdown grace period.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Group-level settings.
#[derive(Debug, Clone, Copy)]
pub struct GroupConfig {
    /// How long to wait for all units once a stop has been requested.
    pub grace: Duration,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

/// Final state of a group run.
#[derive(Debug, Clone)]
pub struct GroupReport {
    /// Last known state of every unit, by name.
    pub units: Vec<(&'static str, UnitState)>,
    /// Units that failed, with the failure reason.
    pub failures: Vec<(&'static str, String)>,
    /// `true` if the grace period ran out before every unit stopped.
    pub grace_exceeded: bool,
}

impl GroupReport {
    /// No failures and everything stopped in time.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.grace_exceeded
    }

    pub fn state(&self, unit: &str) -> Option<UnitState> {
        self.units
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, s)| *s)
    }
}

/// A set of units supervised together.
pub struct ServiceGroup {
    config: GroupConfig,
    handle: GroupHandle,
    units: Vec<ServiceRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    metrics: MetricsHandle,
}

impl ServiceGroup {
    /// Create an empty group bound to `handle`.
    pub fn new(config: GroupConfig, handle: GroupHandle) -> Self {
        Self {
            config,
            handle,
            units: Vec::new(),
            subscribers: Vec::new(),
            metrics: noop_metrics(),
        }
    }

    /// Add a unit. Names must be unique within the group.
    pub fn add(&mut self, unit: ServiceRef) -> Result<(), CoreError> {
        if !self.handle.register(unit.name()) {
            return Err(CoreError::DuplicateUnit(unit.name()));
        }
        self.units.push(unit);
        Ok(())
    }

    /// Attach supervisor event subscribers (logging, etc).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn handle(&self) -> &GroupHandle {
        &self.handle
    }

    fn task_for(&self, unit: &ServiceRef) -> TaskRef {
        let unit = Arc::clone(unit);
        let handle = self.handle.clone();
        let metrics = Arc::clone(&self.metrics);

        TaskFn::arc(unit.name(), move |cancel: CancellationToken| {
            let unit = Arc::clone(&unit);
            let handle = handle.clone();
            let metrics = Arc::clone(&metrics);
            async move { handle.supervise(unit, cancel, metrics).await }
        })
    }

    /// Start every unit and wait for the group to stop.
    #[instrument(level = "debug", skip(self), fields(units = self.units.len()))]
    pub async fn run(self) -> Result<GroupReport, CoreError> {
        let mut sup_cfg = SupervisorConfig::default();
        sup_cfg.grace = self.config.grace;

        let sup = Supervisor::builder(sup_cfg)
            .with_subscribers(self.subscribers.clone())
            .build();

        let specs: Vec<TaskSpec> = self
            .units
            .iter()
            .map(|unit| {
                TaskSpec::new(
                    self.task_for(unit),
                    RestartPolicy::Never,
                    BackoffPolicy::default(),
                    None,
                )
            })
            .collect();

        info!(
            units = ?self.units.iter().map(|u| u.name()).collect::<Vec<_>>(),
            "starting service group"
        );
        let run = sup.run(specs);
        tokio::pin!(run);

        let finished = tokio::select! {
            res = &mut run => Some(res),
            _ = self.handle.stopped() => None,
        };
        let (result, grace_exceeded) = match finished {
            Some(res) => (Some(res), false),
            None => match tokio::time::timeout(self.config.grace, &mut run).await {
                Ok(res) => (Some(res), false),
                Err(_) => {
                    warn!(grace = ?self.config.grace, "grace exceeded; abandoning remaining units");
                    (None, true)
                }
            },
        };

        let grace_exceeded = match result {
            // The supervisor ran its own grace wait (OS signal shutdown).
            Some(Err(RuntimeError::GraceExceeded { .. })) => {
                warn!("supervisor grace exceeded");
                true
            }
            Some(Err(e)) => return Err(CoreError::Supervisor(e.to_string())),
            _ => grace_exceeded,
        };
        let report = self.handle.report(grace_exceeded);
        info!(clean = report.is_clean(), "service group stopped");
        Ok(report)
    }
}
