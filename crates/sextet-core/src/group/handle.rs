use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use taskvisor::TaskError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    group::{GroupReport, ServiceRef, UnitState},
    metrics::MetricsHandle,
};

#[derive(Debug)]
struct UnitRecord {
    state: UnitState,
    failure: Option<String>,
}

struct HandleInner {
    stop: CancellationToken,
    units: RwLock<BTreeMap<&'static str, UnitRecord>>,
}

/// Shared view of a service group: the group-wide stop signal and per-unit state.
///
/// Cheap to clone; every unit wrapper, the orchestrator and external callers
/// hold one.
#[derive(Clone)]
pub struct GroupHandle {
    inner: Arc<HandleInner>,
}

impl GroupHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                stop: CancellationToken::new(),
                units: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Request every unit to stop. Idempotent.
    pub fn stop(&self) {
        if !self.inner.stop.is_cancelled() {
            debug!("group stop requested");
        }
        self.inner.stop.cancel();
    }

    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Resolves once a group stop has been requested.
    pub async fn stopped(&self) {
        self.inner.stop.cancelled().await
    }

    /// Current state of the named unit, if registered.
    pub fn state(&self, unit: &str) -> Option<UnitState> {
        self.inner
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unit)
            .map(|r| r.state)
    }

    pub fn is_running(&self, unit: &str) -> bool {
        self.state(unit) == Some(UnitState::Running)
    }

    /// Register a unit in `Created` state. Returns `false` if the name is taken.
    pub(crate) fn register(&self, unit: &'static str) -> bool {
        let mut units = self
            .inner
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if units.contains_key(unit) {
            return false;
        }
        units.insert(
            unit,
            UnitRecord {
                state: UnitState::Created,
                failure: None,
            },
        );
        true
    }

    /// Move a unit forward. Terminal states are never left.
    fn transition(&self, unit: &'static str, next: UnitState, failure: Option<String>) {
        let mut units = self
            .inner
            .units
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let record = units.entry(unit).or_insert(UnitRecord {
            state: UnitState::Created,
            failure: None,
        });
        if record.state.is_terminal() {
            return;
        }
        debug!(unit, from = %record.state, to = %next, "unit transition");
        record.state = next;
        if failure.is_some() {
            record.failure = failure;
        }
    }

    /// Drive one unit through its lifecycle and fold its outcome into a group stop.
    pub(crate) async fn supervise(
        &self,
        unit: ServiceRef,
        cancel: CancellationToken,
        metrics: MetricsHandle,
    ) -> Result<(), TaskError> {
        let name = unit.name();
        self.transition(name, UnitState::Starting, None);

        let token = self.inner.stop.child_token();
        let run = unit.run(token.clone());
        tokio::pin!(run);
        self.transition(name, UnitState::Running, None);

        let early = tokio::select! {
            res = &mut run => Some(res),
            _ = cancel.cancelled() => None,
            _ = token.cancelled() => None,
        };
        let res = match early {
            Some(res) => res,
            None => {
                self.transition(name, UnitState::Stopping, None);
                token.cancel();
                run.await
            }
        };

        let outcome = match res {
            Ok(()) => {
                info!(unit = name, "unit terminated");
                self.transition(name, UnitState::Terminated, None);
                metrics.record_unit_finished(name, UnitState::Terminated);
                Ok(())
            }
            Err(e) => {
                error!(unit = name, error = %e, "unit failed");
                self.transition(name, UnitState::Failed, Some(e.to_string()));
                metrics.record_unit_finished(name, UnitState::Failed);
                Err(TaskError::Fatal {
                    reason: e.to_string(),
                })
            }
        };
        self.stop();
        outcome
    }

    /// Snapshot of the final unit states.
    pub(crate) fn report(&self, grace_exceeded: bool) -> GroupReport {
        let units = self
            .inner
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        GroupReport {
            units: units.iter().map(|(name, r)| (*name, r.state)).collect(),
            failures: units
                .iter()
                .filter_map(|(name, r)| r.failure.clone().map(|f| (*name, f)))
                .collect(),
            grace_exceeded,
        }
    }
}

impl Default for GroupHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self
            .inner
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("GroupHandle")
            .field("stopping", &self.is_stopping())
            .field("units", &units.len())
            .finish()
    }
}
