//! Idle-output watchdog.
//!
//! While armed, the timeout hook fires once per interval unless something calls
//! [`Watchdog::reset`] first. After firing it re-arms itself, so the hook also
//! serves as a steady keepalive driver until [`Watchdog::unset`] is called.
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::Notify,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    error::ServiceError,
    group::{Service, ServiceRef},
};

/// Unit name of the watchdog loop in the service group.
pub const WATCHDOG_UNIT: &str = "watchdog";

/// Callback invoked on every expiry.
pub type TimeoutHook = Arc<dyn Fn() + Send + Sync>;

/// `deadline == None` means "never"; the loop parks until woken.
#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    armed: bool,
}

enum Step {
    Fire,
    Wait(Option<Instant>),
}

pub struct Watchdog {
    interval: Option<Duration>,
    timer: Mutex<TimerState>,
    recheck: Notify,
    on_timeout: TimeoutHook,
}

impl Watchdog {
    /// Create a disarmed watchdog. `interval == None` disables it for good.
    pub fn new(interval: Option<Duration>, on_timeout: TimeoutHook) -> Self {
        Self {
            interval: interval.filter(|iv| !iv.is_zero()),
            timer: Mutex::new(TimerState::default()),
            recheck: Notify::new(),
            on_timeout,
        }
    }

    fn timer(&self) -> MutexGuard<'_, TimerState> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.timer().armed
    }

    /// Push the deadline one interval into the future and arm.
    ///
    /// Equivalent to [`Watchdog::unset`] when the watchdog is disabled.
    pub fn reset(&self) {
        let Some(interval) = self.interval else {
            self.unset();
            return;
        };
        {
            let mut timer = self.timer();
            timer.deadline = Some(Instant::now() + interval);
            timer.armed = true;
        }
        self.recheck.notify_one();
    }

    /// Disarm. Idempotent.
    pub fn unset(&self) {
        {
            let mut timer = self.timer();
            timer.armed = false;
            timer.deadline = None;
        }
        self.recheck.notify_one();
    }

    fn step(&self, now: Instant) -> Step {
        let mut timer = self.timer();
        match timer.deadline {
            Some(deadline) if deadline <= now => match (timer.armed, self.interval) {
                (true, Some(interval)) => {
                    timer.deadline = Some(now + interval);
                    Step::Fire
                }
                _ => {
                    timer.deadline = None;
                    Step::Wait(None)
                }
            },
            other => Step::Wait(other),
        }
    }

    /// Background loop; returns once `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        debug!(interval = ?self.interval, "watchdog loop started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.step(Instant::now()) {
                Step::Fire => {
                    trace!("watchdog expired");
                    (self.on_timeout)();
                }
                Step::Wait(deadline) => {
                    let expiry = async {
                        match deadline {
                            Some(at) => sleep_until(at).await,
                            None => std::future::pending::<()>().await,
                        }
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.recheck.notified() => {}
                        _ = expiry => {}
                    }
                }
            }
        }
        debug!("watchdog loop stopped");
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("interval", &self.interval)
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Service unit driving a shared [`Watchdog`].
pub struct WatchdogService {
    watchdog: Arc<Watchdog>,
}

impl WatchdogService {
    pub fn new(watchdog: Arc<Watchdog>) -> Self {
        Self { watchdog }
    }

    pub fn into_ref(self) -> ServiceRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Service for WatchdogService {
    fn name(&self) -> &'static str {
        WATCHDOG_UNIT
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        self.watchdog.run(cancel).await;
        Ok(())
    }
}
