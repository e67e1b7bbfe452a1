//! Supervisor event logging.

use async_trait::async_trait;
use taskvisor::{Event, EventKind, Subscribe};
use tracing::{debug, error, info, trace, warn};

/// Logs supervisor events for the stream's service units.
#[derive(Debug, Default)]
pub struct Subscriber;

/// A stream runs three or four units; this comfortably absorbs a shutdown burst.
const QUEUE_CAPACITY: usize = 256;

#[async_trait]
impl Subscribe for Subscriber {
    async fn on_event(&self, event: &Event) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "sextet-events"
    }

    fn queue_capacity(&self) -> usize {
        QUEUE_CAPACITY
    }
}

fn log_event(e: &Event) {
    let unit = e.task.as_deref().unwrap_or("unknown");
    let reason = e.reason.as_deref().unwrap_or("");

    match e.kind {
        EventKind::TaskStarting => debug!(unit, "unit starting"),
        EventKind::TaskStopped => debug!(unit, "unit stopped"),
        EventKind::TaskFailed => error!(unit, reason, "unit failed"),
        EventKind::ActorDead => error!(unit, reason, "unit terminated permanently"),
        EventKind::ActorExhausted => debug!(unit, reason, "unit will not be restarted"),
        EventKind::ShutdownRequested => info!("shutdown requested"),
        EventKind::AllStoppedWithinGrace => debug!("all units stopped within grace"),
        EventKind::GraceExceeded => warn!("some units did not stop within grace"),
        EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
            error!(unit, reason, "event subscriber failure")
        }
        other => trace!(unit, kind = ?other, "supervisor event"),
    }
}
