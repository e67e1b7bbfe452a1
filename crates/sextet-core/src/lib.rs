pub mod channel;
pub mod error;
pub mod group;
pub mod keys;
pub mod metrics;
pub mod sink;
pub mod stream;
pub mod watchdog;

pub use channel::{DEFAULT_CAPACITY, PacketChannel};
pub use error::{CoreError, ServiceError};
pub use group::{
    DEFAULT_GRACE, GroupConfig, GroupHandle, GroupReport, Service, ServiceGroup, ServiceRef,
    UnitState,
};
pub use keys::KeyState;
pub use metrics::{MetricsBackend, MetricsHandle, NoOpMetrics, noop_metrics};
pub use sink::{SinkContext, Transport, WriteHook};
pub use stream::{KeyStream, StreamOptions};
pub use watchdog::{TimeoutHook, WATCHDOG_UNIT, Watchdog, WatchdogService};

pub mod prelude {
    pub use crate::error::{CoreError, ServiceError};
    pub use crate::group::{Service, ServiceRef};
    pub use crate::sink::{SinkContext, Transport};
    pub use crate::stream::{KeyStream, StreamOptions};
}
