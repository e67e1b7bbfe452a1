use std::sync::Arc;

use sextet_model::PacketKind;

use crate::group::UnitState;

/// Backend metrics collection interface.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a state packet accepted by the channel.
    fn record_packet_queued(&self);
    /// Record older packets evicted to make room for a newer one.
    ///
    /// Called only with `count > 0`.
    fn record_packets_dropped(&self, count: u64);
    /// Record a keepalive hint that actually queued a blank packet.
    fn record_keepalive_hint(&self);
    /// Record a packet handed to the transport for writing.
    fn record_packet_written(&self, kind: PacketKind);
    /// Record the terminal state of a service unit.
    ///
    /// # Arguments
    /// - `unit`: Unit name
    /// - `state`: `Terminated` or `Failed`
    fn record_unit_finished(&self, unit: &str, state: UnitState);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
