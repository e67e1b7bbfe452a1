use sextet_model::PacketKind;

use crate::{group::UnitState, metrics::backend::MetricsBackend};

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_packet_queued(&self) {}

    #[inline(always)]
    fn record_packets_dropped(&self, _: u64) {}

    #[inline(always)]
    fn record_keepalive_hint(&self) {}

    #[inline(always)]
    fn record_packet_written(&self, _: PacketKind) {}

    #[inline(always)]
    fn record_unit_finished(&self, _: &str, _: UnitState) {}
}
