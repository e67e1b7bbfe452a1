use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder, proto::MetricFamily};

use sextet_core::{MetricsBackend, UnitState};
use sextet_model::PacketKind;

const NAMESPACE: &str = "sextet";

/// Prometheus metrics backend for the stream.
///
/// ## Label cardinality
/// - `kind`: "state", "keepalive"
/// - `unit`: sink name, "watchdog", "input"
/// - `state`: "terminated", "failed"
#[derive(Clone)]
pub struct PrometheusMetrics {
    packets_queued: IntCounter,
    packets_dropped: IntCounter,
    keepalive_hints: IntCounter,
    packets_written: IntCounterVec,
    units_finished: IntCounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create the backend and register its collectors in `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let packets_queued = IntCounter::with_opts(
            Opts::new("packets_queued_total", "State packets accepted by the channel")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(packets_queued.clone()))?;

        let packets_dropped = IntCounter::with_opts(
            Opts::new(
                "packets_dropped_total",
                "Waiting packets evicted in favor of newer ones",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(packets_dropped.clone()))?;

        let keepalive_hints = IntCounter::with_opts(
            Opts::new("keepalive_hints_total", "Blank keepalive packets queued")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(keepalive_hints.clone()))?;

        let packets_written = IntCounterVec::new(
            Opts::new("packets_written_total", "Packets handed to the transport")
                .namespace(NAMESPACE),
            &["kind"],
        )?;
        registry.register(Box::new(packets_written.clone()))?;

        let units_finished = IntCounterVec::new(
            Opts::new("units_finished_total", "Service units that reached a final state")
                .namespace(NAMESPACE),
            &["unit", "state"],
        )?;
        registry.register(Box::new(units_finished.clone()))?;

        Ok(Self {
            packets_queued,
            packets_dropped,
            keepalive_hints,
            packets_written,
            units_finished,
            registry,
        })
    }

    /// Create the backend with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.gather())
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_packet_queued(&self) {
        self.packets_queued.inc();
    }

    fn record_packets_dropped(&self, count: u64) {
        self.packets_dropped.inc_by(count);
    }

    fn record_keepalive_hint(&self) {
        self.keepalive_hints.inc();
    }

    fn record_packet_written(&self, kind: PacketKind) {
        self.packets_written
            .with_label_values(&[kind.as_label()])
            .inc();
    }

    fn record_unit_finished(&self, unit: &str, state: UnitState) {
        self.units_finished
            .with_label_values(&[unit, state.as_label()])
            .inc();
    }
}
