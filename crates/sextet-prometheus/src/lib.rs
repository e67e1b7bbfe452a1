//! Prometheus metrics backend for the key-state stream.
//!
//! [`PrometheusMetrics`] implements [`sextet_core::MetricsBackend`]; hand it to
//! the stream through `StreamOptions::metrics` and read the counters back with
//! [`PrometheusMetrics::gather`] or [`PrometheusMetrics::encode_text`].
//!
//! ## Metrics
//! - `sextet_packets_queued_total` - Counter
//! - `sextet_packets_dropped_total` - Counter
//! - `sextet_keepalive_hints_total` - Counter
//! - `sextet_packets_written_total{kind}` - Counter
//! - `sextet_units_finished_total{unit, state}` - Counter
//!
//! No HTTP endpoint is served; the daemon logs the text exposition on exit.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
