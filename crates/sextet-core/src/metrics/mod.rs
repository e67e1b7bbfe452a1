//! Metrics collection abstraction for the streaming core.
//!
//! Backends (prometheus, etc) implement [`MetricsBackend`] and are handed to
//! [`crate::KeyStream`], which shares the handle with the sink context.
mod backend;
pub use backend::{MetricsBackend, MetricsHandle};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
