//! Transport sinks for the key-state stream.
//!
//! Both sinks share [`DirectSink`], which writes one payload per line and
//! flushes after each one.
mod direct;
pub use direct::{DirectSink, drain_until_cancelled};

#[cfg(feature = "stdout")]
pub mod stdout;
#[cfg(feature = "tcp")]
pub mod tcp;

use sextet_model::{Mode, StreamConfig};

/// Pick the transport described by a validated stream configuration.
#[cfg(all(feature = "stdout", feature = "tcp"))]
pub fn transport_for(cfg: &StreamConfig) -> Box<dyn sextet_core::Transport> {
    match cfg.mode() {
        Mode::Stdout => Box::new(stdout::StdoutTransport),
        Mode::Tcp => Box::new(tcp::TcpTransport::new(
            cfg.host().map(str::to_string),
            cfg.port().unwrap_or_default(),
        )),
    }
}
