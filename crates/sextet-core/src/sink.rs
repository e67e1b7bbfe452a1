//! Seam between the core and concrete transport sinks.
//!
//! A [`Transport`] builds the sink unit; the unit pulls packets through its
//! [`SinkContext`], which also notifies the orchestrator before each write.
use std::{fmt, sync::Arc};

use sextet_model::Packet;

use crate::{
    channel::PacketChannel,
    error::CoreError,
    group::ServiceRef,
    metrics::{MetricsHandle, noop_metrics},
};

/// Called right before a packet is written out.
pub type WriteHook = Arc<dyn Fn(&Packet) + Send + Sync>;

/// Shared dependencies handed to a sink when it is built.
#[derive(Clone)]
pub struct SinkContext {
    channel: Arc<PacketChannel>,
    on_write: WriteHook,
    metrics: MetricsHandle,
}

impl SinkContext {
    pub fn new(channel: Arc<PacketChannel>, on_write: WriteHook, metrics: MetricsHandle) -> Self {
        Self {
            channel,
            on_write,
            metrics,
        }
    }

    /// Context with a no-op write hook and no-op metrics.
    pub fn detached(channel: Arc<PacketChannel>) -> Self {
        Self::new(channel, Arc::new(|_: &Packet| {}), noop_metrics())
    }

    pub fn channel(&self) -> &Arc<PacketChannel> {
        &self.channel
    }

    /// Wait for the next packet to write; `None` means the sink should finish.
    ///
    /// Every returned packet has already been reported as "about to be written".
    pub async fn next_packet(&self) -> Option<Packet> {
        let packet = self.channel.receive().await?;
        (self.on_write)(&packet);
        if let Some(kind) = packet.kind() {
            self.metrics.record_packet_written(kind);
        }
        Some(packet)
    }

    /// Unblock a pending [`SinkContext::next_packet`] for good.
    pub fn shutdown(&self) {
        self.channel.request_shutdown();
    }
}

impl fmt::Debug for SinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkContext")
            .field("channel", &self.channel)
            .field("on_write", &"<hook>")
            .field("metrics", &"<handle>")
            .finish()
    }
}

/// Factory for the sink unit of a stream.
///
/// Implementations decide where packets go (stdout, a TCP client, ...). The
/// unit they build must call [`SinkContext::shutdown`] when cancelled so a
/// pending receive returns.
pub trait Transport: Send + Sync {
    /// Transport name; also the name of the sink unit in the group.
    fn name(&self) -> &'static str;

    /// Build the sink unit.
    fn build(&self, ctx: SinkContext) -> Result<ServiceRef, CoreError>;
}
