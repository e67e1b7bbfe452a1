use std::io;

use sextet_core::SinkContext;
use sextet_model::Packet;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Line writer over an already-open destination.
#[derive(Debug)]
pub struct DirectSink<W> {
    out: W,
    written: u64,
}

impl<W> DirectSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Write `payload + '\n'` and flush. `Invalid` packets are skipped.
    pub async fn write_packet(&mut self, packet: &Packet) -> io::Result<()> {
        let Some(payload) = packet.payload() else {
            return Ok(());
        };
        self.out.write_all(payload.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;

        self.written += 1;
        trace!(packet = %packet, "packet written");
        Ok(())
    }

    /// Write packets until the context reports shutdown.
    pub async fn drain(&mut self, ctx: &SinkContext) -> io::Result<u64> {
        while let Some(packet) = ctx.next_packet().await {
            self.write_packet(&packet).await?;
        }
        Ok(self.written)
    }

    /// Lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Drain `sink` until the channel shuts down, shutting it down on `cancel`.
///
/// A write in flight when `cancel` fires is allowed to finish.
pub async fn drain_until_cancelled<W>(
    sink: &mut DirectSink<W>,
    ctx: &SinkContext,
    cancel: &CancellationToken,
) -> io::Result<u64>
where
    W: AsyncWrite + Unpin + Send,
{
    let drain = sink.drain(ctx);
    tokio::pin!(drain);

    let early = tokio::select! {
        res = &mut drain => Some(res),
        _ = cancel.cancelled() => None,
    };
    match early {
        Some(res) => res,
        None => {
            ctx.shutdown();
            drain.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextet_core::PacketChannel;
    use std::{sync::Arc, time::Duration};

    fn packet(s: &str) -> Packet {
        Packet::from_payload(Some(s.to_string()))
    }

    #[tokio::test]
    async fn writes_one_line_per_packet() {
        let mut sink = DirectSink::new(Vec::new());
        sink.write_packet(&packet("@A")).await.unwrap();
        sink.write_packet(&Packet::Blank).await.unwrap();
        sink.write_packet(&Packet::Invalid).await.unwrap();

        assert_eq!(sink.written(), 2);
        assert_eq!(sink.into_inner(), b"@A\n\n");
    }

    #[tokio::test]
    async fn drain_writes_queued_packets_until_shutdown() {
        let channel = Arc::new(PacketChannel::new());
        let ctx = SinkContext::detached(Arc::clone(&channel));
        channel.send(packet("a"));
        channel.send(packet("b"));

        let mut sink = DirectSink::new(Vec::new());
        let (res, _) = tokio::join!(sink.drain(&ctx), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.shutdown();
        });

        assert_eq!(res.unwrap(), 2);
        assert_eq!(sink.into_inner(), b"a\nb\n");
    }

    #[tokio::test]
    async fn cancel_ends_an_idle_drain() {
        let ctx = SinkContext::detached(Arc::new(PacketChannel::new()));
        let cancel = CancellationToken::new();
        let mut sink = DirectSink::new(Vec::new());

        let (res, _) = tokio::join!(drain_until_cancelled(&mut sink, &ctx, &cancel), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        assert_eq!(res.unwrap(), 0);
        assert!(ctx.channel().is_closing());
    }
}
