//! Accept-then-write TCP sink.
//!
//! Listens on `host:port`, accepts exactly one client, shuts down the read
//! side (the protocol is send-only) and streams lines to it. The accept wait
//! runs in [`ACCEPT_SLICE`] slices so a stop request is honored promptly.
use std::{
    io,
    net::{Shutdown, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use sextet_core::{CoreError, Service, ServiceError, ServiceRef, SinkContext, Transport};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{DirectSink, drain_until_cancelled};

/// Unit name of the TCP sink.
pub const TCP_UNIT: &str = "tcp";

/// Longest single wait for an incoming connection before re-checking for stop.
pub const ACCEPT_SLICE: Duration = Duration::from_millis(250);

/// Address used when no host is configured.
const ANY_HOST: &str = "0.0.0.0";

/// Streams packets to a single accepted TCP client.
#[derive(Debug)]
pub struct TcpTransport {
    host: Option<String>,
    port: u16,
    local_addr: Arc<watch::Sender<Option<SocketAddr>>>,
}

impl TcpTransport {
    /// `host == None` listens on every local address.
    pub fn new(host: Option<String>, port: u16) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            host,
            port,
            local_addr: Arc::new(tx),
        }
    }

    /// Bound address, published once the listener is open.
    pub fn local_addr(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.local_addr.subscribe()
    }
}

impl Transport for TcpTransport {
    fn name(&self) -> &'static str {
        TCP_UNIT
    }

    fn build(&self, ctx: SinkContext) -> Result<ServiceRef, CoreError> {
        Ok(Arc::new(TcpSink {
            ctx,
            host: self.host.clone().unwrap_or_else(|| ANY_HOST.to_string()),
            port: self.port,
            local_addr: Arc::clone(&self.local_addr),
        }))
    }
}

struct TcpSink {
    ctx: SinkContext,
    host: String,
    port: u16,
    local_addr: Arc<watch::Sender<Option<SocketAddr>>>,
}

impl TcpSink {
    async fn bind(&self) -> Result<TcpListener, ServiceError> {
        let addr = format!("{}:{}", self.host, self.port);
        match TcpListener::bind((self.host.as_str(), self.port)).await {
            Ok(listener) => Ok(listener),
            Err(source) => {
                warn!(%addr, error = %source, "failed to open listening socket");
                Err(ServiceError::Bind { addr, source })
            }
        }
    }
}

#[async_trait]
impl Service for TcpSink {
    fn name(&self) -> &'static str {
        TCP_UNIT
    }

    #[instrument(level = "debug", skip_all, fields(host = %self.host, port = self.port))]
    async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let listener = self.bind().await?;
        let local = listener.local_addr()?;
        self.local_addr.send_replace(Some(local));
        info!(%local, "waiting for client");

        let Some((stream, peer)) = accept_client(&listener, &cancel).await? else {
            info!("stopped waiting for client because the sink is stopping");
            self.ctx.shutdown();
            return Ok(());
        };
        drop(listener);
        info!(%peer, "client connected");

        let mut sink = DirectSink::new(send_only(stream)?);
        match drain_until_cancelled(&mut sink, &self.ctx, &cancel).await {
            Ok(written) => {
                debug!(%peer, written, "tcp sink finished");
                Ok(())
            }
            Err(e) if is_peer_gone(&e) => {
                warn!(%peer, error = %e, "client is no longer connected");
                self.ctx.shutdown();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Wait for one client, giving up (with `None`) once `cancel` fires.
async fn accept_client(
    listener: &TcpListener,
    cancel: &CancellationToken,
) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            res = tokio::time::timeout(ACCEPT_SLICE, listener.accept()) => match res {
                Err(_) => continue,
                Ok(Ok(pair)) => return Ok(Some(pair)),
                Ok(Err(e)) if is_transient_accept(&e) => {
                    debug!(error = %e, "transient accept error");
                    continue;
                }
                Ok(Err(e)) => return Err(e),
            },
        }
    }
}

/// Close the read half; nothing is ever read from the client.
fn send_only(stream: TcpStream) -> io::Result<TcpStream> {
    let std = stream.into_std()?;
    if let Err(e) = std.shutdown(Shutdown::Read) {
        debug!(error = %e, "could not shut down read side");
    }
    TcpStream::from_std(std)
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}

fn is_transient_accept(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}
