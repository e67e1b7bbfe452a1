//! Standard-output sink.
use std::sync::Arc;

use async_trait::async_trait;
use sextet_core::{CoreError, Service, ServiceError, ServiceRef, SinkContext, Transport};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{DirectSink, drain_until_cancelled};

/// Unit name of the stdout sink.
pub const STDOUT_UNIT: &str = "stdout";

/// Writes every packet as a line on the process's standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutTransport;

impl Transport for StdoutTransport {
    fn name(&self) -> &'static str {
        STDOUT_UNIT
    }

    fn build(&self, ctx: SinkContext) -> Result<ServiceRef, CoreError> {
        Ok(Arc::new(StdoutSink { ctx }))
    }
}

struct StdoutSink {
    ctx: SinkContext,
}

#[async_trait]
impl Service for StdoutSink {
    fn name(&self) -> &'static str {
        STDOUT_UNIT
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let mut sink = DirectSink::new(tokio::io::stdout());
        let written = drain_until_cancelled(&mut sink, &self.ctx, &cancel).await?;
        debug!(written, "stdout sink finished");
        Ok(())
    }
}
