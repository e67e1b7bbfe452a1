mod args;
mod input;

use std::{process::ExitCode, sync::Arc, time::Duration};

use anyhow::Context;
use taskvisor::Subscribe;
use tracing::{debug, error, info, warn};

use sextet_core::{
    GroupConfig, GroupReport, KeyStream, MetricsHandle, ServiceRef, StreamOptions,
};
use sextet_observe::{Subscriber, init_local_offset, init_logger};
use sextet_prometheus::PrometheusMetrics;
use sextet_transport::transport_for;

use crate::{
    args::{Args, ArgsError, USAGE},
    input::InputSource,
};

/// How long runtime shutdown waits for blocking work such as a pending stdin read.
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let args = match args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(ArgsError::Help) => {
            eprintln!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("sextetd: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    // Before any thread exists.
    init_local_offset();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("sextetd: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);

    match result {
        Ok(report) if report.failures.is_empty() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("sextetd: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<GroupReport> {
    init_logger(&args.logger).context("logger")?;
    info!(config = %args.stream, "starting");

    let metrics = Arc::new(PrometheusMetrics::new().context("metrics registry")?);
    let handle: MetricsHandle = metrics.clone();
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Subscriber)];

    let transport = transport_for(&args.stream);
    let stream = KeyStream::new(
        transport.as_ref(),
        StreamOptions {
            watchdog_interval: args.stream.watchdog_interval(),
            group: GroupConfig::default(),
            metrics: handle,
            subscribers,
        },
    )?;

    let report = stream.run(extra_units(&stream)).await?;

    for (unit, reason) in &report.failures {
        error!(unit = *unit, reason = %reason, "unit failed");
    }
    if report.grace_exceeded {
        warn!("not every unit stopped within the grace period");
    }
    match metrics.encode_text() {
        Ok(text) => debug!(metrics = %text, "final counters"),
        Err(e) => warn!(error = %e, "failed to encode metrics"),
    }
    info!(clean = report.is_clean(), "stopped");
    Ok(report)
}

/// Units run next to the sink and watchdog.
///
/// OS signals (Ctrl-C, SIGTERM) are handled by the supervisor itself.
fn extra_units(stream: &Arc<KeyStream>) -> Vec<ServiceRef> {
    vec![InputSource::stdin(Arc::clone(stream)).into_ref()]
}
