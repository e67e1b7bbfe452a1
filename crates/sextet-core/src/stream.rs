//! Orchestrator tying key state, channel, watchdog and one sink together.
use std::{fmt, sync::Arc, time::Duration};

use sextet_model::{KeyId, Packet};
use taskvisor::Subscribe;
use tracing::{debug, info};

use crate::{
    channel::PacketChannel,
    error::CoreError,
    group::{GroupConfig, GroupHandle, GroupReport, ServiceGroup, ServiceRef},
    keys::KeyState,
    metrics::{MetricsHandle, noop_metrics},
    sink::{SinkContext, Transport, WriteHook},
    watchdog::{TimeoutHook, Watchdog, WatchdogService},
};

/// Construction options for [`KeyStream`].
#[derive(Clone)]
pub struct StreamOptions {
    /// Idle interval after which a keepalive is requested; `None` disables it.
    pub watchdog_interval: Option<Duration>,
    pub group: GroupConfig,
    pub metrics: MetricsHandle,
    pub subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            watchdog_interval: Some(Duration::from_secs(1)),
            group: GroupConfig::default(),
            metrics: noop_metrics(),
            subscribers: Vec::new(),
        }
    }
}

/// Live key-state stream.
///
/// The input side calls [`KeyStream::report_key_transition`]; every real
/// change is encoded and queued for the sink. The watchdog asks for a
/// keepalive whenever the sink has been idle for one interval, and every
/// write (keepalives included) pushes that deadline back.
pub struct KeyStream {
    keys: KeyState,
    channel: Arc<PacketChannel>,
    watchdog: Arc<Watchdog>,
    sink: ServiceRef,
    handle: GroupHandle,
    opts: StreamOptions,
}

impl KeyStream {
    /// Wire up a stream around the sink built by `transport`.
    pub fn new(transport: &dyn Transport, opts: StreamOptions) -> Result<Arc<Self>, CoreError> {
        let channel = Arc::new(PacketChannel::new());
        let handle = GroupHandle::new();
        let sink_unit = transport.name();

        let on_timeout: TimeoutHook = {
            let channel = Arc::clone(&channel);
            let handle = handle.clone();
            let metrics = Arc::clone(&opts.metrics);
            Arc::new(move || {
                if handle.is_running(sink_unit) && channel.hint_keepalive() {
                    metrics.record_keepalive_hint();
                }
            })
        };
        let watchdog = Arc::new(Watchdog::new(opts.watchdog_interval, on_timeout));
        watchdog.reset();

        let on_write: WriteHook = {
            let watchdog = Arc::clone(&watchdog);
            Arc::new(move |_: &Packet| watchdog.reset())
        };
        let ctx = SinkContext::new(Arc::clone(&channel), on_write, Arc::clone(&opts.metrics));
        let sink = transport.build(ctx)?;
        if sink.name() != sink_unit {
            return Err(CoreError::Sink {
                transport: sink_unit,
                reason: format!("sink unit is named '{}'", sink.name()),
            });
        }

        debug!(transport = sink_unit, interval = ?opts.watchdog_interval, "key stream assembled");
        Ok(Arc::new(Self {
            keys: KeyState::new(),
            channel,
            watchdog,
            sink,
            handle,
            opts,
        }))
    }

    /// Apply a key transition; on a real change queue the new state.
    ///
    /// Returns `true` iff the pressed set changed.
    pub fn report_key_transition(&self, key: KeyId, down: bool) -> bool {
        if !self.keys.update(key, down) {
            return false;
        }
        let packet = self.keys.to_packet();
        debug!(key, down, state = %packet, "key state changed");

        let evicted = self.channel.send(packet);
        self.opts.metrics.record_packet_queued();
        if evicted > 0 {
            self.opts.metrics.record_packets_dropped(evicted as u64);
        }
        true
    }

    /// The input surface is going away; stop the whole group.
    pub fn notify_closing(&self) {
        info!("input closing; stopping stream");
        self.handle.stop();
    }

    /// Encoded form of the current key state.
    pub fn current_packet(&self) -> Packet {
        self.keys.to_packet()
    }

    pub fn handle(&self) -> &GroupHandle {
        &self.handle
    }

    pub fn channel(&self) -> &Arc<PacketChannel> {
        &self.channel
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Name of the sink unit.
    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    /// Run sink, watchdog and `extra` units as one group until it stops.
    pub async fn run(self: &Arc<Self>, extra: Vec<ServiceRef>) -> Result<GroupReport, CoreError> {
        let mut group = ServiceGroup::new(self.opts.group, self.handle.clone())
            .with_subscribers(self.opts.subscribers.clone())
            .with_metrics(Arc::clone(&self.opts.metrics));

        group.add(Arc::clone(&self.sink))?;
        group.add(WatchdogService::new(Arc::clone(&self.watchdog)).into_ref())?;
        for unit in extra {
            group.add(unit)?;
        }

        let report = group.run().await?;
        debug!(dropped = self.channel.dropped(), "key stream finished");
        Ok(report)
    }
}

impl fmt::Debug for KeyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStream")
            .field("sink", &self.sink.name())
            .field("watchdog", &self.watchdog)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ServiceError,
        group::{Service, UnitState},
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    type Lines = Arc<Mutex<Vec<String>>>;

    struct CaptureTransport {
        lines: Lines,
        fail: bool,
    }

    struct CaptureSink {
        ctx: SinkContext,
        lines: Lines,
        fail: bool,
    }

    impl Transport for CaptureTransport {
        fn name(&self) -> &'static str {
            "capture"
        }

        fn build(&self, ctx: SinkContext) -> Result<ServiceRef, CoreError> {
            Ok(Arc::new(CaptureSink {
                ctx,
                lines: Arc::clone(&self.lines),
                fail: self.fail,
            }))
        }
    }

    #[async_trait]
    impl Service for CaptureSink {
        fn name(&self) -> &'static str {
            "capture"
        }

        async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
            if self.fail {
                return Err(ServiceError::Fatal("sink broke".into()));
            }
            let drain = async {
                while let Some(p) = self.ctx.next_packet().await {
                    self.lines.lock().unwrap().push(p.payload().unwrap().to_string());
                }
            };
            tokio::select! {
                _ = drain => {}
                _ = cancel.cancelled() => self.ctx.shutdown(),
            }
            Ok(())
        }
    }

    fn stream(interval: Option<Duration>, fail: bool) -> (Arc<KeyStream>, Lines) {
        let lines: Lines = Arc::default();
        let transport = CaptureTransport {
            lines: Arc::clone(&lines),
            fail,
        };
        let opts = StreamOptions {
            watchdog_interval: interval,
            group: GroupConfig {
                grace: Duration::from_secs(2),
            },
            ..Default::default()
        };
        (KeyStream::new(&transport, opts).unwrap(), lines)
    }

    async fn wait_for(lines: &Lines, pred: impl Fn(&[String]) -> bool) {
        for _ in 0..200 {
            if pred(&lines.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; lines = {:?}", lines.lock().unwrap());
    }

    #[tokio::test]
    async fn transitions_become_lines() {
        let (ks, lines) = stream(None, false);
        let runner = {
            let ks = Arc::clone(&ks);
            tokio::spawn(async move { ks.run(Vec::new()).await })
        };
        wait_for(&lines, |_| ks.handle().is_running("capture")).await;

        assert!(ks.report_key_transition(0, true));
        wait_for(&lines, |l| l.len() == 1).await;
        assert!(ks.report_key_transition(5, true));
        wait_for(&lines, |l| l.len() == 2).await;
        assert!(!ks.report_key_transition(5, true));
        assert!(ks.report_key_transition(0, false));
        assert!(ks.report_key_transition(5, false));
        wait_for(&lines, |l| l.last().map(String::as_str) == Some("@")).await;

        assert_eq!(&lines.lock().unwrap()[..2], ["A", "a"]);

        ks.notify_closing();
        let report = runner.await.unwrap().unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.state("capture"), Some(UnitState::Terminated));
        assert_eq!(report.state("watchdog"), Some(UnitState::Terminated));
    }

    #[tokio::test]
    async fn idle_stream_emits_keepalives() {
        let (ks, lines) = stream(Some(Duration::from_millis(40)), false);
        let runner = {
            let ks = Arc::clone(&ks);
            tokio::spawn(async move { ks.run(Vec::new()).await })
        };

        wait_for(&lines, |l| l.iter().filter(|s| s.is_empty()).count() >= 2).await;
        assert!(ks.watchdog().is_armed());

        ks.notify_closing();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_waits_for_a_running_sink() {
        let (ks, _) = stream(Some(Duration::from_millis(40)), false);
        let cancel = CancellationToken::new();
        let watchdog = {
            let watchdog = Arc::clone(ks.watchdog());
            let cancel = cancel.clone();
            tokio::spawn(async move { watchdog.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ks.watchdog().is_armed());
        assert!(ks.channel().is_empty(), "no keepalive without a running sink");

        cancel.cancel();
        watchdog.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn writes_push_the_keepalive_back() {
        let (ks, lines) = stream(Some(Duration::from_millis(100)), false);
        let runner = {
            let ks = Arc::clone(&ks);
            tokio::spawn(async move { ks.run(Vec::new()).await })
        };
        wait_for(&lines, |_| ks.handle().is_running("capture")).await;

        for i in 0..8 {
            ks.report_key_transition(0, i % 2 == 0);
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        {
            let lines = lines.lock().unwrap();
            assert_eq!(lines.len(), 8);
            assert!(lines.iter().all(|l| !l.is_empty()), "{lines:?}");
        }

        wait_for(&lines, |l| l.iter().any(String::is_empty)).await;

        ks.notify_closing();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failing_sink_stops_the_group() {
        let (ks, _) = stream(Some(Duration::from_millis(40)), true);
        let report = tokio::time::timeout(Duration::from_secs(5), ks.run(Vec::new()))
            .await
            .expect("group must stop")
            .unwrap();

        assert_eq!(report.state("capture"), Some(UnitState::Failed));
        assert_eq!(report.state("watchdog"), Some(UnitState::Terminated));
        assert!(ks.handle().is_stopping());
    }

    #[test]
    fn unchanged_transition_is_not_queued() {
        let (ks, _) = stream(None, false);
        assert!(!ks.report_key_transition(3, false));
        assert!(ks.channel().is_empty());

        assert!(ks.report_key_transition(3, true));
        assert_eq!(ks.channel().len(), 1);
        assert_eq!(ks.current_packet().payload(), Some("H"));
    }

    #[test]
    fn bursts_keep_only_latest_four_states() {
        let (ks, _) = stream(None, false);
        for key in 0..6 {
            ks.report_key_transition(key, true);
        }
        assert_eq!(ks.channel().len(), 4);
        assert_eq!(ks.channel().dropped(), 2);
    }
}
