//! Line-oriented key input.
use std::sync::Arc;

use async_trait::async_trait;
use sextet_core::{KeyStream, Service, ServiceError, ServiceRef};
use sextet_model::{KeyId, KeyTransition};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader, Stdin},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const INPUT_UNIT: &str = "input";

/// Highest accepted key identifier. Payload length grows with the highest
/// pressed key, so one stray huge id would otherwise cost a huge line.
pub const MAX_KEY: KeyId = 4095;

/// Reads key transitions, one per line, and feeds them to the stream.
///
/// `quit`, `exit` or end of input closes the stream.
pub struct InputSource<R> {
    stream: Arc<KeyStream>,
    reader: Mutex<Option<R>>,
}

impl InputSource<Stdin> {
    pub fn stdin(stream: Arc<KeyStream>) -> Self {
        Self::new(stream, tokio::io::stdin())
    }
}

impl<R> InputSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(stream: Arc<KeyStream>, reader: R) -> Self {
        Self {
            stream,
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn into_ref(self) -> ServiceRef {
        Arc::new(self)
    }

    /// Returns `false` once the input asked to close.
    fn apply(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return false;
        }
        match line.parse::<KeyTransition>() {
            Ok(t) if t.key > MAX_KEY => {
                warn!(key = t.key, max = MAX_KEY, "ignoring out-of-range key")
            }
            Ok(t) => {
                if self.stream.report_key_transition(t.key, t.down) {
                    debug!(transition = %t, state = %self.stream.current_packet(), "input applied");
                }
            }
            Err(e) => warn!(error = %e, "ignoring input line"),
        }
        true
    }
}

#[async_trait]
impl<R> Service for InputSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        INPUT_UNIT
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        let Some(reader) = self.reader.lock().await.take() else {
            return Err(ServiceError::Fatal("input already consumed".into()));
        };
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                read = reader.read_until(b'\n', &mut buf) => read?,
            };
            if read == 0 {
                info!("end of input");
                break;
            }
            // Bytes that are not UTF-8 only spoil their own line.
            if !self.apply(&String::from_utf8_lossy(&buf)) {
                info!("quit requested");
                break;
            }
        }
        self.stream.notify_closing();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextet_core::StreamOptions;
    use sextet_transport::stdout::StdoutTransport;

    fn stream() -> Arc<KeyStream> {
        KeyStream::new(&StdoutTransport, StreamOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn applies_lines_and_closes_at_end_of_input() {
        let stream = stream();
        let input = InputSource::new(Arc::clone(&stream), &b"+5\n+0\nbogus\n\n-5\n"[..]);

        input.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stream.current_packet().payload(), Some("A"));
        assert!(stream.handle().is_stopping());
    }

    #[tokio::test]
    async fn undecodable_line_is_skipped() {
        let stream = stream();
        let input = InputSource::new(Arc::clone(&stream), &b"+1\n\xff\xfe\n+2\n"[..]);

        input.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stream.current_packet().payload(), Some("F"));
        assert!(stream.handle().is_stopping());
    }

    #[tokio::test]
    async fn keys_above_the_limit_are_ignored() {
        let stream = stream();
        let input = InputSource::new(
            Arc::clone(&stream),
            &b"+4294967295\n+4096\n+4095\n"[..],
        );

        input.run(CancellationToken::new()).await.unwrap();

        let payload = stream.current_packet().payload().map(str::len);
        assert_eq!(payload, Some(MAX_KEY as usize / 6 + 1));
    }

    #[tokio::test]
    async fn quit_stops_reading() {
        let stream = stream();
        let input = InputSource::new(Arc::clone(&stream), &b"down 3\nquit\n+4\n"[..]);

        input.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stream.current_packet().payload(), Some("H"));
        assert!(stream.handle().is_stopping());
    }

    #[tokio::test]
    async fn cancel_leaves_the_stream_running() {
        let stream = stream();
        let (_writer, reader) = tokio::io::duplex(64);
        let input = InputSource::new(Arc::clone(&stream), reader);

        let cancel = CancellationToken::new();
        cancel.cancel();
        input.run(cancel).await.unwrap();

        assert!(!stream.handle().is_stopping());
    }
}
