use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize, Serializer};

use crate::ModelError;

/// Watchdog interval used when none is configured.
pub const DEFAULT_INTERVAL_MS: i64 = 1000;

/// Output destination.
/// - `Stdout`: one payload per line on standard output.
/// - `Tcp`:    listen, accept a single client, stream lines to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Stdout,
    Tcp,
}

impl FromStr for Mode {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "tcp" => Ok(Self::Tcp),
            _ => Err(ModelError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Stdout => "stdout",
            Mode::Tcp => "tcp",
        })
    }
}

impl Serialize for Mode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Raw, unvalidated stream parameters as supplied by the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub mode: Option<Mode>,
    pub host: Option<String>,
    pub port: Option<i64>,
    /// Watchdog interval in milliseconds; non-positive disables it.
    pub interval: Option<i64>,
}

/// Validated stream configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    mode: Mode,
    host: Option<String>,
    port: Option<u16>,
    interval_ms: i64,
}

impl StreamConfig {
    /// Standard-output streaming with the given watchdog interval.
    pub fn stdout(interval_ms: i64) -> Self {
        Self {
            mode: Mode::Stdout,
            host: None,
            port: None,
            interval_ms,
        }
    }

    /// TCP streaming on `host:port` (`None` host means any local address).
    pub fn tcp(host: Option<String>, port: u16, interval_ms: i64) -> Self {
        Self {
            mode: Mode::Tcp,
            host,
            port: Some(port),
            interval_ms,
        }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    #[inline]
    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Watchdog period, or `None` when the watchdog is disabled.
    pub fn watchdog_interval(&self) -> Option<Duration> {
        u64::try_from(self.interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stdout(DEFAULT_INTERVAL_MS)
    }
}

impl TryFrom<StreamParams> for StreamConfig {
    type Error = ModelError;

    /// Rules:
    /// - mode defaults to `tcp` when a port is given, `stdout` otherwise;
    /// - `stdout` forbids both host and port;
    /// - `tcp` requires a port in `0..=65535`;
    /// - interval defaults to [`DEFAULT_INTERVAL_MS`].
    fn try_from(p: StreamParams) -> Result<Self, Self::Error> {
        let mode = p.mode.unwrap_or(if p.port.is_some() {
            Mode::Tcp
        } else {
            Mode::Stdout
        });
        let interval_ms = p.interval.unwrap_or(DEFAULT_INTERVAL_MS);

        match mode {
            Mode::Stdout => {
                if p.host.is_some() || p.port.is_some() {
                    return Err(ModelError::RemoteInStdoutMode);
                }
                Ok(Self::stdout(interval_ms))
            }
            Mode::Tcp => {
                let raw = p.port.ok_or(ModelError::MissingPort)?;
                let port = u16::try_from(raw).map_err(|_| ModelError::InvalidPort(raw))?;
                Ok(Self::tcp(p.host, port, interval_ms))
            }
        }
    }
}

impl fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Mode::Stdout => write!(f, "StreamConfig(mode=stdout, interval={}ms)", self.interval_ms),
            Mode::Tcp => write!(
                f,
                "StreamConfig(mode=tcp, host={}, port={}, interval={}ms)",
                self.host.as_deref().unwrap_or("*"),
                self.port.unwrap_or_default(),
                self.interval_ms,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: Option<Mode>, host: Option<&str>, port: Option<i64>) -> StreamParams {
        StreamParams {
            mode,
            host: host.map(str::to_string),
            port,
            interval: None,
        }
    }

    #[test]
    fn empty_params_mean_stdout_with_default_interval() {
        let cfg = StreamConfig::try_from(StreamParams::default()).unwrap();
        assert_eq!(cfg.mode(), Mode::Stdout);
        assert_eq!(cfg.interval_ms(), DEFAULT_INTERVAL_MS);
        assert_eq!(cfg.watchdog_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn port_implies_tcp() {
        let cfg = StreamConfig::try_from(params(None, None, Some(6761))).unwrap();
        assert_eq!(cfg.mode(), Mode::Tcp);
        assert_eq!(cfg.port(), Some(6761));
        assert_eq!(cfg.host(), None);
    }

    #[test]
    fn tcp_keeps_host() {
        let cfg =
            StreamConfig::try_from(params(Some(Mode::Tcp), Some("localhost"), Some(0))).unwrap();
        assert_eq!(cfg.host(), Some("localhost"));
        assert_eq!(cfg.port(), Some(0));
    }

    #[test]
    fn stdout_rejects_host_or_port() {
        for p in [
            params(Some(Mode::Stdout), Some("localhost"), None),
            params(Some(Mode::Stdout), None, Some(1)),
            params(None, Some("localhost"), None),
        ] {
            let err = StreamConfig::try_from(p).unwrap_err();
            assert!(matches!(err, ModelError::RemoteInStdoutMode));
        }
    }

    #[test]
    fn tcp_requires_port_in_range() {
        let err = StreamConfig::try_from(params(Some(Mode::Tcp), None, None)).unwrap_err();
        assert!(matches!(err, ModelError::MissingPort));

        for bad in [-1, 65_536, i64::MAX] {
            let err = StreamConfig::try_from(params(None, None, Some(bad))).unwrap_err();
            assert!(matches!(err, ModelError::InvalidPort(p) if p == bad));
        }
    }

    #[test]
    fn non_positive_interval_disables_watchdog() {
        for ms in [0, -5] {
            assert_eq!(StreamConfig::stdout(ms).watchdog_interval(), None);
        }
        assert_eq!(
            StreamConfig::stdout(250).watchdog_interval(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn mode_parses_case_insensitive() {
        assert_eq!("TCP".parse::<Mode>().unwrap(), Mode::Tcp);
        assert_eq!(" stdout ".parse::<Mode>().unwrap(), Mode::Stdout);
        assert!("udp".parse::<Mode>().is_err());
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: StreamParams = serde_json::from_str(r#"{"port": 6761}"#).unwrap();
        assert!(p.mode.is_none());
        let cfg = StreamConfig::try_from(p).unwrap();
        assert_eq!(cfg.mode(), Mode::Tcp);

        let p: StreamParams = serde_json::from_str(r#"{"mode": "Stdout", "interval": 0}"#).unwrap();
        let cfg = StreamConfig::try_from(p).unwrap();
        assert_eq!(cfg.mode(), Mode::Stdout);
        assert_eq!(cfg.watchdog_interval(), None);
    }

    #[test]
    fn display_summarizes() {
        assert_eq!(
            StreamConfig::tcp(None, 6761, 1000).to_string(),
            "StreamConfig(mode=tcp, host=*, port=6761, interval=1000ms)"
        );
    }
}
