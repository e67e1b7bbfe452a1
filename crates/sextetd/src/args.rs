//! `key=value` command-line arguments.
use std::collections::BTreeSet;

use sextet_model::{ModelError, StreamConfig, StreamParams};
use sextet_observe::{LoggerConfig, LoggerError};
use thiserror::Error;

pub const USAGE: &str = "\
usage: sextetd [key=value ...]

  mode=stdout|tcp    output destination (default: tcp if port is set, else stdout)
  host=ADDR          tcp listen address (default: all interfaces)
  port=N             tcp listen port, 0..=65535
  interval=MS        keepalive interval in milliseconds, <= 0 disables (default: 1000)
  log=FILTER         log filter, e.g. info or sextet_core=debug,info (default: info)
  log-format=FORMAT  text|json|journald (default: text)
  log-tz=TZ          utc|local (default: utc)

Key input is read from stdin, one per line: +N / down N, -N / up N, quit.";

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("help requested")]
    Help,

    #[error("expected key=value, got '{0}'")]
    Malformed(String),

    #[error("unknown parameter '{0}'")]
    UnknownKey(String),

    #[error("parameter '{0}' given more than once")]
    Duplicate(String),

    #[error("parameter '{key}' must be an integer, got '{value}'")]
    NotAnInteger { key: String, value: String },

    #[error(transparent)]
    Config(#[from] ModelError),

    #[error(transparent)]
    Logger(#[from] LoggerError),
}

#[derive(Debug, Clone)]
pub struct Args {
    pub stream: StreamConfig,
    pub logger: LoggerConfig,
}

/// Parse the arguments following the program name.
pub fn parse<I, S>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut params = StreamParams::default();
    let mut logger = LoggerConfig::default();
    let mut seen = BTreeSet::new();

    for arg in args {
        let arg = arg.as_ref();
        if matches!(arg, "help" | "-h" | "--help") {
            return Err(ArgsError::Help);
        }
        let (key, value) = arg
            .split_once('=')
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| ArgsError::Malformed(arg.to_string()))?;
        if !seen.insert(key.to_string()) {
            return Err(ArgsError::Duplicate(key.to_string()));
        }

        match key {
            "mode" => params.mode = Some(value.parse()?),
            "host" => params.host = Some(value.to_string()),
            "port" => params.port = Some(integer(key, value)?),
            "interval" => params.interval = Some(integer(key, value)?),
            "log" => logger.level = value.parse()?,
            "log-format" => logger.format = value.parse()?,
            "log-tz" => logger.tz = value.parse()?,
            _ => return Err(ArgsError::UnknownKey(key.to_string())),
        }
    }

    Ok(Args {
        stream: StreamConfig::try_from(params)?,
        logger,
    })
}

fn integer(key: &str, value: &str) -> Result<i64, ArgsError> {
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::NotAnInteger {
            key: key.to_string(),
            value: value.to_string(),
        })
}
