use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown mode: {0} (expected: stdout|tcp)")]
    UnknownMode(String),

    #[error("{0} is not a valid port number")]
    InvalidPort(i64),

    #[error("parameters 'host' and 'port' must be unset when in stdout mode")]
    RemoteInStdoutMode,

    #[error("parameter 'port' must be set when in tcp mode")]
    MissingPort,

    #[error("invalid sextet character {0:?} at offset {1}")]
    InvalidSextet(char, usize),

    #[error("invalid key transition: {0}")]
    InvalidTransition(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
