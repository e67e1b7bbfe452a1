use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("supervisor error: {0}")]
    Supervisor(String),

    #[error("sink setup failed for transport '{transport}': {reason}")]
    Sink {
        transport: &'static str,
        reason: String,
    },

    #[error("duplicate unit name: {0}")]
    DuplicateUnit(&'static str),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Outcome of a single service unit that did not end cleanly.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fatal: {0}")]
    Fatal(String),
}
