//! Logging setup for the sextet daemon.
//!
//! Everything is written to stderr: stdout is reserved for the packet stream.
mod logger;
pub use logger::*;

#[cfg(feature = "subscriber")]
mod subscriber;
#[cfg(feature = "subscriber")]
pub use subscriber::Subscriber;
