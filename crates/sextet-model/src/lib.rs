mod config;
pub use config::{DEFAULT_INTERVAL_MS, Mode, StreamConfig, StreamParams};

mod error;
pub use error::{ModelError, ModelResult};

mod key;
pub use key::{KeyId, KeyTransition};

mod packet;
pub use packet::{Packet, PacketKind};

pub mod sextet;
pub use sextet::{decode, encode};
