use std::{fmt, sync::Arc};

/// One encoded key-state snapshot, or one of the two sentinels.
///
/// - `Invalid`:   carries nothing; used as a shutdown sentinel and never written.
/// - `Blank`:     empty payload; written as a keepalive line.
/// - `Populated`: non-empty printable payload produced by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Invalid,
    Blank,
    Populated(Arc<str>),
}

/// Coarse packet classification used in logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    State,
    Keepalive,
}

impl PacketKind {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            PacketKind::State => "state",
            PacketKind::Keepalive => "keepalive",
        }
    }
}

impl Packet {
    /// Build a packet from an optional payload.
    ///
    /// `None` maps to [`Packet::Invalid`], an empty string to [`Packet::Blank`].
    pub fn from_payload(payload: Option<String>) -> Self {
        match payload {
            None => Packet::Invalid,
            Some(s) if s.is_empty() => Packet::Blank,
            Some(s) => Packet::Populated(Arc::from(s)),
        }
    }

    /// Payload to put on the wire, or `None` for [`Packet::Invalid`].
    pub fn payload(&self) -> Option<&str> {
        match self {
            Packet::Invalid => None,
            Packet::Blank => Some(""),
            Packet::Populated(data) => Some(data),
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        !matches!(self, Packet::Invalid)
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        matches!(self, Packet::Blank)
    }

    /// Classify a valid packet; `Invalid` has no kind.
    pub fn kind(&self) -> Option<PacketKind> {
        match self {
            Packet::Invalid => None,
            Packet::Blank => Some(PacketKind::Keepalive),
            Packet::Populated(_) => Some(PacketKind::State),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Invalid => f.write_str("<invalid>"),
            Packet::Blank => f.write_str("<blank>"),
            Packet::Populated(data) => f.write_str(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_payload_maps_sentinels() {
        assert_eq!(Packet::from_payload(None), Packet::Invalid);
        assert_eq!(Packet::from_payload(Some(String::new())), Packet::Blank);
        assert_eq!(
            Packet::from_payload(Some("@A".into())),
            Packet::Populated(Arc::from("@A"))
        );
    }

    #[test]
    fn invalid_has_no_payload_or_kind() {
        let p = Packet::Invalid;
        assert!(!p.is_valid());
        assert_eq!(p.payload(), None);
        assert_eq!(p.kind(), None);
    }

    #[test]
    fn blank_is_a_valid_keepalive() {
        let p = Packet::Blank;
        assert!(p.is_valid());
        assert!(p.is_blank());
        assert_eq!(p.payload(), Some(""));
        assert_eq!(p.kind(), Some(PacketKind::Keepalive));
    }

    #[test]
    fn display_shows_payload_or_marker() {
        assert_eq!(Packet::from_payload(Some("a".into())).to_string(), "a");
        assert_eq!(Packet::Blank.to_string(), "<blank>");
        assert_eq!(Packet::Invalid.to_string(), "<invalid>");
    }
}
