use std::{fmt, str::FromStr};

use crate::ModelError;

/// Logical key identifier as reported by the input source.
pub type KeyId = u32;

/// A single key going down or coming up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyId,
    pub down: bool,
}

impl KeyTransition {
    pub const fn down(key: KeyId) -> Self {
        Self { key, down: true }
    }

    pub const fn up(key: KeyId) -> Self {
        Self { key, down: false }
    }
}

/// Accepts `+N` / `-N` and `down N` / `up N` (case-insensitive verbs).
impl FromStr for KeyTransition {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ModelError::InvalidTransition(s.to_string());

        let (down, rest) = if let Some(rest) = s.strip_prefix('+') {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix('-') {
            (false, rest)
        } else {
            let (verb, rest) = s.split_once(char::is_whitespace).ok_or_else(invalid)?;
            match verb.to_ascii_lowercase().as_str() {
                "down" | "press" => (true, rest),
                "up" | "release" => (false, rest),
                _ => return Err(invalid()),
            }
        };

        let key = rest.trim().parse::<KeyId>().map_err(|_| invalid())?;
        Ok(Self { key, down })
    }
}

impl fmt::Display for KeyTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.down { '+' } else { '-' };
        write!(f, "{sign}{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sign_prefixed_form() {
        assert_eq!("+12".parse::<KeyTransition>().unwrap(), KeyTransition::down(12));
        assert_eq!("-0".parse::<KeyTransition>().unwrap(), KeyTransition::up(0));
        assert_eq!(" +7 ".parse::<KeyTransition>().unwrap(), KeyTransition::down(7));
    }

    #[test]
    fn parses_verb_form() {
        assert_eq!("down 3".parse::<KeyTransition>().unwrap(), KeyTransition::down(3));
        assert_eq!("UP  40".parse::<KeyTransition>().unwrap(), KeyTransition::up(40));
        assert_eq!("release 1".parse::<KeyTransition>().unwrap(), KeyTransition::up(1));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "12", "+", "+-1", "down", "hold 3", "-x", "+4294967296"] {
            assert!(
                bad.parse::<KeyTransition>().is_err(),
                "expected error for {bad:?}"
            );
        }
    }

    #[test]
    fn display_uses_sign_form() {
        assert_eq!(KeyTransition::down(5).to_string(), "+5");
        assert_eq!(KeyTransition::up(9).to_string(), "-9");
    }
}
