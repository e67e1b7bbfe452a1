//! Bit-level packing of a sparse key set into a printable, self-delimiting token.
//!
//! Key `k` lives in bit `k % 6` of sextet `k / 6`. Each sextet value `v` is
//! written as `((v + 0x10) & 0x3F) + 0x30`, which lands in `0x30..=0x6F`:
//! printable, never a space, never a newline. The token length depends only on
//! the highest pressed key.
use std::collections::BTreeSet;

use crate::{KeyId, ModelError, ModelResult, Packet};

/// Number of keys carried by one output character.
pub const BITS_PER_SEXTET: u32 = 6;

/// Lowest character the encoder can emit.
pub const SEXTET_MIN: u8 = 0x30;

/// Highest character the encoder can emit.
pub const SEXTET_MAX: u8 = 0x6F;

/// Character emitted for a sextet with no bits set (`'@'`).
pub const ZERO_SEXTET: char = sextet_char(0);

/// Map a 6-bit value to its printable character.
#[inline]
pub const fn sextet_char(value: u8) -> char {
    (((value.wrapping_add(0x10)) & 0x3F) + SEXTET_MIN) as char
}

/// Inverse of [`sextet_char`] for characters inside the encoder range.
#[inline]
fn sextet_value(c: char) -> Option<u8> {
    let b = u8::try_from(c).ok()?;
    if !(SEXTET_MIN..=SEXTET_MAX).contains(&b) {
        return None;
    }
    Some(b.wrapping_sub(0x40) & 0x3F)
}

/// Payload length for a set whose highest key is `max`.
///
/// An empty set still takes one all-zero sextet, so an empty state is never
/// confused with a blank keepalive line.
pub fn encoded_len(max: Option<KeyId>) -> usize {
    let bits = max.map_or(0, |m| m as usize + 1);
    bits.div_ceil(BITS_PER_SEXTET as usize).max(1)
}

/// Encode a snapshot of pressed keys into a populated packet.
pub fn encode(keys: &BTreeSet<KeyId>) -> Packet {
    let len = encoded_len(keys.last().copied());
    let mut sextets = vec![0u8; len];

    for &key in keys {
        let idx = (key / BITS_PER_SEXTET) as usize;
        sextets[idx] |= 1 << (key % BITS_PER_SEXTET);
    }
    let payload: String = sextets.into_iter().map(sextet_char).collect();
    Packet::from_payload(Some(payload))
}

/// Decode a payload back into the set of pressed keys.
pub fn decode(payload: &str) -> ModelResult<BTreeSet<KeyId>> {
    let mut keys = BTreeSet::new();

    for (i, c) in payload.chars().enumerate() {
        let value = sextet_value(c).ok_or(ModelError::InvalidSextet(c, i))?;
        for bit in 0..BITS_PER_SEXTET {
            if value & (1 << bit) != 0 {
                keys.insert(i as KeyId * BITS_PER_SEXTET + bit);
            }
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[KeyId]) -> BTreeSet<KeyId> {
        keys.iter().copied().collect()
    }

    fn payload_of(keys: &[KeyId]) -> String {
        encode(&set(keys))
            .payload()
            .expect("encoder always yields a payload")
            .to_string()
    }

    #[test]
    fn empty_set_is_one_zero_sextet() {
        let p = encode(&BTreeSet::new());
        assert!(matches!(p, Packet::Populated(_)));
        assert_eq!(p.payload(), Some("@"));
        assert_eq!(ZERO_SEXTET, '@');
    }

    #[test]
    fn bits_zero_and_five_share_one_sextet() {
        // 0x21 + 0x10 = 0x31, + 0x30 = 0x61
        assert_eq!(payload_of(&[0, 5]), "a");
    }

    #[test]
    fn key_six_starts_second_sextet() {
        assert_eq!(payload_of(&[6]), "@A");
    }

    #[test]
    fn length_follows_highest_key_only() {
        let cases: &[(&[KeyId], usize)] = &[
            (&[], 1),
            (&[0], 1),
            (&[5], 1),
            (&[6], 2),
            (&[0, 1, 2, 3, 4, 5, 11], 2),
            (&[12], 3),
            (&[255], 43),
        ];
        for (keys, len) in cases {
            assert_eq!(payload_of(keys).len(), *len, "keys={keys:?}");
            assert_eq!(encoded_len(keys.iter().max().copied()), *len);
        }
    }

    #[test]
    fn output_is_printable_and_space_free() {
        let all: Vec<KeyId> = (0..120).collect();
        for c in payload_of(&all).chars().chain(payload_of(&[7, 64]).chars()) {
            let b = c as u32;
            assert!((0x30..=0x6F).contains(&b), "char {c:?} out of range");
            assert!(!c.is_whitespace());
        }
    }

    #[test]
    fn every_sextet_value_maps_to_a_distinct_char() {
        let chars: BTreeSet<char> = (0u8..64).map(sextet_char).collect();
        assert_eq!(chars.len(), 64);
        for v in 0u8..64 {
            assert_eq!(sextet_value(sextet_char(v)), Some(v));
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let mut seed: u32 = 0x2545_f491;
        let mut samples = vec![set(&[]), set(&[0]), set(&[6]), set(&[1, 8, 63, 64])];
        for _ in 0..32 {
            let mut s = BTreeSet::new();
            for _ in 0..(seed % 9) {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                s.insert((seed >> 16) % 200);
            }
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            samples.push(s);
        }

        for keys in samples {
            let packet = encode(&keys);
            let decoded = decode(packet.payload().unwrap()).unwrap();
            assert_eq!(decoded, keys);
        }
    }

    #[test]
    fn decode_rejects_out_of_range_chars() {
        for bad in ["@ ", "p", "/", "@\n", "é"] {
            let err = decode(bad).unwrap_err();
            assert!(matches!(err, ModelError::InvalidSextet(_, _)), "{bad:?}");
        }
    }
}
