//! The D5PC block transform.
//!
//! Every byte is nibble-swapped and XORed with [`XOR_MASK`].  Both steps are
//! self-inverse, but they do not commute (the mask only touches the high
//! nibble), so the two directions apply them in mirrored order:
//!
//! ```text
//! encode: swap → xor
//! decode: xor  → swap
//! ```
//!
//! Data is processed in [`BLOCK_SIZE`] blocks.  The final block of a stream
//! may be shorter; it goes through exactly the same per-byte path.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Bytes per block.
pub const BLOCK_SIZE: usize = 8;
/// Per-byte XOR mask.
pub const XOR_MASK:   u8    = 0xF0;

// ── Mode ─────────────────────────────────────────────────────────────────────

/// Direction of the transform.  Fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Encode,
    Decode,
}

impl Mode {
    /// Apply this mode's transform to a single byte.
    #[inline]
    pub fn apply_byte(self, b: u8) -> u8 {
        match self {
            Mode::Encode => encode_byte(b),
            Mode::Decode => decode_byte(b),
        }
    }

    /// The mode that undoes this one.
    pub fn inverse(self) -> Mode {
        match self {
            Mode::Encode => Mode::Decode,
            Mode::Decode => Mode::Encode,
        }
    }

    /// File extension conventionally given to this mode's output.
    pub fn output_extension(self) -> &'static str {
        match self {
            Mode::Encode => "enc",
            Mode::Decode => "dec",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Encode => "encode",
            Mode::Decode => "decode",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mode '{0}' (expected 'e', 'encode', 'd' or 'decode')")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e" | "encode" => Ok(Mode::Encode),
            "d" | "decode" => Ok(Mode::Decode),
            _              => Err(ParseModeError(s.to_string())),
        }
    }
}

// ── Byte operations ──────────────────────────────────────────────────────────

/// Exchange the high and low nibble.  Self-inverse.
#[inline]
pub fn swap_nibbles(b: u8) -> u8 {
    b.rotate_left(4)
}

/// Nibble-swap, then XOR.
#[inline]
pub fn encode_byte(b: u8) -> u8 {
    swap_nibbles(b) ^ XOR_MASK
}

/// XOR, then nibble-swap.  Inverse of [`encode_byte`].
#[inline]
pub fn decode_byte(b: u8) -> u8 {
    swap_nibbles(b ^ XOR_MASK)
}

/// Transform `block` in place.
///
/// Works on any length: a full [`BLOCK_SIZE`] block, a short trailing block,
/// or a larger buffer.  The result never depends on where block boundaries
/// fall, since every byte is handled independently.
pub fn transform_block(block: &mut [u8], mode: Mode) {
    for b in block.iter_mut() {
        *b = mode.apply_byte(*b);
    }
}

/// Transform a buffer into a newly allocated one.
pub fn transform_bytes(data: &[u8], mode: Mode) -> Vec<u8> {
    data.iter().map(|&b| mode.apply_byte(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn byte_roundtrip_exhaustive() {
        for b in 0u8..=255 {
            assert_eq!(decode_byte(encode_byte(b)), b, "decode∘encode failed for {b:#04x}");
            assert_eq!(encode_byte(decode_byte(b)), b, "encode∘decode failed for {b:#04x}");
        }
    }

    #[test]
    fn swap_and_xor_are_self_inverse() {
        for b in 0u8..=255 {
            assert_eq!(swap_nibbles(swap_nibbles(b)), b);
            assert_eq!((b ^ XOR_MASK) ^ XOR_MASK, b);
        }
    }

    #[test]
    fn swap_and_xor_do_not_commute() {
        // The mirrored order in decode is required, not cosmetic.
        let differs = (0u8..=255).any(|b| swap_nibbles(b) ^ XOR_MASK != swap_nibbles(b ^ XOR_MASK));
        assert!(differs);
        assert_ne!(encode_byte(0x00), decode_byte(0x00));
    }

    #[test]
    fn partial_block_encode() {
        let mut block = [0x12, 0xAB, 0x00, 0xFF, 0x0F];
        transform_block(&mut block, Mode::Encode);
        assert_eq!(block, [0xD1, 0x4A, 0xF0, 0x0F, 0x00]);

        transform_block(&mut block, Mode::Decode);
        assert_eq!(block, [0x12, 0xAB, 0x00, 0xFF, 0x0F]);
    }

    #[test]
    fn full_block_matches_per_byte_rule() {
        let mut block: [u8; BLOCK_SIZE] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        let expected: Vec<u8> = block.iter().map(|&b| encode_byte(b)).collect();
        transform_block(&mut block, Mode::Encode);
        assert_eq!(block.to_vec(), expected);
    }

    #[test]
    fn empty_block_is_noop() {
        let mut block: [u8; 0] = [];
        transform_block(&mut block, Mode::Decode);
        assert!(transform_bytes(&[], Mode::Encode).is_empty());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("e".parse::<Mode>().unwrap(), Mode::Encode);
        assert_eq!("Decode".parse::<Mode>().unwrap(), Mode::Decode);
        assert_eq!(" d ".parse::<Mode>().unwrap(), Mode::Decode);
        assert!("x".parse::<Mode>().is_err());
        assert_eq!(Mode::Encode.to_string(), "encode");
        assert_eq!(Mode::Encode.inverse(), Mode::Decode);
        assert_eq!(Mode::Decode.output_extension(), "dec");
    }

    proptest! {
        #[test]
        fn roundtrip_any_sequence(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let enc = transform_bytes(&data, Mode::Encode);
            prop_assert_eq!(enc.len(), data.len());
            prop_assert_eq!(transform_bytes(&enc, Mode::Decode), data.clone());

            let dec = transform_bytes(&data, Mode::Decode);
            prop_assert_eq!(transform_bytes(&dec, Mode::Encode), data);
        }
    }
}
