//! Bit ↔ tone mapping and bit/byte packing
//!
//! Bits travel most-significant first within each byte.

use serde::{Deserialize, Serialize};

/// The two data tones: `one` carries bit 1, `zero` carries bit 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitToneMap {
    pub one: f32,
    pub zero: f32,
}

impl BitToneMap {
    pub fn new(one: f32, zero: f32) -> Self {
        Self { one, zero }
    }

    pub fn tone_for(&self, bit: bool) -> f32 {
        if bit {
            self.one
        } else {
            self.zero
        }
    }

    /// Bit 1 only when strictly closer to the `one` tone; ties go to 0
    pub fn classify(&self, frequency: f32) -> bool {
        (frequency - self.one).abs() < (frequency - self.zero).abs()
    }
}

impl Default for BitToneMap {
    fn default() -> Self {
        Self::new(crate::FREQ_ONE, crate::FREQ_ZERO)
    }
}

/// Expand bytes to bits, MSB first
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1 == 1);
        }
    }
    bits
}

/// Pack bits into bytes, MSB first. A trailing group shorter than 8 is dropped.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| if bit { byte | 1 << (7 - i) } else { byte })
        })
        .collect()
}
