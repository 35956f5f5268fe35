//! Perceptual fingerprints and their comparison.
//!
//! A [`Fingerprint`] is an opaque fixed-length bit string: visually similar
//! images (recompressed, resized, lightly cropped) produce fingerprints with a
//! low Hamming distance, unrelated images a high one.
//!
//! Comparison lives here and is always available. Computing a fingerprint
//! from encoded image bytes needs the `perceptual-hash` feature.

#[cfg(feature = "perceptual-hash")]
pub mod perceptual;

#[cfg(feature = "perceptual-hash")]
pub use perceptual::{compute, FingerprintHasher, HashAlgorithm};

use serde::{Deserialize, Serialize};

use crate::error::{CivicError, Result};

/// Fixed-length perceptual fingerprint.
///
/// Serialized as a lowercase hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Wrap raw fingerprint bytes. Empty input is rejected.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CivicError::MalformedFingerprint(
                "fingerprint must not be empty".into(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Parse a fingerprint from its hex form.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CivicError::MalformedFingerprint(format!("Invalid hex string: {}", e)))?;
        Self::from_bytes(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the fingerprint in bits.
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Hamming distance to another fingerprint of the same length.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        hamming_distance(self, other)
    }

    /// Whether `other` lies within `threshold` differing bits.
    pub fn is_similar(&self, other: &Self, threshold: u32) -> Result<bool> {
        is_similar(self, other, threshold)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = CivicError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_hex()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Count the differing bits between two fingerprints.
///
/// # Errors
///
/// [`CivicError::InvalidFingerprint`] when the bit lengths differ.
pub fn hamming_distance(f1: &Fingerprint, f2: &Fingerprint) -> Result<u32> {
    if f1.bytes.len() != f2.bytes.len() {
        return Err(CivicError::InvalidFingerprint {
            left_bits: f1.bit_len(),
            right_bits: f2.bit_len(),
        });
    }

    Ok(f1
        .bytes
        .iter()
        .zip(f2.bytes.iter())
        .map(|(a, b)| (a ^ b).count_ones())
        .sum())
}

/// True iff `hamming_distance(f1, f2) <= threshold`.
pub fn is_similar(f1: &Fingerprint, f2: &Fingerprint, threshold: u32) -> Result<bool> {
    Ok(hamming_distance(f1, f2)? <= threshold)
}
