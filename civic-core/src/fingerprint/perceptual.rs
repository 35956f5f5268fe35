//! Fingerprint computation from encoded image bytes.
//!
//! # Algorithm
//!
//! Uses the Blockhash algorithm, which produces a consistent 64-bit (8 byte)
//! hash robust against JPEG recompression, resizing and minor cropping.
//!
//! # Usage
//!
//! ```no_run
//! use civic_core::fingerprint::{FingerprintHasher, HashAlgorithm};
//!
//! let image_data = std::fs::read("pothole.jpg").unwrap();
//! let hasher = FingerprintHasher::new(HashAlgorithm::Blockhash64);
//! let f1 = hasher.hash_bytes(&image_data).unwrap();
//!
//! let image_data2 = std::fs::read("pothole-recompressed.jpg").unwrap();
//! let f2 = hasher.hash_bytes(&image_data2).unwrap();
//! let similar = f1.is_similar(&f2, 5).unwrap();
//! ```

use blockhash::{blockhash64, Blockhash64};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Fingerprint;
use crate::error::{CivicError, Result};

/// Fingerprint size in bytes for Blockhash64.
pub const FINGERPRINT_SIZE: usize = 8;

/// Perceptual hash algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// Blockhash64 - 64-bit grid-based hash.
    #[default]
    Blockhash64,
}

/// Computes fingerprints from image data.
#[derive(Debug, Clone, Default)]
pub struct FingerprintHasher {
    algorithm: HashAlgorithm,
}

impl FingerprintHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Compute a fingerprint from raw image bytes.
    ///
    /// Supports JPEG, PNG, GIF and WebP.
    ///
    /// # Errors
    ///
    /// [`CivicError::InvalidImage`] when the bytes cannot be decoded.
    pub fn hash_bytes(&self, image_data: &[u8]) -> Result<Fingerprint> {
        let image = image::load_from_memory(image_data)
            .map_err(|e| CivicError::InvalidImage(format!("Failed to decode image: {}", e)))?;

        debug!(
            width = image.width(),
            height = image.height(),
            bytes = image_data.len(),
            "Decoded image for fingerprinting"
        );

        self.hash_image(&image)
    }

    /// Compute a fingerprint from an already decoded image.
    pub fn hash_image(&self, image: &DynamicImage) -> Result<Fingerprint> {
        match self.algorithm {
            HashAlgorithm::Blockhash64 => {
                let hash: Blockhash64 = blockhash64(image);
                let hash_bytes: [u8; FINGERPRINT_SIZE] = hash.into();
                Fingerprint::from_bytes(hash_bytes.to_vec())
            }
        }
    }

    /// Check if the provided bytes look like a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

/// Compute a fingerprint with the default algorithm.
pub fn compute(image_bytes: &[u8]) -> Result<Fingerprint> {
    FingerprintHasher::default().hash_bytes(image_bytes)
}
