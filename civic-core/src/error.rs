use thiserror::Error;

#[derive(Error, Debug)]
pub enum CivicError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Fingerprint length mismatch: {left_bits} bits vs {right_bits} bits")]
    InvalidFingerprint { left_bits: usize, right_bits: usize },

    #[error("Malformed fingerprint: {0}")]
    MalformedFingerprint(String),

    #[error("Invalid coordinate: lat={latitude}, lon={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CivicError {
    fn from(err: serde_json::Error) -> Self {
        CivicError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CivicError>;
