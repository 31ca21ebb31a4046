//! JSON encoding for request and response bodies.
//!
//! Thin wrappers over `serde_json` that map failures into [`CodecError`],
//! plus the error body both sides of the interface agree on.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// JSON body returned by the server for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// Encodes a value as JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a value from JSON bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
