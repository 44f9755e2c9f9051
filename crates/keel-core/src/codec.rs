//! Canonical binary encoding shared by blocks, transactions, and the archive index.
//!
//! Everything persisted or hashed goes through bincode's standard config so
//! that the same value always yields the same bytes.

use bincode::{Decode, Encode};

use crate::error::ChainError;

/// Encode a value with the canonical config.
pub fn encode<T: Encode>(value: &T) -> Result<Vec<u8>, ChainError> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ChainError::Serialization(e.to_string()))
}

/// Decode a value, treating any failure or trailing bytes as corrupt data.
pub fn decode<T: Decode<()>>(bytes: &[u8]) -> Result<T, ChainError> {
    let (value, read) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ChainError::CorruptData(e.to_string()))?;
    if read != bytes.len() {
        return Err(ChainError::CorruptData(format!(
            "{} trailing bytes after value",
            bytes.len() - read
        )));
    }
    Ok(value)
}
