//! Bucket codec: records to and from the engine's byte storage
//!
//! Records are stored as JSON documents. A value that does not decode into
//! the bucket's record type is an error, never silently skipped.

use govstore_core::{Record, StoreError};

use crate::error::Result;

/// Serialize a record for storage in its bucket
pub fn encode<T: Record>(record: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Deserialize the value stored under `key` in `T`'s bucket
pub fn decode<T: Record>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StoreError::Serialization(format!(
            "decode {}/{} failed: {}",
            T::BUCKET,
            key,
            e
        ))
        .into()
    })
}
