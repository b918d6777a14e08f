//! Wire encoding for requests and responses crossing the site boundary.
//!
//! Everything that leaves a site goes through [`encode`], which refuses
//! payloads over the configured limit.

use crate::core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Default payload limit: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Encode a value with bincode, enforcing a size limit.
pub fn encode<T: Serialize>(value: &T, limit: usize) -> Result<Vec<u8>> {
    let size = bincode::serialized_size(value)? as usize;
    if size > limit {
        return Err(Error::PayloadTooLarge { size, limit });
    }
    Ok(bincode::serialize(value)?)
}

/// Decode a bincode payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::DeserializationError(e.to_string()))
}
