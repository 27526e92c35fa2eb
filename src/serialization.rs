//! Serialization Module
//!
//! Converts typed values to and from the string payloads a [`DistributedCache`] stores.
//!
//! [`DistributedCache`]: crate::cache::DistributedCache

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::{CacheError, Result};

// == Serializer ==
/// Encoding strategy fixed when a [`CacheAccessor`](crate::CacheAccessor) is built.
///
/// `deserialize(serialize(v))` must equal `v`. Malformed input must fail with
/// [`CacheError::Deserialization`], never decode to a default value.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;

    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T>;

    /// True if `payload` is this encoding's representation of "no value".
    /// `set` rejects such payloads and `get_or_populate` does not cache them.
    fn is_null(&self, _payload: &str) -> bool {
        false
    }
}

/// A payload that could not be decoded as the requested type.
#[derive(Error, Debug)]
#[error("cannot decode {type_name}: {source}")]
pub struct DecodeError {
    pub type_name: &'static str,
    #[source]
    pub source: serde_json::Error,
}

// == JSON ==
/// JSON encoding backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(CacheError::serialization)
    }

    fn deserialize<T: DeserializeOwned>(&self, payload: &str) -> Result<T> {
        serde_json::from_str(payload).map_err(|source| {
            CacheError::deserialization(DecodeError {
                type_name: std::any::type_name::<T>(),
                source,
            })
        })
    }

    fn is_null(&self, payload: &str) -> bool {
        payload == "null"
    }
}
