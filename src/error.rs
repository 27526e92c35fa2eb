//! Error types for the cache-aside layer
//!
//! Provides unified error handling using thiserror.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error raised by a store backend, a serializer or a value producer.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for cache access.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Rejected argument (empty key, null value, non-positive expiration)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Value could not be encoded for storage
    #[error("Serialization failed: {0}")]
    Serialization(#[source] BoxError),

    /// Stored payload could not be decoded into the requested type
    #[error("Deserialization failed: {0}")]
    Deserialization(#[source] BoxError),

    /// An asynchronous wait observed its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// The value producer failed
    #[error("Producer failed: {0}")]
    Producer(#[source] BoxError),

    /// The underlying store failed
    #[error("Store error: {0}")]
    Store(#[source] BoxError),
}

impl CacheError {
    /// Builds an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CacheError::InvalidArgument(message.into())
    }

    /// Wraps an encoder failure.
    pub fn serialization(err: impl Into<BoxError>) -> Self {
        CacheError::Serialization(err.into())
    }

    /// Wraps a decoder failure.
    pub fn deserialization(err: impl Into<BoxError>) -> Self {
        CacheError::Deserialization(err.into())
    }

    /// Wraps a backend failure.
    pub fn store(err: impl Into<BoxError>) -> Self {
        CacheError::Store(err.into())
    }

    /// Returns the producer's own error, if this is a producer failure.
    pub fn producer_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            CacheError::Producer(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }

    /// True for errors raised before touching the store or the key lock.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CacheError::InvalidArgument(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CacheError::Cancelled)
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache access.
pub type Result<T> = std::result::Result<T, CacheError>;
