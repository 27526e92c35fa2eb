//! Distributed Cache Port
//!
//! The string-only store contract the cache-aside accessor is layered on.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cache::EntryOptions;
use crate::error::Result;

/// Port for a string key-value cache (e.g. Redis, Memcached, or [`MemoryCache`]).
///
/// Backends report an absent or expired key as `Ok(None)`, and removing an
/// absent key is not an error. Connectivity failures surface as
/// [`CacheError::Store`](crate::error::CacheError::Store) and are never retried
/// by the accessor.
///
/// Async methods receive the caller's cancellation token so a backend can
/// abandon in-flight network work; the accessor also races every call against
/// the token, so a backend that ignores it is still cancellable.
///
/// [`MemoryCache`]: crate::cache::MemoryCache
#[async_trait]
pub trait DistributedCache: Send + Sync {
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value`, applying `options` or the backend default policy when `None`.
    fn set_string(&self, key: &str, value: String, options: Option<&EntryOptions>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    async fn get_string_async(&self, key: &str, token: &CancellationToken)
        -> Result<Option<String>>;

    async fn set_string_async(
        &self,
        key: &str,
        value: String,
        options: Option<&EntryOptions>,
        token: &CancellationToken,
    ) -> Result<()>;

    async fn remove_async(&self, key: &str, token: &CancellationToken) -> Result<()>;
}
