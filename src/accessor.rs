//! Cache Accessor
//!
//! Cache-aside reads and writes of typed values over a [`DistributedCache`],
//! with per-key stampede protection on population.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{DistributedCache, EntryOptions};
use crate::error::{BoxError, CacheError, Result};
use crate::locks::KeyLockRegistry;
use crate::serialization::{JsonSerializer, Serializer};

// == Cache Accessor ==
/// Typed cache-aside access to a string store.
///
/// Every operation exists in a blocking form and an async form that takes a
/// [`CancellationToken`]. Both forms share the same key locks, so a blocking
/// caller and an async caller populating the same key still exclude each
/// other. Blocking forms must not be called from inside an async task.
///
/// # Scope of the stampede protection
/// Key locks live in this process. Several processes sharing one remote store
/// can each populate the same key once; the last write wins.
pub struct CacheAccessor<C, S = JsonSerializer> {
    cache: Arc<C>,
    serializer: S,
    locks: Arc<KeyLockRegistry>,
}

impl<C, S: Clone> Clone for CacheAccessor<C, S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            serializer: self.serializer.clone(),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<C: DistributedCache> CacheAccessor<C, JsonSerializer> {
    /// Creates an accessor with JSON encoding and its own lock registry.
    pub fn new(cache: Arc<C>) -> Self {
        Self::builder(cache).build()
    }

    pub fn builder(cache: Arc<C>) -> CacheAccessorBuilder<C, JsonSerializer> {
        CacheAccessorBuilder {
            cache,
            serializer: JsonSerializer,
            locks: None,
        }
    }
}

impl<C: DistributedCache, S: Serializer> CacheAccessor<C, S> {
    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn lock_registry(&self) -> &Arc<KeyLockRegistry> {
        &self.locks
    }

    // == Set ==
    /// Serializes `value` and stores it under `key`.
    ///
    /// Without `options` the store's default expiration applies.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty key or a value that encodes as null.
    pub fn set<T>(&self, key: &str, value: &T, options: Option<&EntryOptions>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ensure_key(key)?;
        let payload = self.encode(value)?;
        self.cache.set_string(key, payload, options)
    }

    /// Stores `value` with an absolute expiration of `seconds` from now.
    pub fn set_for_seconds<T>(&self, key: &str, value: &T, seconds: u64) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ensure_key(key)?;
        let options = EntryOptions::expire_after_seconds(seconds)?;
        self.set(key, value, Some(&options))
    }

    pub async fn set_async<T>(
        &self,
        key: &str,
        value: &T,
        options: Option<&EntryOptions>,
        token: &CancellationToken,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ensure_key(key)?;
        let payload = self.encode(value)?;
        cancellable(token, self.cache.set_string_async(key, payload, options, token)).await
    }

    pub async fn set_for_seconds_async<T>(
        &self,
        key: &str,
        value: &T,
        seconds: u64,
        token: &CancellationToken,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        ensure_key(key)?;
        let options = EntryOptions::expire_after_seconds(seconds)?;
        self.set_async(key, value, Some(&options), token).await
    }

    // == Get ==
    /// Reads and decodes the value under `key`. Never writes.
    ///
    /// Returns `Ok(None)` when the key is absent or expired.
    ///
    /// # Errors
    /// `Deserialization` if the stored payload does not decode as `T`; the
    /// entry is left in place.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        ensure_key(key)?;
        self.read(key)
    }

    pub async fn get_async<T: DeserializeOwned>(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<T>> {
        ensure_key(key)?;
        self.read_async(key, token).await
    }

    // == Get Or Populate ==
    /// Returns the cached value for `key`, or computes it with `producer` and
    /// stores it.
    ///
    /// On a miss the key's lock is taken and the cache is checked again before
    /// `producer` runs, so concurrent misses in this process run `producer`
    /// once. A result equal to `T::default()`, or one the serializer encodes
    /// as null (`Some(None)`, `f64::NAN` under JSON), is returned but not stored.
    ///
    /// The key lock is released on every path. A producer error is returned
    /// as [`CacheError::Producer`] and nothing is written.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context, since
    /// waiting for the key lock blocks the thread. Use
    /// [`get_or_populate_async`](Self::get_or_populate_async) there, or run
    /// this call under `tokio::task::spawn_blocking`.
    pub fn get_or_populate<T, F, E>(
        &self,
        key: &str,
        producer: F,
        options: Option<&EntryOptions>,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default + PartialEq,
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        ensure_key(key)?;
        if let Some(hit) = self.read(key)? {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        let lock = self.locks.acquire_or_create(key);
        let _guard = lock.lock();

        // Double check: another caller may have populated while we waited.
        if let Some(hit) = self.read(key)? {
            debug!(key, "populated while waiting for key lock");
            return Ok(hit);
        }

        let value = producer().map_err(|e| CacheError::Producer(e.into()))?;
        if value == T::default() {
            debug!(key, "producer returned default value, not caching");
            return Ok(value);
        }

        let payload = self.serializer.serialize(&value)?;
        if self.serializer.is_null(&payload) {
            debug!(key, "producer value encodes as null, not caching");
            return Ok(value);
        }

        self.cache.set_string(key, payload, options)?;
        debug!(key, "populated cache entry");
        Ok(value)
    }

    /// [`get_or_populate`](Self::get_or_populate) with an absolute expiration
    /// of `seconds` from the write.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context, like
    /// [`get_or_populate`](Self::get_or_populate).
    pub fn get_or_populate_for_seconds<T, F, E>(
        &self,
        key: &str,
        producer: F,
        seconds: u64,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default + PartialEq,
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<BoxError>,
    {
        let options = EntryOptions::expire_after_seconds(seconds)?;
        self.get_or_populate(key, producer, Some(&options))
    }

    /// Async form of [`get_or_populate`](Self::get_or_populate).
    ///
    /// `producer` receives a clone of `token`. Waiting for the key lock, the
    /// store and the producer all race against `token`; on cancellation the
    /// pending work is dropped, the key lock is released if held, and
    /// [`CacheError::Cancelled`] is returned.
    pub async fn get_or_populate_async<T, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        options: Option<&EntryOptions>,
        token: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default + PartialEq,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        ensure_key(key)?;
        if let Some(hit) = self.read_async(key, token).await? {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        let lock = self.locks.acquire_or_create(key);
        let _guard = lock.lock_async(token).await?;

        if let Some(hit) = self.read_async(key, token).await? {
            debug!(key, "populated while waiting for key lock");
            return Ok(hit);
        }

        let produce = async {
            producer(token.clone())
                .await
                .map_err(|e| CacheError::Producer(e.into()))
        };
        let value = cancellable(token, produce).await?;
        if value == T::default() {
            debug!(key, "producer returned default value, not caching");
            return Ok(value);
        }

        let payload = self.serializer.serialize(&value)?;
        if self.serializer.is_null(&payload) {
            debug!(key, "producer value encodes as null, not caching");
            return Ok(value);
        }

        cancellable(token, self.cache.set_string_async(key, payload, options, token)).await?;
        debug!(key, "populated cache entry");
        Ok(value)
    }

    pub async fn get_or_populate_for_seconds_async<T, F, Fut, E>(
        &self,
        key: &str,
        producer: F,
        seconds: u64,
        token: &CancellationToken,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default + PartialEq,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        let options = EntryOptions::expire_after_seconds(seconds)?;
        self.get_or_populate_async(key, producer, Some(&options), token)
            .await
    }

    // == Remove ==
    /// Removes every listed key. Absent keys are not an error.
    ///
    /// Each removal is independent: a failing key is logged and the rest are
    /// still attempted, then the first failure is returned.
    pub fn remove<K: AsRef<str>>(&self, keys: &[K]) -> Result<()> {
        ensure_keys(keys)?;

        let mut first_error = None;
        for key in keys.iter().map(AsRef::as_ref) {
            if let Err(err) = self.cache.remove(key) {
                warn!(key, error = %err, "failed to remove cache entry");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Async form of [`remove`](Self::remove). Cancellation stops at the
    /// current key and skips the rest.
    pub async fn remove_async<K: AsRef<str>>(
        &self,
        keys: &[K],
        token: &CancellationToken,
    ) -> Result<()> {
        ensure_keys(keys)?;

        let mut first_error = None;
        for key in keys.iter().map(AsRef::as_ref) {
            match cancellable(token, self.cache.remove_async(key, token)).await {
                Ok(()) => {}
                Err(CacheError::Cancelled) => return Err(CacheError::Cancelled),
                Err(err) => {
                    warn!(key, error = %err, "failed to remove cache entry");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let payload = self.serializer.serialize(value)?;
        if self.serializer.is_null(&payload) {
            return Err(CacheError::invalid_argument("value must not be null"));
        }
        Ok(payload)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get_string(key)? {
            Some(payload) => self.serializer.deserialize(&payload).map(Some),
            None => Ok(None),
        }
    }

    async fn read_async<T: DeserializeOwned>(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<T>> {
        match cancellable(token, self.cache.get_string_async(key, token)).await? {
            Some(payload) => self.serializer.deserialize(&payload).map(Some),
            None => Ok(None),
        }
    }
}

// == Builder ==
/// Builds a [`CacheAccessor`] with a chosen serializer and lock registry.
pub struct CacheAccessorBuilder<C, S> {
    cache: Arc<C>,
    serializer: S,
    locks: Option<Arc<KeyLockRegistry>>,
}

impl<C: DistributedCache, S: Serializer> CacheAccessorBuilder<C, S> {
    pub fn serializer<S2: Serializer>(self, serializer: S2) -> CacheAccessorBuilder<C, S2> {
        CacheAccessorBuilder {
            cache: self.cache,
            serializer,
            locks: self.locks,
        }
    }

    /// Shares `locks` with other accessors instead of creating a private registry.
    pub fn lock_registry(mut self, locks: Arc<KeyLockRegistry>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn build(self) -> CacheAccessor<C, S> {
        CacheAccessor {
            cache: self.cache,
            serializer: self.serializer,
            locks: self.locks.unwrap_or_default(),
        }
    }
}

fn ensure_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::invalid_argument("key must not be empty"));
    }
    Ok(())
}

fn ensure_keys<K: AsRef<str>>(keys: &[K]) -> Result<()> {
    if keys.is_empty() {
        return Err(CacheError::invalid_argument("at least one key is required"));
    }
    keys.iter().try_for_each(|key| ensure_key(key.as_ref()))
}

async fn cancellable<F, R>(token: &CancellationToken, fut: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CacheError::Cancelled),
        result = fut => result,
    }
}
