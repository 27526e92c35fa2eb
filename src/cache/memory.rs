//! Memory Cache Module
//!
//! In-process implementation of [`DistributedCache`] with absolute and sliding expiration.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheEntry, CacheStats, DistributedCache, EntryOptions};
use crate::config::Config;
use crate::error::{CacheError, Result};

#[derive(Debug, Default)]
struct Inner {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Activity counters
    stats: CacheStats,
}

// == Memory Cache ==
/// Thread-safe in-memory string store.
///
/// Expired entries are dropped lazily on read and in bulk by
/// [`purge_expired`](Self::purge_expired). There is no capacity limit.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
    /// Expiration applied to writes without options, None = never expire
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `default_ttl` - Expiration for entries written without options
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            default_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_expiration())
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // Entries stay consistent even if a holder panicked mid-operation.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(token: &CancellationToken) -> Result<()> {
        if token.is_cancelled() {
            Err(CacheError::Cancelled)
        } else {
            Ok(())
        }
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Purge Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner();

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - inner.entries.len();

        inner.stats.record_expirations(removed);
        let remaining = inner.entries.len();
        inner.stats.set_total_entries(remaining);
        removed
    }

    /// Returns true if a live entry exists, without touching its sliding window.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Returns the time left before `key` expires.
    ///
    /// `None` if the key is absent, already expired, or never expires. Does not
    /// count as a read and does not restart a sliding window.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.inner()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(CacheEntry::ttl_remaining)
    }

    /// Returns the current number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().entries.is_empty()
    }
}

#[async_trait]
impl DistributedCache for MemoryCache {
    // == Get ==
    /// Returns the payload if present and not expired, restarting its sliding window.
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut guard = self.inner();
        let inner = &mut *guard;

        let expired = inner.entries.get(key).map(|entry| entry.is_expired_at(now));
        let value = match expired {
            Some(true) => {
                inner.entries.remove(key);
                inner.stats.record_expirations(1);
                None
            }
            Some(false) => inner.entries.get_mut(key).map(|entry| {
                entry.touch(now);
                entry.value.clone()
            }),
            None => None,
        };

        match value {
            Some(_) => inner.stats.record_hit(),
            None => inner.stats.record_miss(),
        }
        inner.stats.set_total_entries(inner.entries.len());
        Ok(value)
    }

    // == Set ==
    /// Stores a payload, overwriting any existing entry and resetting its expiration.
    fn set_string(&self, key: &str, value: String, options: Option<&EntryOptions>) -> Result<()> {
        let entry = CacheEntry::new(value, options, self.default_ttl);
        let mut inner = self.inner();

        inner.entries.insert(key.to_string(), entry);
        inner.stats.record_write();
        let total = inner.entries.len();
        inner.stats.set_total_entries(total);
        Ok(())
    }

    // == Remove ==
    /// Removes an entry; absent keys are ignored.
    fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner();

        if inner.entries.remove(key).is_some() {
            inner.stats.record_removal();
        }
        let total = inner.entries.len();
        inner.stats.set_total_entries(total);
        Ok(())
    }

    async fn get_string_async(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<String>> {
        Self::ensure_live(token)?;
        self.get_string(key)
    }

    async fn set_string_async(
        &self,
        key: &str,
        value: String,
        options: Option<&EntryOptions>,
        token: &CancellationToken,
    ) -> Result<()> {
        Self::ensure_live(token)?;
        self.set_string(key, value, options)
    }

    async fn remove_async(&self, key: &str, token: &CancellationToken) -> Result<()> {
        Self::ensure_live(token)?;
        self.remove(key)
    }
}
