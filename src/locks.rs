//! Key Lock Registry
//!
//! Per-key mutual exclusion used to keep concurrent misses on the same key
//! from populating it more than once.
//!
//! The registry grows monotonically: a key's lock is created on first use and
//! kept for the registry's lifetime. This is bounded by key cardinality, which
//! is acceptable for the usual finite key space (entity ids, config names). For
//! unbounded or adversarial key spaces the registry needs an eviction scheme,
//! such as dropping a lock when its last waiter leaves.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{CacheError, Result};

// == Key Lock Registry ==
/// Owned map from cache key to its lock.
///
/// Share one registry (behind an `Arc`) between every accessor that should
/// exclude each other. Tests can build an isolated registry per case.
#[derive(Debug, Default)]
pub struct KeyLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Acquire Or Create ==
    /// Returns the lock for `key`, creating and registering it on first use.
    ///
    /// Creation is a single atomic get-or-insert, so concurrent first callers
    /// always end up sharing one lock.
    pub fn acquire_or_create(&self, key: &str) -> KeyLock {
        let mutex = match self.locks.get(key) {
            Some(existing) => Arc::clone(existing.value()),
            None => Arc::clone(
                self.locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .value(),
            ),
        };

        KeyLock {
            key: Arc::from(key),
            mutex,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }

    /// Number of keys that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// == Key Lock ==
/// Handle to one key's lock. Clones refer to the same lock.
#[derive(Debug, Clone)]
pub struct KeyLock {
    key: Arc<str>,
    mutex: Arc<Mutex<()>>,
}

impl KeyLock {
    /// Blocks the current thread until the lock is held.
    ///
    /// # Panics
    /// Panics if called from within an asynchronous execution context; use
    /// [`lock_async`](Self::lock_async) there.
    pub fn lock(&self) -> KeyGuard {
        let guard = Arc::clone(&self.mutex).blocking_lock_owned();
        trace!(key = %self.key, "acquired key lock");
        KeyGuard {
            key: Arc::clone(&self.key),
            _guard: guard,
        }
    }

    /// Suspends the current task until the lock is held.
    ///
    /// Fails with [`CacheError::Cancelled`] without acquiring if `token` fires first.
    pub async fn lock_async(&self, token: &CancellationToken) -> Result<KeyGuard> {
        let guard = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(CacheError::Cancelled),
            guard = Arc::clone(&self.mutex).lock_owned() => guard,
        };

        trace!(key = %self.key, "acquired key lock");
        Ok(KeyGuard {
            key: Arc::clone(&self.key),
            _guard: guard,
        })
    }

    /// True while some caller holds this key's lock.
    pub fn is_locked(&self) -> bool {
        self.mutex.try_lock().is_err()
    }
}

// == Key Guard ==
/// Proof of holding a key's lock. The lock is released when the guard drops.
#[derive(Debug)]
pub struct KeyGuard {
    key: Arc<str>,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn unlock(self) {}
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        trace!(key = %self.key, "released key lock");
    }
}
