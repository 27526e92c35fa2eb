//! Integration Tests for the Cache Accessor
//!
//! Exercises get-or-populate under real concurrency, cancellation, and store failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cache_aside::{
    CacheAccessor, CacheError, DistributedCache, EntryOptions, KeyLockRegistry, MemoryCache,
    Result,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Barrier;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// == Helpers ==

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug)]
struct Unreachable(&'static str);

impl std::fmt::Display for Unreachable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} unreachable", self.0)
    }
}

impl std::error::Error for Unreachable {}

/// Memory store that can be told to fail reads or removals of given keys.
#[derive(Default)]
struct FlakyCache {
    inner: MemoryCache,
    fail_reads: AtomicBool,
    failing_removals: HashSet<String>,
    remove_attempts: AtomicUsize,
}

impl FlakyCache {
    fn failing_removals(keys: &[&str]) -> Self {
        Self {
            failing_removals: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::store(Unreachable("replica")));
        }
        Ok(())
    }

    fn check_remove(&self, key: &str) -> Result<()> {
        self.remove_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_removals.contains(key) {
            return Err(CacheError::store(Unreachable("primary")));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributedCache for FlakyCache {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.check_read()?;
        self.inner.get_string(key)
    }

    fn set_string(&self, key: &str, value: String, options: Option<&EntryOptions>) -> Result<()> {
        self.inner.set_string(key, value, options)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check_remove(key)?;
        self.inner.remove(key)
    }

    async fn get_string_async(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<String>> {
        self.check_read()?;
        self.inner.get_string_async(key, token).await
    }

    async fn set_string_async(
        &self,
        key: &str,
        value: String,
        options: Option<&EntryOptions>,
        token: &CancellationToken,
    ) -> Result<()> {
        self.inner.set_string_async(key, value, options, token).await
    }

    async fn remove_async(&self, key: &str, token: &CancellationToken) -> Result<()> {
        self.check_remove(key)?;
        self.inner.remove_async(key, token).await
    }
}

fn memory_accessor() -> CacheAccessor<MemoryCache> {
    CacheAccessor::new(Arc::new(MemoryCache::new(None)))
}

// == Single Population ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_callers_populate_once() {
    let cache = memory_accessor();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(32));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                let token = CancellationToken::new();
                cache
                    .get_or_populate_async(
                        "k",
                        |_| async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(100)).await;
                            Ok::<_, Unreachable>(42u32)
                        },
                        None,
                        &token,
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 42);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.cache().stats().writes, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_and_async_callers_share_key_lock() {
    let cache = memory_accessor();
    let calls = Arc::new(AtomicUsize::new(0));

    let blocking = {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        tokio::task::spawn_blocking(move || {
            cache.get_or_populate(
                "shared",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(150));
                    Ok::<_, Unreachable>("from-blocking".to_string())
                },
                None,
            )
        })
    };

    // Let the blocking caller take the lock first.
    sleep(Duration::from_millis(30)).await;

    let token = CancellationToken::new();
    let async_calls = Arc::clone(&calls);
    let value = cache
        .get_or_populate_async(
            "shared",
            |_| async move {
                async_calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Unreachable>("from-async".to_string())
            },
            None,
            &token,
        )
        .await
        .unwrap();

    assert_eq!(blocking.await.unwrap().unwrap(), "from-blocking");
    assert_eq!(value, "from-blocking");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Default Values ==

#[tokio::test]
async fn test_async_default_result_is_not_cached() {
    let cache = memory_accessor();
    let token = CancellationToken::new();
    let calls = AtomicUsize::new(0);
    let calls = &calls;

    for _ in 0..2 {
        let value = cache
            .get_or_populate_async(
                "k",
                move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<i32, Unreachable>(0)
                },
                None,
                &token,
            )
            .await
            .unwrap();
        assert_eq!(value, 0);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2, "Default results are recomputed");
    assert!(cache.get_async::<i32>("k", &token).await.unwrap().is_none());
}

// == Failure Handling ==

#[tokio::test]
async fn test_async_producer_failure_releases_lock() {
    let cache = memory_accessor();
    let token = CancellationToken::new();

    let err = cache
        .get_or_populate_async(
            "user:9",
            |_| async { Err::<User, _>(Unreachable("database")) },
            None,
            &token,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Producer(_)));
    assert!(cache.cache().is_empty());

    let user = timeout(
        Duration::from_secs(1),
        cache.get_or_populate_async(
            "user:9",
            |_| async {
                Ok::<_, Unreachable>(User {
                    id: 9,
                    name: "I".to_string(),
                })
            },
            None,
            &token,
        ),
    )
    .await
    .expect("second call must not deadlock")
    .unwrap();
    assert_eq!(user.id, 9);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_key_lock() {
    let locks = Arc::new(KeyLockRegistry::new());
    let cache = CacheAccessor::builder(Arc::new(MemoryCache::new(None)))
        .lock_registry(Arc::clone(&locks))
        .build();

    let holder_token = CancellationToken::new();
    let held = locks
        .acquire_or_create("k")
        .lock_async(&holder_token)
        .await
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let calls = AtomicUsize::new(0);
    let calls = &calls;
    let result = cache
        .get_or_populate_async(
            "k",
            move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Unreachable>(1u8)
            },
            None,
            &token,
        )
        .await;

    assert!(matches!(result, Err(CacheError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    drop(held);
    assert!(!locks.acquire_or_create("k").is_locked());
}

#[tokio::test]
async fn test_store_read_failure_propagates_unchanged() {
    let store = Arc::new(FlakyCache::default());
    store.fail_reads.store(true, Ordering::SeqCst);
    let cache = CacheAccessor::new(Arc::clone(&store));
    let token = CancellationToken::new();

    let err = cache
        .get_or_populate_async("k", |_| async { Ok::<_, Unreachable>(1u8) }, None, &token)
        .await
        .unwrap_err();

    match err {
        CacheError::Store(inner) => assert_eq!(inner.to_string(), "replica unreachable"),
        other => panic!("expected store error, got {other:?}"),
    }
    assert!(!cache.lock_registry().contains("k"), "Fast path fails before locking");
}

#[test]
fn test_remove_attempts_every_key_despite_failure() {
    let store = Arc::new(FlakyCache::failing_removals(&["a"]));
    let cache = CacheAccessor::new(Arc::clone(&store));
    cache.set("a", &1, None).unwrap();
    cache.set("b", &2, None).unwrap();

    let err = cache.remove(&["a", "b", "c"]).unwrap_err();

    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(store.remove_attempts.load(Ordering::SeqCst), 3);
    assert!(store.inner.contains_key("a"));
    assert!(!store.inner.contains_key("b"));
}

#[tokio::test]
async fn test_remove_async_attempts_every_key_despite_failure() {
    let store = Arc::new(FlakyCache::failing_removals(&["b"]));
    let cache = CacheAccessor::new(Arc::clone(&store));
    let token = CancellationToken::new();
    cache.set_async("a", &1, None, &token).await.unwrap();
    cache.set_async("c", &3, None, &token).await.unwrap();

    let err = cache.remove_async(&["a", "b", "c"], &token).await.unwrap_err();

    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(store.remove_attempts.load(Ordering::SeqCst), 3);
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn test_remove_async_stops_when_cancelled() {
    let store = Arc::new(FlakyCache::default());
    let cache = CacheAccessor::new(Arc::clone(&store));
    let token = CancellationToken::new();
    token.cancel();

    let err = cache.remove_async(&["a", "b"], &token).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(store.remove_attempts.load(Ordering::SeqCst), 0);
}

// == Independent Keys ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_key_does_not_block_other_keys() {
    let cache = memory_accessor();
    let release = CancellationToken::new();

    let slow = {
        let cache = cache.clone();
        let release = release.clone();
        tokio::spawn(async move {
            let token = CancellationToken::new();
            cache
                .get_or_populate_async(
                    "a",
                    |_| async move {
                        release.cancelled().await;
                        Ok::<_, Unreachable>(1u32)
                    },
                    None,
                    &token,
                )
                .await
        })
    };

    sleep(Duration::from_millis(20)).await;
    let token = CancellationToken::new();
    let fast = timeout(
        Duration::from_millis(500),
        cache.get_or_populate_async("b", |_| async { Ok::<_, Unreachable>(2u32) }, None, &token),
    )
    .await
    .expect("key b must not wait on key a")
    .unwrap();
    assert_eq!(fast, 2);

    release.cancel();
    assert_eq!(slow.await.unwrap().unwrap(), 1);
}

// == Expiration ==

#[tokio::test]
async fn test_populated_entry_repopulates_after_expiry() {
    let cache = memory_accessor();
    let token = CancellationToken::new();
    let calls = AtomicUsize::new(0);
    let calls = &calls;
    let options = EntryOptions::new().with_absolute_expiration(Duration::from_millis(50));

    for expected_calls in [1, 1] {
        cache
            .get_or_populate_async(
                "k",
                move |_| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Unreachable>(5u8)
                },
                Some(&options),
                &token,
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    }

    sleep(Duration::from_millis(80)).await;
    cache
        .get_or_populate_async(
            "k",
            move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Unreachable>(5u8)
            },
            Some(&options),
            &token,
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
