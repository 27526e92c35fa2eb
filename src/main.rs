//! Cache Aside demo
//!
//! Runs several concurrent callers against one cold key and shows that the
//! value producer runs once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_aside::{spawn_cleanup_task, CacheAccessor, Config, MemoryCache};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

/// Entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the in-memory store and start the expiration purge task
/// 4. Race the configured number of callers on one key
/// 5. Report the producer call count, hit rate, remaining TTL and store statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to debug for this crate, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_aside=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_ttl={}s, cleanup_interval={}s, populate_ttl={}s, callers={}",
        config.default_ttl, config.cleanup_interval, config.populate_ttl, config.demo_callers
    );

    let store = Arc::new(MemoryCache::from_config(&config));
    let cleanup_handle = spawn_cleanup_task(Arc::clone(&store), config.cleanup_interval);
    let cache = CacheAccessor::new(Arc::clone(&store));

    let token = CancellationToken::new();
    let producer_calls = Arc::new(AtomicUsize::new(0));
    let mut callers = JoinSet::new();

    for caller in 0..config.demo_callers {
        let cache = cache.clone();
        let token = token.clone();
        let producer_calls = Arc::clone(&producer_calls);
        let ttl = config.populate_ttl;

        callers.spawn(async move {
            let user = cache
                .get_or_populate_for_seconds_async(
                    "user:1",
                    |_| async move {
                        producer_calls.fetch_add(1, Ordering::SeqCst);
                        // Stand-in for a slow database lookup
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, std::io::Error>(User {
                            id: 1,
                            name: "A".to_string(),
                        })
                    },
                    ttl,
                    &token,
                )
                .await?;
            info!(caller, ?user, "caller finished");
            Ok::<_, cache_aside::CacheError>(user)
        });
    }

    while let Some(joined) = callers.join_next().await {
        joined
            .context("caller task panicked")?
            .context("cache access failed")?;
    }

    let stats = store.stats();
    let hit_rate = stats.hit_rate();
    let stats = serde_json::to_string(&stats)?;
    info!(
        producer_calls = producer_calls.load(Ordering::SeqCst),
        hit_rate,
        ttl_remaining = ?store.ttl_remaining("user:1"),
        %stats,
        "demo complete"
    );

    cleanup_handle.abort();
    Ok(())
}
