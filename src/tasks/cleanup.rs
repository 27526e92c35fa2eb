//! Expiration Purge Task
//!
//! Background task that periodically removes expired entries from a [`MemoryCache`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;

/// Spawns a background task that periodically purges expired entries.
///
/// Reads already skip expired entries; the purge only reclaims memory held by
/// keys nobody reads again.
///
/// # Arguments
/// * `cache` - Shared reference to the store
/// * `cleanup_interval_secs` - Interval in seconds between purge runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be aborted on shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(MemoryCache::new(None));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<MemoryCache>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiration purge task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();

            if removed > 0 {
                info!("Expiration purge: removed {} expired entries", removed);
            } else {
                debug!("Expiration purge: no expired entries found");
            }
        }
    })
}
