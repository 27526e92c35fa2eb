//! Configuration Module
//!
//! Loads runtime settings for the in-memory store and the demo from environment variables.

use std::env;
use std::time::Duration;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default TTL in seconds for entries written without options, 0 = never expire
    pub default_ttl: u64,
    /// Background purge task interval in seconds
    pub cleanup_interval: u64,
    /// TTL in seconds the demo applies to populated entries
    pub populate_ttl: u64,
    /// Number of concurrent callers the demo spawns
    pub demo_callers: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL` - Store default TTL in seconds (default: 0, no expiration)
    /// - `CACHE_CLEANUP_INTERVAL` - Purge frequency in seconds (default: 1)
    /// - `CACHE_POPULATE_TTL` - Demo populate TTL in seconds (default: 60)
    /// - `CACHE_DEMO_CALLERS` - Demo concurrent callers (default: 8)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl: parse_var("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            cleanup_interval: parse_var("CACHE_CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
            populate_ttl: parse_var("CACHE_POPULATE_TTL").unwrap_or(defaults.populate_ttl),
            demo_callers: parse_var("CACHE_DEMO_CALLERS").unwrap_or(defaults.demo_callers),
        }
    }

    /// Store default expiration, `None` when entries never expire by default.
    pub fn default_expiration(&self) -> Option<Duration> {
        (self.default_ttl > 0).then(|| Duration::from_secs(self.default_ttl))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 0,
            cleanup_interval: 1,
            populate_ttl: 60,
            demo_callers: 8,
        }
    }
}
