//! Entry Options Module
//!
//! Expiration policy attached to a cache write.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{CacheError, Result};

// == Entry Options ==
/// Expiration policy for a single cache entry.
///
/// Absolute and sliding expiration may be combined; the entry expires at
/// whichever deadline comes first. With no field set the store applies its
/// own default policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Expire this long after the write, regardless of access
    pub absolute_expiration: Option<Duration>,
    /// Expire at this wall-clock instant, regardless of access
    pub absolute_expiration_at: Option<DateTime<Utc>>,
    /// Expire after this long without a read; each read restarts the window
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Creates options with no expiration set.
    pub fn new() -> Self {
        Self::default()
    }

    // == Seconds Shortcut ==
    /// Builds an absolute expiration of `seconds` from now.
    ///
    /// Fails with [`CacheError::InvalidArgument`] when `seconds` is zero.
    pub fn expire_after_seconds(seconds: u64) -> Result<Self> {
        if seconds == 0 {
            return Err(CacheError::invalid_argument(
                "cache seconds must be greater than 0",
            ));
        }
        Ok(Self::new().with_absolute_expiration(Duration::from_secs(seconds)))
    }

    pub fn with_absolute_expiration(mut self, ttl: Duration) -> Self {
        self.absolute_expiration = Some(ttl);
        self
    }

    pub fn with_absolute_expiration_at(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration_at = Some(at);
        self
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// True if any expiration field is set.
    pub fn has_expiration(&self) -> bool {
        self.absolute_expiration.is_some()
            || self.absolute_expiration_at.is_some()
            || self.sliding_expiration.is_some()
    }

    // == Absolute Deadline ==
    /// Time remaining until the earliest absolute deadline, measured from `now`.
    ///
    /// A wall-clock instant already in the past yields `Duration::ZERO`.
    pub fn absolute_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        let from_at = self
            .absolute_expiration_at
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO));

        match (self.absolute_expiration, from_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
