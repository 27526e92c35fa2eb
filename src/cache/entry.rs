//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with absolute and sliding expiration.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::cache::EntryOptions;

// == Cache Entry ==
/// Represents a single stored payload with its expiration state.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The serialized payload
    pub value: String,
    /// Fixed deadline, None = no absolute expiration
    pub expires_at: Option<Instant>,
    /// Idle window, None = no sliding expiration
    pub sliding: Option<Duration>,
    /// Last read or write, drives sliding expiration
    pub last_access: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry from write options.
    ///
    /// # Arguments
    /// * `value` - The serialized payload
    /// * `options` - Expiration policy for this write, if any
    /// * `default_ttl` - Store default applied when `options` sets no expiration
    pub fn new(value: String, options: Option<&EntryOptions>, default_ttl: Option<Duration>) -> Self {
        let now = Instant::now();

        let (absolute, sliding) = match options.filter(|o| o.has_expiration()) {
            Some(options) => (options.absolute_ttl(Utc::now()), options.sliding_expiration),
            None => (default_ttl, None),
        };

        Self {
            value,
            expires_at: absolute.map(|ttl| now + ttl),
            sliding,
            last_access: now,
        }
    }

    // == Deadline ==
    /// Returns the effective deadline: the earlier of the absolute deadline
    /// and the end of the current sliding window.
    pub fn deadline(&self) -> Option<Instant> {
        let sliding_deadline = self.sliding.map(|window| self.last_access + window);

        match (self.expires_at, sliding_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now` reaches its deadline.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Touch ==
    /// Records a read, restarting the sliding window.
    pub fn touch(&mut self, now: Instant) {
        self.last_access = now;
    }

    // == Time To Live ==
    /// Returns remaining time before expiration, or None if the entry never expires.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
