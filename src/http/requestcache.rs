//! In-memory response cache with per-entry TTL.
//!
//! Expiry is enforced lazily: a read of an expired entry evicts it and reports
//! a miss. There is no background sweep; long-lived callers that cache many
//! distinct keys should call [`RequestCache::clear_all`] periodically.
//!
//! Time comes from the tokio clock, so paused-time tests can advance it.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_millis(5000);

/// Expiry horizon used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Cached value with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub expiry: Instant,
    pub data: V,
}

impl<V> CacheEntry<V> {
    /// Fresh while `now < expiry`.
    pub fn is_fresh(&self) -> bool {
        Instant::now() < self.expiry
    }
}

/// TTL-keyed cache.
///
/// Thread-safe via DashMap; owned by one API instance and never shared.
pub struct RequestCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> Default for RequestCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> RequestCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Look up a fresh value. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        {
            let entry = self.entries.get(key)?;
            if entry.is_fresh() {
                return Some(entry.data.clone());
            }
        }
        self.entries.remove_if(key, |_, e| !e.is_fresh());
        tracing::trace!(key = %key, "evicted expired cache entry");
        None
    }

    /// Store a value for `ttl`, replacing any previous entry.
    ///
    /// A TTL too large to represent keeps the entry for thirty years.
    pub fn set(&self, key: impl Into<String>, data: V, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            expiry: now.checked_add(ttl).unwrap_or(now + FAR_FUTURE),
            data,
        };
        self.entries.insert(key.into(), entry);
    }

    /// Remove one entry, or every entry when `key` is `None`.
    pub fn clear(&self, key: Option<&str>) {
        match key {
            Some(k) => {
                self.entries.remove(k);
            }
            None => self.entries.clear(),
        }
    }

    /// Remove every entry.
    pub fn clear_all(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including stale ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
