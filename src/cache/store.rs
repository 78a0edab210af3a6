//! Cache Store Module
//!
//! Process-lifetime key/value table with per-entry expiry and lazy eviction.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock};

// == Cache Store ==
/// Key/value storage where expired entries are swept on access.
///
/// There is no background timer: every operation except [`CacheStore::clear`]
/// first removes all entries whose TTL has elapsed, so an expired value is
/// never returned and is indistinguishable from an absent one.
#[derive(Debug)]
pub struct CacheStore<V, C = SystemClock> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Usage statistics
    stats: CacheStats,
    /// Time source for expiry decisions
    clock: C,
}

impl<V: Clone> CacheStore<V, SystemClock> {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<V: Clone> Default for CacheStore<V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone, C: Clock> CacheStore<V, C> {
    /// Creates an empty store driven by `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            clock,
        }
    }

    // == Set ==
    /// Stores `value` under `key`, visible for `ttl`. Overwrites any prior entry.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        self.sweep_expired();
        let entry = CacheEntry::expiring(value, self.clock.now(), ttl);
        self.entries.insert(key.into(), entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Set Forever ==
    /// Stores `value` under `key` with no expiration.
    pub fn set_forever(&mut self, key: impl Into<String>, value: V) {
        self.sweep_expired();
        self.entries.insert(key.into(), CacheEntry::forever(value));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns a copy of the value stored under `key` if it has not expired.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.sweep_expired();
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Get Or ==
    /// Returns the cached value, or the result of `fallback` on a miss.
    ///
    /// The fallback result is not stored; callers cache it themselves if wanted.
    pub fn get_or<F>(&mut self, key: &str, fallback: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.get(key).unwrap_or_else(fallback)
    }

    // == Delete ==
    /// Removes the entry under `key`. Returns whether a live entry was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.sweep_expired();
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Has ==
    /// Existence check with the same expiry semantics as [`CacheStore::get`].
    pub fn has(&mut self, key: &str) -> bool {
        self.sweep_expired();
        self.entries.contains_key(key)
    }

    // == Keys ==
    /// Snapshot of all unexpired keys, in no particular order.
    pub fn keys(&mut self) -> Vec<String> {
        self.sweep_expired();
        self.entries.keys().cloned().collect()
    }

    // == Clear ==
    /// Removes every entry unconditionally.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of stored entries, including ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Sweep Expired ==
    /// Removes all expired entries and returns how many were dropped.
    fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        let removed = before - self.entries.len();
        if removed > 0 {
            self.stats.record_expirations(removed);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }
}
