//! Dedup cache - suppresses repeated delivery of the same event identity
//!
//! The cache maps `EventIdentity` to the wall-clock time it was first seen.
//! Presence alone gates delivery, so a key is written once and never updated.
//!
//! ## Eviction
//! Nothing is evicted on the insert path. The janitor calls [`DedupCache::sweep`]
//! on a fixed period:
//! 1. drop every entry older than `now - retention`
//! 2. if the cache is still over `max_entries`, drop the oldest entries until
//!    it is not
//!
//! An insert racing a sweep may or may not survive it. The cache only promises
//! not to double-deliver identities seen close together in time.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, trace};

use super::dedup_key::EventIdentity;
use crate::config::RelayConfig;

/// Current wall-clock time, epoch ms
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Result of one sweep pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepStats {
    /// Removed because older than the retention window
    pub expired: usize,
    /// Removed to get back under the size cap
    pub evicted: usize,
    /// Entries left after the pass
    pub remaining: usize,
}

/// Concurrent dedup cache
pub struct DedupCache {
    entries: DashMap<EventIdentity, i64>,
    retention_ms: i64,
    max_entries: usize,
}

impl DedupCache {
    /// Empty cache
    ///
    /// Entries older than `retention` are dropped by `sweep`, which also trims
    /// the cache back to `max_entries`, oldest first.
    pub fn new(retention: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            retention_ms: i64::try_from(retention.as_millis()).unwrap_or(i64::MAX),
            max_entries,
        }
    }

    /// Cache using the configured retention and entry cap
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.retention(), config.max_cache_entries)
    }

    /// Check-and-set: `true` if the identity was not present (and is now recorded)
    pub fn should_deliver(&self, identity: EventIdentity) -> bool {
        self.should_deliver_at(identity, now_millis())
    }

    /// [`should_deliver`](Self::should_deliver) with an explicit clock
    ///
    /// The entry API holds the shard lock across the check and the insert, so
    /// concurrent callers with the same identity see exactly one `true`.
    pub fn should_deliver_at(&self, identity: EventIdentity, now_ms: i64) -> bool {
        match self.entries.entry(identity) {
            Entry::Occupied(_) => {
                trace!(identity = %identity, "Duplicate notification suppressed");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(now_ms);
                true
            }
        }
    }

    /// Sweep against the current wall clock
    ///
    /// Drops expired entries, then evicts the oldest until the cap holds.
    /// Safe to run while other threads call `should_deliver`.
    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(now_millis())
    }

    /// One sweep pass with an explicit clock
    pub fn sweep_at(&self, now_ms: i64) -> SweepStats {
        let cutoff = now_ms.saturating_sub(self.retention_ms);

        let mut expired = 0;
        self.entries.retain(|_, first_seen| {
            let keep = *first_seen >= cutoff;
            if !keep {
                expired += 1;
            }
            keep
        });

        let mut evicted = 0;
        if self.entries.len() > self.max_entries {
            let mut snapshot: Vec<(EventIdentity, i64)> = self
                .entries
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect();
            snapshot.sort_by_key(|(_, first_seen)| *first_seen);

            let excess = snapshot.len().saturating_sub(self.max_entries);
            for (identity, _) in snapshot.into_iter().take(excess) {
                if self.entries.remove(&identity).is_some() {
                    evicted += 1;
                }
            }
        }

        let stats = SweepStats {
            expired,
            evicted,
            remaining: self.entries.len(),
        };
        debug!(
            expired = stats.expired,
            evicted = stats.evicted,
            remaining = stats.remaining,
            "Dedup cache swept"
        );
        stats
    }

    /// Whether `identity` is currently recorded
    pub fn contains(&self, identity: &EventIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Number of recorded identities; may briefly exceed the cap between sweeps
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}
