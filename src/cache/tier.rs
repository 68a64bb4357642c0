//! Locked tier core shared by the local and memory tiers.
//!
//! Owns the map, the lock and the counters. The owning tier only picks an
//! [`Eviction`] policy.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::{CacheEntry, Lookup, TierState};
use super::metrics::TierStats;

/// How a full tier makes room for an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Eviction {
    /// Drop whichever key the map yields first
    Arbitrary,
    /// Sweep expired entries, then drop the entry closest to its deadline
    SoonestToExpire,
}

#[derive(Debug)]
pub(crate) struct TierCore {
    name: &'static str,
    eviction: Eviction,
    max_entries: usize,
    max_memory: u64,
    state: RwLock<TierState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl TierCore {
    pub fn new(name: &'static str, eviction: Eviction, max_entries: usize, max_memory: u64) -> Self {
        Self {
            name,
            eviction,
            max_entries,
            max_memory,
            state: RwLock::new(TierState::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Copy of the live entry under `key`. An expired entry is removed and counted as a miss.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();

        match self.state.read().lookup(key, now) {
            Lookup::Hit(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.clone());
            }
            Lookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Lookup::Expired => {}
        }

        // A writer may have refreshed the key between the two locks
        let mut state = self.state.write();
        let result = match state.lookup(key, now) {
            Lookup::Hit(entry) => Some(entry.clone()),
            Lookup::Expired => {
                state.remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                debug!(tier = self.name, key = %key, "expired entry dropped");
                None
            }
            Lookup::Miss => None,
        };

        let counter = if result.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Insert or overwrite `key`. A full tier evicts one entry first, even on overwrite.
    pub fn insert(&self, key: &str, entry: CacheEntry) {
        let mut state = self.state.write();

        if self.eviction == Eviction::SoonestToExpire {
            let expired = state.remove_expired(Instant::now());
            if expired > 0 {
                self.expirations.fetch_add(expired as u64, Ordering::Relaxed);
                debug!(tier = self.name, count = expired, "swept expired entries");
            }
        }

        if state.len() >= self.max_entries {
            let victim = match self.eviction {
                Eviction::Arbitrary => state.first_key(),
                Eviction::SoonestToExpire => state.soonest_to_expire(),
            };
            if let Some(victim) = victim {
                state.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(tier = self.name, key = %victim, "evicted entry");
            }
        }

        let before = state.size_bytes();
        state.insert(key.to_string(), entry);
        let after = state.size_bytes();

        if before <= self.max_memory && after > self.max_memory {
            warn!(
                tier = self.name,
                size_bytes = after,
                max_memory = self.max_memory,
                "tier exceeded its advisory memory budget"
            );
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.state.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.state.write().clear();
    }

    pub fn purge_expired(&self) -> usize {
        let removed = self.state.write().remove_expired(Instant::now());
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Live-entry check that leaves the hit/miss counters alone
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.state.read().lookup(key, Instant::now()), Lookup::Hit(_))
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn size(&self) -> u64 {
        self.state.read().size_bytes()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> TierStats {
        let (entries, size_bytes) = {
            let state = self.state.read();
            (state.len(), state.size_bytes())
        };

        TierStats {
            entries,
            size_bytes,
            max_entries: self.max_entries,
            max_memory: self.max_memory,
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations(),
        }
    }
}
