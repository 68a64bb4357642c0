//! Local Cache - Hot In-Process Tier
//!
//! Smallest and cheapest tier. Sits in front of the memory tier and is refreshed
//! by the manager on every read that falls through to a lower tier.
//!
//! # Design
//!
//! - One `RwLock` over the whole map: reads share, writes exclude
//! - Entries keep the deadline they were populated with; an expired entry is
//!   dropped on the read that finds it, never returned
//! - A full tier evicts the first key the map yields before every insert,
//!   overwrites included; no ordering is kept

use std::time::Duration;

use bytes::Bytes;

use super::entry::CacheEntry;
use super::metrics::TierStats;
use super::tier::{Eviction, TierCore};

/// Local cache configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Hard entry cap
    pub max_entries: usize,
    /// Advisory byte budget
    pub max_memory: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            max_memory: 10 * 1024 * 1024,
        }
    }
}

/// Local cache - hot in-process tier
#[derive(Debug)]
pub struct LocalCache {
    core: TierCore,
}

impl LocalCache {
    /// Create a new local cache with default configuration
    pub fn new() -> Self {
        Self::with_config(LocalConfig::default())
    }

    /// Create a new local cache with custom configuration
    pub fn with_config(config: LocalConfig) -> Self {
        Self {
            core: TierCore::new("local", Eviction::Arbitrary, config.max_entries, config.max_memory),
        }
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.core.lookup(key).map(CacheEntry::into_value)
    }

    /// Insert or overwrite `key`
    pub fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        self.core.insert(key, CacheEntry::new(value, ttl));
    }

    /// Remove `key`, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.core.remove(key)
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.core.clear();
    }

    /// Drop entries whose deadline has passed
    pub fn purge_expired(&self) -> usize {
        self.core.purge_expired()
    }

    /// Check for a live entry without touching hit/miss counters
    pub fn contains(&self, key: &str) -> bool {
        self.core.contains(key)
    }

    /// Number of resident entries (expired ones included until dropped)
    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resident payload bytes
    pub fn size(&self) -> u64 {
        self.core.size()
    }

    /// Entry cap
    pub fn capacity(&self) -> usize {
        self.core.max_entries()
    }

    pub fn hits(&self) -> u64 {
        self.core.hits()
    }

    pub fn misses(&self) -> u64 {
        self.core.misses()
    }

    pub fn evictions(&self) -> u64 {
        self.core.evictions()
    }

    /// Get cache statistics
    pub fn stats(&self) -> TierStats {
        self.core.stats()
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
