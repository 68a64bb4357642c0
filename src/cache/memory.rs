//! Memory Cache - Primary In-Process Tier
//!
//! Larger, TTL-aware tier that is the main in-process store.
//!
//! # Design
//!
//! - One `RwLock` over the key -> entry map
//! - Lazy expiry on read: an expired entry is deleted and reported as a miss
//! - Every insert first sweeps expired entries, then, if the tier is still at
//!   `max_entries`, evicts the entry closest to its deadline
//! - `max_memory` is advisory: crossing it is logged, never enforced

use std::time::Duration;

use bytes::Bytes;

use super::entry::CacheEntry;
use super::metrics::TierStats;
use super::tier::{Eviction, TierCore};

/// Memory cache configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Hard entry cap
    pub max_entries: usize,
    /// Advisory byte budget
    pub max_memory: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::config::DEFAULT_MAX_ENTRIES,
            max_memory: crate::config::DEFAULT_MAX_MEMORY,
        }
    }
}

/// Memory cache - primary in-process tier
#[derive(Debug)]
pub struct MemoryCache {
    core: TierCore,
}

impl MemoryCache {
    /// Create a new memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Create a new memory cache with custom configuration
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            core: TierCore::new(
                "memory",
                Eviction::SoonestToExpire,
                config.max_entries,
                config.max_memory,
            ),
        }
    }

    /// Get the value stored under `key`, if it has not expired
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.get_entry(key).map(CacheEntry::into_value)
    }

    /// Get a copy of the live entry stored under `key`
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        self.core.lookup(key)
    }

    /// Insert or overwrite `key`, expiring `ttl` from now
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

    /// Sweep expired entries now rather than on the next insert
    pub fn purge_expired(&self) -> usize {
        self.core.purge_expired()
    }

    /// Check for a live entry without touching hit/miss counters
    pub fn contains(&self, key: &str) -> bool {
        self.core.contains(key)
    }

    /// Number of resident entries (expired ones included until swept)
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

    pub fn expirations(&self) -> u64 {
        self.core.expirations()
    }

    /// Get cache statistics
    pub fn stats(&self) -> TierStats {
        self.core.stats()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
