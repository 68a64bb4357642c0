//! Cache Entry Types
//!
//! Tier-internal entries and the key -> entry map each in-process tier owns.
//! Deadlines use [`tokio::time::Instant`] so a paused test runtime controls expiry.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// Deadline used when `now + ttl` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A value held by one tier, with its deadline and accounted size
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Opaque payload
    value: Bytes,
    /// The entry is expired once `now >= expires_at`
    expires_at: Instant,
    /// Payload length in bytes
    size: u64,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` from now. A zero TTL is already expired.
    pub fn new(value: Bytes, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self::with_deadline(value, expires_at)
    }

    /// Create an entry with an explicit deadline
    pub fn with_deadline(value: Bytes, expires_at: Instant) -> Self {
        let size = value.len() as u64;
        Self {
            value,
            expires_at,
            size,
        }
    }

    /// Borrow the payload
    #[inline]
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Take the payload
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }

    /// Deadline
    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Accounted size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Lifetime left before expiry (zero once expired)
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Outcome of looking a key up at a given instant
#[derive(Debug)]
pub(crate) enum Lookup<'a> {
    Hit(&'a CacheEntry),
    Expired,
    Miss,
}

/// Key -> entry map with byte accounting. Always used behind the owning tier's lock.
#[derive(Debug, Default)]
pub(crate) struct TierState {
    entries: HashMap<String, CacheEntry>,
    size_bytes: u64,
}

impl TierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `key` at `now` without mutating anything
    pub fn lookup(&self, key: &str, now: Instant) -> Lookup<'_> {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => Lookup::Expired,
            Some(entry) => Lookup::Hit(entry),
            None => Lookup::Miss,
        }
    }

    /// Insert or overwrite, returning the replaced entry
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.size_bytes += entry.size();
        let old = self.entries.insert(key, entry);
        if let Some(old_entry) = &old {
            self.size_bytes -= old_entry.size();
        }
        old
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if let Some(entry) = &removed {
            self.size_bytes -= entry.size();
        }
        removed
    }

    /// Drop everything, returning how many entries were held
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.size_bytes = 0;
        count
    }

    /// Remove every entry expired at `now`, returning how many were removed
    pub fn remove_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                freed += entry.size();
            }
            keep
        });
        self.size_bytes -= freed;
        before - self.entries.len()
    }

    /// Key with the earliest deadline
    pub fn soonest_to_expire(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at())
            .map(|(key, _)| key.clone())
    }

    /// Whatever key the map yields first
    pub fn first_key(&self) -> Option<String> {
        self.entries.keys().next().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

// =============================================================================
// Tests
// =============================================================================
