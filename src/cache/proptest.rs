//! Property-Based Tests for the Cache Tiers
//!
//! # Test Properties
//!
//! 1. **Capacity Bound**: no tier ever holds more than `max_entries` entries
//! 2. **Soonest-Expiry Eviction**: the memory tier evicts the entry closest to its deadline
//! 3. **Overwrite Eviction**: rewriting a key in a full tier still evicts one entry
//! 4. **Read-Your-Write**: a value set through the manager is read back unchanged

#![cfg(test)]

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;

use super::local::{LocalCache, LocalConfig};
use super::manager::CacheManager;
use super::memory::{MemoryCache, MemoryConfig};
use crate::config::CacheConfig;

// =============================================================================
// Property Strategies
// =============================================================================

/// Distinct TTLs in whole seconds, all far enough out that nothing expires mid-test.
fn distinct_ttls_strategy(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::hash_set(60u64..100_000, 2..=max_len)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Short keys drawn from a small alphabet so overwrites happen.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-h]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

fn memory_cache(max_entries: usize) -> MemoryCache {
    MemoryCache::with_config(MemoryConfig {
        max_entries,
        ..Default::default()
    })
}

// =============================================================================
// Capacity Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the memory tier never exceeds its entry cap.
    #[test]
    fn prop_memory_capacity_bound(
        max_entries in 1usize..=16,
        keys in prop::collection::vec(key_strategy(), 1..200),
    ) {
        let cache = memory_cache(max_entries);
        for key in &keys {
            cache.set(key, Bytes::from_static(b"v"), Duration::from_secs(3600));
            prop_assert!(cache.len() <= max_entries);
        }

        let distinct: HashSet<_> = keys.iter().collect();
        prop_assert!(cache.len() <= distinct.len());
        if let Some(last) = keys.last() {
            prop_assert!(cache.contains(last));
        }
    }

    /// Property: the local tier never exceeds its entry cap.
    #[test]
    fn prop_local_capacity_bound(
        max_entries in 1usize..=16,
        keys in prop::collection::vec(key_strategy(), 1..200),
    ) {
        let cache = LocalCache::with_config(LocalConfig {
            max_entries,
            ..Default::default()
        });
        for key in &keys {
            cache.set(key, Bytes::from_static(b"v"), Duration::from_secs(3600));
            prop_assert!(cache.len() <= max_entries);
        }

        // The key just written always survives its own insert
        if let Some(last) = keys.last() {
            prop_assert!(cache.contains(last));
        }
    }
}

// =============================================================================
// Eviction Order Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: inserting a new key into a full memory tier evicts exactly the
    /// entry with the earliest deadline.
    #[test]
    fn prop_memory_evicts_soonest_to_expire(ttls in distinct_ttls_strategy(12)) {
        let cache = memory_cache(ttls.len());
        for (i, ttl) in ttls.iter().enumerate() {
            cache.set(&format!("k{}", i), Bytes::from_static(b"v"), Duration::from_secs(*ttl));
        }

        let victim = ttls
            .iter()
            .enumerate()
            .min_by_key(|(_, ttl)| **ttl)
            .map(|(i, _)| format!("k{}", i))
            .unwrap();

        cache.set("newcomer", Bytes::from_static(b"v"), Duration::from_secs(200_000));

        prop_assert_eq!(cache.len(), ttls.len());
        prop_assert_eq!(cache.evictions(), 1);
        prop_assert!(!cache.contains(&victim));
        prop_assert!(cache.contains("newcomer"));
        for i in 0..ttls.len() {
            let key = format!("k{}", i);
            if key != victim {
                prop_assert!(cache.contains(&key));
            }
        }
    }

    /// Property: overwriting a resident key in a full memory tier evicts the
    /// entry with the earliest deadline, which may be the key being rewritten.
    #[test]
    fn prop_overwrite_at_capacity_evicts_soonest(
        ttls in distinct_ttls_strategy(12),
        rewrite in any::<prop::sample::Index>(),
    ) {
        let cache = memory_cache(ttls.len());
        for (i, ttl) in ttls.iter().enumerate() {
            cache.set(&format!("k{}", i), Bytes::from_static(b"v"), Duration::from_secs(*ttl));
        }

        let victim = ttls
            .iter()
            .enumerate()
            .min_by_key(|(_, ttl)| **ttl)
            .map(|(i, _)| format!("k{}", i))
            .unwrap();
        let rewritten = format!("k{}", rewrite.index(ttls.len()));

        cache.set(&rewritten, Bytes::from_static(b"updated"), Duration::from_secs(200_000));

        prop_assert_eq!(cache.evictions(), 1);
        let got = cache.get(&rewritten).unwrap();
        prop_assert_eq!(got.as_ref(), b"updated");
        if victim == rewritten {
            prop_assert_eq!(cache.len(), ttls.len());
        } else {
            prop_assert_eq!(cache.len(), ttls.len() - 1);
            prop_assert!(!cache.contains(&victim));
        }
    }
}

// =============================================================================
// Manager Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: set then get returns the stored bytes, and delete makes the key absent.
    #[test]
    fn prop_manager_read_your_write(
        entries in prop::collection::hash_map(key_strategy(), value_strategy(), 1..8),
    ) {
        tokio_test::block_on(async {
            let manager = CacheManager::memory_only(CacheConfig::default()).unwrap();

            for (key, value) in &entries {
                manager.set(key, value.clone(), Duration::from_secs(60)).await.unwrap();
            }
            for (key, value) in &entries {
                let got = manager.get(key).await.unwrap();
                prop_assert_eq!(got.as_ref(), value.as_slice());
            }
            for key in entries.keys() {
                manager.delete(key).await.unwrap();
                prop_assert!(manager.get(key).await.unwrap_err().is_not_found());
            }
            Ok(())
        })?;
    }
}
