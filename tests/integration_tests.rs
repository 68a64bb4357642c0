//! tiercache Integration Tests
//!
//! End-to-end behaviour of the cache manager over all three tiers, with the
//! remote tier served by the in-process backend:
//! - Read-through promotion
//! - Write-through population and partial failure
//! - Capacity and eviction across tiers
//! - Observability

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use bytes::Bytes;

use tiercache::cache::{InMemoryRemoteBackend, RemoteBackend};
use tiercache::{CacheConfig, CacheManager, Error};

const MINUTE: Duration = Duration::from_secs(60);

async fn three_tier(config: CacheConfig) -> (CacheManager, Arc<InMemoryRemoteBackend>) {
    let backend = Arc::new(InMemoryRemoteBackend::new());
    let manager = CacheManager::with_remote(config, backend.clone())
        .await
        .unwrap();
    (manager, backend)
}

// =============================================================================
// Read Path
// =============================================================================

mod read_path_tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get_returns_value() {
        let (manager, _backend) = three_tier(CacheConfig::default()).await;
        manager.set("session:1", "payload", MINUTE).await.unwrap();
        assert_eq!(manager.get("session:1").await.unwrap(), Bytes::from("payload"));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_served() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        manager.set("k", "v", Duration::ZERO).await.unwrap();

        assert_matches!(manager.get("k").await, Err(Error::NotFound { .. }));
        assert!(!backend.contains("k"));
    }

    #[tokio::test]
    async fn test_remote_only_value_reaches_local_after_one_get() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        backend
            .set("user:42", Bytes::from_static(b"alice"), MINUTE)
            .await
            .unwrap();
        assert!(!manager.local().contains("user:42"));

        manager.get("user:42").await.unwrap();

        assert!(manager.local().contains("user:42"));
        assert!(manager.memory().contains("user:42"));

        // The next read never leaves the process
        let reads_before = backend.stats().reads;
        manager.get("user:42").await.unwrap();
        assert_eq!(backend.stats().reads, reads_before);
    }

    #[tokio::test]
    async fn test_remote_read_failure_degrades_to_miss() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        backend.set_failing(true);

        assert_matches!(manager.get("k").await, Err(Error::NotFound { key }) if key == "k");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_remote_read_times_out_as_miss() {
        let config = CacheConfig {
            operation_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let (manager, backend) = three_tier(config).await;
        backend
            .set("k", Bytes::from_static(b"v"), MINUTE)
            .await
            .unwrap();
        backend.set_latency(Duration::from_secs(1));

        assert_matches!(manager.get("k").await, Err(Error::NotFound { .. }));
        assert_eq!(manager.remote().unwrap().errors(), 1);
    }

    #[tokio::test]
    async fn test_exists_checks_all_tiers() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        manager.set("a", "1", MINUTE).await.unwrap();
        backend
            .set("b", Bytes::from_static(b"2"), MINUTE)
            .await
            .unwrap();

        assert!(manager.exists("a").await);
        assert!(manager.exists("b").await);
        assert!(!manager.exists("c").await);
    }
}

// =============================================================================
// Write Path
// =============================================================================

mod write_path_tests {
    use super::*;

    #[tokio::test]
    async fn test_set_populates_every_tier() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        manager.set("k", "v", MINUTE).await.unwrap();

        assert!(manager.local().contains("k"));
        assert!(manager.memory().contains("k"));
        assert!(backend.contains("k"));
    }

    #[tokio::test]
    async fn test_remote_write_failure_surfaces() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        backend.set_failing(true);

        assert_matches!(
            manager.set("k", "v", MINUTE).await,
            Err(Error::RemoteUnavailable(_))
        );
        assert!(manager.local().contains("k"));
        assert!(manager.memory().contains("k"));
    }

    #[tokio::test]
    async fn test_repeated_delete_is_idempotent() {
        let (manager, _backend) = three_tier(CacheConfig::default()).await;
        manager.set("k", "v", MINUTE).await.unwrap();

        for _ in 0..5 {
            manager.delete("k").await.unwrap();
            assert_matches!(manager.get("k").await, Err(Error::NotFound { .. }));
        }
        manager.delete("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_remote_delete_surfaces_but_key_is_gone() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        manager.set("k", "v", MINUTE).await.unwrap();

        backend.set_failing(true);
        assert_matches!(manager.delete("k").await, Err(Error::RemoteUnavailable(_)));

        // In-process tiers are cleared and the failing remote read is a miss
        assert_matches!(manager.get("k").await, Err(Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_failing_remote_clear_still_empties_local_tiers() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        for i in 0..20 {
            manager.set(&format!("k{}", i), "v", MINUTE).await.unwrap();
        }

        backend.set_failing(true);
        assert_matches!(manager.clear().await, Err(Error::RemoteUnavailable(_)));

        assert!(manager.local().is_empty());
        assert!(manager.memory().is_empty());
        assert_eq!(backend.len(), 20);
    }

    #[tokio::test]
    async fn test_close_then_remote_unavailable() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        manager.close().await.unwrap();

        assert!(backend.is_closed());
        assert_matches!(manager.ping().await, Err(Error::RemoteUnavailable(_)));
    }
}

// =============================================================================
// Capacity and Eviction
// =============================================================================

mod eviction_tests {
    use super::*;

    #[tokio::test]
    async fn test_capacity_two_each_tier_holds_two() {
        let manager = CacheManager::memory_only(CacheConfig::memory(2, 2)).unwrap();

        manager.set("a", "1", Duration::from_secs(60)).await.unwrap();
        manager.set("b", "2", Duration::from_secs(120)).await.unwrap();
        manager.set("c", "3", Duration::from_secs(180)).await.unwrap();

        assert_eq!(manager.local().len(), 2);
        assert_eq!(manager.memory().len(), 2);

        // Memory evicts the entry closest to expiry
        assert!(!manager.memory().contains("a"));
        assert!(manager.memory().contains("b"));
        assert!(manager.memory().contains("c"));

        let evicted_from_both: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .filter(|k| !manager.local().contains(k) && !manager.memory().contains(k))
            .collect();
        assert!(evicted_from_both.len() <= 1);

        for key in evicted_from_both {
            assert_matches!(manager.get(key).await, Err(Error::NotFound { .. }));
        }

        // c was written last, so both tiers still hold it
        assert_eq!(manager.get("c").await.unwrap(), Bytes::from("3"));
    }

    #[tokio::test]
    async fn test_remote_backs_evicted_entries() {
        let (manager, _backend) = three_tier(CacheConfig::memory(2, 2)).await;

        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            manager
                .set(key, format!("v{}", i), Duration::from_secs(60 * (i as u64 + 1)))
                .await
                .unwrap();
        }

        // Every key is still readable through the remote tier
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            assert_eq!(manager.get(key).await.unwrap(), Bytes::from(format!("v{}", i)));
        }
        assert!(manager.metrics().remote_hits >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_swept_before_eviction() {
        let manager = CacheManager::memory_only(CacheConfig::memory(2, 2)).unwrap();
        manager.set("short", "1", Duration::from_secs(1)).await.unwrap();
        manager.set("long", "2", Duration::from_secs(600)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        manager.set("new", "3", Duration::from_secs(600)).await.unwrap();

        assert_eq!(manager.memory().evictions(), 0);
        assert!(manager.memory().contains("long"));
        assert!(manager.memory().contains("new"));
    }
}

// =============================================================================
// Concurrency
// =============================================================================

mod concurrency_tests {
    use super::*;
    use tokio::task::JoinSet;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_operations() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        let manager = Arc::new(manager);
        let mut join_set = JoinSet::new();

        for t in 0..8 {
            let mgr = manager.clone();
            join_set.spawn(async move {
                for i in 0..100 {
                    let key = format!("t{}-{}", t, i);
                    mgr.set(&key, format!("value-{}", i), MINUTE).await?;
                    let value = mgr.get(&key).await?;
                    assert_eq!(value, Bytes::from(format!("value-{}", i)));
                    if i % 10 == 0 {
                        mgr.delete(&key).await?;
                    }
                }
                Ok::<_, Error>(())
            });
        }

        while let Some(result) = join_set.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(backend.len(), 8 * 90);
        assert_eq!(manager.memory().len(), 8 * 90);
    }
}

// =============================================================================
// Observability
// =============================================================================

mod observability_tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_track_tiers() {
        let (manager, backend) = three_tier(CacheConfig::default()).await;
        manager.set("a", "1", MINUTE).await.unwrap();
        backend
            .set("b", Bytes::from_static(b"2"), MINUTE)
            .await
            .unwrap();

        manager.get("a").await.unwrap();
        manager.get("b").await.unwrap();
        let _ = manager.get("missing").await;

        let metrics = manager.metrics();
        assert_eq!(metrics.local_hits, 1);
        assert_eq!(metrics.remote_hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.local_entries, 2);
        assert_eq!(metrics.memory_entries, 2);
        assert!((metrics.hit_ratio - 2.0 / 3.0).abs() < 1e-9);

        let text = manager.metrics_text().unwrap();
        assert!(text.contains("tiercache_misses_total 1"));
        assert!(text.contains("tiercache_promotions_total{tier=\"memory\"} 1"));
    }

    #[tokio::test]
    async fn test_config_from_yaml_drives_manager() {
        let yaml = r#"
cache:
  driver: memory
  ttl: 10m
  max_entries: 50
  local_max_entries: 5
"#;
        let config = CacheConfig::from_yaml_str(yaml).unwrap();
        let manager = CacheManager::new(config).await.unwrap();

        assert!(!manager.is_remote_enabled());
        assert_eq!(manager.local().capacity(), 5);
        assert_eq!(manager.memory().capacity(), 50);
        assert_eq!(manager.config().ttl, Duration::from_secs(600));
    }
}
