//! Cache Manager - Unified Three-Tier Cache
//!
//! Single entry point over the local, memory and (optional) remote tiers.
//!
//! Reads walk the tiers cheapest-first and copy a hit into every cheaper tier.
//! Remote read failures degrade to a miss. Writes, deletes and clears apply
//! local -> memory -> remote, and a remote failure is returned to the caller
//! after the in-process tiers have already been updated.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::local::{LocalCache, LocalConfig};
use super::memory::{MemoryCache, MemoryConfig};
use super::metrics::{CacheMetrics, MetricsSnapshot};
use super::redis::RedisBackend;
use super::remote::{RemoteBackend, RemoteCache};
use crate::config::{CacheConfig, CacheDriver};
use crate::error::{Error, Result};

/// Cache tier enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// Small hot in-process map
    Local,
    /// Primary in-process map with TTL and eviction
    Memory,
    /// Distributed store
    Remote,
}

impl CacheTier {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            CacheTier::Local => "local",
            CacheTier::Memory => "memory",
            CacheTier::Remote => "remote",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unified cache manager
pub struct CacheManager {
    local: LocalCache,
    memory: MemoryCache,
    remote: Option<RemoteCache>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("local", &self.local)
            .field("memory", &self.memory)
            .field("remote", &self.remote)
            .field("driver", &self.config.driver)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Build the manager described by `config`.
    ///
    /// With the `redis` driver the server must answer a ping within
    /// `connect_timeout`, otherwise construction fails.
    pub async fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let remote = if config.is_remote() {
            let backend = RedisBackend::connect(&config).await?;
            Some(
                RemoteCache::connect(
                    Arc::new(backend),
                    config.connect_timeout,
                    config.operation_timeout,
                )
                .await?,
            )
        } else {
            None
        };

        Self::assemble(config, remote)
    }

    /// Build a manager over a caller-supplied remote backend, ignoring `config.driver`
    pub async fn with_remote(config: CacheConfig, backend: Arc<dyn RemoteBackend>) -> Result<Self> {
        config.validate()?;
        let remote =
            RemoteCache::connect(backend, config.connect_timeout, config.operation_timeout)
                .await?;
        Self::assemble(config, Some(remote))
    }

    /// Build a manager with local and memory tiers only
    pub fn memory_only(config: CacheConfig) -> Result<Self> {
        if config.driver != CacheDriver::Memory {
            return Err(Error::ConfigurationInvalid(format!(
                "memory-only manager requested with driver {}",
                config.driver
            )));
        }
        config.validate()?;
        Self::assemble(config, None)
    }

    fn assemble(config: CacheConfig, remote: Option<RemoteCache>) -> Result<Self> {
        let local = LocalCache::with_config(LocalConfig {
            max_entries: config.local_max_entries(),
            max_memory: config.local_max_memory(),
        });
        let memory = MemoryCache::with_config(MemoryConfig {
            max_entries: config.max_entries,
            max_memory: config.max_memory,
        });

        info!(
            local_max_entries = local.capacity(),
            memory_max_entries = memory.capacity(),
            remote = remote.as_ref().map(RemoteCache::name).unwrap_or("none"),
            "cache manager initialized"
        );

        Ok(Self {
            local,
            memory,
            remote,
            config,
            metrics: Arc::new(CacheMetrics::new()?),
        })
    }

    /// Look `key` up, cheapest tier first.
    ///
    /// A memory hit is copied into the local tier; a remote hit into memory
    /// and local. A remote failure is logged and reported as `NotFound`.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        if let Some(value) = self.local.get(key) {
            self.metrics.record_hit(CacheTier::Local);
            debug!(key = %key, tier = "local", "cache hit");
            return Ok(value);
        }

        if let Some(entry) = self.memory.get_entry(key) {
            self.metrics.record_hit(CacheTier::Memory);
            debug!(key = %key, tier = "memory", "cache hit");

            // Never let the local copy outlive the entry it came from
            let ttl = entry.remaining_ttl().min(self.config.ttl);
            let value = entry.into_value();
            self.local.set(key, value.clone(), ttl);
            self.metrics.record_promotion(CacheTier::Local);

            return Ok(value);
        }

        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(value) => {
                    self.metrics.record_hit(CacheTier::Remote);
                    debug!(key = %key, tier = "remote", "cache hit");

                    self.memory.set(key, value.clone(), self.config.ttl);
                    self.metrics.record_promotion(CacheTier::Memory);
                    self.local.set(key, value.clone(), self.config.ttl);
                    self.metrics.record_promotion(CacheTier::Local);

                    return Ok(value);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    self.metrics.record_remote_error("get");
                    warn!(key = %key, error = %e, "remote cache read failed, treating as miss");
                }
            }
        }

        self.metrics.record_miss();
        debug!(key = %key, "cache miss");
        Err(Error::not_found(key))
    }

    /// Store `value` under `key` in every tier.
    ///
    /// A zero `ttl` stores an already-expired value: the next `get` misses.
    pub async fn set(&self, key: &str, value: impl Into<Bytes>, ttl: Duration) -> Result<()> {
        let value = value.into();

        self.local.set(key, value.clone(), ttl);
        self.memory.set(key, value.clone(), ttl);

        if let Some(remote) = &self.remote {
            remote.set(key, value, ttl).await.map_err(|e| {
                self.metrics.record_remote_error("set");
                warn!(key = %key, error = %e, "remote cache write failed");
                e
            })?;
        }

        Ok(())
    }

    /// Store `value` with the configured default TTL
    pub async fn set_default(&self, key: &str, value: impl Into<Bytes>) -> Result<()> {
        self.set(key, value, self.config.ttl).await
    }

    /// Remove `key` from every tier. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.local.delete(key);
        self.memory.delete(key);

        if let Some(remote) = &self.remote {
            remote.delete(key).await.map_err(|e| {
                self.metrics.record_remote_error("delete");
                warn!(key = %key, error = %e, "remote cache delete failed, local tiers already cleared");
                e
            })?;
        }

        debug!(key = %key, "cache entry deleted");
        Ok(())
    }

    /// Remove every key from every tier
    pub async fn clear(&self) -> Result<()> {
        self.local.clear();
        self.memory.clear();

        if let Some(remote) = &self.remote {
            remote.clear().await.map_err(|e| {
                self.metrics.record_remote_error("clear");
                warn!(error = %e, "remote cache clear failed, local tiers already cleared");
                e
            })?;
        }

        info!("cache cleared");
        Ok(())
    }

    /// Release the remote connection. The in-process tiers need no teardown.
    pub async fn close(&self) -> Result<()> {
        if let Some(remote) = &self.remote {
            remote.close().await?;
        }
        info!("cache manager closed");
        Ok(())
    }

    /// Check remote reachability; always succeeds without a remote tier
    pub async fn ping(&self) -> Result<()> {
        match &self.remote {
            Some(remote) => remote.ping().await,
            None => Ok(()),
        }
    }

    /// True if any tier holds `key`. Does not promote; remote errors count as absent.
    pub async fn exists(&self, key: &str) -> bool {
        if self.local.contains(key) || self.memory.contains(key) {
            return true;
        }
        match &self.remote {
            Some(remote) => remote.get(key).await.is_ok(),
            None => false,
        }
    }

    /// Sweep expired entries from both in-process tiers
    pub fn purge_expired(&self) -> usize {
        self.local.purge_expired() + self.memory.purge_expired()
    }

    /// True if a remote tier is configured
    pub fn is_remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    fn update_stats(&self) {
        self.metrics
            .update_tier_stats(CacheTier::Local, &self.local.stats());
        self.metrics
            .update_tier_stats(CacheTier::Memory, &self.memory.stats());
    }

    /// Get metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.update_stats();
        self.metrics.snapshot()
    }

    /// Prometheus text exposition
    pub fn metrics_text(&self) -> Result<String> {
        self.update_stats();
        self.metrics.encode_text()
    }

    /// Get reference to the local tier
    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    /// Get reference to the memory tier
    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    /// Get reference to the remote tier, if configured
    pub fn remote(&self) -> Option<&RemoteCache> {
        self.remote.as_ref()
    }

    /// Get configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
