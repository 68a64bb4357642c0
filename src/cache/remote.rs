//! Remote Cache - Distributed Tier
//!
//! Network-backed key/value store behind the same get/set/delete/clear shape
//! as the in-process tiers. Treated as unreliable: every call is bounded by a
//! timeout and failures are reported as [`Error::RemoteUnavailable`], misses
//! as [`Error::NotFound`].
//!
//! # Design
//!
//! - Pluggable backend ([`RemoteBackend`]): Redis in production, an in-memory
//!   map for tests and embedding
//! - Construction pings the backend; an unreachable backend is fatal
//! - Cancellation is by dropping the future; no lock is held across `.await`

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::info;

use super::entry::CacheEntry;
use crate::error::{Error, Result};

/// Remote storage backend trait
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Reachability check
    async fn ping(&self) -> Result<()>;

    /// Fetch a value; `Err(NotFound)` on miss
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Store a value; a zero TTL removes the key instead
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove a key; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key the backend holds for this cache
    async fn clear(&self) -> Result<()>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}

/// Remote backend statistics
#[derive(Debug, Clone, Default)]
pub struct RemoteBackendStats {
    /// Keys currently stored
    pub object_count: u64,
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
    /// Delete operations
    pub deletes: u64,
}

/// In-memory remote backend for tests and single-process embedding
pub struct InMemoryRemoteBackend {
    storage: DashMap<String, CacheEntry>,
    failing: AtomicBool,
    closed: AtomicBool,
    latency_ms: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl Default for InMemoryRemoteBackend {
    fn default() -> Self {
        Self {
            storage: DashMap::new(),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }
}

impl InMemoryRemoteBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `RemoteUnavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every subsequent call
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// True if a live entry is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.storage
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn stats(&self) -> RemoteBackendStats {
        RemoteBackendStats {
            object_count: self.storage.len() as u64,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    async fn simulate_network(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("connection closed".to_string()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable(
                "connection refused (injected)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for InMemoryRemoteBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn ping(&self) -> Result<()> {
        self.simulate_network().await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        self.simulate_network().await?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        // Clone out before removing; DashMap refs hold the shard lock
        let found = self.storage.get(key).map(|entry| entry.clone());
        match found {
            Some(entry) if !entry.is_expired() => Ok(entry.into_value()),
            Some(_) => {
                self.storage.remove(key);
                Err(Error::not_found(key))
            }
            None => Err(Error::not_found(key)),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.simulate_network().await?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        if ttl.is_zero() {
            self.storage.remove(key);
        } else {
            self.storage
                .insert(key.to_string(), CacheEntry::new(value, ttl));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.simulate_network().await?;
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.storage.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.simulate_network().await?;
        self.storage.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Remote cache - distributed tier
pub struct RemoteCache {
    backend: Arc<dyn RemoteBackend>,
    operation_timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl fmt::Debug for RemoteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCache")
            .field("backend", &self.backend.name())
            .field("operation_timeout", &self.operation_timeout)
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .field("errors", &self.errors())
            .finish()
    }
}

impl RemoteCache {
    /// Wrap `backend`, failing unless it answers a ping within `connect_timeout`
    pub async fn connect(
        backend: Arc<dyn RemoteBackend>,
        connect_timeout: Duration,
        operation_timeout: Duration,
    ) -> Result<Self> {
        match tokio::time::timeout(connect_timeout, backend.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(Error::RemoteUnavailable(format!(
                    "{} ping timed out after {:?}",
                    backend.name(),
                    connect_timeout
                )))
            }
        }

        info!(backend = backend.name(), "remote cache tier connected");

        Ok(Self {
            backend,
            operation_timeout,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }

    /// Run a backend call under the operation timeout
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::RemoteUnavailable(format!(
                "{} {} timed out after {:?}",
                self.backend.name(),
                operation,
                self.operation_timeout
            ))),
        };

        if matches!(&result, Err(e) if !e.is_not_found()) {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Fetch a value; `Err(NotFound)` on miss, `Err(RemoteUnavailable)` on failure
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let result = self.bounded("get", self.backend.get(key)).await;
        match &result {
            Ok(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_not_found() => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
        result
    }

    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.bounded("set", self.backend.set(key, value, ttl)).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.bounded("delete", self.backend.delete(key)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.bounded("clear", self.backend.clear()).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.backend.ping()).await
    }

    pub async fn close(&self) -> Result<()> {
        self.bounded("close", self.backend.close()).await
    }

    /// Backend name
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Failed calls, timeouts included
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
