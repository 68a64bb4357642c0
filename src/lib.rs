//! tiercache - Three-Tier Cache Manager
//!
//! A key/value cache that fronts an optional distributed store (Redis) with two
//! in-process tiers. Reads are served by the cheapest tier holding the key and
//! populate the tiers above it; writes go through every tier.
//!
//! # Architecture
//!
//! ```text
//! get:  Local ──miss──▶ Memory ──miss──▶ Remote ──miss──▶ NotFound
//!         ▲               │  ▲              │
//!         └──promote──────┘  └──promote─────┘
//!
//! set / delete / clear:  Local ──▶ Memory ──▶ Remote
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Tiers and the manager that coordinates them
//! - [`config`] - Cache configuration and duration parsing
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tiercache::{CacheConfig, CacheManager};
//!
//! # async fn run() -> tiercache::Result<()> {
//! let manager = CacheManager::new(CacheConfig::from_redis_url("redis://localhost:6379/0")?).await?;
//! manager.set("user:42", "alice", Duration::from_secs(300)).await?;
//! let value = manager.get("user:42").await?;
//! assert_eq!(value.as_ref(), b"alice");
//! manager.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use cache::{
    CacheEntry, CacheManager, CacheMetrics, CacheTier, InMemoryRemoteBackend, LocalCache,
    MemoryCache, MetricsSnapshot, RedisBackend, RemoteBackend, RemoteCache,
};
pub use config::{CacheConfig, CacheDriver};
pub use error::{Error, Result};
