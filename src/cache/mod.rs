//! Three-Tier Cache
//!
//! Local, memory and remote tiers behind a single [`CacheManager`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          Cache Manager                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  Local Tier          │ Memory Tier           │ Remote Tier (optional) │
//! │  ┌────────────────┐  │ ┌──────────────────┐  │ ┌──────────────────┐   │
//! │  │ RwLock<Map>    │  │ │ RwLock<Map>      │  │ │ RemoteBackend    │   │
//! │  │ max/10 entries │  │ │ TTL + eviction   │  │ │ Redis / in-proc  │   │
//! │  └────────────────┘  │ └──────────────────┘  │ └──────────────────┘   │
//! │          ▲           │          ▲            │          │             │
//! │          └───────────┴──────────┴────────────┴──────────┘             │
//! │                     read-through promotion                           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Semantics
//!
//! - Reads: local, then memory, then remote; a hit is copied into every
//!   cheaper tier. Remote read failures are misses.
//! - Writes, deletes, clears: local, then memory, then remote. A remote
//!   failure is returned after the in-process tiers were already updated.
//! - Memory tier eviction removes the entry closest to expiry; local tier
//!   eviction removes an arbitrary entry.

mod entry;
mod local;
mod manager;
mod memory;
mod metrics;
mod redis;
mod remote;
mod tier;

#[cfg(test)]
mod proptest;

pub use entry::CacheEntry;
pub use local::{LocalCache, LocalConfig};
pub use manager::{CacheManager, CacheTier};
pub use memory::{MemoryCache, MemoryConfig};
pub use metrics::{CacheMetrics, MetricsSnapshot, TierStats};
pub use self::redis::RedisBackend;
pub use remote::{InMemoryRemoteBackend, RemoteBackend, RemoteBackendStats, RemoteCache};
