//! Cache Metrics Collection
//!
//! Prometheus counters and gauges for the manager, kept in a private registry
//! so several managers can live in one process.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use super::manager::CacheTier;
use crate::error::Result;

const NAMESPACE: &str = "tiercache";

/// Point-in-time statistics reported by a single tier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierStats {
    /// Resident entries
    pub entries: usize,
    /// Resident payload bytes
    pub size_bytes: u64,
    /// Entry cap
    pub max_entries: usize,
    /// Advisory byte budget
    pub max_memory: u64,
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because their deadline passed
    pub expirations: u64,
}

impl TierStats {
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.misses)
    }
}

/// Cache metrics collector
pub struct CacheMetrics {
    registry: Registry,
    hits: IntCounterVec,
    misses: IntCounter,
    promotions: IntCounterVec,
    remote_errors: IntCounterVec,
    entries: IntGaugeVec,
    size_bytes: IntGaugeVec,
    evictions: IntGaugeVec,
}

impl CacheMetrics {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;

        let hits = IntCounterVec::new(
            Opts::new("hits_total", "Lookups answered, by the tier that answered"),
            &["tier"],
        )?;
        let misses = IntCounter::new("misses_total", "Lookups no tier could answer")?;
        let promotions = IntCounterVec::new(
            Opts::new("promotions_total", "Values copied into a cheaper tier on read"),
            &["tier"],
        )?;
        let remote_errors = IntCounterVec::new(
            Opts::new("remote_errors_total", "Failed remote tier calls, by operation"),
            &["operation"],
        )?;
        let entries = IntGaugeVec::new(Opts::new("entries", "Resident entries"), &["tier"])?;
        let size_bytes =
            IntGaugeVec::new(Opts::new("size_bytes", "Resident payload bytes"), &["tier"])?;
        let evictions = IntGaugeVec::new(
            Opts::new("evictions", "Capacity evictions since start"),
            &["tier"],
        )?;

        registry.register(Box::new(hits.clone()))?;
        registry.register(Box::new(misses.clone()))?;
        registry.register(Box::new(promotions.clone()))?;
        registry.register(Box::new(remote_errors.clone()))?;
        registry.register(Box::new(entries.clone()))?;
        registry.register(Box::new(size_bytes.clone()))?;
        registry.register(Box::new(evictions.clone()))?;

        Ok(Self {
            registry,
            hits,
            misses,
            promotions,
            remote_errors,
            entries,
            size_bytes,
            evictions,
        })
    }

    pub fn record_hit(&self, tier: CacheTier) {
        self.hits.with_label_values(&[tier.label()]).inc();
    }

    pub fn record_miss(&self) {
        self.misses.inc();
    }

    /// A value was copied into `tier` after a lower tier answered
    pub fn record_promotion(&self, tier: CacheTier) {
        self.promotions.with_label_values(&[tier.label()]).inc();
    }

    pub fn record_remote_error(&self, operation: &str) {
        self.remote_errors.with_label_values(&[operation]).inc();
    }

    pub fn update_tier_stats(&self, tier: CacheTier, stats: &TierStats) {
        let label = [tier.label()];
        self.entries
            .with_label_values(&label)
            .set(stats.entries as i64);
        self.size_bytes
            .with_label_values(&label)
            .set(stats.size_bytes as i64);
        self.evictions
            .with_label_values(&label)
            .set(stats.evictions as i64);
    }

    pub fn hits(&self, tier: CacheTier) -> u64 {
        self.hits.with_label_values(&[tier.label()]).get()
    }

    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    pub fn promotions(&self, tier: CacheTier) -> u64 {
        self.promotions.with_label_values(&[tier.label()]).get()
    }

    pub fn remote_errors(&self, operation: &str) -> u64 {
        self.remote_errors.with_label_values(&[operation]).get()
    }

    /// Overall hit ratio across tiers
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits(CacheTier::Local)
            + self.hits(CacheTier::Memory)
            + self.hits(CacheTier::Remote);
        ratio(hits, self.misses())
    }

    /// Copy the current values into a plain struct
    pub fn snapshot(&self) -> MetricsSnapshot {
        let gauge = |vec: &IntGaugeVec, tier: CacheTier| {
            vec.with_label_values(&[tier.label()]).get().max(0) as u64
        };

        MetricsSnapshot {
            local_hits: self.hits(CacheTier::Local),
            memory_hits: self.hits(CacheTier::Memory),
            remote_hits: self.hits(CacheTier::Remote),
            misses: self.misses(),
            local_promotions: self.promotions(CacheTier::Local),
            memory_promotions: self.promotions(CacheTier::Memory),
            remote_get_errors: self.remote_errors("get"),
            remote_write_errors: self.remote_errors("set")
                + self.remote_errors("delete")
                + self.remote_errors("clear"),
            local_entries: gauge(&self.entries, CacheTier::Local),
            memory_entries: gauge(&self.entries, CacheTier::Memory),
            local_size_bytes: gauge(&self.size_bytes, CacheTier::Local),
            memory_size_bytes: gauge(&self.size_bytes, CacheTier::Memory),
            local_evictions: gauge(&self.evictions, CacheTier::Local),
            memory_evictions: gauge(&self.evictions, CacheTier::Memory),
            hit_ratio: self.hit_ratio(),
        }
    }

    /// Prometheus text exposition of every metric
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()).into())
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub local_hits: u64,
    pub memory_hits: u64,
    pub remote_hits: u64,
    pub misses: u64,
    pub local_promotions: u64,
    pub memory_promotions: u64,
    pub remote_get_errors: u64,
    pub remote_write_errors: u64,
    pub local_entries: u64,
    pub memory_entries: u64,
    pub local_size_bytes: u64,
    pub memory_size_bytes: u64,
    pub local_evictions: u64,
    pub memory_evictions: u64,
    pub hit_ratio: f64,
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

// =============================================================================
// Tests
// =============================================================================
