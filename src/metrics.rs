//! Engine observability counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Relaxed counters over the engine's hot paths. Cheap enough to update
/// unconditionally; read via [`EngineMetrics::snapshot`].
#[derive(Debug, Default)]
pub struct EngineMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    basic_calculations: AtomicU64,
    record_saves: AtomicU64,
    refreshes_scheduled: AtomicU64,
    refreshes_skipped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub basic_calculations: u64,
    pub record_saves: u64,
    pub refreshes_scheduled: u64,
    pub refreshes_skipped: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn basic_calculation(&self) {
        self.basic_calculations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_save(&self) {
        self.record_saves.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn refresh_scheduled(&self) {
        self.refreshes_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn refresh_skipped(&self) {
        self.refreshes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsReport {
        MetricsReport {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            basic_calculations: self.basic_calculations.load(Ordering::Relaxed),
            record_saves: self.record_saves.load(Ordering::Relaxed),
            refreshes_scheduled: self.refreshes_scheduled.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
        }
    }
}
