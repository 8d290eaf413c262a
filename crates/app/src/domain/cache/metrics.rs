//! Cache metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for cache behaviour, shared by the layer and reported by the CLI.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,

    /// Entries that were present but expired or older than the last committed write.
    pub stale: AtomicU64,

    /// Store loads performed to fill the cache.
    pub loads: AtomicU64,
    pub read_fallbacks: AtomicU64,
    pub write_fallbacks: AtomicU64,
    pub invalidate_fallbacks: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub loads: u64,
    pub read_fallbacks: u64,
    pub write_fallbacks: u64,
    pub invalidate_fallbacks: u64,
}

impl CacheMetrics {
    pub(crate) fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            read_fallbacks: self.read_fallbacks.load(Ordering::Relaxed),
            write_fallbacks: self.write_fallbacks.load(Ordering::Relaxed),
            invalidate_fallbacks: self.invalidate_fallbacks.load(Ordering::Relaxed),
        }
    }
}
