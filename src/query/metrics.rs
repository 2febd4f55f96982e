//! Cache observability counters.
//!
//! One instance is shared by every cache owned by a [`super::QueryClient`].

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Reads answered from a fresh cache entry
    hits: AtomicUsize,

    /// Reads that started a network fetch
    misses: AtomicUsize,

    /// Reads that joined a fetch already in flight
    joined: AtomicUsize,

    /// Fetches that resolved with an error
    failures: AtomicUsize,

    /// Responses dropped because the entry was invalidated meanwhile
    discarded: AtomicUsize,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_joined(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let joined = self.joined.load(Ordering::Relaxed);
        let reads = hits + misses + joined;
        let hit_rate = if reads > 0 {
            ((hits + joined) as f64 / reads as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            hits,
            misses,
            joined,
            failures: self.failures.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub hits: usize,
    pub misses: usize,
    pub joined: usize,
    pub failures: usize,
    pub discarded: usize,

    /// Share of reads served without a new network call (0-100)
    pub hit_rate: f64,
}

impl MetricsReport {
    pub fn format_summary(&self) -> String {
        format!(
            "Cache: {} hits, {} misses, {} joined in-flight ({:.1}% served without a new request), {} failed, {} stale responses dropped",
            self.hits, self.misses, self.joined, self.hit_rate, self.failures, self.discarded
        )
    }
}
