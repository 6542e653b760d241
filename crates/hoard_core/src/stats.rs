//! Engine statistics.
//!
//! Counters are atomic so they can be read through a shared reference
//! while the engine is in use, e.g. from a [`crate::SharedEngine`] holder
//! that only wants diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine statistics and counters.
///
/// Values are monotonically increasing.
#[derive(Debug, Default)]
pub struct EngineStats {
    creates: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    selects: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    records_flushed: AtomicU64,
    flushes: AtomicU64,
    population_skips: AtomicU64,
}

impl EngineStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_select(&self) {
        self.selects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self, records: u64) {
        self.records_flushed.fetch_add(records, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_population_skip(&self) {
        self.population_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            selects: self.selects.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            population_skips: self.population_skips.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    /// Records created.
    pub creates: u64,
    /// Records updated.
    pub updates: u64,
    /// Records deleted.
    pub deletes: u64,
    /// Queries evaluated.
    pub selects: u64,
    /// Cache lookups answered from memory.
    pub cache_hits: u64,
    /// Cache lookups that went to the record store.
    pub cache_misses: u64,
    /// Records written by flushes.
    pub records_flushed: u64,
    /// Completed engine flushes.
    pub flushes: u64,
    /// Records skipped while backfilling an index or grouping.
    pub population_skips: u64,
}

impl StatsSnapshot {
    /// Fraction of cache lookups answered from memory.
    #[must_use]
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
