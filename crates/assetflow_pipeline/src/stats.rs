//! Per-lane counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters shared by a lane's stages.
#[derive(Debug, Default)]
pub struct LaneStats {
    pub(crate) requested: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
    pub(crate) cache_stores: AtomicU64,
    pub(crate) cache_failures: AtomicU64,
    pub(crate) downloads_started: AtomicU64,
    pub(crate) downloads_completed: AtomicU64,
    pub(crate) downloads_failed: AtomicU64,
    pub(crate) invalid_ids: AtomicU64,
    pub(crate) decoded: AtomicU64,
    pub(crate) decode_failures: AtomicU64,
}

/// Point-in-time copy of [`LaneStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneStatsSnapshot {
    /// Requests accepted by the lane.
    pub requested: u64,
    /// Requests served from the cache.
    pub cache_hits: u64,
    /// Requests with no cache entry.
    pub cache_misses: u64,
    /// Entries written to the cache.
    pub cache_stores: u64,
    /// Cache loads or stores that failed.
    pub cache_failures: u64,
    /// Fetches issued.
    pub downloads_started: u64,
    /// Fetches that delivered bytes.
    pub downloads_completed: u64,
    /// Fetches that failed and were dropped.
    pub downloads_failed: u64,
    /// Requests dropped for a nil id.
    pub invalid_ids: u64,
    /// Successful decodes.
    pub decoded: u64,
    /// Failed decodes.
    pub decode_failures: u64,
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl LaneStats {
    /// Copies every counter.
    #[must_use]
    pub fn snapshot(&self) -> LaneStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        LaneStatsSnapshot {
            requested: load(&self.requested),
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            cache_stores: load(&self.cache_stores),
            cache_failures: load(&self.cache_failures),
            downloads_started: load(&self.downloads_started),
            downloads_completed: load(&self.downloads_completed),
            downloads_failed: load(&self.downloads_failed),
            invalid_ids: load(&self.invalid_ids),
            decoded: load(&self.decoded),
            decode_failures: load(&self.decode_failures),
        }
    }
}
