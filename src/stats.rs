//! Statistics tracking for the pool engines.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Activity counters shared by both pool engines.
///
/// All counters are relaxed atomics; readers get a consistent-enough
/// picture for monitoring, not a linearizable snapshot.
#[derive(Debug, Default)]
pub struct PoolStats {
    pub(crate) acquires: AtomicU64,
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) returns: AtomicU64,
    /// Returns dropped instead of pooled (oversized or retention full).
    pub(crate) discarded: AtomicU64,
    /// Idle entries dropped for exceeding the staleness horizon.
    pub(crate) expired: AtomicU64,
    /// Capacity recalibrations executed.
    pub(crate) calibrations: AtomicU64,
    /// Shard retention cap increases.
    pub(crate) scale_ups: AtomicU64,
    /// Shard retention cap decreases.
    pub(crate) scale_downs: AtomicU64,
}

impl PoolStats {
    #[inline]
    pub(crate) fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_calibration(&self) {
        self.calibrations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_scale_up(&self) {
        self.scale_ups.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_scale_down(&self) {
        self.scale_downs.fetch_add(1, Ordering::Relaxed);
    }

    /// Fraction of acquires served from pooled storage, `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = self.acquires.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy the counters into a plain snapshot.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acquires: self.acquires.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            calibrations: self.calibrations.load(Ordering::Relaxed),
            scale_ups: self.scale_ups.load(Ordering::Relaxed),
            scale_downs: self.scale_downs.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStatsSnapshot {
    /// Total acquire calls.
    pub acquires: u64,
    /// Acquires served from pooled storage.
    pub hits: u64,
    /// Acquires that built a fresh object.
    pub misses: u64,
    /// Releases that parked their object for reuse.
    pub returns: u64,
    /// Releases dropped instead of pooled.
    pub discarded: u64,
    /// Idle entries dropped as stale.
    pub expired: u64,
    /// Capacity recalibrations executed.
    pub calibrations: u64,
    /// Shard retention cap increases.
    pub scale_ups: u64,
    /// Shard retention cap decreases.
    pub scale_downs: u64,
    /// Hits over acquires at snapshot time.
    pub hit_rate: f64,
}

impl fmt::Display for PoolStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pool statistics:")?;
        writeln!(
            f,
            "  acquires: {} (hit rate: {:.2}%)",
            self.acquires,
            self.hit_rate * 100.0
        )?;
        writeln!(f, "  hits: {} / misses: {}", self.hits, self.misses)?;
        writeln!(f, "  returns: {}", self.returns)?;
        writeln!(
            f,
            "  discarded: {} / expired: {}",
            self.discarded, self.expired
        )?;
        writeln!(f, "  calibrations: {}", self.calibrations)?;
        write!(
            f,
            "  scale ups: {} / scale downs: {}",
            self.scale_ups, self.scale_downs
        )
    }
}
