//! The EMA-calibrated buffer pool.
//!
//! Acquire pops a recycled buffer from the per-thread cache or builds a
//! fresh one at the current calibrated capacity. Release measures the
//! buffer, feeds the observation into the calibration window, drops
//! oversized outliers, and parks everything else. The hot path is a few
//! atomic loads, one atomic add, and at most one CAS per release; there
//! is no lock anywhere in this engine.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use core::ops::{Deref, DerefMut};

use crossbeam_utils::CachePadded;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::calibrate::next_capacity;
use crate::config::{CalibratedConfig, PoolOptions};
use crate::lifecycle::{BufferLifecycle, BytesLifecycle, VecLifecycle};
use crate::pool::local::{SlotCache, ThreadCache};
#[cfg(feature = "stats")]
use crate::stats::PoolStats;

/// Only 1 in 16 sub-peak usage observations is recorded, keyed off the
/// low bits of the release counter. Overshoots are always recorded.
const SAMPLE_MASK: u64 = 0xF;

/// A lock-free pool whose hand-out capacity follows observed usage.
///
/// The pool tracks the peak `used` seen across a window of
/// `calibrate_period` releases, then folds that peak into its target
/// capacity with an asymmetric moving average: fast growth on rising
/// traffic, slow decay on falling traffic, and no drift at all while
/// idle. Returned buffers whose capacity exceeds the target by more than
/// `max_percent` are dropped rather than pooled so a single huge request
/// cannot pin memory forever.
///
/// # Example
/// ```
/// use bytepool::{vec_buffer_pool, PoolOptions};
///
/// let pool = vec_buffer_pool(PoolOptions::new());
/// let mut buf = pool.acquire();
/// buf.extend_from_slice(b"payload");
/// pool.release(buf);
/// ```
pub struct CalibratedPool<L: BufferLifecycle, C = SlotCache<<L as BufferLifecycle>::Buffer>> {
    lifecycle: L,
    cache: C,
    config: CalibratedConfig,
    // The three hot atomics live on separate cache lines; `calls` and
    // `max_usage` are written on every release while `calibrated` is
    // read-mostly.
    calibrated: CachePadded<AtomicUsize>,
    calls: CachePadded<AtomicU64>,
    max_usage: CachePadded<AtomicUsize>,
    #[cfg(feature = "stats")]
    stats: PoolStats,
}

impl<L: BufferLifecycle> CalibratedPool<L> {
    /// Pool with the default per-thread slot cache.
    pub fn new(lifecycle: L, options: PoolOptions) -> Self {
        Self::with_cache(lifecycle, options, SlotCache::new())
    }
}

impl<L, C> CalibratedPool<L, C>
where
    L: BufferLifecycle,
    C: ThreadCache<L::Buffer>,
{
    /// Pool backed by a caller-supplied idle cache.
    pub fn with_cache(lifecycle: L, options: PoolOptions, cache: C) -> Self {
        let config = options.resolve();
        Self {
            lifecycle,
            cache,
            calibrated: CachePadded::new(AtomicUsize::new(config.initial_capacity)),
            calls: CachePadded::new(AtomicU64::new(0)),
            max_usage: CachePadded::new(AtomicUsize::new(0)),
            config,
            #[cfg(feature = "stats")]
            stats: PoolStats::default(),
        }
    }

    /// Take a buffer from the pool, building one at the current target
    /// capacity on a cache miss. Never blocks, never fails.
    pub fn acquire(&self) -> L::Buffer {
        #[cfg(feature = "stats")]
        self.stats.record_acquire();

        if let Some(buffer) = self.cache.fetch() {
            #[cfg(feature = "stats")]
            self.stats.record_hit();
            return buffer;
        }

        #[cfg(feature = "stats")]
        self.stats.record_miss();

        self.lifecycle.make(self.calibrated.load(Ordering::Acquire))
    }

    /// Return a buffer to the pool.
    ///
    /// The buffer's usage feeds the calibration window. Buffers whose
    /// capacity exceeds `target * max_percent` are dropped; everything
    /// else is reset and parked for the next acquire on this thread.
    pub fn release(&self, mut buffer: L::Buffer) {
        let stat = self.lifecycle.stat(&buffer);
        if stat.is_empty() {
            // Nothing to pool and nothing worth measuring.
            return;
        }

        let current = self.calibrated.load(Ordering::Acquire);

        // Overshoots always count; sub-peak observations above the floor
        // are sampled so the peak CAS does not become the bottleneck.
        if stat.used > current {
            self.record_peak(stat.used);
        } else if stat.used > self.config.min_size
            && self.calls.load(Ordering::Relaxed) & SAMPLE_MASK == 0
        {
            self.record_peak(stat.used);
        }

        let ticked = self.calls.fetch_add(1, Ordering::AcqRel) + 1;
        if ticked >= self.config.calibrate_period {
            // Whoever swings the counter back to zero owns this window's
            // calibration; everyone else moves on.
            if self
                .calls
                .compare_exchange(ticked, 0, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                self.calibrate();
            }
        }

        if stat.capacity as f64 > current as f64 * self.config.max_percent {
            #[cfg(feature = "stats")]
            self.stats.record_discard();
            #[cfg(feature = "tracing")]
            trace!(
                capacity = stat.capacity,
                target = current,
                "dropping oversized buffer"
            );
            return;
        }

        self.lifecycle.reset(&mut buffer);
        self.cache.stash(buffer);

        #[cfg(feature = "stats")]
        self.stats.record_return();
    }

    /// Acquire wrapped in an RAII guard that releases on drop.
    pub fn checkout(&self) -> PooledBuffer<'_, L, C> {
        PooledBuffer {
            pool: self,
            buffer: Some(self.acquire()),
        }
    }

    /// The capacity the pool currently hands to fresh buffers.
    pub fn target_capacity(&self) -> usize {
        self.calibrated.load(Ordering::Acquire)
    }

    /// Activity counters for this pool.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    fn record_peak(&self, used: usize) {
        let mut peak = self.max_usage.load(Ordering::Relaxed);
        while used > peak {
            match self.max_usage.compare_exchange_weak(
                peak,
                used,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    fn calibrate(&self) {
        let peak = self.max_usage.swap(0, Ordering::AcqRel);
        let current = self.calibrated.load(Ordering::Relaxed);
        let next = next_capacity(current, peak, self.config.min_size, self.config.max_size);
        self.calibrated.store(next, Ordering::Release);

        #[cfg(feature = "stats")]
        self.stats.record_calibration();
        #[cfg(feature = "tracing")]
        trace!(from = current, to = next, peak, "recalibrated target capacity");
    }
}

/// Build a calibrated pool of `Vec<u8>` buffers.
pub fn vec_buffer_pool(options: PoolOptions) -> CalibratedPool<VecLifecycle> {
    CalibratedPool::new(VecLifecycle, options)
}

/// Build a calibrated pool of [`bytes::BytesMut`] buffers.
pub fn bytes_buffer_pool(options: PoolOptions) -> CalibratedPool<BytesLifecycle> {
    CalibratedPool::new(BytesLifecycle, options)
}

/// RAII handle to a buffer from a [`CalibratedPool`].
///
/// Dereferences to the buffer and releases it back to the pool on drop.
/// [`detach`](PooledBuffer::detach) keeps the buffer and skips the
/// return.
pub struct PooledBuffer<'a, L, C = SlotCache<<L as BufferLifecycle>::Buffer>>
where
    L: BufferLifecycle,
    C: ThreadCache<L::Buffer>,
{
    pool: &'a CalibratedPool<L, C>,
    buffer: Option<L::Buffer>,
}

impl<L, C> PooledBuffer<'_, L, C>
where
    L: BufferLifecycle,
    C: ThreadCache<L::Buffer>,
{
    /// Take the buffer out of the guard; it will not return to the pool.
    pub fn detach(mut self) -> L::Buffer {
        self.buffer.take().expect("buffer already detached")
    }
}

impl<L, C> Deref for PooledBuffer<'_, L, C>
where
    L: BufferLifecycle,
    C: ThreadCache<L::Buffer>,
{
    type Target = L::Buffer;

    fn deref(&self) -> &L::Buffer {
        self.buffer.as_ref().expect("buffer already detached")
    }
}

impl<L, C> DerefMut for PooledBuffer<'_, L, C>
where
    L: BufferLifecycle,
    C: ThreadCache<L::Buffer>,
{
    fn deref_mut(&mut self) -> &mut L::Buffer {
        self.buffer.as_mut().expect("buffer already detached")
    }
}

impl<L, C> Drop for PooledBuffer<'_, L, C>
where
    L: BufferLifecycle,
    C: ThreadCache<L::Buffer>,
{
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}
