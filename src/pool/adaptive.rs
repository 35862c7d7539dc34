//! The adaptive sharded object pool.
//!
//! One shard per hardware thread, each guarded by a spin lock and
//! holding a LIFO stack of idle objects stamped with their release
//! time. A shard's retention cap floats between `min_idle` and
//! `max_idle_limit`, driven by its own hit rate: a shard that serves
//! most acquires from idle storage is retaining too little and grows;
//! a shard whose idles go unclaimed shrinks and frees the excess. Idle
//! objects older than the scale interval are considered stale and are
//! dropped during acquire lookups.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::CachePadded;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::config::AdaptiveConfig;
use crate::pool::local::{available_cpus, thread_slot_index};
#[cfg(feature = "stats")]
use crate::stats::PoolStats;
use crate::sync::SpinMutex;

/// Hit rate above which a shard's retention cap grows.
const GROW_THRESHOLD: f64 = 0.8;

/// Hit rate below which a shard's retention cap shrinks.
const SHRINK_THRESHOLD: f64 = 0.2;

/// An idle object and the moment it was returned.
struct IdleEntry<T> {
    value: T,
    released_at: Instant,
}

struct Shard<T> {
    /// LIFO stack; newest entries sit at the end.
    idle: Vec<IdleEntry<T>>,
    /// Objects currently out on loan from this shard.
    active: i64,
    hits: u64,
    gets: u64,
    /// Retention cap this shard currently allows itself.
    current_max: usize,
    last_scale: Instant,
}

/// A per-core sharded pool whose retained-idle count follows demand.
///
/// Objects are created by a caller-supplied factory and recycled by a
/// caller-supplied reset closure before reuse. Unlike the calibrated
/// engine, the factory takes no size hint; capacity is whatever the
/// factory chooses.
///
/// # Example
/// ```
/// use bytepool::{AdaptiveConfig, AdaptivePool};
///
/// let pool = AdaptivePool::new(
///     AdaptiveConfig::new(4, 16, 128),
///     || Vec::<u8>::with_capacity(4096),
///     |buf| buf.clear(),
/// );
///
/// let mut buf = pool.acquire();
/// buf.extend_from_slice(b"frame");
/// pool.release(buf);
/// ```
pub struct AdaptivePool<T: Send + 'static> {
    shards: Box<[CachePadded<SpinMutex<Shard<T>>>]>,
    config: AdaptiveConfig,
    make: Arc<dyn Fn() -> T + Send + Sync>,
    recycle: Arc<dyn Fn(&mut T) + Send + Sync>,
    #[cfg(feature = "stats")]
    stats: PoolStats,
}

impl<T: Send + 'static> AdaptivePool<T> {
    /// Pool with one shard per hardware thread.
    pub fn new<F, R>(config: AdaptiveConfig, make: F, recycle: R) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        let config = config.normalized();
        let now = Instant::now();

        let shards = (0..available_cpus())
            .map(|_| {
                CachePadded::new(SpinMutex::new(Shard {
                    idle: Vec::with_capacity(config.max_idle),
                    active: 0,
                    hits: 0,
                    gets: 0,
                    current_max: config.max_idle,
                    last_scale: now,
                }))
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            config,
            make: Arc::new(make),
            recycle: Arc::new(recycle),
            #[cfg(feature = "stats")]
            stats: PoolStats::default(),
        }
    }

    /// Take an object from the calling thread's shard, or build one.
    ///
    /// Stale idle entries encountered during the lookup are discarded.
    pub fn acquire(&self) -> T {
        #[cfg(feature = "stats")]
        self.stats.record_acquire();

        let shard = &self.shards[thread_slot_index(self.shards.len())];
        let now = Instant::now();
        let mut expired = 0u64;

        let mut guard = shard.lock();
        guard.gets += 1;

        while let Some(entry) = guard.idle.pop() {
            if now.duration_since(entry.released_at) < self.config.scale_interval {
                guard.hits += 1;
                guard.active += 1;
                drop(guard);

                #[cfg(feature = "stats")]
                {
                    self.stats.record_hit();
                    if expired > 0 {
                        self.stats.record_expired(expired);
                    }
                }
                let _ = expired;

                let mut value = entry.value;
                (self.recycle)(&mut value);
                return value;
            }
            // Too old to trust as warm; let it go back to the allocator.
            expired += 1;
            drop(entry);
        }

        guard.active += 1;
        drop(guard);

        #[cfg(feature = "stats")]
        {
            self.stats.record_miss();
            if expired > 0 {
                self.stats.record_expired(expired);
            }
        }
        let _ = expired;

        (self.make)()
    }

    /// Return an object to the calling thread's shard.
    ///
    /// The shard may first resize its retention cap (at most once per
    /// scale interval); the object is then kept if the shard has room
    /// and dropped otherwise.
    pub fn release(&self, value: T) {
        let shard = &self.shards[thread_slot_index(self.shards.len())];
        let now = Instant::now();

        let mut guard = shard.lock();
        guard.active -= 1;
        self.resize_shard(&mut guard, now);

        if guard.idle.len() < guard.current_max {
            guard.idle.push(IdleEntry {
                value,
                released_at: now,
            });
            drop(guard);
            #[cfg(feature = "stats")]
            self.stats.record_return();
        } else {
            drop(guard);
            drop(value);
            #[cfg(feature = "stats")]
            self.stats.record_discard();
        }
    }

    /// Acquire wrapped in an RAII guard that releases on drop.
    pub fn checkout(&self) -> PooledValue<'_, T> {
        PooledValue {
            pool: self,
            value: Some(self.acquire()),
        }
    }

    /// Number of shards (hardware parallelism at construction).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Point-in-time view of every shard, for monitoring and tests.
    pub fn shard_snapshots(&self) -> Vec<ShardSnapshot> {
        self.shards
            .iter()
            .map(|shard| {
                let guard = shard.lock();
                ShardSnapshot {
                    idle: guard.idle.len(),
                    active: guard.active,
                    retain_cap: guard.current_max,
                }
            })
            .collect()
    }

    /// Activity counters for this pool.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    fn resize_shard(&self, shard: &mut Shard<T>, now: Instant) {
        if now.duration_since(shard.last_scale) < self.config.scale_interval {
            return;
        }
        shard.last_scale = now;

        let hit_rate = if shard.gets > 0 {
            shard.hits as f64 / shard.gets as f64
        } else {
            0.0
        };
        shard.hits = 0;
        shard.gets = 0;

        // Hot shard: idles are consumed as fast as they arrive, so the
        // cap is the limiting factor.
        if hit_rate > GROW_THRESHOLD && shard.current_max < self.config.max_idle_limit {
            let grown = (shard.current_max as f64 * self.config.grow_factor) as usize;
            shard.current_max = grown.min(self.config.max_idle_limit);

            #[cfg(feature = "stats")]
            self.stats.record_scale_up();
            #[cfg(feature = "tracing")]
            debug!(cap = shard.current_max, hit_rate, "shard retention grew");
            return;
        }

        // Cold shard: retained idles go unclaimed, give memory back.
        if hit_rate < SHRINK_THRESHOLD && shard.current_max > self.config.min_idle {
            let shrunk = (shard.current_max as f64 * self.config.shrink_factor) as usize;
            shard.current_max = shrunk.max(self.config.min_idle);

            if shard.idle.len() > shard.current_max {
                shard.idle.truncate(shard.current_max);
            }

            #[cfg(feature = "stats")]
            self.stats.record_scale_down();
            #[cfg(feature = "tracing")]
            debug!(cap = shard.current_max, hit_rate, "shard retention shrank");
        }
    }
}

/// Point-in-time state of one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSnapshot {
    /// Idle objects currently retained.
    pub idle: usize,
    /// Objects out on loan (negative if callers release foreign objects).
    pub active: i64,
    /// Current retention cap.
    pub retain_cap: usize,
}

/// RAII handle to an object from an [`AdaptivePool`].
pub struct PooledValue<'a, T: Send + 'static> {
    pool: &'a AdaptivePool<T>,
    value: Option<T>,
}

impl<T: Send + 'static> PooledValue<'_, T> {
    /// Take the object out of the guard; it will not return to the pool.
    pub fn detach(mut self) -> T {
        self.value.take().expect("value already detached")
    }
}

impl<T: Send + 'static> std::ops::Deref for PooledValue<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("value already detached")
    }
}

impl<T: Send + 'static> std::ops::DerefMut for PooledValue<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("value already detached")
    }
}

impl<T: Send + 'static> Drop for PooledValue<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}
