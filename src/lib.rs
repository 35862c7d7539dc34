//! # bytepool
//!
//! Self-tuning object pools for byte-oriented scratch buffers.
//!
//! Client code acquires a buffer, writes into it, and returns it; the
//! pool recycles the underlying memory so steady-state workloads stop
//! paying for large allocations. The pools continually learn the right
//! capacity to hand out by watching real usage: they expand quickly when
//! traffic rises, contract slowly when it falls, and bound worst-case
//! retained memory throughout.
//!
//! Two engines share one contract:
//!
//! - [`CalibratedPool`], the primary engine: lock-free, with a target
//!   capacity driven by an asymmetric exponential moving average of the
//!   peak usage seen each calibration window, plus smart discard of
//!   oversized returns.
//! - [`AdaptivePool`], the secondary engine: one spin-locked shard per
//!   hardware thread, with a per-shard retention cap driven by hit-rate
//!   feedback and age-based eviction of stale idles.
//!
//! ## Quick start
//!
//! ```
//! use bytepool::{vec_buffer_pool, PoolOptions};
//!
//! let pool = vec_buffer_pool(PoolOptions::new().with_max_percent(1.5));
//!
//! let mut buf = pool.acquire();
//! buf.extend_from_slice(b"response body");
//! pool.release(buf);
//!
//! // Or let a guard handle the return:
//! let mut buf = pool.checkout();
//! buf.extend_from_slice(b"another one");
//! drop(buf);
//! ```
//!
//! ## Features
//!
//! - `stats` (default): atomic activity counters on every pool,
//!   exposed through [`PoolStats`] snapshots.
//! - `tracing`: trace-level instrumentation of calibration, discard,
//!   and shard-resize decisions.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod calibrate;
pub mod config;
pub mod lifecycle;
mod pool;
#[cfg(feature = "stats")]
pub mod stats;
mod sync;

pub use config::{AdaptiveConfig, PoolOptions};
pub use lifecycle::{BufferLifecycle, BufferStat, BytesLifecycle, CustomLifecycle, VecLifecycle};
pub use pool::{
    bytes_buffer_pool, vec_buffer_pool, AdaptivePool, CalibratedPool, PooledBuffer, PooledValue,
    ShardSnapshot, SlotCache, ThreadCache,
};
#[cfg(feature = "stats")]
pub use stats::{PoolStats, PoolStatsSnapshot};

/// Convenient re-exports of the types most callers need.
pub mod prelude {
    pub use crate::config::{AdaptiveConfig, PoolOptions};
    pub use crate::lifecycle::{BufferLifecycle, BufferStat, BytesLifecycle, VecLifecycle};
    pub use crate::pool::{
        bytes_buffer_pool, vec_buffer_pool, AdaptivePool, CalibratedPool, PooledBuffer,
        PooledValue, ThreadCache,
    };
    #[cfg(feature = "stats")]
    pub use crate::stats::{PoolStats, PoolStatsSnapshot};
}
