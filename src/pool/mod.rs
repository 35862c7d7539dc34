//! The two pool engines and their shared per-thread storage.
//!
//! - [`CalibratedPool`]: lock-free, capacity governed by an asymmetric
//!   moving average of observed usage. The primary engine.
//! - [`AdaptivePool`]: per-core shards, retained-idle count governed by
//!   a hit-rate feedback loop with age-based eviction.
//!
//! Both engines expose the same acquire/release contract and RAII
//! checkout guards.

mod adaptive;
mod calibrated;
mod local;

pub use adaptive::{AdaptivePool, PooledValue, ShardSnapshot};
pub use calibrated::{bytes_buffer_pool, vec_buffer_pool, CalibratedPool, PooledBuffer};
pub use local::{SlotCache, ThreadCache};
