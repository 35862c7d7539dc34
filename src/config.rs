//! Pool configuration records.
//!
//! [`PoolOptions`] keeps every field optional so that "not set" stays
//! distinguishable from "set to zero"; option records can be merged with
//! later records overriding earlier ones field by field. Out-of-range or
//! inconsistent values are normalized silently at pool construction, the
//! pool never rejects a configuration.

use std::time::Duration;

/// Lower bound applied to the calibrated capacity when unset.
pub const DEFAULT_MIN_SIZE: usize = 512;

/// Upper bound applied to the calibrated capacity when unset (64 MiB).
pub const DEFAULT_MAX_SIZE: usize = 64 << 20;

/// Releases per calibration window when unset.
pub const DEFAULT_CALIBRATE_PERIOD: u64 = 1000;

/// Discard multiplier when unset: buffers whose capacity exceeds
/// `calibrated * max_percent` are dropped instead of pooled.
pub const DEFAULT_MAX_PERCENT: f64 = 2.0;

/// Initial calibrated capacity when unset.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Options for [`CalibratedPool`](crate::CalibratedPool).
///
/// # Example
/// ```
/// use bytepool::PoolOptions;
///
/// let base = PoolOptions::new().with_min_size(1024).with_max_percent(1.5);
/// let tuned = base.merge([PoolOptions::new().with_max_percent(3.0)]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolOptions {
    min_size: Option<usize>,
    max_size: Option<usize>,
    calibrate_period: Option<u64>,
    max_percent: Option<f64>,
    initial_capacity: Option<usize>,
}

impl PoolOptions {
    /// An option record with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower bound on the calibrated capacity.
    pub fn with_min_size(mut self, bytes: usize) -> Self {
        self.min_size = Some(bytes);
        self
    }

    /// Upper bound on the calibrated capacity.
    pub fn with_max_size(mut self, bytes: usize) -> Self {
        self.max_size = Some(bytes);
        self
    }

    /// Number of releases between capacity recalibrations.
    pub fn with_calibrate_period(mut self, releases: u64) -> Self {
        self.calibrate_period = Some(releases);
        self
    }

    /// Discard threshold multiplier for oversized returns.
    pub fn with_max_percent(mut self, factor: f64) -> Self {
        self.max_percent = Some(factor);
        self
    }

    /// Capacity the pool targets before the first calibration.
    pub fn with_initial_capacity(mut self, bytes: usize) -> Self {
        self.initial_capacity = Some(bytes);
        self
    }

    /// Overlay `overrides` onto this record, in order. For each field the
    /// last override that sets it wins; fields no override sets keep this
    /// record's value.
    pub fn merge<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = PoolOptions>,
    {
        for other in overrides {
            if other.min_size.is_some() {
                self.min_size = other.min_size;
            }
            if other.max_size.is_some() {
                self.max_size = other.max_size;
            }
            if other.calibrate_period.is_some() {
                self.calibrate_period = other.calibrate_period;
            }
            if other.max_percent.is_some() {
                self.max_percent = other.max_percent;
            }
            if other.initial_capacity.is_some() {
                self.initial_capacity = other.initial_capacity;
            }
        }
        self
    }

    /// Apply defaults and normalize into a concrete configuration.
    pub(crate) fn resolve(self) -> CalibratedConfig {
        let min_size = self.min_size.unwrap_or(DEFAULT_MIN_SIZE);
        let max_size = self.max_size.unwrap_or(DEFAULT_MAX_SIZE).max(min_size);
        let calibrate_period = self.calibrate_period.unwrap_or(DEFAULT_CALIBRATE_PERIOD).max(1);
        let max_percent = {
            let v = self.max_percent.unwrap_or(DEFAULT_MAX_PERCENT);
            if v.is_finite() && v >= 1.0 { v } else { DEFAULT_MAX_PERCENT }
        };
        let initial_capacity = self
            .initial_capacity
            .unwrap_or(DEFAULT_INITIAL_CAPACITY)
            .clamp(min_size, max_size);

        CalibratedConfig {
            min_size,
            max_size,
            calibrate_period,
            max_percent,
            initial_capacity,
        }
    }
}

/// Fully resolved configuration of a calibrated pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CalibratedConfig {
    pub(crate) min_size: usize,
    pub(crate) max_size: usize,
    pub(crate) calibrate_period: u64,
    pub(crate) max_percent: f64,
    pub(crate) initial_capacity: usize,
}

/// Configuration for [`AdaptivePool`](crate::AdaptivePool).
///
/// `min_idle`, `max_idle`, and `max_idle_limit` bound how many idle
/// objects a single shard retains; the hit-rate feedback loop moves the
/// retention cap between `min_idle` and `max_idle_limit`, starting from
/// `max_idle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveConfig {
    /// Floor for a shard's retention cap.
    pub min_idle: usize,
    /// Starting retention cap per shard.
    pub max_idle: usize,
    /// Ceiling for a shard's retention cap.
    pub max_idle_limit: usize,
    /// Multiplier applied to the cap when the shard runs hot.
    pub grow_factor: f64,
    /// Multiplier applied to the cap when the shard runs cold.
    pub shrink_factor: f64,
    /// Minimum spacing between resize decisions; doubles as the idle
    /// entry staleness horizon.
    pub scale_interval: Duration,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_idle: 4,
            max_idle: 16,
            max_idle_limit: 256,
            grow_factor: 1.2,
            shrink_factor: 0.8,
            scale_interval: Duration::from_secs(10),
        }
    }
}

impl AdaptiveConfig {
    /// Configuration with explicit retention bounds and default tuning.
    pub fn new(min_idle: usize, max_idle: usize, max_idle_limit: usize) -> Self {
        Self {
            min_idle,
            max_idle,
            max_idle_limit,
            ..Self::default()
        }
    }

    /// Override the resize check interval.
    pub fn with_scale_interval(mut self, interval: Duration) -> Self {
        self.scale_interval = interval;
        self
    }

    /// Override the growth multiplier.
    pub fn with_grow_factor(mut self, factor: f64) -> Self {
        self.grow_factor = factor;
        self
    }

    /// Override the shrink multiplier.
    pub fn with_shrink_factor(mut self, factor: f64) -> Self {
        self.shrink_factor = factor;
        self
    }

    /// Normalize inconsistent values instead of erroring.
    pub(crate) fn normalized(mut self) -> Self {
        self.max_idle_limit = self.max_idle_limit.max(self.min_idle);
        self.max_idle = self.max_idle.clamp(self.min_idle, self.max_idle_limit);
        if !self.grow_factor.is_finite() || self.grow_factor < 1.0 {
            self.grow_factor = 1.2;
        }
        if !self.shrink_factor.is_finite() || !(0.0..1.0).contains(&self.shrink_factor) {
            self.shrink_factor = 0.8;
        }
        if self.scale_interval.is_zero() {
            self.scale_interval = Duration::from_secs(10);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = PoolOptions::new().resolve();
        assert_eq!(cfg.min_size, DEFAULT_MIN_SIZE);
        assert_eq!(cfg.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(cfg.calibrate_period, DEFAULT_CALIBRATE_PERIOD);
        assert_eq!(cfg.max_percent, DEFAULT_MAX_PERCENT);
        assert_eq!(cfg.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn zero_is_distinct_from_absent() {
        // Setting period to zero is "set"; it normalizes to 1, not 1000.
        let cfg = PoolOptions::new().with_calibrate_period(0).resolve();
        assert_eq!(cfg.calibrate_period, 1);
    }

    #[test]
    fn merge_last_override_wins() {
        let base = PoolOptions::new().with_min_size(256).with_max_size(4096);
        let merged = base.merge([
            PoolOptions::new().with_min_size(1024),
            PoolOptions::new().with_min_size(2048),
        ]);

        let cfg = merged.resolve();
        assert_eq!(cfg.min_size, 2048);
        // Untouched by any override, keeps the receiver's value.
        assert_eq!(cfg.max_size, 4096);
    }

    #[test]
    fn merge_ignores_unset_fields() {
        let base = PoolOptions::new().with_max_percent(1.5);
        let merged = base.merge([PoolOptions::new()]);
        assert_eq!(merged, base);
    }

    #[test]
    fn inverted_bounds_normalize() {
        let cfg = PoolOptions::new()
            .with_min_size(8192)
            .with_max_size(1024)
            .resolve();
        assert_eq!(cfg.min_size, 8192);
        assert_eq!(cfg.max_size, 8192);
        assert_eq!(cfg.initial_capacity, 8192);
    }

    #[test]
    fn initial_capacity_clamps_into_bounds() {
        let cfg = PoolOptions::new()
            .with_min_size(2048)
            .with_initial_capacity(64)
            .resolve();
        assert_eq!(cfg.initial_capacity, 2048);

        let cfg = PoolOptions::new()
            .with_max_size(4096)
            .with_initial_capacity(1 << 30)
            .resolve();
        assert_eq!(cfg.initial_capacity, 4096);
    }

    #[test]
    fn sub_unity_max_percent_falls_back_to_default() {
        let cfg = PoolOptions::new().with_max_percent(0.25).resolve();
        assert_eq!(cfg.max_percent, DEFAULT_MAX_PERCENT);
    }

    #[test]
    fn adaptive_normalization_repairs_bounds() {
        let cfg = AdaptiveConfig::new(8, 100, 4).normalized();
        assert_eq!(cfg.max_idle_limit, 8);
        assert_eq!(cfg.max_idle, 8);
        assert!(cfg.min_idle <= cfg.max_idle && cfg.max_idle <= cfg.max_idle_limit);
    }

    #[test]
    fn adaptive_defaults_are_sane() {
        let cfg = AdaptiveConfig::default();
        assert_eq!(cfg.grow_factor, 1.2);
        assert_eq!(cfg.shrink_factor, 0.8);
        assert_eq!(cfg.scale_interval, Duration::from_secs(10));
    }

    #[test]
    fn adaptive_builders_override_tuning() {
        let cfg = AdaptiveConfig::new(2, 8, 64)
            .with_grow_factor(1.5)
            .with_shrink_factor(0.5)
            .with_scale_interval(Duration::from_millis(250))
            .normalized();

        assert_eq!(cfg.grow_factor, 1.5);
        assert_eq!(cfg.shrink_factor, 0.5);
        assert_eq!(cfg.scale_interval, Duration::from_millis(250));
    }

    #[test]
    fn degenerate_factors_normalize_to_defaults() {
        let cfg = AdaptiveConfig::new(2, 8, 64)
            .with_grow_factor(0.5)
            .with_shrink_factor(1.5)
            .normalized();

        assert_eq!(cfg.grow_factor, 1.2);
        assert_eq!(cfg.shrink_factor, 0.8);
    }
}
