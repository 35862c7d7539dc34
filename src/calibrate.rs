//! Capacity calibration: an asymmetric exponential moving average.
//!
//! The calibrated pool periodically feeds the peak usage observed over a
//! window of releases into [`next_capacity`] and adopts the result as
//! its new target. Rising traffic is weighted heavily and topped up with
//! a small premium so the pool stops lagging real demand after a couple
//! of windows; falling traffic is weighted lightly so short dips do not
//! throw away warm capacity.

/// Weight given to the previous target when demand is rising.
const ALPHA_RISING: f64 = 0.4;

/// Weight given to the previous target when demand is flat or falling.
const ALPHA_FALLING: f64 = 0.9;

/// Multiplier applied after a rising step so the average can overtake
/// demand instead of approaching it asymptotically.
const RISE_PREMIUM: f64 = 1.05;

/// Compute the next target capacity from the current target and the peak
/// usage observed in the last calibration window.
///
/// A `peak` of zero means the window was idle; the target is left alone
/// so an idle pool never drifts toward zero. Otherwise the peak is
/// clamped into `[min, max]`, blended with the current target using the
/// rising or falling weight, and the result clamped again.
pub(crate) fn next_capacity(current: usize, peak: usize, min: usize, max: usize) -> usize {
    if peak == 0 {
        return current;
    }

    let peak = peak.clamp(min, max);

    let next = if peak > current {
        (current as f64 * ALPHA_RISING + peak as f64 * (1.0 - ALPHA_RISING)) * RISE_PREMIUM
    } else {
        current as f64 * ALPHA_FALLING + peak as f64 * (1.0 - ALPHA_FALLING)
    };

    (next as usize).clamp(min, max)
}
