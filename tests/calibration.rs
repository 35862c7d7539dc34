//! End-to-end behavior of the calibrated pool under realistic traffic.

use bytepool::{vec_buffer_pool, CalibratedPool, PoolOptions, VecLifecycle};
use rand::Rng;

fn scenario_options() -> PoolOptions {
    PoolOptions::new()
        .with_min_size(512)
        .with_max_size(65536)
        .with_calibrate_period(100)
        .with_max_percent(1.5)
        .with_initial_capacity(1024)
}

/// Acquire, simulate `used` bytes of real traffic, release.
fn cycle(pool: &CalibratedPool<VecLifecycle>, used: usize) {
    let mut buf = pool.acquire();
    if buf.capacity() < used {
        buf.reserve(used - buf.capacity());
    }
    buf.resize(used, 0);
    pool.release(buf);
}

#[test]
fn ramp_grows_toward_demand_without_overshooting() {
    let pool = vec_buffer_pool(scenario_options());

    for _ in 0..200 {
        cycle(&pool, 4096);
    }

    let target = pool.target_capacity();
    assert!(target > 1024, "two calibrations must lift the target, got {target}");
    assert!(
        target as f64 <= 4096.0 * 1.05,
        "target {target} exceeds demand plus premium"
    );
}

#[test]
fn single_spike_does_not_dominate_the_target() {
    let pool = vec_buffer_pool(scenario_options());

    // Steady state at 4 KiB.
    for _ in 0..200 {
        cycle(&pool, 4096);
    }

    // One 32 KiB outlier, then normal traffic resumes.
    cycle(&pool, 32768);
    for _ in 0..50 {
        cycle(&pool, 4096);
    }

    let target = pool.target_capacity();
    assert!(
        target < 3 * 4096,
        "spike leaked into the target: {target}"
    );
}

#[test]
fn cooldown_shrinks_slowly_not_instantly() {
    let pool = vec_buffer_pool(scenario_options());

    for _ in 0..200 {
        cycle(&pool, 8192);
    }
    let after_ramp = pool.target_capacity();
    assert!(after_ramp > 4096);

    for _ in 0..500 {
        cycle(&pool, 1024);
    }

    let target = pool.target_capacity();
    assert!(target < after_ramp, "cooldown must shrink the target");
    assert!(
        target > 1024,
        "shrink must be gradual, target collapsed to {target}"
    );
}

#[test]
fn oversized_return_is_not_handed_back() {
    let pool = vec_buffer_pool(scenario_options());

    // Establish a steady state around 2 KiB.
    for _ in 0..200 {
        cycle(&pool, 2048);
    }
    let steady = pool.target_capacity();
    assert!(steady >= 1536 && steady <= 3072, "unexpected steady state {steady}");

    // Return a buffer far beyond the discard threshold.
    let mut oversized = Vec::with_capacity(6144);
    oversized.resize(6144, 0);
    pool.release(oversized);

    let next = pool.acquire();
    assert!(
        next.capacity() < 4096,
        "oversized buffer was pooled: capacity {}",
        next.capacity()
    );
}

#[test]
fn idle_pool_never_drifts() {
    let pool = vec_buffer_pool(scenario_options());
    let initial = pool.target_capacity();

    // Ten full calibration windows of zero-usage churn.
    for _ in 0..1000 {
        let buf = pool.acquire();
        pool.release(buf);
    }

    assert_eq!(pool.target_capacity(), initial);
}

#[test]
fn min_equal_max_freezes_the_target() {
    let pool = vec_buffer_pool(
        PoolOptions::new()
            .with_min_size(2048)
            .with_max_size(2048)
            .with_calibrate_period(10),
    );

    for used in [100usize, 2048, 60000] {
        for _ in 0..30 {
            cycle(&pool, used);
        }
        assert_eq!(pool.target_capacity(), 2048);
    }
}

#[test]
fn bytes_pool_round_trips() {
    let pool = bytepool::bytes_buffer_pool(PoolOptions::new().with_initial_capacity(2048));

    let mut buf = pool.acquire();
    assert!(buf.capacity() >= 2048);
    buf.extend_from_slice(b"wire frame");
    pool.release(buf);

    let buf = pool.acquire();
    assert!(buf.is_empty(), "recycled BytesMut must come back cleared");
}

/// Three-phase traffic evolution: stable low, surge, cooldown. The
/// target must track each phase with jittered usage, not just constant
/// sizes.
#[test]
fn traffic_evolution_tracks_all_phases() {
    let pool = vec_buffer_pool(
        PoolOptions::new()
            .with_min_size(512)
            .with_max_size(64 << 20)
            .with_calibrate_period(1000),
    );
    let mut rng = rand::thread_rng();

    let mut run_phase = |cycles: usize, base: usize, jitter: usize| {
        for _ in 0..cycles {
            let delta = rng.gen_range(0..=jitter * 2) as i64 - jitter as i64;
            let used = (base as i64 + delta).max(100) as usize;
            cycle(&pool, used);
        }
        pool.target_capacity()
    };

    // Phase 1: stable ~2 KiB.
    let low = run_phase(2000, 2048, 200);
    assert!(low > 1024 && low < 4096, "low phase target {low}");

    // Phase 2: surge to ~10 KiB.
    let surge = run_phase(2000, 10240, 500);
    assert!(surge > low, "surge must raise the target");
    assert!(surge < 12288, "surge overshoot: {surge}");

    // Phase 3: back to ~2 KiB; slow decay, strictly between the
    // extremes.
    let cooled = run_phase(10_000, 2048, 200);
    assert!(cooled < surge, "cooldown must lower the target");
    assert!(cooled > 2048, "cooldown too aggressive: {cooled}");
}
