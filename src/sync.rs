//! Minimal spin-based synchronization for shard critical sections.
//!
//! The sharded pool guards each shard with a [`SpinMutex`]. Critical
//! sections there are a handful of vector operations, so a full parking
//! mutex buys nothing; a bounded spin with yields wins on the fast path
//! and degrades to polite yielding under contention.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};
use std::hint;
use std::thread;

/// CAS attempts before the lock falls back to unbounded yielding.
const SPIN_LIMIT: u32 = 128;

/// Exponential backoff: spin a growing number of iterations, then start
/// yielding the thread instead of burning cycles.
#[derive(Debug)]
pub(crate) struct Backoff {
    step: u32,
    max_spin: u32,
}

impl Backoff {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self { step: 0, max_spin: 6 }
    }

    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.step <= self.max_spin {
            for _ in 0..(1u32 << self.step) {
                hint::spin_loop();
            }
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }
}

/// A single-word mutual exclusion lock with two states: free and held.
///
/// `lock` attempts a bounded number of compare-and-swap tries, backing
/// off between attempts, and then falls through to an unbounded retry
/// loop that yields on every failure. There is no fairness guarantee and
/// no poisoning; a panicking holder leaves the lock held.
///
/// Intended for critical sections of a few dozen instructions. Anything
/// longer belongs behind a real mutex.
#[derive(Debug)]
pub(crate) struct SpinMutex<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SpinMutex<T> {}
unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquire the lock, spinning up to [`SPIN_LIMIT`] times before
    /// switching to yield-and-retry.
    #[inline]
    pub(crate) fn lock(&self) -> SpinGuard<'_, T> {
        let mut backoff = Backoff::new();
        for _ in 0..SPIN_LIMIT {
            if self.try_acquire() {
                return SpinGuard { lock: self };
            }
            backoff.snooze();
        }

        loop {
            if self.try_acquire() {
                return SpinGuard { lock: self };
            }
            thread::yield_now();
        }
    }
}

/// RAII guard; releases the lock on drop with a `Release` store.
pub(crate) struct SpinGuard<'a, T> {
    lock: &'a SpinMutex<T>,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
