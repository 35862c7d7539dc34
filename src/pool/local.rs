//! Per-thread idle storage for the calibrated pool.
//!
//! The calibrated pool parks recycled buffers in a [`ThreadCache`] so
//! the common acquire never touches a lock. The default implementation,
//! [`SlotCache`], keeps one slot per hardware thread: a stash replaces
//! the caller's slot (dropping whatever was there) and a fetch empties
//! it, falling back to stealing from other slots so buffers parked by
//! idle threads stay reachable. The cache is allowed to lose objects;
//! callers must treat it as best-effort storage, never as ownership.

use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::thread;

use crossbeam_utils::CachePadded;

/// Best-effort per-thread object cache.
///
/// Both operations are non-blocking and thread-safe. `stash` may drop
/// the object instead of keeping it; `fetch` returns whatever object is
/// reachable from the calling thread, if any.
pub trait ThreadCache<T>: Send + Sync {
    /// Park one object for later reuse. The cache may discard it.
    fn stash(&self, value: T);

    /// Take a parked object, preferring one parked by this thread.
    fn fetch(&self) -> Option<T>;
}

/// One-slot-per-thread cache with displacement eviction.
///
/// Each slot is a cache-padded atomic pointer. Collisions (more live
/// threads than slots) are harmless: a displaced occupant is simply
/// dropped, which the [`ThreadCache`] contract permits.
pub struct SlotCache<T> {
    slots: Box<[CachePadded<AtomicPtr<T>>]>,
}

impl<T> SlotCache<T> {
    /// Cache with one slot per hardware thread.
    pub fn new() -> Self {
        Self::with_slots(available_cpus())
    }

    /// Cache with an explicit slot count.
    pub fn with_slots(slots: usize) -> Self {
        let slots = slots.max(1);
        let slots = (0..slots)
            .map(|_| CachePadded::new(AtomicPtr::new(ptr::null_mut())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    #[inline]
    fn take_slot(&self, index: usize) -> Option<T> {
        let raw = self.slots[index].swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            None
        } else {
            // The pointer came from Box::into_raw in stash and was
            // atomically removed from the slot, so this thread owns it.
            Some(*unsafe { Box::from_raw(raw) })
        }
    }
}

impl<T> Default for SlotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ThreadCache<T> for SlotCache<T> {
    fn stash(&self, value: T) {
        let index = thread_slot_index(self.slots.len());
        let raw = Box::into_raw(Box::new(value));
        let displaced = self.slots[index].swap(raw, Ordering::AcqRel);
        if !displaced.is_null() {
            drop(unsafe { Box::from_raw(displaced) });
        }
    }

    fn fetch(&self) -> Option<T> {
        let len = self.slots.len();
        let home = thread_slot_index(len);

        for offset in 0..len {
            if let Some(value) = self.take_slot((home + offset) % len) {
                return Some(value);
            }
        }
        None
    }
}

impl<T> Drop for SlotCache<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter() {
            let raw = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !raw.is_null() {
                drop(unsafe { Box::from_raw(raw) });
            }
        }
    }
}

unsafe impl<T: Send> Send for SlotCache<T> {}
unsafe impl<T: Send> Sync for SlotCache<T> {}

/// Hardware parallelism, with a fallback when the query fails.
pub(crate) fn available_cpus() -> usize {
    thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_ID: usize = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Sticky slot index for the calling thread, in `0..count`.
///
/// Threads receive a monotonically increasing id on first use; the id is
/// stable for the thread's lifetime, so the derived index is stable for
/// any fixed `count`. Distinct threads may share an index once more than
/// `count` threads exist, which costs reuse efficiency, not correctness.
#[inline]
pub(crate) fn thread_slot_index(count: usize) -> usize {
    THREAD_ID.with(|id| *id % count.max(1))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn stash_then_fetch_round_trips() {
        let cache: SlotCache<Vec<u8>> = SlotCache::with_slots(4);
        cache.stash(vec![1, 2, 3]);
        assert_eq!(cache.fetch(), Some(vec![1, 2, 3]));
        assert_eq!(cache.fetch(), None);
    }

    #[test]
    fn stash_displaces_previous_occupant() {
        let cache: SlotCache<u32> = SlotCache::with_slots(1);
        cache.stash(1);
        cache.stash(2);

        // Only the newest survives in a single slot.
        assert_eq!(cache.fetch(), Some(2));
        assert_eq!(cache.fetch(), None);
    }

    #[test]
    fn fetch_steals_from_other_slots() {
        let cache: Arc<SlotCache<u32>> = Arc::new(SlotCache::with_slots(64));

        let producer = {
            let cache = cache.clone();
            thread::spawn(move || cache.stash(7))
        };
        producer.join().unwrap();

        // This thread almost certainly maps to a different slot, so a
        // successful fetch proves the steal scan works.
        assert_eq!(cache.fetch(), Some(7));
    }

    #[test]
    fn drop_releases_parked_values() {
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let cache: SlotCache<Tracked> = SlotCache::with_slots(2);
            cache.stash(Tracked(drops.clone()));
        }
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn thread_index_is_sticky() {
        let a = thread_slot_index(8);
        let b = thread_slot_index(8);
        assert_eq!(a, b);
        assert!(a < 8);
    }

    #[test]
    fn concurrent_stash_fetch_is_safe() {
        let cache: Arc<SlotCache<usize>> = Arc::new(SlotCache::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for n in 0..1000 {
                        cache.stash(i * 1000 + n);
                        // Fetching may miss under displacement; that is
                        // within contract.
                        let _ = cache.fetch();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }
}
