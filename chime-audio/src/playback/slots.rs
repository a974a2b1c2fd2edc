//! Voice slot pool
//!
//! Fixed arena of hardware-style voice slots behind a single mutex:
//! acquisition scans for the first idle slot and claims it in the same
//! critical section, so concurrent `play()` calls can never be awarded the
//! same slot. Callers hold only the returned index, never a slot
//! reference.

use crate::error::{Error, Result};
use std::sync::Mutex;
use tracing::warn;

/// Number of voice slots the mixer exposes.
pub const NUM_VOICES: usize = 24;

/// Fixed-size registry of voice slots.
pub struct SlotPool {
    active: Mutex<[bool; NUM_VOICES]>,
}

impl SlotPool {
    pub fn new() -> Self {
        Self {
            active: Mutex::new([false; NUM_VOICES]),
        }
    }

    /// Claim the first idle slot.
    ///
    /// # Errors
    /// [`Error::NoFreeChannel`] when all slots are occupied.
    pub fn acquire(&self) -> Result<usize> {
        let mut active = self.active.lock().expect("slot pool poisoned");
        for (index, slot) in active.iter_mut().enumerate() {
            if !*slot {
                *slot = true;
                return Ok(index);
            }
        }
        Err(Error::NoFreeChannel(NUM_VOICES))
    }

    /// Return a slot to the pool.
    pub fn release(&self, index: usize) {
        let mut active = self.active.lock().expect("slot pool poisoned");
        match active.get_mut(index) {
            Some(slot) if *slot => *slot = false,
            Some(_) => warn!("Releasing voice slot {} twice", index),
            None => warn!("Releasing out-of-range voice slot {}", index),
        }
    }

    /// Number of currently claimed slots.
    pub fn active_count(&self) -> usize {
        let active = self.active.lock().expect("slot pool poisoned");
        active.iter().filter(|slot| **slot).count()
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_returns_distinct_slots() {
        let pool = SlotPool::new();
        let mut seen = Vec::new();
        for _ in 0..NUM_VOICES {
            let slot = pool.acquire().unwrap();
            assert!(!seen.contains(&slot));
            seen.push(slot);
        }
        assert_eq!(pool.active_count(), NUM_VOICES);
    }

    #[test]
    fn test_exhausted_pool_fails() {
        let pool = SlotPool::new();
        for _ in 0..NUM_VOICES {
            pool.acquire().unwrap();
        }
        assert!(matches!(
            pool.acquire(),
            Err(Error::NoFreeChannel(NUM_VOICES))
        ));
    }

    #[test]
    fn test_release_makes_slot_reusable() {
        let pool = SlotPool::new();
        for _ in 0..NUM_VOICES {
            pool.acquire().unwrap();
        }

        pool.release(7);
        assert_eq!(pool.active_count(), NUM_VOICES - 1);
        assert_eq!(pool.acquire().unwrap(), 7);
    }

    #[test]
    fn test_double_release_is_harmless() {
        let pool = SlotPool::new();
        let slot = pool.acquire().unwrap();
        pool.release(slot);
        pool.release(slot);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_concurrent_acquire_never_duplicates() {
        use std::sync::Arc;

        let pool = Arc::new(SlotPool::new());
        let handles: Vec<_> = (0..NUM_VOICES)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.acquire().unwrap())
            })
            .collect();

        let mut slots: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), NUM_VOICES);
    }
}
