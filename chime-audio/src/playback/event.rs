//! Shared drain event
//!
//! The mixer bumps this event whenever it retires a wave buffer; every
//! fill loop wakes on every signal and rescans only its own buffers. The
//! signal is coalescing: any number of bumps while a waiter is busy
//! collapse into a single wake-up.

use std::sync::{Condvar, Mutex};

/// Coalescing, broadcast wake signal.
///
/// Implemented as a generation counter: `signal()` bumps the counter and
/// notifies all waiters; `wait()` blocks until the counter moves past the
/// caller's last observed value. A waiter never misses a signal raised
/// between two waits, and never spins on a stale one.
pub struct DrainEvent {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl DrainEvent {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    /// Current generation, for seeding a waiter's `seen` cursor.
    pub fn observe(&self) -> u64 {
        *self.generation.lock().expect("drain event poisoned")
    }

    /// Wake every waiter.
    pub fn signal(&self) {
        let mut generation = self.generation.lock().expect("drain event poisoned");
        *generation += 1;
        self.cond.notify_all();
    }

    /// Block until the event is signalled after `*seen`, then update
    /// `*seen` to the observed generation.
    pub fn wait(&self, seen: &mut u64) {
        let mut generation = self.generation.lock().expect("drain event poisoned");
        while *generation == *seen {
            generation = self
                .cond
                .wait(generation)
                .expect("drain event poisoned");
        }
        *seen = *generation;
    }
}

impl Default for DrainEvent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_signal_wakes_waiter() {
        let event = Arc::new(DrainEvent::new());
        let mut seen = event.observe();

        let signaller = Arc::clone(&event);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            signaller.signal();
        });

        event.wait(&mut seen);
        assert_eq!(seen, 1);
        handle.join().unwrap();
    }

    #[test]
    fn test_signals_coalesce() {
        let event = DrainEvent::new();
        let mut seen = event.observe();

        event.signal();
        event.signal();
        event.signal();

        // A single wait consumes all three bumps.
        event.wait(&mut seen);
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_broadcast_to_all_waiters() {
        let event = Arc::new(DrainEvent::new());

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                std::thread::spawn(move || {
                    let mut seen = 0;
                    event.wait(&mut seen);
                    seen
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        event.signal();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), 1);
        }
    }
}
