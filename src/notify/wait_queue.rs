//! Wait queue for blocking pollers.
//!
//! Waiters announce themselves with [`WaitQueue::enqueue`] while holding the
//! notification flag lock, so the producer's "anyone waiting?" check and the
//! consumer's registration are totally ordered. Wakeups bump a generation
//! counter; a sleeper compares against the generation it saw under the lock,
//! so a wakeup between unlock and sleep is never lost.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::ops::WaitContext;

/// A wait queue with waiter accounting.
pub struct WaitQueue {
    /// Number of registered waiters
    waiters: AtomicUsize,
    /// Number of wakeups delivered so far
    generation: AtomicU64,
}

impl WaitQueue {
    /// Create a new wait queue.
    pub const fn new() -> Self {
        Self {
            waiters: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Whether any waiter is registered.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.waiters.load(Ordering::Acquire) > 0
    }

    /// Number of registered waiters.
    #[inline]
    pub fn waiters(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    /// Registers a waiter and returns the current wake generation.
    pub fn enqueue(&self) -> u64 {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        self.generation()
    }

    /// Unregisters a waiter.
    pub fn dequeue(&self) {
        self.waiters.fetch_sub(1, Ordering::AcqRel);
    }

    /// The current wake generation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wakes every waiter. Returns whether anyone was waiting.
    pub fn wake_all(&self) -> bool {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.is_active()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// One of the watched queues was woken.
    Woken,
    /// A signal arrived first.
    Interrupted,
}

/// Sleeps until any watched queue moves past its recorded generation or the
/// caller is signalled.
///
/// `watched` pairs each queue with the generation observed under the flag lock.
pub fn sleep_on<W: WaitContext + ?Sized>(watched: &[(&WaitQueue, u64)], ctx: &W) -> WaitOutcome {
    loop {
        if watched.iter().any(|(wq, seen)| wq.generation() != *seen) {
            return WaitOutcome::Woken;
        }
        if ctx.signal_pending() {
            return WaitOutcome::Interrupted;
        }
        ctx.relax();
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    struct Ctx(AtomicBool);

    impl WaitContext for Ctx {
        fn signal_pending(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }

        fn relax(&self) {
            thread::yield_now();
        }
    }

    #[test]
    fn test_wait_queue_accounting() {
        let wq = WaitQueue::new();
        assert!(!wq.is_active());
        let seen = wq.enqueue();
        assert!(wq.is_active());
        assert_eq!(wq.waiters(), 1);

        assert!(wq.wake_all());
        assert_ne!(wq.generation(), seen);

        wq.dequeue();
        assert!(!wq.is_active());
        assert!(!wq.wake_all());
    }

    #[test]
    fn test_sleep_sees_earlier_wakeup() {
        let wq = WaitQueue::new();
        let seen = wq.enqueue();
        wq.wake_all();
        let ctx = Ctx(AtomicBool::new(false));
        assert_eq!(sleep_on(&[(&wq, seen)], &ctx), WaitOutcome::Woken);
    }

    #[test]
    fn test_sleep_interrupted() {
        let wq = WaitQueue::new();
        let seen = wq.enqueue();
        let ctx = Ctx(AtomicBool::new(true));
        assert_eq!(sleep_on(&[(&wq, seen)], &ctx), WaitOutcome::Interrupted);
    }

    #[test]
    fn test_sleep_woken_from_other_thread() {
        let wq = Arc::new(WaitQueue::new());
        let seen = wq.enqueue();
        let waker = {
            let wq = Arc::clone(&wq);
            thread::spawn(move || {
                while !wq.is_active() {
                    thread::yield_now();
                }
                wq.wake_all();
            })
        };
        let ctx = Ctx(AtomicBool::new(false));
        assert_eq!(sleep_on(&[(&*wq, seen)], &ctx), WaitOutcome::Woken);
        waker.join().unwrap();
    }
}
