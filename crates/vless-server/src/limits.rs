//! Concurrent tunnel session limit.
//!
//! [`SessionLimiter`] owns an atomic counter shared by every accepted
//! upgrade; [`SessionGuard`] holds one slot and gives it back on drop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Caps the number of tunnel sessions alive at once.
#[derive(Debug)]
pub struct SessionLimiter {
    max_sessions: usize,
    active: Arc<AtomicUsize>,
}

impl SessionLimiter {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            max_sessions,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserve a slot, or `None` when the limit is reached.
    ///
    /// The guard is `Send` so it can move into the session task; the slot
    /// stays taken until the task ends.
    pub fn try_acquire(&self) -> Option<SessionGuard> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max_sessions).then_some(current + 1)
            })
            .ok()
            .map(|_| SessionGuard {
                counter: self.active.clone(),
            })
    }

    /// Number of sessions currently holding a slot.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

/// RAII slot in a [`SessionLimiter`].
#[derive(Debug)]
pub struct SessionGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reached() {
        let limiter = SessionLimiter::new(2);
        let _g1 = limiter.try_acquire().unwrap();
        let _g2 = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.active(), 2);
    }

    #[test]
    fn test_guard_releases() {
        let limiter = SessionLimiter::new(1);
        {
            let _guard = limiter.try_acquire().unwrap();
            assert_eq!(limiter.active(), 1);
        }
        assert_eq!(limiter.active(), 0);
        assert!(limiter.try_acquire().is_some());
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let limiter = SessionLimiter::new(0);
        assert!(limiter.try_acquire().is_none());
    }

    #[test]
    fn test_guard_moves_across_threads() {
        let limiter = SessionLimiter::new(4);
        let guard = limiter.try_acquire().unwrap();
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert_eq!(limiter.active(), 0);
    }
}
