//! Binary Signal - boolean wake primitive
//!
//! `post` sets the flag and wakes at most one waiter; `wait` blocks until the
//! flag is set and consumes it. Posts that happen before any wait collapse into
//! a single pending wake: this is not a counting semaphore.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub struct BinarySignal {
    ready: Mutex<bool>,
    cond: Condvar,
    posts: AtomicU64,
}

impl BinarySignal {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: Mutex::new(ready),
            cond: Condvar::new(),
            posts: AtomicU64::new(0),
        }
    }

    // The flag is a plain bool, so a poisoned lock still holds a valid value.
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set ready and wake one waiter
    pub fn post(&self) {
        let mut ready = self.lock();
        *ready = true;
        self.posts.fetch_add(1, Ordering::Relaxed);
        self.cond.notify_one();
    }

    /// Block until ready, then reset
    pub fn wait(&self) {
        let mut ready = self.lock();
        while !*ready {
            ready = self.cond.wait(ready).unwrap_or_else(PoisonError::into_inner);
        }
        *ready = false;
    }

    /// Like `wait`, giving up after `timeout`. Returns whether a post was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.lock();
        while !*ready {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            ready = self
                .cond
                .wait_timeout(ready, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *ready = false;
        true
    }

    /// Consume a pending post without blocking
    pub fn try_wait(&self) -> bool {
        let mut ready = self.lock();
        std::mem::replace(&mut *ready, false)
    }

    /// Whether a post is pending (not consumed)
    pub fn is_ready(&self) -> bool {
        *self.lock()
    }

    /// Total posts issued since creation
    pub fn posts(&self) -> u64 {
        self.posts.load(Ordering::Relaxed)
    }
}

impl Default for BinarySignal {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_consumes_post() {
        let signal = BinarySignal::default();
        signal.post();
        assert!(signal.is_ready());
        signal.wait();
        assert!(!signal.is_ready());
    }

    #[test]
    fn test_posts_collapse_into_one_wake() {
        let signal = BinarySignal::default();
        signal.post();
        signal.post();
        signal.post();

        assert_eq!(signal.posts(), 3);
        assert!(signal.try_wait());
        assert!(!signal.try_wait(), "boolean signal must not accumulate posts");
    }

    #[test]
    fn test_wait_timeout_without_post() {
        let signal = BinarySignal::default();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_post_wakes_blocked_waiter() {
        let signal = Arc::new(BinarySignal::default());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        signal.post();

        assert!(waiter.join().unwrap());
        assert!(!signal.is_ready());
    }

    #[test]
    fn test_initially_ready() {
        let signal = BinarySignal::new(true);
        assert!(signal.try_wait());
    }
}
