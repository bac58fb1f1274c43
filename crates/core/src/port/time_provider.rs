// Clock port
//
// Read twice per job: once when the query is submitted, once when a worker
// claims it. The difference is the queued_ms reported on JobClaimed.

/// Epoch-millisecond clock
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock via chrono
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Test clock. Frozen unless advanced, or ticking by a fixed step per read.
    pub struct ManualTimeProvider {
        now: AtomicI64,
        step: i64,
    }

    impl ManualTimeProvider {
        pub fn new(start_millis: i64) -> Self {
            Self::ticking(start_millis, 0)
        }

        /// Every read returns the current value, then moves the clock `step` ms
        pub fn ticking(start_millis: i64, step: i64) -> Self {
            Self {
                now: AtomicI64::new(start_millis),
                step,
            }
        }

        pub fn advance(&self, millis: i64) {
            self.now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeProvider for ManualTimeProvider {
        fn now_millis(&self) -> i64 {
            self.now.fetch_add(self.step, Ordering::SeqCst)
        }
    }
}
