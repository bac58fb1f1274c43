// Worker Shutdown Token

use crate::application::job_queue::JobQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run flag as seen by workers
#[derive(Clone)]
pub struct ShutdownToken {
    keep_alive: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        !self.keep_alive.load(Ordering::Acquire)
    }
}

/// Shutdown sender, held by the driver and any external control surface
#[derive(Clone)]
pub struct ShutdownSender {
    keep_alive: Arc<AtomicBool>,
    queue: Arc<JobQueue>,
}

impl ShutdownSender {
    /// Signal shutdown to all workers.
    ///
    /// Clears the run flag, then posts the queue signal so one parked worker
    /// wakes; every worker that observes the cleared flag re-posts before
    /// exiting, so the stop reaches all of them.
    pub fn shutdown(&self) {
        self.keep_alive.store(false, Ordering::Release);
        self.queue.wake();
    }

    pub fn is_shutdown(&self) -> bool {
        !self.keep_alive.load(Ordering::Acquire)
    }
}

/// Create a shutdown channel bound to the queue workers park on
pub fn shutdown_channel(queue: Arc<JobQueue>) -> (ShutdownSender, ShutdownToken) {
    let keep_alive = Arc::new(AtomicBool::new(true));
    (
        ShutdownSender {
            keep_alive: Arc::clone(&keep_alive),
            queue,
        },
        ShutdownToken { keep_alive },
    )
}
