//! Job Queue - shared pending-job store with cascading wake-ups
//!
//! Every `push` posts the "has job" signal once. Because the signal is boolean,
//! a burst of pushes can collapse into a single pending wake; `pop` therefore
//! re-posts whenever jobs remain after removal, so each successful pop forwards
//! the wake to the next idle worker until the burst is drained.

use super::signal::BinarySignal;
use crate::domain::{Job, QueueOrder};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    has_job: BinarySignal,
    order: QueueOrder,
    pushes: AtomicU64,
    pops: AtomicU64,
}

/// Queue counters, for stats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub pushes: u64,
    pub pops: u64,
    pub signal_posts: u64,
}

impl JobQueue {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            has_job: BinarySignal::default(),
            order,
            pushes: AtomicU64::new(0),
            pops: AtomicU64::new(0),
        }
    }

    // Push/pop never panic mid-update, so a poisoned deque is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }

    /// Add a job on top and post the signal once
    pub fn push(&self, job: Job) {
        let mut jobs = self.lock();
        jobs.push_back(job);
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.has_job.post();
    }

    /// Remove the next job (top of stack for LIFO, oldest for FIFO).
    ///
    /// Returns None on an empty queue; callers must tolerate wakes with nothing to do.
    /// Re-posts the signal if jobs remain after removal.
    pub fn pop(&self) -> Option<Job> {
        let mut jobs = self.lock();
        let job = match self.order {
            QueueOrder::Lifo => jobs.pop_back(),
            QueueOrder::Fifo => jobs.pop_front(),
        }?;
        self.pops.fetch_add(1, Ordering::Relaxed);
        if !jobs.is_empty() {
            self.has_job.post();
        }
        Some(job)
    }

    /// Block until the queue signal is posted
    pub fn wait(&self) {
        self.has_job.wait();
    }

    /// Block until posted or `timeout` elapses; returns whether a post was consumed
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.has_job.wait_timeout(timeout)
    }

    /// Post the signal without adding a job (shutdown and retirement forwarding)
    pub fn wake(&self) {
        self.has_job.post();
    }

    /// Remove every pending job
    pub fn drain(&self) -> Vec<Job> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.len(),
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            signal_posts: self.has_job.posts(),
        }
    }

    #[cfg(test)]
    pub(crate) fn signal(&self) -> &BinarySignal {
        &self.has_job
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(QueueOrder::Lifo)
    }
}
