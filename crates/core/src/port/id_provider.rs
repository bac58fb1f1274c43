// Job id source

use crate::domain::JobId;

/// Hands out the id a submission is known by in every dispatch event
pub trait IdProvider: Send + Sync {
    /// Ids must never repeat within one driver's lifetime
    fn next_job_id(&self) -> JobId;
}

/// Random v4 UUIDs
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn next_job_id(&self) -> JobId {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// job-1, job-2, ... in submission order
    #[derive(Default)]
    pub struct SequentialIdProvider {
        issued: AtomicU64,
    }

    impl IdProvider for SequentialIdProvider {
        fn next_job_id(&self) -> JobId {
            format!("job-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }
}
