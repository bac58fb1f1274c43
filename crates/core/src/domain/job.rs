// Job Domain Model

use super::query::Query;
use crate::port::JobCallback;
use std::fmt;
use std::sync::Arc;

/// Job ID (UUID v4 in production, injected via IdProvider)
pub type JobId = String;

/// Enqueued unit of work: a query plus the callback that will consume it.
///
/// Owned by the job queue from push until pop, then by the popping worker,
/// which drops it once the callback has returned.
pub struct Job {
    pub id: JobId,
    pub query: Query,
    pub callback: Arc<dyn JobCallback>,
}

impl Job {
    pub fn new(id: impl Into<String>, query: Query, callback: Arc<dyn JobCallback>) -> Self {
        Self {
            id: id.into(),
            query,
            callback,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
