// Callback isolation: a panicking callback fails its job, not its worker
use crate::domain::WorkerId;
use crate::port::{ExecutionError, Response};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// How one callback invocation ended
#[derive(Debug)]
pub enum CallbackOutcome {
    Served(Response),
    Failed(ExecutionError),
    /// Unwound mid-exchange; the connection's stream position is unknown
    Panicked(String),
}

/// Run a job's callback, catching any panic.
///
/// The closure may hold `&mut` to the worker's connection. That borrow is not
/// unwind safe, so after `Panicked` the caller must treat the connection as broken.
pub fn guard_callback<F>(worker: WorkerId, job_id: &str, f: F) -> CallbackOutcome
where
    F: FnOnce() -> Result<Response, ExecutionError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(response)) => CallbackOutcome::Served(response),
        Ok(Err(e)) => CallbackOutcome::Failed(e),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(worker = %worker, job_id = %job_id, panic_msg = %message, "Job callback panicked");
            CallbackOutcome::Panicked(message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> WorkerId {
        WorkerId(0)
    }

    #[test]
    fn test_response_is_served() {
        let outcome = guard_callback(worker(), "job-1", || Ok(Response::new(b"dune".to_vec())));
        match outcome {
            CallbackOutcome::Served(r) => assert_eq!(r.to_string_lossy(), "dune"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_callback_error_is_failed_not_panicked() {
        let outcome = guard_callback(worker(), "job-2", || {
            Err(ExecutionError::Receive("peer closed".to_string()))
        });
        assert!(matches!(outcome, CallbackOutcome::Failed(ExecutionError::Receive(_))));
    }

    #[test]
    fn test_panic_inside_exchange_is_captured() {
        let mut sent = Vec::new();
        let outcome = guard_callback(worker(), "job-3", || {
            sent.push(b'a');
            panic!("job {} failed halfway", 3)
        });
        assert!(matches!(outcome, CallbackOutcome::Panicked(msg) if msg == "job 3 failed halfway"));
        assert_eq!(sent, b"a");
    }

    #[test]
    fn test_non_string_panic_payload() {
        let outcome = guard_callback(worker(), "job-4", || std::panic::panic_any(17u32));
        assert!(matches!(outcome, CallbackOutcome::Panicked(msg) if msg == "Unknown panic"));
    }
}
