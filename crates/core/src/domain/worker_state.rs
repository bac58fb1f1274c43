// Worker Lifecycle State

use super::error::{DomainError, Result};
use serde::Serialize;

/// Worker state machine:
/// STARTING -> CONNECTING -> IDLE <-> EXECUTING -> ... -> STOPPED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Starting,
    Connecting,
    Idle,
    Executing,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Starting => write!(f, "STARTING"),
            WorkerState::Connecting => write!(f, "CONNECTING"),
            WorkerState::Idle => write!(f, "IDLE"),
            WorkerState::Executing => write!(f, "EXECUTING"),
            WorkerState::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl WorkerState {
    /// Validate a transition, returning the new state
    pub fn transition(self, to: WorkerState) -> Result<WorkerState> {
        use WorkerState::*;
        let allowed = matches!(
            (self, to),
            (Starting, Connecting)
                | (Connecting, Idle)
                | (Connecting, Stopped)
                | (Idle, Executing)
                | (Idle, Connecting) // reconnect of a broken session
                | (Idle, Stopped)
                | (Executing, Idle)
        );
        if allowed {
            Ok(to)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(v: u8) -> WorkerState {
        match v {
            0 => WorkerState::Starting,
            1 => WorkerState::Connecting,
            2 => WorkerState::Idle,
            3 => WorkerState::Executing,
            _ => WorkerState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serving_cycle_is_allowed() {
        let s = WorkerState::Starting
            .transition(WorkerState::Connecting)
            .and_then(|s| s.transition(WorkerState::Idle))
            .and_then(|s| s.transition(WorkerState::Executing))
            .and_then(|s| s.transition(WorkerState::Idle))
            .and_then(|s| s.transition(WorkerState::Stopped))
            .unwrap();
        assert_eq!(s, WorkerState::Stopped);
    }

    #[test]
    fn test_cannot_execute_without_connecting() {
        let result = WorkerState::Starting.transition(WorkerState::Executing);
        assert!(matches!(
            result,
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_stopped_is_terminal() {
        assert!(WorkerState::Stopped.transition(WorkerState::Idle).is_err());
    }

    #[test]
    fn test_u8_round_trip() {
        for s in [
            WorkerState::Starting,
            WorkerState::Connecting,
            WorkerState::Idle,
            WorkerState::Executing,
            WorkerState::Stopped,
        ] {
            assert_eq!(WorkerState::from_u8(s.as_u8()), s);
        }
    }
}
