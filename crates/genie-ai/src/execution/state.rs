use std::fmt;

use super::request::CompletionStatus;

/// Per-session execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Cancelled | ExecutionState::Failed
        )
    }

    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Idle, Running) | (Running, Completed | Cancelled | Failed) | (Completed | Cancelled | Failed, Idle)
        )
    }

    pub(crate) fn from_status(status: &CompletionStatus) -> Self {
        match status {
            CompletionStatus::Completed => ExecutionState::Completed,
            CompletionStatus::Cancelled => ExecutionState::Cancelled,
            CompletionStatus::Failed(_) => ExecutionState::Failed,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Cancelled => "cancelled",
            ExecutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::FailureReason;

    #[test]
    fn lifecycle_transitions() {
        use ExecutionState::*;
        assert!(Idle.can_transition_to(Running));
        assert!(Running.can_transition_to(Cancelled));
        assert!(Failed.can_transition_to(Idle));
        assert!(!Idle.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Idle));
    }

    #[test]
    fn status_maps_to_terminal_state() {
        let failed = CompletionStatus::Failed(FailureReason::Timeout);
        assert_eq!(ExecutionState::from_status(&failed), ExecutionState::Failed);
        assert!(ExecutionState::from_status(&CompletionStatus::Cancelled).is_terminal());
        assert!(!ExecutionState::Running.is_terminal());
    }
}
