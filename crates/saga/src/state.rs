//! Flow state machine.

use serde::{Deserialize, Serialize};

/// The state of a flow in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FlowState {
    /// Flow has not started yet.
    #[default]
    NotStarted,

    /// Flow steps are being executed.
    Running,

    /// A step failed and compensating actions are in progress.
    Compensating,

    /// All steps completed successfully (terminal state).
    Completed,

    /// Compensation finished after a failure (terminal state).
    Failed,
}

impl FlowState {
    /// Returns true if the flow can begin running.
    pub fn can_run(&self) -> bool {
        matches!(self, FlowState::NotStarted)
    }

    /// Returns true if the flow can begin compensation.
    pub fn can_compensate(&self) -> bool {
        matches!(self, FlowState::Running)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Completed | FlowState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::NotStarted => "NotStarted",
            FlowState::Running => "Running",
            FlowState::Compensating => "Compensating",
            FlowState::Completed => "Completed",
            FlowState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
