//! Execution progress cursor and engine lifecycle states.

use chrono::{DateTime, Utc};

use super::spec::ProcedureSpec;

/// Lifecycle state of the flow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No procedure loaded or running.
    Idle,
    /// Procedure actively executing.
    Running,
    /// Suspended at an action boundary, waiting for resume or stop.
    Paused,
    /// Halted by an external stop command.
    Stopped,
    /// All stages completed successfully.
    Completed,
    /// A fatal action failure terminated the procedure.
    Failed,
}

impl EngineState {
    /// Whether this state permits no further execution transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Terminal outcome of a procedure run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every stage ran to completion.
    Completed,
    /// A fatal action failure aborted the run.
    Failed,
    /// An external stop command halted the run.
    Stopped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        write!(f, "{label}")
    }
}

/// Mutable execution cursor, exclusively owned by the running engine.
///
/// A persisted snapshot of the same information is owned by the
/// `StateManager`; this in-memory copy is advanced as each action is
/// attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionProgress {
    /// Index of the stage currently executing.
    pub stage_index: usize,
    /// Index of the action currently attempted inside that stage.
    pub action_index: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Current lifecycle status of the run.
    pub status: EngineState,
}

impl ExecutionProgress {
    /// A fresh cursor at the first stage and action.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage_index: 0,
            action_index: 0,
            started_at: Utc::now(),
            status: EngineState::Running,
        }
    }

    /// A cursor reconstructed from a checkpoint, re-entering at the
    /// recorded stage and action.
    #[must_use]
    pub fn resumed_at(stage_index: usize, action_index: usize) -> Self {
        Self {
            stage_index,
            action_index,
            started_at: Utc::now(),
            status: EngineState::Running,
        }
    }

    /// Whether the cursor points inside the given procedure's bounds.
    #[must_use]
    pub fn within_bounds(&self, spec: &ProcedureSpec) -> bool {
        spec.stages
            .get(self.stage_index)
            .is_some_and(|stage| self.action_index < stage.actions.len())
    }
}

impl Default for ExecutionProgress {
    fn default() -> Self {
        Self::new()
    }
}
