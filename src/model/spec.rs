//! Immutable procedure definition: actions, stages, and the procedure itself.
//!
//! These types are produced once by the sketch validator and never mutated
//! afterwards. Declaration order in the sketch file is execution order.

use std::time::Duration;

/// A single automation action: one main shell command plus optional
/// lifecycle commands around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    /// Action name; unique within its stage.
    pub name: String,
    /// Main shell command.
    pub command: String,
    /// Optional preparation command; its failure is logged but never aborts.
    pub setup_command: Option<String>,
    /// Optional cleanup command; runs exactly once regardless of outcome.
    pub teardown_command: Option<String>,
    /// Optional hook executed after a successful main command.
    pub on_ok_command: Option<String>,
    /// Optional hook executed after a failed or timed-out main command.
    pub on_nok_command: Option<String>,
    /// Estimated duration, informational only.
    pub estimated: Option<Duration>,
    /// Hard timeout for the main command; strictly positive when set.
    pub timeout: Option<Duration>,
    /// Escalate a main-command failure to terminate the whole procedure.
    pub fatal_nok: bool,
}

impl ActionSpec {
    /// Construct an action with just a name and command; used by tests and
    /// programmatic procedure construction.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            setup_command: None,
            teardown_command: None,
            on_ok_command: None,
            on_nok_command: None,
            estimated: None,
            timeout: None,
            fatal_nok: false,
        }
    }
}

/// An ordered sequence of actions executed under one stage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Stage name; unique within the procedure.
    pub name: String,
    /// Actions in declaration order.
    pub actions: Vec<ActionSpec>,
}

impl StageSpec {
    /// Construct a stage from a name and its ordered actions.
    #[must_use]
    pub fn new(name: impl Into<String>, actions: Vec<ActionSpec>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    /// Position of an action within this stage, by name.
    #[must_use]
    pub fn position_of(&self, action_name: &str) -> Option<usize> {
        self.actions.iter().position(|a| a.name == action_name)
    }
}

/// A complete procedure: ordered stages, each with ordered actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureSpec {
    /// Procedure name; defaults to the sketch file name when unnamed.
    pub name: String,
    /// Stages in declaration order.
    pub stages: Vec<StageSpec>,
}

impl ProcedureSpec {
    /// Construct a procedure from a name and its ordered stages.
    #[must_use]
    pub fn new(name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    /// Position of a stage within the procedure, by name.
    #[must_use]
    pub fn position_of(&self, stage_name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == stage_name)
    }

    /// Total number of actions across all stages.
    #[must_use]
    pub fn total_actions(&self) -> usize {
        self.stages.iter().map(|s| s.actions.len()).sum()
    }

    /// Resolve a checkpointed (stage name, action name) pair back into a
    /// (stage index, action index) cursor. `None` if either name is unknown.
    #[must_use]
    pub fn locate(&self, stage_name: &str, action_name: &str) -> Option<(usize, usize)> {
        let stage_idx = self.position_of(stage_name)?;
        let action_idx = self.stages[stage_idx].position_of(action_name)?;
        Some((stage_idx, action_idx))
    }
}
