//! Stage execution: ordered actions with pause/stop boundaries and
//! fatal-abort.

use tracing::{error, info};

use super::action::{self, ActionOutcome};
use super::context::ExecContext;
use crate::model::spec::StageSpec;

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Every action was attempted; no fatal outcome.
    Completed,
    /// A fatal action outcome aborted the stage.
    Failed,
    /// A stop request halted the stage before the next action.
    Stopped,
}

/// Result of executing one stage.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// How the stage ended.
    pub status: StageStatus,
    /// Name of the action whose fatal outcome aborted the stage.
    pub failed_action: Option<String>,
}

/// Execute a stage's actions in order, starting from `start_at` (nonzero
/// when resuming from a checkpoint).
///
/// Between actions the pause/stop flags are consulted: a stop halts
/// without starting the next action; a pause suspends at the boundary
/// until resume or stop. Neither ever interrupts an action already
/// running. A fatal action outcome aborts the stage immediately.
pub async fn execute(
    spec: &StageSpec,
    start_at: usize,
    stage_index: usize,
    ctx: &ExecContext,
) -> StageOutcome {
    info!(stage = spec.name, actions = spec.actions.len(), "executing stage");

    for (action_index, action_spec) in spec.actions.iter().enumerate().skip(start_at) {
        // Control boundary: never entered while an action is in flight.
        if ctx.control.wait_at_boundary().await {
            info!(stage = spec.name, "stop observed at action boundary");
            return StageOutcome {
                status: StageStatus::Stopped,
                failed_action: None,
            };
        }

        ctx.advance_cursor(stage_index, action_index);
        ctx.checkpoint_action(&action_spec.name);

        let outcome: ActionOutcome = action::execute(action_spec, ctx).await;
        ctx.report_entry(&action::report_entry(&spec.name, action_spec, &outcome));

        if outcome.fatal {
            error!(
                stage = spec.name,
                action = action_spec.name,
                "fatal action outcome, aborting stage"
            );
            return StageOutcome {
                status: StageStatus::Failed,
                failed_action: Some(action_spec.name.clone()),
            };
        }
    }

    info!(stage = spec.name, "stage completed");
    StageOutcome {
        status: StageStatus::Completed,
        failed_action: None,
    }
}
