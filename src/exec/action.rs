//! Single-action execution: setup, main command, hooks, teardown.

use chrono::Utc;
use tracing::{info, warn};

use super::context::ExecContext;
use super::shell::CommandResult;
use crate::model::spec::ActionSpec;
use crate::report::ReportEntry;

/// Outcome of one action's main command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// Main command exited zero.
    Ok,
    /// Main command exited nonzero or could not be launched.
    Failed,
    /// Main command exceeded its timeout and was killed.
    TimedOut,
}

impl ActionStatus {
    /// Report label for this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Result of executing one action, including whether the failure
/// escalates to a fatal procedure abort.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// How the main command ended.
    pub status: ActionStatus,
    /// True only when the main command failed or timed out and the action
    /// is marked `fatal-nok`. Hook failures never set this.
    pub fatal: bool,
    /// The main command's result.
    pub main: CommandResult,
}

/// Execute one action: setup (failure logged only), main command under
/// the action's timeout, the matching on-ok/on-nok hook, and teardown,
/// which runs exactly once regardless of the main outcome.
pub async fn execute(spec: &ActionSpec, ctx: &ExecContext) -> ActionOutcome {
    info!(action = spec.name, "executing action");

    if let Some(setup) = &spec.setup_command {
        let result = ctx.shell.execute(setup, None).await;
        if !result.success() {
            warn!(
                action = spec.name,
                exit_code = ?result.exit_code,
                "setup command failed, continuing"
            );
        }
    }

    let main = ctx.shell.execute(&spec.command, spec.timeout).await;

    let status = if main.timed_out {
        ActionStatus::TimedOut
    } else if main.success() {
        ActionStatus::Ok
    } else {
        ActionStatus::Failed
    };

    let hook = match status {
        ActionStatus::Ok => spec.on_ok_command.as_ref(),
        ActionStatus::Failed | ActionStatus::TimedOut => spec.on_nok_command.as_ref(),
    };
    if let Some(hook) = hook {
        let result = ctx.shell.execute(hook, None).await;
        if !result.success() {
            warn!(
                action = spec.name,
                exit_code = ?result.exit_code,
                "hook command failed"
            );
        }
    }

    // Guaranteed release: teardown runs exactly once, whatever happened
    // above.
    if let Some(teardown) = &spec.teardown_command {
        let result = ctx.shell.execute(teardown, None).await;
        if !result.success() {
            warn!(
                action = spec.name,
                exit_code = ?result.exit_code,
                "teardown command failed"
            );
        }
    }

    let fatal = spec.fatal_nok && status != ActionStatus::Ok;

    info!(
        action = spec.name,
        status = status.as_str(),
        fatal,
        exit_code = ?main.exit_code,
        elapsed_ms = u64::try_from(main.elapsed.as_millis()).unwrap_or(u64::MAX),
        "action finished"
    );

    ActionOutcome {
        status,
        fatal,
        main,
    }
}

/// Build a report entry for a finished action.
#[must_use]
pub fn report_entry(stage_name: &str, spec: &ActionSpec, outcome: &ActionOutcome) -> ReportEntry {
    ReportEntry {
        timestamp: Utc::now(),
        stage: stage_name.to_owned(),
        action: spec.name.clone(),
        status: outcome.status.as_str().to_owned(),
        exit_code: outcome.main.exit_code,
        elapsed_ms: u64::try_from(outcome.main.elapsed.as_millis()).unwrap_or(u64::MAX),
        fatal: outcome.fatal,
    }
}
