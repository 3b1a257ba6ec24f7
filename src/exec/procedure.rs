//! Procedure execution: ordered stages, checkpointing, outcome
//! aggregation.

use tracing::{error, info};

use super::context::ExecContext;
use super::stage::{self, StageStatus};
use crate::model::progress::RunStatus;
use crate::model::spec::ProcedureSpec;

/// Aggregated result of a procedure run.
#[derive(Debug, Clone)]
pub struct ProcedureOutcome {
    /// Terminal run status.
    pub status: RunStatus,
    /// Stage whose fatal action aborted the run.
    pub failed_stage: Option<String>,
    /// Action whose fatal outcome aborted the run.
    pub failed_action: Option<String>,
}

impl ProcedureOutcome {
    fn completed() -> Self {
        Self {
            status: RunStatus::Completed,
            failed_stage: None,
            failed_action: None,
        }
    }

    fn stopped() -> Self {
        Self {
            status: RunStatus::Stopped,
            failed_stage: None,
            failed_action: None,
        }
    }
}

/// A loaded procedure ready to execute.
pub struct Procedure {
    spec: ProcedureSpec,
}

impl Procedure {
    /// Wrap a checked procedure definition.
    #[must_use]
    pub fn new(spec: ProcedureSpec) -> Self {
        Self { spec }
    }

    /// The underlying definition.
    #[must_use]
    pub fn spec(&self) -> &ProcedureSpec {
        &self.spec
    }

    /// Execute stages in declaration order, persisting the cursor as each
    /// stage and action is attempted.
    ///
    /// `resume_cursor` re-enters at the recorded (stage, action) indices;
    /// the recorded action is re-run from scratch because its completion
    /// is unknowable after an interruption.
    ///
    /// A fatal stage failure terminates the whole procedure; a stop
    /// request halts with [`RunStatus::Stopped`] once the in-flight
    /// action completes.
    pub async fn execute(
        &self,
        ctx: &ExecContext,
        resume_cursor: Option<(usize, usize)>,
    ) -> ProcedureOutcome {
        info!(
            procedure = self.spec.name,
            stages = self.spec.stages.len(),
            resumed = resume_cursor.is_some(),
            "executing procedure"
        );

        let (first_stage, first_action) = resume_cursor.unwrap_or((0, 0));

        for (stage_index, stage_spec) in self.spec.stages.iter().enumerate().skip(first_stage) {
            if ctx.control.stop_requested() {
                info!(procedure = self.spec.name, "stop observed between stages");
                return ProcedureOutcome::stopped();
            }

            ctx.checkpoint_stage(&stage_spec.name);

            let start_at = if stage_index == first_stage {
                first_action
            } else {
                0
            };

            let outcome = stage::execute(stage_spec, start_at, stage_index, ctx).await;
            match outcome.status {
                StageStatus::Completed => {}
                StageStatus::Stopped => return ProcedureOutcome::stopped(),
                StageStatus::Failed => {
                    // Fatal failures always terminate the procedure, never
                    // just the stage.
                    error!(
                        procedure = self.spec.name,
                        stage = stage_spec.name,
                        action = outcome.failed_action.as_deref().unwrap_or(""),
                        "procedure failed"
                    );
                    return ProcedureOutcome {
                        status: RunStatus::Failed,
                        failed_stage: Some(stage_spec.name.clone()),
                        failed_action: outcome.failed_action,
                    };
                }
            }
        }

        info!(procedure = self.spec.name, "procedure completed");
        ProcedureOutcome::completed()
    }
}
