//! Top-level flow engine: wires the procedure executor, the state
//! manager, and the control monitor together behind the
//! run/pause/resume/stop state machine.
//!
//! Two unrelated OS processes cooperate through the engine: the *runner*
//! executing [`FlowEngine::start`] and any later *controller* invocation
//! issuing [`pause`](FlowEngine::pause) / [`resume`](FlowEngine::resume) /
//! [`stop`](FlowEngine::stop) / [`purge`](FlowEngine::purge). All
//! coordination happens through the checkpoint and command files.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::FlowConfig;
use crate::exec::context::{ExecContext, RunControl};
use crate::exec::procedure::Procedure;
use crate::exec::shell::ShellExecutor;
use crate::model::command::CommandKind;
use crate::model::progress::{EngineState, ExecutionProgress, RunStatus};
use crate::model::spec::ProcedureSpec;
use crate::report::ReportWriter;
use crate::sketch;
use crate::state::channel::{ControlChannel, FileChannel};
use crate::state::manager::{StateManager, StateSnapshot};
use crate::state::monitor::StateMonitor;
use crate::{FlowError, Result};

/// Coordinates one procedure run and its external control surface.
///
/// Every path the engine touches comes from its injected [`FlowConfig`],
/// so independent engines with distinct checkpoint files coexist freely
/// (the test suite relies on this).
pub struct FlowEngine {
    config: FlowConfig,
    state: Arc<StateManager>,
    machine: Arc<Mutex<EngineState>>,
}

impl FlowEngine {
    /// Construct an engine with the default file-backed control channel.
    #[must_use]
    pub fn new(config: FlowConfig) -> Self {
        let channel = Arc::new(FileChannel::new(config.command_path()));
        Self::with_channel(config, channel)
    }

    /// Construct an engine over a custom control-channel implementation.
    #[must_use]
    pub fn with_channel(config: FlowConfig, channel: Arc<dyn ControlChannel>) -> Self {
        let state = Arc::new(StateManager::new(
            config.state_path(),
            config.report_path(),
            channel,
        ));
        Self {
            config,
            state,
            machine: Arc::new(Mutex::new(EngineState::Idle)),
        }
    }

    /// Current in-memory lifecycle state.
    #[must_use]
    pub fn engine_state(&self) -> EngineState {
        self.machine.lock().map_or(EngineState::Idle, |st| *st)
    }

    /// The engine's state manager; exposed for status queries.
    #[must_use]
    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state
    }

    /// Read the persisted checkpoint snapshot; `None` when no run has
    /// persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the checkpoint cannot be read.
    pub fn get_full_state(&self) -> Result<Option<StateSnapshot>> {
        self.state.get_full_state()
    }

    /// Start a fresh run of the given sketch file.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AlreadyRunning`] unless the engine is idle and
    /// the checkpoint reports no active run; [`FlowError::Validation`] for
    /// a malformed sketch.
    pub async fn start(&self, sketch_path: &Path) -> Result<RunStatus> {
        self.run(sketch_path, false).await
    }

    /// Resume an interrupted run from its persisted checkpoint,
    /// re-entering at the recorded stage/action. The recorded action is
    /// re-run from scratch because its completion is unknowable.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotRunning`] when there is no checkpoint to
    /// resume from, or [`FlowError::Validation`] when the checkpoint does
    /// not match the sketch.
    pub async fn resume_run(&self, sketch_path: &Path) -> Result<RunStatus> {
        self.run(sketch_path, true).await
    }

    /// Ask the running procedure to pause at the next action boundary.
    /// Fire-and-forget: the effect is asynchronous and confirmed via
    /// [`get_full_state`](Self::get_full_state) once the runner's monitor
    /// has applied it.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotRunning`] when no active procedure owns the
    /// checkpoint, or when it is already paused.
    pub fn pause(&self) -> Result<()> {
        let snapshot = self.require_active("pause")?;
        if snapshot.is_paused() {
            return Err(FlowError::NotRunning("procedure is already paused".into()));
        }
        self.state.send_command(CommandKind::Pause)?;
        info!("pause command sent");
        Ok(())
    }

    /// Ask a paused procedure to resume. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotRunning`] unless the checkpoint reports a
    /// paused procedure.
    pub fn resume(&self) -> Result<()> {
        let snapshot = self.require_active("resume")?;
        if !snapshot.is_paused() {
            return Err(FlowError::NotRunning("procedure is not paused".into()));
        }
        self.state.send_command(CommandKind::Resume)?;
        info!("resume command sent");
        Ok(())
    }

    /// Ask the running procedure to stop once the in-flight action
    /// completes. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotRunning`] when no active procedure owns the
    /// checkpoint.
    pub fn stop(&self) -> Result<()> {
        self.require_active("stop")?;
        self.state.send_command(CommandKind::Stop)?;
        info!("stop command sent");
        Ok(())
    }

    /// Delete the checkpoint, pending command, and report files.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InUse`] while a procedure is running or
    /// paused, either in this engine or per the on-disk checkpoint.
    pub fn purge(&self) -> Result<()> {
        let local = self.engine_state();
        if matches!(local, EngineState::Running | EngineState::Paused) {
            return Err(FlowError::InUse(
                "cannot purge while a procedure is running or paused".into(),
            ));
        }

        if self
            .state
            .get_full_state()?
            .is_some_and(|snap| snap.is_active())
        {
            return Err(FlowError::InUse(
                "checkpoint reports an active procedure".into(),
            ));
        }

        self.state.purge()?;
        self.set_machine(EngineState::Idle);
        Ok(())
    }

    /// Shared runner path for fresh starts and checkpoint resumes.
    async fn run(&self, sketch_path: &Path, resume: bool) -> Result<RunStatus> {
        let spec = sketch::load_procedure(sketch_path)?;

        {
            let mut machine = self
                .machine
                .lock()
                .map_err(|_| FlowError::Execution("engine state mutex poisoned".into()))?;
            if matches!(*machine, EngineState::Running | EngineState::Paused) {
                return Err(FlowError::AlreadyRunning(
                    "a procedure is already running in this engine".into(),
                ));
            }
            *machine = EngineState::Running;
        }

        let resume_cursor = match self.prepare_checkpoint(sketch_path, &spec, resume) {
            Ok(cursor) => cursor,
            Err(err) => {
                self.set_machine(EngineState::Idle);
                return Err(err);
            }
        };

        let control = RunControl::default();
        let progress = Arc::new(Mutex::new(match resume_cursor {
            Some((stage, action)) => ExecutionProgress::resumed_at(stage, action),
            None => ExecutionProgress::new(),
        }));

        let ctx = ExecContext {
            shell: ShellExecutor,
            state: Arc::clone(&self.state),
            control: control.clone(),
            progress: Arc::clone(&progress),
            report: Arc::new(ReportWriter::new(self.config.report_path())),
        };

        let monitor_handle = self.spawn_monitor(&control);

        let procedure = Procedure::new(spec);
        let outcome = procedure.execute(&ctx, resume_cursor).await;

        monitor_handle.await_completion().await;

        self.finalize(outcome.status, &progress);
        Ok(outcome.status)
    }

    /// Validate the on-disk checkpoint against the requested mode and
    /// stamp the new run's initial record. Returns the resume cursor when
    /// re-entering an interrupted run.
    fn prepare_checkpoint(
        &self,
        sketch_path: &Path,
        spec: &ProcedureSpec,
        resume: bool,
    ) -> Result<Option<(usize, usize)>> {
        let snapshot = self.state.get_full_state()?;

        let (label, cursor) = if resume {
            let Some(snapshot) = snapshot else {
                return Err(FlowError::NotRunning(
                    "no checkpoint to resume from".into(),
                ));
            };

            let cursor = if snapshot.current_stage.is_empty() {
                None
            } else {
                // Re-validate the recorded cursor against this sketch; a
                // mismatch means the checkpoint belongs to another sketch.
                let located = spec
                    .locate(&snapshot.current_stage, &snapshot.current_action)
                    .ok_or_else(|| {
                        FlowError::Validation(format!(
                            "checkpoint cursor ({}, {}) does not match sketch {}",
                            snapshot.current_stage,
                            snapshot.current_action,
                            sketch_path.display()
                        ))
                    })?;
                Some(located)
            };

            ("resumed", cursor)
        } else {
            if snapshot.is_some_and(|snap| snap.is_active()) {
                return Err(FlowError::AlreadyRunning(
                    "checkpoint reports an active procedure; resume or purge first".into(),
                ));
            }
            // Drop any stale cursor left by a previous failed or stopped
            // run before stamping the fresh record.
            self.state.set_state(false, "cleared")?;
            ("started", None)
        };

        // A command left pending by a previous run (written as it
        // finished, or against a crashed run) targets that run, not this
        // one. Drop it so the monitor cannot pick it up.
        if let Some(stale) = self.state.take_command()? {
            warn!(command = %stale.kind, "discarding stale control command");
        }

        self.state.set_state(true, label)?;
        self.state
            .record_sketch(&sketch_path.to_string_lossy())?;
        Ok(cursor)
    }

    /// Spawn the control monitor with callbacks that flip the run flags
    /// and mirror the lifecycle label into the checkpoint.
    fn spawn_monitor(&self, control: &RunControl) -> crate::state::monitor::StateMonitorHandle {
        let cancel = CancellationToken::new();

        let pause_control = control.clone();
        let pause_state = Arc::clone(&self.state);
        let pause_machine = Arc::clone(&self.machine);

        let resume_control = control.clone();
        let resume_state = Arc::clone(&self.state);
        let resume_machine = Arc::clone(&self.machine);

        let stop_control = control.clone();

        StateMonitor::new(Arc::clone(&self.state), self.config.poll_interval(), cancel)
            .on_command(
                CommandKind::Pause,
                Box::new(move || {
                    pause_control.request_pause();
                    set_state_of(&pause_machine, EngineState::Paused);
                    if let Err(err) = pause_state.set_state(true, "paused") {
                        error!(%err, "failed to record paused label");
                    }
                }),
            )
            .on_command(
                CommandKind::Resume,
                Box::new(move || {
                    resume_control.clear_pause();
                    set_state_of(&resume_machine, EngineState::Running);
                    if let Err(err) = resume_state.set_state(true, "resumed") {
                        error!(%err, "failed to record resumed label");
                    }
                }),
            )
            .on_command(
                CommandKind::Stop,
                Box::new(move || {
                    stop_control.request_stop();
                }),
            )
            .on_command(
                CommandKind::Purge,
                Box::new(|| {
                    warn!("purge command refused while procedure is active");
                }),
            )
            .spawn()
    }

    /// Record the terminal state in memory and on disk. Natural
    /// completion clears the checkpoint; failed and stopped runs keep it
    /// so the last attempted stage/action stays observable.
    fn finalize(&self, status: RunStatus, progress: &Arc<Mutex<ExecutionProgress>>) {
        let (machine_state, active, label) = match status {
            RunStatus::Completed => (EngineState::Completed, false, "completed"),
            RunStatus::Failed => (EngineState::Failed, true, "failed"),
            RunStatus::Stopped => (EngineState::Stopped, true, "stopped"),
        };

        self.set_machine(machine_state);
        if let Ok(mut cursor) = progress.lock() {
            cursor.status = machine_state;
        }

        if let Err(err) = self.state.set_state(active, label) {
            error!(%err, label, "failed to record terminal state");
        }

        info!(status = %status, "procedure run finished");
    }

    /// Require an active on-disk run for a controller operation.
    fn require_active(&self, operation: &str) -> Result<StateSnapshot> {
        match self.state.get_full_state()? {
            Some(snapshot) if snapshot.is_active() => Ok(snapshot),
            _ => Err(FlowError::NotRunning(format!(
                "cannot {operation}: no active procedure"
            ))),
        }
    }

    fn set_machine(&self, next: EngineState) {
        set_state_of(&self.machine, next);
    }
}

fn set_state_of(machine: &Arc<Mutex<EngineState>>, next: EngineState) {
    if let Ok(mut state) = machine.lock() {
        *state = next;
    }
}
