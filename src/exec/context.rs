//! Shared execution context and run control flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::error;

use super::shell::ShellExecutor;
use crate::model::progress::ExecutionProgress;
use crate::report::{ReportEntry, ReportWriter};
use crate::state::manager::StateManager;

#[derive(Default)]
struct ControlFlags {
    pause: AtomicBool,
    stop: AtomicBool,
    changed: Notify,
}

/// Pause/stop flags set by the monitor task and consulted by the stage
/// loop between actions. Cloning shares the underlying flags.
#[derive(Clone, Default)]
pub struct RunControl {
    flags: Arc<ControlFlags>,
}

impl RunControl {
    /// Request suspension at the next action boundary.
    pub fn request_pause(&self) {
        self.flags.pause.store(true, Ordering::SeqCst);
        self.flags.changed.notify_waiters();
    }

    /// Clear a pause request and wake the suspended stage loop.
    pub fn clear_pause(&self) {
        self.flags.pause.store(false, Ordering::SeqCst);
        self.flags.changed.notify_waiters();
    }

    /// Request a halt once the in-flight action completes.
    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
        self.flags.changed.notify_waiters();
    }

    /// Whether a stop is currently requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    /// Honor pause/stop at an action boundary. Returns `true` when a stop
    /// is requested; otherwise suspends while paused until resume or stop.
    ///
    /// The notified future is registered before the flags are re-checked
    /// so a flag flip between check and await cannot be missed.
    pub async fn wait_at_boundary(&self) -> bool {
        loop {
            if self.flags.stop.load(Ordering::SeqCst) {
                return true;
            }
            if !self.flags.pause.load(Ordering::SeqCst) {
                return false;
            }

            let notified = self.flags.changed.notified();
            if self.flags.stop.load(Ordering::SeqCst) || !self.flags.pause.load(Ordering::SeqCst) {
                continue;
            }
            notified.await;
        }
    }
}

/// Everything an executing procedure needs: the shell, the checkpoint
/// owner, the control flags, the progress cursor, and the report sink.
pub struct ExecContext {
    /// Shell executor, shared by every command in the run.
    pub shell: ShellExecutor,
    /// Checkpoint and command-channel owner.
    pub state: Arc<StateManager>,
    /// Pause/stop flags from the monitor.
    pub control: RunControl,
    /// In-memory progress cursor, advanced as actions are attempted.
    pub progress: Arc<Mutex<ExecutionProgress>>,
    /// Run report sink.
    pub report: Arc<ReportWriter>,
}

impl ExecContext {
    /// Persist the current action cursor. A checkpoint write failure only
    /// degrades crash-resume fidelity, so it is logged loudly and the run
    /// continues.
    pub fn checkpoint_action(&self, action_name: &str) {
        if let Err(err) = self.state.record_action(action_name) {
            error!(%err, action = action_name, "failed to checkpoint action cursor");
        }
    }

    /// Persist the current stage cursor; same failure policy as
    /// [`checkpoint_action`](Self::checkpoint_action).
    pub fn checkpoint_stage(&self, stage_name: &str) {
        if let Err(err) = self.state.record_stage(stage_name) {
            error!(%err, stage = stage_name, "failed to checkpoint stage cursor");
        }
    }

    /// Advance the in-memory cursor to the given stage/action indices.
    pub fn advance_cursor(&self, stage_index: usize, action_index: usize) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.stage_index = stage_index;
            progress.action_index = action_index;
        }
    }

    /// Append a report line; failures are logged and swallowed so
    /// reporting can never abort execution.
    pub fn report_entry(&self, entry: &ReportEntry) {
        if let Err(err) = self.report.append(entry) {
            error!(%err, "failed to append report entry");
        }
    }
}
