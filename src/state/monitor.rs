//! Background control-channel poller.
//!
//! The runner spawns a [`StateMonitor`] next to the main execution task.
//! It polls the command channel at a fixed interval and dispatches the
//! registered callback for each detected command exactly once; the channel
//! consumes the command in the same step so it is never redelivered.
//! Unknown commands are ignored. The loop is cancelable through a
//! `CancellationToken` and stops promptly when the engine finishes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::manager::StateManager;
use crate::model::command::CommandKind;

/// Callback invoked when a control command is observed.
pub type CommandCallback = Box<dyn Fn() + Send + Sync>;

/// Builder for the background poll loop.
///
/// Register callbacks with [`on_command`](Self::on_command), then call
/// [`spawn`](Self::spawn) to start polling.
pub struct StateMonitor {
    state: Arc<StateManager>,
    poll_interval: Duration,
    cancel: CancellationToken,
    callbacks: HashMap<CommandKind, CommandCallback>,
}

impl StateMonitor {
    /// Construct a monitor over the given state manager (does not start
    /// polling yet).
    #[must_use]
    pub fn new(state: Arc<StateManager>, poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            state,
            poll_interval,
            cancel,
            callbacks: HashMap::new(),
        }
    }

    /// Register the callback for one command kind, replacing any previous
    /// registration. At most one callback per kind.
    #[must_use]
    pub fn on_command(mut self, kind: CommandKind, callback: CommandCallback) -> Self {
        self.callbacks.insert(kind, callback);
        self
    }

    /// Spawn the background poll task and return a handle for stopping it.
    #[must_use]
    pub fn spawn(self) -> StateMonitorHandle {
        let cancel_for_handle = self.cancel.clone();
        let poll_interval = self.poll_interval;

        let task_handle = tokio::spawn(Self::run(
            self.state,
            poll_interval,
            self.cancel,
            self.callbacks,
        ));

        info!(
            poll_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
            "state monitor started"
        );

        StateMonitorHandle {
            join_handle: Some(task_handle),
            cancel: cancel_for_handle,
        }
    }

    /// Core poll loop.
    async fn run(
        state: Arc<StateManager>,
        poll_interval: Duration,
        cancel: CancellationToken,
        callbacks: HashMap<CommandKind, CommandCallback>,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("state monitor cancelled");
                    return;
                }
                () = tokio::time::sleep(poll_interval) => {}
            }

            match state.take_command() {
                Ok(Some(command)) => {
                    if let Some(callback) = callbacks.get(&command.kind) {
                        info!(command = %command.kind, "control command observed");
                        callback();
                    } else {
                        debug!(command = %command.kind, "no callback registered, ignoring");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    // A transient read failure only delays command pickup.
                    error!(%err, "failed to poll control channel");
                }
            }
        }
    }
}

/// Handle returned from [`StateMonitor::spawn`].
pub struct StateMonitorHandle {
    join_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl StateMonitorHandle {
    /// Signal the poll loop to stop and wait for it to exit.
    pub async fn await_completion(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for StateMonitorHandle {
    /// Cancel the background poll task when the handle is dropped.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
