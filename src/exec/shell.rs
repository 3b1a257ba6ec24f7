//! Timeout-bounded shell command execution.
//!
//! Runs one command through `sh -c` in its own process group. Output is
//! drained by concurrent reader tasks so high-volume output cannot
//! deadlock the wait. When a timeout is set, completion races the timer;
//! whichever resolves first cancels the other. On timeout the whole
//! process group is killed so shell-spawned grandchildren die too.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sentinel exit code reported for a killed (timed-out) command.
pub const KILLED_EXIT_CODE: i32 = 124;

/// Result of one shell command invocation. Created fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code; `None` when the process was killed by a signal or never
    /// launched.
    pub exit_code: Option<i32>,
    /// Captured standard output, trailing newlines stripped.
    pub stdout: String,
    /// Captured standard error, trailing newlines stripped.
    pub stderr: String,
    /// Wall time from spawn to completion or kill.
    pub elapsed: Duration,
    /// Whether the timeout elapsed before the command finished.
    pub timed_out: bool,
    /// Set when the shell itself could not be launched; never an `Err`.
    pub launch_error: Option<String>,
}

impl CommandResult {
    /// Whether the command ran to completion with exit code zero.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.launch_error.is_none() && self.exit_code == Some(0)
    }

    fn launch_failure(message: String, elapsed: Duration) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            elapsed,
            timed_out: false,
            launch_error: Some(message),
        }
    }
}

/// Executes shell commands to completion or timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    /// Run a command through the OS shell, optionally bounded by a
    /// timeout. Failures are always reported inside the result.
    pub async fn execute(&self, command: &str, timeout: Option<Duration>) -> CommandResult {
        let start = Instant::now();
        debug!(command, ?timeout, "executing shell command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout kill reaches shell-spawned
        // grandchildren as well.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(command, %err, "failed to launch shell");
                return CommandResult::launch_failure(
                    format!("failed to launch shell: {err}"),
                    start.elapsed(),
                );
            }
        };

        let stdout_task = spawn_drain(child.stdout.take());
        let stderr_task = spawn_drain(child.stderr.take());

        let (exit_code, timed_out, wait_error) = match timeout {
            Some(limit) => {
                tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => (status.code(), false, None),
                        Err(err) => (None, false, Some(err.to_string())),
                    },
                    () = tokio::time::sleep(limit) => {
                        warn!(command, timeout_secs = limit.as_secs(), "command timed out, killing process group");
                        kill_process_group(&mut child).await;
                        (Some(KILLED_EXIT_CODE), true, None)
                    }
                }
            }
            None => match child.wait().await {
                Ok(status) => (status.code(), false, None),
                Err(err) => (None, false, Some(err.to_string())),
            },
        };

        let stdout = collect_drained(stdout_task).await;
        let stderr = collect_drained(stderr_task).await;
        let elapsed = start.elapsed();

        debug!(
            command,
            ?exit_code,
            timed_out,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "shell command finished"
        );

        CommandResult {
            exit_code,
            stdout,
            stderr,
            elapsed,
            timed_out,
            launch_error: wait_error.map(|err| format!("failed to await command: {err}")),
        }
    }
}

/// Drain a child output pipe on its own task so the pipe buffer can never
/// fill up and stall the child while the main task waits.
fn spawn_drain(
    pipe: Option<impl tokio::io::AsyncRead + Unpin + Send + 'static>,
) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer).await;
            buffer
        })
    })
}

async fn collect_drained(task: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(task) = task else {
        return String::new();
    };
    let bytes = task.await.unwrap_or_default();
    let text = String::from_utf8_lossy(&bytes);
    text.trim_end_matches('\n').to_owned()
}

/// Kill the child's entire process group, then reap the child.
async fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // The child was started as its own group leader, so its pid is
        // the pgid.
        if let Ok(pid) = i32::try_from(pid) {
            if let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                warn!(%err, pid, "killpg failed, falling back to direct kill");
                let _ = child.kill().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.kill().await;
    }

    // Reap so the killed child does not linger as a zombie.
    let _ = child.wait().await;
}
