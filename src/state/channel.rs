//! Cross-process control-command channel.
//!
//! The runner and a controller invocation are unrelated OS processes with
//! no shared memory, so the command channel is modeled as a capability
//! trait. The default implementation is file-backed; a socket- or
//! pipe-backed implementation can substitute without touching the
//! procedure execution contracts.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::model::command::ControlCommand;
use crate::{FlowError, Result};

/// Transport for pending control commands between controller and runner.
///
/// The channel holds at most the latest pending command; taking a command
/// consumes it so it is never redelivered.
pub trait ControlChannel: Send + Sync {
    /// Publish a command, replacing any still-pending one.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the command cannot be written.
    fn send(&self, command: &ControlCommand) -> Result<()>;

    /// Take the pending command, if any, clearing it in the same step.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the channel cannot be read or
    /// cleared.
    fn take(&self) -> Result<Option<ControlCommand>>;

    /// Discard any pending command without dispatching it.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the channel cannot be cleared.
    fn clear(&self) -> Result<()>;
}

/// File-backed control channel: one line `command,timestamp`, deleted on
/// consume. Writes go through a temp file plus rename so a polling reader
/// never observes a partial record.
#[derive(Debug, Clone)]
pub struct FileChannel {
    path: PathBuf,
}

impl FileChannel {
    /// Construct a channel rooted at the given command-file path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the backing command file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlChannel for FileChannel {
    fn send(&self, command: &ControlCommand) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir)
            .map_err(|err| FlowError::StateIo(format!("cannot create command temp file: {err}")))?;

        std::fs::write(tmp.path(), command.to_line())
            .map_err(|err| FlowError::StateIo(format!("cannot write command: {err}")))?;

        tmp.persist(&self.path)
            .map_err(|err| FlowError::StateIo(format!("cannot publish command: {err}")))?;

        debug!(command = %command.kind, path = %self.path.display(), "control command sent");
        Ok(())
    }

    fn take(&self) -> Result<Option<ControlCommand>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(FlowError::StateIo(format!("cannot read command: {err}")));
            }
        };

        // Consume before dispatching so a crash mid-dispatch cannot
        // redeliver the command.
        std::fs::remove_file(&self.path)
            .map_err(|err| FlowError::StateIo(format!("cannot clear command: {err}")))?;

        let command = ControlCommand::parse_line(&raw);
        if command.is_none() && !raw.trim().is_empty() {
            warn!(raw = raw.trim(), "ignoring unknown control command");
        }
        Ok(command)
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FlowError::StateIo(format!("cannot clear command: {err}"))),
        }
    }
}
