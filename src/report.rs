//! JSONL run report writer.
//!
//! Appends one JSON object per executed action to the configured report
//! file. The report is exclusive to the runner process, so plain appends
//! suffice; `purge` removes the file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::{FlowError, Result};

/// One report line describing a finished action.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// When the action finished.
    pub timestamp: DateTime<Utc>,
    /// Stage the action belongs to.
    pub stage: String,
    /// Action name.
    pub action: String,
    /// Outcome label: `ok`, `failed`, or `timed_out`.
    pub status: String,
    /// Main-command exit code, when the command ran to completion.
    pub exit_code: Option<i32>,
    /// Main-command wall time in milliseconds.
    pub elapsed_ms: u64,
    /// Whether the outcome escalated to a fatal procedure abort.
    pub fatal: bool,
}

/// Append-only JSONL report writer.
pub struct ReportWriter {
    path: PathBuf,
    // Serializes appends from the execution task; the file itself is
    // runner-exclusive.
    lock: Mutex<()>,
}

impl ReportWriter {
    /// Construct a writer appending to the given path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append one entry as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Io`] if the report file cannot be opened or
    /// written.
    pub fn append(&self, entry: &ReportEntry) -> Result<()> {
        let line = serde_json::to_string(entry)
            .map_err(|err| FlowError::Io(format!("failed to serialize report entry: {err}")))?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| FlowError::Io("report writer mutex poisoned".into()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| {
                FlowError::Io(format!(
                    "failed to open report {}: {err}",
                    self.path.display()
                ))
            })?;

        if let Err(err) = writeln!(file, "{line}") {
            warn!(%err, "failed to append report entry");
            return Err(FlowError::Io(format!("report write failed: {err}")));
        }

        Ok(())
    }
}
