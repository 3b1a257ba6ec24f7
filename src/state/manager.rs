//! Checkpoint record ownership and atomic persistence.
//!
//! The checkpoint is a single-writer, one-line record rewritten atomically
//! (write-temp-then-rename) after every execution transition, so a
//! separate observer process never sees a partial record. The control
//! channel lives in a physically separate file owned by the same manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::channel::ControlChannel;
use crate::model::command::{CommandKind, ControlCommand};
use crate::{FlowError, Result};

/// Number of comma-separated fields in the checkpoint record.
const RECORD_FIELDS: usize = 5;

/// Lifecycle labels that indicate a run currently owns the checkpoint.
const ACTIVE_LABELS: [&str; 3] = ["started", "resumed", "paused"];

/// Decoded checkpoint record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Last lifecycle label (`started`, `paused`, `resumed`, `stopped`,
    /// `failed`).
    pub action_label: String,
    /// Sketch file the run was started from.
    pub sketch_file: String,
    /// Name of the stage last attempted.
    pub current_stage: String,
    /// Name of the action last attempted.
    pub current_action: String,
    /// RFC 3339 timestamp of the last rewrite.
    pub timestamp: String,
}

impl StateSnapshot {
    /// Whether the record describes a run that still owns the checkpoint.
    #[must_use]
    pub fn is_active(&self) -> bool {
        ACTIVE_LABELS.contains(&self.action_label.as_str())
    }

    /// Whether the run is suspended waiting for resume.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.action_label == "paused"
    }
}

/// Owner of the on-disk checkpoint record and the control-command channel.
pub struct StateManager {
    state_path: PathBuf,
    report_path: PathBuf,
    channel: Arc<dyn ControlChannel>,
}

impl StateManager {
    /// Construct a manager over the given checkpoint and report paths and
    /// control channel.
    #[must_use]
    pub fn new(
        state_path: PathBuf,
        report_path: PathBuf,
        channel: Arc<dyn ControlChannel>,
    ) -> Self {
        Self {
            state_path,
            report_path,
            channel,
        }
    }

    /// Path of the checkpoint record file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Set the overall run state. Deactivating clears the record entirely;
    /// activating rewrites the lifecycle label while preserving the cursor
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the record cannot be rewritten.
    pub fn set_state(&self, active: bool, label: &str) -> Result<()> {
        if !active {
            // An empty record reads back as no state at all.
            self.write_raw("")?;
            debug!(label, "checkpoint cleared");
            return Ok(());
        }

        let mut fields = self.read_fields()?.unwrap_or_default();
        fields[0] = label.to_owned();
        self.write_fields(&fields)?;
        debug!(label, "checkpoint label set");
        Ok(())
    }

    /// Record which sketch file the current run was started from.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the record cannot be rewritten.
    pub fn record_sketch(&self, sketch_file: &str) -> Result<()> {
        self.update_field(1, sketch_file)
    }

    /// Record the stage currently being attempted.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the record cannot be rewritten.
    pub fn record_stage(&self, stage_name: &str) -> Result<()> {
        self.update_field(2, stage_name)
    }

    /// Record the action currently being attempted.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the record cannot be rewritten.
    pub fn record_action(&self, action_name: &str) -> Result<()> {
        self.update_field(3, action_name)
    }

    /// Read the full checkpoint record; `None` when no run has persisted
    /// state (missing or empty file).
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the record exists but cannot be
    /// read.
    pub fn get_full_state(&self) -> Result<Option<StateSnapshot>> {
        let Some(fields) = self.read_fields()? else {
            return Ok(None);
        };

        Ok(Some(StateSnapshot {
            action_label: fields[0].clone(),
            sketch_file: fields[1].clone(),
            current_stage: fields[2].clone(),
            current_action: fields[3].clone(),
            timestamp: fields[4].clone(),
        }))
    }

    /// Publish a control command for the runner to pick up.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the channel write fails.
    pub fn send_command(&self, kind: CommandKind) -> Result<()> {
        self.channel.send(&ControlCommand::now(kind))
    }

    /// Consume the pending control command, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if the channel cannot be read or
    /// cleared.
    pub fn take_command(&self) -> Result<Option<ControlCommand>> {
        self.channel.take()
    }

    /// Delete the checkpoint, pending command, and report files.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StateIo`] if any file cannot be removed.
    pub fn purge(&self) -> Result<()> {
        remove_if_exists(&self.state_path)?;
        remove_if_exists(&self.report_path)?;
        self.channel.clear()?;
        info!("state and report data purged");
        Ok(())
    }

    /// Rewrite one record field, refreshing the timestamp.
    fn update_field(&self, index: usize, value: &str) -> Result<()> {
        let mut fields = self.read_fields()?.unwrap_or_default();
        fields[index] = value.to_owned();
        self.write_fields(&fields)
    }

    /// Read the record split into exactly [`RECORD_FIELDS`] fields.
    fn read_fields(&self) -> Result<Option<[String; RECORD_FIELDS]>> {
        let raw = match std::fs::read_to_string(&self.state_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(FlowError::StateIo(format!("cannot read checkpoint: {err}")));
            }
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let mut fields: [String; RECORD_FIELDS] = Default::default();
        for (slot, value) in fields.iter_mut().zip(trimmed.split(',')) {
            *slot = value.to_owned();
        }
        Ok(Some(fields))
    }

    /// Join the fields, refresh the timestamp, and rewrite atomically.
    fn write_fields(&self, fields: &[String; RECORD_FIELDS]) -> Result<()> {
        let mut stamped = fields.clone();
        stamped[RECORD_FIELDS - 1] = Utc::now().to_rfc3339();
        self.write_record(&stamped)
    }

    fn write_record(&self, fields: &[String; RECORD_FIELDS]) -> Result<()> {
        self.write_raw(&fields.join(","))
    }

    /// Atomically replace the checkpoint file contents.
    fn write_raw(&self, contents: &str) -> Result<()> {
        let dir = self.state_path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir).map_err(|err| {
            FlowError::StateIo(format!("cannot create checkpoint temp file: {err}"))
        })?;

        std::fs::write(tmp.path(), contents)
            .map_err(|err| FlowError::StateIo(format!("cannot write checkpoint: {err}")))?;

        tmp.persist(&self.state_path)
            .map_err(|err| FlowError::StateIo(format!("cannot replace checkpoint: {err}")))?;

        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(FlowError::StateIo(format!(
            "cannot remove {}: {err}",
            path.display()
        ))),
    }
}
