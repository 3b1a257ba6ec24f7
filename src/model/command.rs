//! Control commands exchanged between a controller invocation and a runner.

use chrono::{DateTime, Utc};

/// The four externally issuable control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Suspend execution at the next action boundary.
    Pause,
    /// Resume a paused procedure.
    Resume,
    /// Halt once the in-flight action completes.
    Stop,
    /// Delete checkpoint and report data.
    Purge,
}

impl CommandKind {
    /// Wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Purge => "purge",
        }
    }

    /// Parse a wire name; unknown names yield `None` and are ignored by
    /// the monitor.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "stop" => Some(Self::Stop),
            "purge" => Some(Self::Purge),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pending control command with its issue timestamp. Transient:
/// consumed exactly once by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    /// Which command was issued.
    pub kind: CommandKind,
    /// When the controller wrote it.
    pub issued_at: DateTime<Utc>,
}

impl ControlCommand {
    /// Construct a command stamped with the current time.
    #[must_use]
    pub fn now(kind: CommandKind) -> Self {
        Self {
            kind,
            issued_at: Utc::now(),
        }
    }

    /// Encode as the single-line wire format `command,timestamp`.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{},{}", self.kind.as_str(), self.issued_at.to_rfc3339())
    }

    /// Decode from the wire format. Unknown command names or a blank line
    /// yield `None`; a missing or malformed timestamp falls back to now so
    /// a hand-written command file still works.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut parts = trimmed.splitn(2, ',');
        let kind = CommandKind::parse(parts.next()?.trim())?;
        let issued_at = parts
            .next()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())
            .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

        Some(Self { kind, issued_at })
    }
}
