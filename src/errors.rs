//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum FlowError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Malformed sketch detected before execution starts.
    Validation(String),
    /// Command could not be launched at all.
    Execution(String),
    /// Command exceeded its timeout (distinct from a nonzero exit).
    Timeout(String),
    /// Checkpoint or command-channel file unreadable/unwritable.
    StateIo(String),
    /// A procedure is already running for this checkpoint path.
    AlreadyRunning(String),
    /// State files are in use by an active procedure.
    InUse(String),
    /// Control command targeted a procedure that is not running.
    NotRunning(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for FlowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Execution(msg) => write!(f, "execution: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::StateIo(msg) => write!(f, "state io: {msg}"),
            Self::AlreadyRunning(msg) => write!(f, "already running: {msg}"),
            Self::InUse(msg) => write!(f, "in use: {msg}"),
            Self::NotRunning(msg) => write!(f, "not running: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<toml::de::Error> for FlowError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for FlowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
