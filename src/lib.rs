#![forbid(unsafe_code)]

//! `procflow`: procedure automation engine.
//!
//! Executes staged shell-command procedures described by JSON sketch files.
//! A running procedure can be paused, resumed, or stopped from a separate
//! process invocation through a file-based control channel, and its
//! progress is checkpointed to disk so an interrupted run can be resumed.

pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod model;
pub mod report;
pub mod sketch;
pub mod state;

pub use config::FlowConfig;
pub use errors::{FlowError, Result};
