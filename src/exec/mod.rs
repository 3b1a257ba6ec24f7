//! Procedure execution modules.
//!
//! Covers shell command execution, the Action/Stage/Procedure hierarchy,
//! and the shared execution context threaded through it.

pub mod action;
pub mod context;
pub mod procedure;
pub mod shell;
pub mod stage;
