//! Domain model module declarations.

pub mod command;
pub mod progress;
pub mod spec;
