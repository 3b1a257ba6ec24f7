//! State persistence and cross-process control.
//!
//! Covers the on-disk checkpoint record, the control-command channel used
//! by separate controller invocations, and the background monitor that
//! polls the channel inside the runner.

pub mod channel;
pub mod manager;
pub mod monitor;
