//! Per-vehicle state history: screen projection, snapshot lines and the
//! recorders that persist them.

pub mod projection;
pub mod recorder;
pub mod snapshot;
