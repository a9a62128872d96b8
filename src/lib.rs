//! IntersectionSim - signalized intersection simulator.
//!
//! Autonomous vehicles follow waypoint trajectories through a four-way
//! intersection under closed-loop steering, torque and braking control,
//! react to traffic lights and to each other, and leave a per-vehicle state
//! history behind for offline labeling.

pub mod error;
pub mod recording;
pub mod simulation;

pub use error::{ConfigError, RecordError, SimError};
pub use recording::recorder::{FileRecorder, MemoryRecorder, RecorderConfig, StateRecorder, WriteMode};
pub use simulation::session::{Session, SessionConfig, TickReport};
pub use simulation::SimulationPlugin;
