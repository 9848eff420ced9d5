//! Control systems for joint trajectory tracking
//!
//! This crate provides:
//! - A discrete PD controller with actuator saturation
//! - Fixed-rate reference trajectories and task-space path conversion
//! - A lockstep tracking loop against any `Simulation`

pub mod pd;
pub mod tracking;
pub mod trajectory;

pub use pd::*;
pub use tracking::*;
pub use trajectory::*;
