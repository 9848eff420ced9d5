//! Core simulation vocabulary
//!
//! This crate provides:
//! - The narrow `Simulation` interface consumed by controllers
//! - Body and joint handles, joint commands and joint state
//! - The simulation error taxonomy
//! - Scalar integrators used by simulation backends

pub mod error;
pub mod integrators;
pub mod traits;

pub use error::*;
pub use integrators::*;
pub use traits::*;
