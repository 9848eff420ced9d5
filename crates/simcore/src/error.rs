use thiserror::Error;

use crate::traits::BodyHandle;

/// Failures surfaced by a simulation backend.
///
/// A control run treats every variant as fatal: simulation state cannot be
/// resumed mid-loop once one of these has been raised.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("no model registered for description `{0}`")]
    UnknownModel(String),

    #[error("{0} does not exist")]
    InvalidBody(BodyHandle),

    #[error("{body} has no joint {joint} (joint count {count})")]
    InvalidJoint {
        body: BodyHandle,
        joint: usize,
        count: usize,
    },

    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    #[error("invalid command for {body} joint {joint}: {reason}")]
    InvalidCommand {
        body: BodyHandle,
        joint: usize,
        reason: String,
    },

    #[error("{body} joint {joint} diverged at t = {t:.6} s")]
    Diverged { body: BodyHandle, joint: usize, t: f64 },
}
