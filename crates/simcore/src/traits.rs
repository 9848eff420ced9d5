use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Opaque reference to a body created by a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub usize);

impl std::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

// Joint Traits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuationMode {
    Velocity,
    Torque,
}

/// Actuation directive for a single joint.
///
/// A directive stays in effect on every subsequent step until replaced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointCommand {
    /// Servo the joint toward a target velocity (rad/s) without exceeding
    /// `force_limit` (N·m) of motor torque.
    Velocity { target_velocity: f64, force_limit: f64 },
    /// Apply a raw torque (N·m).
    Torque { torque: f64 },
}

impl JointCommand {
    pub fn mode(&self) -> ActuationMode {
        match self {
            JointCommand::Velocity { .. } => ActuationMode::Velocity,
            JointCommand::Torque { .. } => ActuationMode::Torque,
        }
    }

    /// A zero-force velocity motor; leaves the joint free to move.
    pub fn released() -> Self {
        JointCommand::Velocity {
            target_velocity: 0.0,
            force_limit: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointState {
    pub position: f64,
    pub velocity: f64,
    /// Fx, Fy, Fz, Mx, My, Mz carried by the joint.
    pub reaction_forces: [f64; 6],
    pub applied_motor_torque: f64,
}

// General Traits
#[derive(Debug, Clone, Copy)]
pub struct SimContext {
    pub dt: f64,
    pub t: f64,
}

pub trait Model {
    fn reset(&mut self);
}

/// Narrow interface to a stepped rigid-body simulation.
///
/// Bodies are created from an opaque description string; callers never
/// inspect what the description means.
pub trait Simulation {
    fn create_body(&mut self, description: &str) -> Result<BodyHandle, SimError>;

    fn set_gravity(&mut self, gravity: [f64; 3]) -> Result<(), SimError>;

    fn set_timestep(&mut self, dt: f64) -> Result<(), SimError>;

    fn timestep(&self) -> f64;

    fn set_joint_actuation(
        &mut self,
        body: BodyHandle,
        joint: usize,
        command: JointCommand,
    ) -> Result<(), SimError>;

    fn joint_state(&self, body: BodyHandle, joint: usize) -> Result<JointState, SimError>;

    /// Advances simulated time by exactly one configured timestep.
    fn step(&mut self) -> Result<(), SimError>;
}

/// One actuated degree of freedom on a simulated body.
///
/// The handle owns nothing; the simulation is borrowed on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointHandle {
    pub body: BodyHandle,
    pub joint: usize,
}

impl JointHandle {
    pub fn new(body: BodyHandle, joint: usize) -> Self {
        Self { body, joint }
    }

    pub fn state<S: Simulation + ?Sized>(&self, sim: &S) -> Result<JointState, SimError> {
        sim.joint_state(self.body, self.joint)
    }

    pub fn position<S: Simulation + ?Sized>(&self, sim: &S) -> Result<f64, SimError> {
        Ok(self.state(sim)?.position)
    }

    pub fn command<S: Simulation + ?Sized>(
        &self,
        sim: &mut S,
        command: JointCommand,
    ) -> Result<(), SimError> {
        sim.set_joint_actuation(self.body, self.joint, command)
    }
}

impl std::fmt::Display for JointHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/joint#{}", self.body, self.joint)
    }
}
