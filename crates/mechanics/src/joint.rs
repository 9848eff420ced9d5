//! Revolute joint dynamics
//!
//! Provides:
//! - Joint friction models (Coulomb, viscous, combined)
//! - Motor torque resolution for velocity servos and raw torque commands
//! - Per-joint state advanced by a scalar integrator

use serde::{Deserialize, Serialize};
use simcore::{DofState, Integrator, JointCommand, SimContext};

/// Velocity below which Coulomb friction is treated as stuck.
const STICTION_THRESHOLD: f64 = 1e-4;

/// Friction torque acting on a revolute joint
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum JointFriction {
    #[default]
    None,
    /// Viscous damping, N·m·s/rad
    Viscous { damping: f64 },
    /// Constant-magnitude kinetic friction torque, N·m
    Coulomb { torque: f64 },
    Combined { coulomb_torque: f64, damping: f64 },
}

impl JointFriction {
    /// Friction torque opposing `velocity`.
    pub fn torque(&self, velocity: f64) -> f64 {
        let coulomb = |magnitude: f64| {
            if velocity.abs() < STICTION_THRESHOLD {
                0.0
            } else {
                -magnitude * velocity.signum()
            }
        };

        match *self {
            JointFriction::None => 0.0,
            JointFriction::Viscous { damping } => -damping * velocity,
            JointFriction::Coulomb { torque } => coulomb(torque),
            JointFriction::Combined { coulomb_torque, damping } => {
                coulomb(coulomb_torque) - damping * velocity
            }
        }
    }
}

/// Physical parameters of one joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JointDynamics {
    /// Effective inertia about the joint axis, kg·m²
    pub inertia: f64,
    pub friction: JointFriction,
}

impl Default for JointDynamics {
    fn default() -> Self {
        Self {
            inertia: 0.1,
            friction: JointFriction::None,
        }
    }
}

impl JointDynamics {
    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = inertia;
        self
    }

    pub fn with_friction(mut self, friction: JointFriction) -> Self {
        self.friction = friction;
        self
    }
}

/// A simulated joint: state, active actuation directive, and last motor torque.
#[derive(Debug, Clone)]
pub struct JointBody {
    pub dynamics: JointDynamics,
    pub state: DofState,
    pub command: JointCommand,
    /// Motor torque applied during the last step, N·m
    pub motor_torque: f64,
}

impl JointBody {
    pub fn new(dynamics: JointDynamics, default_command: JointCommand) -> Self {
        Self {
            dynamics,
            state: DofState::default(),
            command: default_command,
            motor_torque: 0.0,
        }
    }

    /// Motor torque for this step given every other torque on the joint.
    ///
    /// A velocity servo asks for the torque that reaches the target velocity
    /// within one step, clamped to its force limit.
    pub fn resolve_motor_torque(&self, dt: f64, passive_torque: f64) -> f64 {
        match self.command {
            JointCommand::Torque { torque } => torque,
            JointCommand::Velocity { target_velocity, force_limit } => {
                let required = self.dynamics.inertia * (target_velocity - self.state.velocity) / dt
                    - passive_torque;
                let limit = force_limit.abs();
                required.max(-limit).min(limit)
            }
        }
    }

    /// Advances the joint one step under `external_torque` (gravity, coupling).
    pub fn step<I: Integrator>(&mut self, integrator: &I, ctx: &SimContext, external_torque: f64) {
        let passive = external_torque + self.dynamics.friction.torque(self.state.velocity);
        self.motor_torque = self.resolve_motor_torque(ctx.dt, passive);
        let acceleration = (self.motor_torque + passive) / self.dynamics.inertia;
        integrator.step(ctx, &mut self.state, acceleration);
    }

    pub fn is_finite(&self) -> bool {
        self.state.position.is_finite() && self.state.velocity.is_finite()
    }
}
