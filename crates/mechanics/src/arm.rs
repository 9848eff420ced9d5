//! Planar two-link arm body
//!
//! Each joint is integrated independently against its own effective inertia.
//! Gravity is applied through point masses at the link midpoints using the
//! in-plane (X, Y) gravity components, so an arm lying in the horizontal
//! plane with gravity along -Z feels no gravity torque.

use nalgebra::Vector2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use simcore::{JointCommand, JointState, Model, SemiImplicitEuler, SimContext};
use thiserror::Error;

use crate::joint::{JointBody, JointDynamics};
use crate::kinematics::{GeometryError, JointConfiguration, LinkChainGeometry};

pub const JOINT_COUNT: usize = 2;

/// Force limit of the velocity motors every joint starts with, N·m
pub const DEFAULT_MOTOR_FORCE: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArmConfigError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("joint {joint} inertia must be positive and finite, got {inertia}")]
    InvalidInertia { joint: usize, inertia: f64 },
    #[error("link {link} mass must be non-negative and finite, got {mass}")]
    InvalidMass { link: usize, mass: f64 },
    #[error("position noise standard deviation must be non-negative and finite, got {0}")]
    InvalidNoise(f64),
}

/// Physical description of a planar 2R arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanarArmConfig {
    /// Link lengths (m)
    pub link_lengths: [f64; 2],
    /// Link masses (kg), lumped at each link midpoint
    pub link_masses: [f64; 2],
    pub joints: [JointDynamics; 2],
    /// Force limit of the default velocity motors, N·m
    pub default_motor_force: f64,
    /// Standard deviation of Gaussian noise on measured positions (rad)
    pub position_noise_std: f64,
    pub noise_seed: u64,
}

impl Default for PlanarArmConfig {
    fn default() -> Self {
        Self {
            link_lengths: [1.0, 1.0],
            link_masses: [1.0, 1.0],
            joints: [JointDynamics::default(); 2],
            default_motor_force: DEFAULT_MOTOR_FORCE,
            position_noise_std: 0.0,
            noise_seed: 0,
        }
    }
}

impl PlanarArmConfig {
    pub fn with_link_lengths(mut self, l1: f64, l2: f64) -> Self {
        self.link_lengths = [l1, l2];
        self
    }

    pub fn with_link_masses(mut self, m1: f64, m2: f64) -> Self {
        self.link_masses = [m1, m2];
        self
    }

    pub fn with_joint(mut self, index: usize, dynamics: JointDynamics) -> Self {
        if let Some(joint) = self.joints.get_mut(index) {
            *joint = dynamics;
        }
        self
    }

    pub fn with_position_noise(mut self, std: f64, seed: u64) -> Self {
        self.position_noise_std = std;
        self.noise_seed = seed;
        self
    }

    pub fn geometry(&self) -> Result<LinkChainGeometry, GeometryError> {
        LinkChainGeometry::new(self.link_lengths[0], self.link_lengths[1])
    }

    pub fn validate(&self) -> Result<(), ArmConfigError> {
        self.geometry()?;
        for (joint, dynamics) in self.joints.iter().enumerate() {
            if !(dynamics.inertia.is_finite() && dynamics.inertia > 0.0) {
                return Err(ArmConfigError::InvalidInertia { joint, inertia: dynamics.inertia });
            }
        }
        for (link, &mass) in self.link_masses.iter().enumerate() {
            if !(mass.is_finite() && mass >= 0.0) {
                return Err(ArmConfigError::InvalidMass { link, mass });
            }
        }
        if !(self.position_noise_std.is_finite() && self.position_noise_std >= 0.0) {
            return Err(ArmConfigError::InvalidNoise(self.position_noise_std));
        }
        Ok(())
    }
}

/// A simulated planar 2R arm
#[derive(Debug, Clone)]
pub struct PlanarArm {
    config: PlanarArmConfig,
    geometry: LinkChainGeometry,
    joints: [JointBody; 2],
    measured: [f64; 2],
    noise: Option<Normal<f64>>,
    rng: StdRng,
}

impl PlanarArm {
    pub fn new(config: PlanarArmConfig) -> Result<Self, ArmConfigError> {
        config.validate()?;
        let geometry = config.geometry()?;
        let noise = if config.position_noise_std > 0.0 {
            Some(
                Normal::new(0.0, config.position_noise_std)
                    .map_err(|_| ArmConfigError::InvalidNoise(config.position_noise_std))?,
            )
        } else {
            None
        };
        let default_command = Self::default_command(&config);

        Ok(Self {
            geometry,
            joints: config.joints.map(|dynamics| JointBody::new(dynamics, default_command)),
            measured: [0.0; 2],
            noise,
            rng: StdRng::seed_from_u64(config.noise_seed),
            config,
        })
    }

    fn default_command(config: &PlanarArmConfig) -> JointCommand {
        JointCommand::Velocity {
            target_velocity: 0.0,
            force_limit: config.default_motor_force,
        }
    }

    pub fn config(&self) -> &PlanarArmConfig {
        &self.config
    }

    pub fn geometry(&self) -> &LinkChainGeometry {
        &self.geometry
    }

    pub fn joint_count(&self) -> usize {
        JOINT_COUNT
    }

    /// True (noise-free) joint angles.
    pub fn configuration(&self) -> JointConfiguration {
        JointConfiguration::new(self.joints[0].state.position, self.joints[1].state.position)
    }

    pub fn joint(&self, index: usize) -> Option<&JointBody> {
        self.joints.get(index)
    }

    pub fn set_command(&mut self, index: usize, command: JointCommand) -> bool {
        match self.joints.get_mut(index) {
            Some(joint) => {
                joint.command = command;
                true
            }
            None => false,
        }
    }

    /// Places the arm at `joints` at rest, bypassing dynamics.
    pub fn set_configuration(&mut self, joints: JointConfiguration) {
        self.joints[0].state.position = joints.theta1;
        self.joints[1].state.position = joints.theta2;
        for joint in &mut self.joints {
            joint.state.velocity = 0.0;
        }
        self.measured = [joints.theta1, joints.theta2];
    }

    /// Gravity torque at each joint from the in-plane gravity components.
    pub fn gravity_torques(&self, gravity: [f64; 3]) -> [f64; 2] {
        let g = Vector2::new(gravity[0], gravity[1]);
        let [m1, m2] = self.config.link_masses;
        let (l1, l2) = (self.geometry.l1(), self.geometry.l2());
        let q = self.configuration();

        let u1 = Vector2::new(q.theta1.cos(), q.theta1.sin());
        let u12 = Vector2::new((q.theta1 + q.theta2).cos(), (q.theta1 + q.theta2).sin());

        // Link 2 centre of mass relative to the elbow, and both relative to the base.
        let c2_from_elbow = u12 * (l2 / 2.0);
        let c1 = u1 * (l1 / 2.0);
        let c2 = u1 * l1 + c2_from_elbow;

        let tau2 = c2_from_elbow.perp(&(g * m2));
        let tau1 = c1.perp(&(g * m1)) + c2.perp(&(g * m2));
        [tau1, tau2]
    }

    /// Advances every joint by `ctx.dt` and refreshes the measured positions.
    pub fn step_physics(&mut self, ctx: &SimContext, gravity: [f64; 3]) {
        let gravity_torque = self.gravity_torques(gravity);
        for (joint, tau_g) in self.joints.iter_mut().zip(gravity_torque) {
            joint.step(&SemiImplicitEuler, ctx, tau_g);
        }
        self.refresh_measurements();
    }

    fn refresh_measurements(&mut self) {
        for (measured, joint) in self.measured.iter_mut().zip(&self.joints) {
            let noise = self.noise.as_ref().map_or(0.0, |n| n.sample(&mut self.rng));
            *measured = joint.state.position + noise;
        }
    }

    pub fn joint_state(&self, index: usize, gravity: [f64; 3]) -> Option<JointState> {
        let joint = self.joints.get(index)?;
        let supported_mass: f64 = self.config.link_masses[index..].iter().sum();
        let tau_g = self.gravity_torques(gravity)[index];

        Some(JointState {
            position: self.measured[index],
            velocity: joint.state.velocity,
            reaction_forces: [
                -supported_mass * gravity[0],
                -supported_mass * gravity[1],
                -supported_mass * gravity[2],
                0.0,
                0.0,
                -tau_g,
            ],
            applied_motor_torque: joint.motor_torque,
        })
    }

    /// Index of the first joint whose state is no longer finite.
    pub fn diverged_joint(&self) -> Option<usize> {
        self.joints.iter().position(|joint| !joint.is_finite())
    }
}

impl Model for PlanarArm {
    fn reset(&mut self) {
        let default_command = Self::default_command(&self.config);
        self.joints = self.config.joints.map(|dynamics| JointBody::new(dynamics, default_command));
        self.measured = [0.0; 2];
        self.rng = StdRng::seed_from_u64(self.config.noise_seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    const DOWN: [f64; 3] = [0.0, -9.81, 0.0];

    #[test]
    fn test_rejects_bad_config() {
        let config = PlanarArmConfig::default().with_link_lengths(-1.0, 1.0);
        assert!(matches!(PlanarArm::new(config), Err(ArmConfigError::Geometry(_))));

        let config =
            PlanarArmConfig::default().with_joint(1, JointDynamics::default().with_inertia(0.0));
        assert!(matches!(
            PlanarArm::new(config),
            Err(ArmConfigError::InvalidInertia { joint: 1, .. })
        ));

        let config = PlanarArmConfig::default().with_position_noise(-0.1, 0);
        assert!(matches!(PlanarArm::new(config), Err(ArmConfigError::InvalidNoise(_))));
    }

    #[test]
    fn test_gravity_torque_horizontal_arm() {
        let arm = PlanarArm::new(PlanarArmConfig::default().with_link_masses(2.0, 1.0)).unwrap();
        let [tau1, tau2] = arm.gravity_torques(DOWN);

        // Link 1 CoM at 0.5 m, link 2 CoM at 1.5 m from the base, 0.5 m from the elbow.
        assert_relative_eq!(tau1, -(2.0 * 9.81 * 0.5 + 1.0 * 9.81 * 1.5), epsilon = 1e-9);
        assert_relative_eq!(tau2, -(1.0 * 9.81 * 0.5), epsilon = 1e-9);
    }

    #[test]
    fn test_gravity_torque_hanging_arm_is_zero() {
        let mut arm = PlanarArm::new(PlanarArmConfig::default()).unwrap();
        arm.set_configuration(JointConfiguration::new(-FRAC_PI_2, 0.0));
        let [tau1, tau2] = arm.gravity_torques(DOWN);
        assert_relative_eq!(tau1, 0.0, epsilon = 1e-9);
        assert_relative_eq!(tau2, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_plane_gravity_has_no_torque() {
        let arm = PlanarArm::new(PlanarArmConfig::default()).unwrap();
        assert_eq!(arm.gravity_torques([0.0, 0.0, -9.81]), [0.0, 0.0]);
    }

    #[test]
    fn test_default_motors_hold_position() {
        let mut arm = PlanarArm::new(PlanarArmConfig::default()).unwrap();
        let ctx = SimContext { dt: 1e-3, t: 0.0 };
        for _ in 0..500 {
            arm.step_physics(&ctx, DOWN);
        }
        assert_relative_eq!(arm.configuration().theta1, 0.0, epsilon = 1e-9);
        assert_relative_eq!(arm.configuration().theta2, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_released_arm_falls() {
        let mut arm = PlanarArm::new(PlanarArmConfig::default()).unwrap();
        arm.set_command(0, JointCommand::released());
        arm.set_command(1, JointCommand::released());
        let ctx = SimContext { dt: 1e-3, t: 0.0 };
        for _ in 0..100 {
            arm.step_physics(&ctx, DOWN);
        }
        assert!(arm.configuration().theta1 < 0.0);
    }

    #[test]
    fn test_joint_state_reports_motor_torque_and_load() {
        let config = PlanarArmConfig::default().with_link_masses(1.0, 0.5);
        let mut arm = PlanarArm::new(config).unwrap();
        arm.set_command(1, JointCommand::Torque { torque: 2.5 });
        arm.step_physics(&SimContext { dt: 1e-3, t: 0.0 }, [0.0, 0.0, -9.81]);

        let state = arm.joint_state(1, [0.0, 0.0, -9.81]).unwrap();
        assert_relative_eq!(state.applied_motor_torque, 2.5);
        assert_relative_eq!(state.reaction_forces[2], 0.5 * 9.81, epsilon = 1e-12);
        assert!(state.position > 0.0);

        let base = arm.joint_state(0, [0.0, 0.0, -9.81]).unwrap();
        assert_relative_eq!(base.reaction_forces[2], 1.5 * 9.81, epsilon = 1e-12);
        assert!(arm.joint_state(2, DOWN).is_none());
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let config = PlanarArmConfig::default().with_position_noise(1e-3, 42);
        let mut a = PlanarArm::new(config.clone()).unwrap();
        let mut b = PlanarArm::new(config).unwrap();
        let ctx = SimContext { dt: 1e-3, t: 0.0 };

        a.step_physics(&ctx, DOWN);
        b.step_physics(&ctx, DOWN);

        let pa = a.joint_state(0, DOWN).unwrap().position;
        let pb = b.joint_state(0, DOWN).unwrap().position;
        assert_eq!(pa, pb);
        assert!(pa != a.configuration().theta1);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut arm = PlanarArm::new(PlanarArmConfig::default()).unwrap();
        arm.set_command(0, JointCommand::Torque { torque: 10.0 });
        arm.step_physics(&SimContext { dt: 1e-2, t: 0.0 }, DOWN);
        arm.reset();

        assert_eq!(arm.configuration(), JointConfiguration::default());
        assert_eq!(arm.joint(0).unwrap().command.mode(), simcore::ActuationMode::Velocity);
    }
}
