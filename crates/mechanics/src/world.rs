//! In-process reference simulation
//!
//! `World` implements [`Simulation`] over a table of [`PlanarArm`] bodies.
//! Bodies are instantiated from a registry of named arm models, so the
//! description passed to `create_body` stays an opaque key to callers.

use std::collections::HashMap;

use simcore::{BodyHandle, JointCommand, JointState, Model, SimContext, SimError, Simulation};

use crate::arm::{ArmConfigError, PlanarArm, PlanarArmConfig};

/// Default simulation timestep (s)
pub const DEFAULT_TIMESTEP: f64 = 1.0 / 240.0;

/// Default gravity (m/s²), along -Z
pub const DEFAULT_GRAVITY: [f64; 3] = [0.0, 0.0, -9.81];

#[derive(Debug, Clone)]
pub struct World {
    models: HashMap<String, PlanarArmConfig>,
    bodies: Vec<PlanarArm>,
    gravity: [f64; 3],
    dt: f64,
    t: f64,
    step_count: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            bodies: Vec::new(),
            gravity: DEFAULT_GRAVITY,
            dt: DEFAULT_TIMESTEP,
            t: 0.0,
            step_count: 0,
        }
    }

    /// Registers an arm model under `description`, replacing any previous one.
    pub fn register_model(
        &mut self,
        description: impl Into<String>,
        config: PlanarArmConfig,
    ) -> Result<(), ArmConfigError> {
        config.validate()?;
        let description = description.into();
        log::debug!("Registered arm model `{}`", description);
        self.models.insert(description, config);
        Ok(())
    }

    pub fn with_model(
        mut self,
        description: impl Into<String>,
        config: PlanarArmConfig,
    ) -> Result<Self, ArmConfigError> {
        self.register_model(description, config)?;
        Ok(self)
    }

    pub fn gravity(&self) -> [f64; 3] {
        self.gravity
    }

    /// Simulated time (s)
    pub fn time(&self) -> f64 {
        self.t
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&PlanarArm> {
        self.bodies.get(handle.0)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut PlanarArm> {
        self.bodies.get_mut(handle.0)
    }

    fn checked_body(&self, handle: BodyHandle, joint: usize) -> Result<&PlanarArm, SimError> {
        let body = self.body(handle).ok_or(SimError::InvalidBody(handle))?;
        if joint >= body.joint_count() {
            return Err(SimError::InvalidJoint {
                body: handle,
                joint,
                count: body.joint_count(),
            });
        }
        Ok(body)
    }
}

fn validate_command(
    body: BodyHandle,
    joint: usize,
    command: &JointCommand,
) -> Result<(), SimError> {
    let reason = match *command {
        JointCommand::Torque { torque } if !torque.is_finite() => {
            format!("torque {} is not finite", torque)
        }
        JointCommand::Velocity { target_velocity, force_limit }
            if !target_velocity.is_finite() || !force_limit.is_finite() || force_limit < 0.0 =>
        {
            format!(
                "velocity target {} with force limit {} is not admissible",
                target_velocity, force_limit
            )
        }
        _ => return Ok(()),
    };
    Err(SimError::InvalidCommand { body, joint, reason })
}

impl Model for World {
    fn reset(&mut self) {
        for body in &mut self.bodies {
            body.reset();
        }
        self.t = 0.0;
        self.step_count = 0;
    }
}

impl Simulation for World {
    fn create_body(&mut self, description: &str) -> Result<BodyHandle, SimError> {
        let config = self
            .models
            .get(description)
            .ok_or_else(|| SimError::UnknownModel(description.to_string()))?;
        // Registered configs were validated on insertion.
        let body = PlanarArm::new(config.clone())
            .map_err(|_| SimError::UnknownModel(description.to_string()))?;

        let handle = BodyHandle(self.bodies.len());
        self.bodies.push(body);
        log::debug!("Created {} from `{}`", handle, description);
        Ok(handle)
    }

    fn set_gravity(&mut self, gravity: [f64; 3]) -> Result<(), SimError> {
        self.gravity = gravity;
        Ok(())
    }

    fn set_timestep(&mut self, dt: f64) -> Result<(), SimError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SimError::InvalidTimestep(dt));
        }
        self.dt = dt;
        Ok(())
    }

    fn timestep(&self) -> f64 {
        self.dt
    }

    fn set_joint_actuation(
        &mut self,
        body: BodyHandle,
        joint: usize,
        command: JointCommand,
    ) -> Result<(), SimError> {
        self.checked_body(body, joint)?;
        validate_command(body, joint, &command)?;
        if let Some(arm) = self.body_mut(body) {
            arm.set_command(joint, command);
        }
        Ok(())
    }

    fn joint_state(&self, body: BodyHandle, joint: usize) -> Result<JointState, SimError> {
        self.checked_body(body, joint)?
            .joint_state(joint, self.gravity)
            .ok_or(SimError::InvalidJoint { body, joint, count: 0 })
    }

    fn step(&mut self) -> Result<(), SimError> {
        let ctx = SimContext { dt: self.dt, t: self.t };
        for (index, body) in self.bodies.iter_mut().enumerate() {
            body.step_physics(&ctx, self.gravity);
            if let Some(joint) = body.diverged_joint() {
                log::trace!("{} joint {} state: {:?}", BodyHandle(index), joint, body.joint(joint));
                return Err(SimError::Diverged {
                    body: BodyHandle(index),
                    joint,
                    t: self.t,
                });
            }
        }
        self.t += self.dt;
        self.step_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ARM: &str = "planar_2r";

    fn world() -> World {
        World::new().with_model(ARM, PlanarArmConfig::default()).unwrap()
    }

    #[test]
    fn test_unknown_model() {
        let mut world = world();
        assert_eq!(
            world.create_body("ground_plane"),
            Err(SimError::UnknownModel("ground_plane".to_string()))
        );
    }

    #[test]
    fn test_invalid_model_is_rejected_at_registration() {
        let mut world = World::new();
        let config = PlanarArmConfig::default().with_link_lengths(0.0, 1.0);
        assert!(world.register_model(ARM, config).is_err());
    }

    #[test]
    fn test_invalid_joint_and_body() {
        let mut world = world();
        let body = world.create_body(ARM).unwrap();

        assert!(matches!(
            world.joint_state(body, 5),
            Err(SimError::InvalidJoint { joint: 5, count: 2, .. })
        ));
        assert_eq!(
            world.joint_state(BodyHandle(9), 0),
            Err(SimError::InvalidBody(BodyHandle(9)))
        );
    }

    #[test]
    fn test_rejects_bad_timestep_and_command() {
        let mut world = world();
        let body = world.create_body(ARM).unwrap();

        assert_eq!(world.set_timestep(0.0), Err(SimError::InvalidTimestep(0.0)));
        assert!(matches!(
            world.set_joint_actuation(body, 0, JointCommand::Torque { torque: f64::NAN }),
            Err(SimError::InvalidCommand { .. })
        ));
        assert!(matches!(
            world.set_joint_actuation(
                body,
                0,
                JointCommand::Velocity { target_velocity: 1.0, force_limit: -1.0 }
            ),
            Err(SimError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn test_step_advances_time() {
        let mut world = world();
        world.set_timestep(0.01).unwrap();
        for _ in 0..10 {
            world.step().unwrap();
        }
        assert_relative_eq!(world.time(), 0.1, epsilon = 1e-12);
        assert_eq!(world.step_count(), 10);
    }

    #[test]
    fn test_torque_moves_joint() {
        let mut world = world();
        let body = world.create_body(ARM).unwrap();
        world.set_timestep(1e-3).unwrap();
        world
            .set_joint_actuation(body, 0, JointCommand::Torque { torque: 1.0 })
            .unwrap();

        for _ in 0..100 {
            world.step().unwrap();
        }

        // q = a·t²/2 with a = 10 rad/s² (semi-implicit Euler overshoots by a·dt·t/2)
        let q = world.joint_state(body, 0).unwrap().position;
        assert_relative_eq!(q, 0.5 * 10.0 * 0.1 * 0.1, epsilon = 1e-3);
        assert_relative_eq!(world.joint_state(body, 1).unwrap().position, 0.0);
    }

    #[test]
    fn test_velocity_directive() {
        let mut world = world();
        let body = world.create_body(ARM).unwrap();
        world.set_timestep(1e-3).unwrap();
        world
            .set_joint_actuation(
                body,
                1,
                JointCommand::Velocity { target_velocity: 2.0, force_limit: 1000.0 },
            )
            .unwrap();

        for _ in 0..500 {
            world.step().unwrap();
        }

        let state = world.joint_state(body, 1).unwrap();
        assert_relative_eq!(state.velocity, 2.0, epsilon = 1e-9);
        assert_relative_eq!(state.position, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_huge_torque_diverges() {
        let mut world = world();
        let body = world.create_body(ARM).unwrap();
        world
            .set_joint_actuation(body, 0, JointCommand::Torque { torque: f64::MAX })
            .unwrap();

        let mut result = Ok(());
        for _ in 0..10 {
            result = world.step();
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(SimError::Diverged { joint: 0, .. })));
    }

    #[test]
    fn test_reset() {
        let mut world = world();
        let body = world.create_body(ARM).unwrap();
        world
            .set_joint_actuation(body, 0, JointCommand::Torque { torque: 3.0 })
            .unwrap();
        world.step().unwrap();
        world.reset();

        assert_eq!(world.time(), 0.0);
        assert_eq!(world.joint_state(body, 0).unwrap().position, 0.0);
    }
}
