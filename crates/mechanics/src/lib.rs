//! Mechanical models for a planar two-link arm
//!
//! This crate provides:
//! - Closed-form forward/inverse kinematics for a 2R chain
//! - Revolute joint dynamics with friction and motor torque resolution
//! - A planar arm body and an in-process `Simulation` backend

pub mod arm;
pub mod joint;
pub mod kinematics;
pub mod world;

pub use arm::{ArmConfigError, PlanarArm, PlanarArmConfig, DEFAULT_MOTOR_FORCE};
pub use joint::{JointBody, JointDynamics, JointFriction};
pub use kinematics::{
    forward, inverse, ElbowBranch, EndEffectorPose, GeometryError, IkFailure, IkSolution,
    JointConfiguration, LinkChainGeometry,
};
pub use world::{World, DEFAULT_GRAVITY, DEFAULT_TIMESTEP};
