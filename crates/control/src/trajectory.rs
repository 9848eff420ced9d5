//! Reference trajectories for a single degree of freedom
//!
//! A [`Trajectory`] is a fixed-rate, immutable sequence of setpoints. It is
//! produced from any [`SetpointRule`] or, for a 2R arm, from a task-space
//! path through inverse kinematics.

use std::ops::Index;

use mechanics::{ElbowBranch, EndEffectorPose, LinkChainGeometry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("trajectory timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),
    #[error("setpoint {index} is not finite")]
    NonFiniteSample { index: usize },
    #[error("none of the {0} waypoints is reachable")]
    NoReachableWaypoint(usize),
}

/// Maps time since the start of the trajectory (s) to a setpoint.
pub trait SetpointRule {
    fn setpoint(&self, t: f64) -> f64;
}

impl<F: Fn(f64) -> f64> SetpointRule for F {
    fn setpoint(&self, t: f64) -> f64 {
        self(t)
    }
}

/// `offset + rate·t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub rate: f64,
    pub offset: f64,
}

impl Ramp {
    pub fn new(rate: f64) -> Self {
        Self { rate, offset: 0.0 }
    }
}

impl SetpointRule for Ramp {
    fn setpoint(&self, t: f64) -> f64 {
        self.offset + self.rate * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constant(pub f64);

impl SetpointRule for Constant {
    fn setpoint(&self, _t: f64) -> f64 {
        self.0
    }
}

/// Jumps from `initial` to `target` at time `at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub initial: f64,
    pub target: f64,
    pub at: f64,
}

impl SetpointRule for Step {
    fn setpoint(&self, t: f64) -> f64 {
        if t < self.at { self.initial } else { self.target }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sine {
    pub amplitude: f64,
    pub frequency_hz: f64,
    pub offset: f64,
}

impl SetpointRule for Sine {
    fn setpoint(&self, t: f64) -> f64 {
        self.offset + self.amplitude * (std::f64::consts::TAU * self.frequency_hz * t).sin()
    }
}

/// Fixed-rate reference signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    dt: f64,
    samples: Vec<f64>,
}

impl Trajectory {
    /// Samples `rule` at `t = i·dt` for `i` in `0..steps`.
    pub fn generate<R: SetpointRule + ?Sized>(
        dt: f64,
        steps: usize,
        rule: &R,
    ) -> Result<Self, TrajectoryError> {
        let samples = (0..steps).map(|i| rule.setpoint(i as f64 * dt)).collect();
        Self::from_samples(dt, samples)
    }

    pub fn from_samples(dt: f64, samples: Vec<f64>) -> Result<Self, TrajectoryError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TrajectoryError::InvalidTimestep(dt));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(TrajectoryError::NonFiniteSample { index });
        }
        Ok(Self { dt, samples })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.samples.get(index).copied()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Time of sample `index` (s)
    pub fn time(&self, index: usize) -> f64 {
        index as f64 * self.dt
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 * self.dt
    }
}

impl Index<usize> for Trajectory {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.samples[index]
    }
}

/// Joint-space references for both joints of a 2R arm
#[derive(Debug, Clone, PartialEq)]
pub struct JointPathPlan {
    pub theta1: Trajectory,
    pub theta2: Trajectory,
    /// Indices of waypoints that could not be reached and were held over
    pub skipped: Vec<usize>,
}

/// Converts a task-space path into per-joint trajectories.
///
/// Unreachable waypoints hold the previous reachable configuration; leading
/// unreachable waypoints take the first reachable one.
pub fn joint_trajectories_from_path(
    chain: &LinkChainGeometry,
    waypoints: &[EndEffectorPose],
    branch: ElbowBranch,
    dt: f64,
) -> Result<JointPathPlan, TrajectoryError> {
    let solutions = chain.solve_path(waypoints, branch);
    let first = solutions
        .iter()
        .find(|s| s.is_valid())
        .map(|s| s.configuration())
        .ok_or(TrajectoryError::NoReachableWaypoint(waypoints.len()))?;

    let mut held = first;
    let mut theta1 = Vec::with_capacity(solutions.len());
    let mut theta2 = Vec::with_capacity(solutions.len());
    let mut skipped = Vec::new();

    for (index, solution) in solutions.iter().enumerate() {
        match solution.into_result() {
            Ok(joints) => held = joints,
            Err(reason) => {
                log::debug!("Holding setpoint over waypoint {}: {}", index, reason);
                skipped.push(index);
            }
        }
        theta1.push(held.theta1);
        theta2.push(held.theta2);
    }

    Ok(JointPathPlan {
        theta1: Trajectory::from_samples(dt, theta1)?,
        theta2: Trajectory::from_samples(dt, theta2)?,
        skipped,
    })
}
