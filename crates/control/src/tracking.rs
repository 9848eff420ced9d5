//! Closed-loop joint trajectory tracking
//!
//! Each iteration runs strictly in this order against the simulation:
//! read position, update the PD law, command torque, step, log. There is no
//! early exit; the only way out before the last sample is a simulation error.

use serde::Serialize;
use simcore::{JointCommand, JointHandle, SimError, Simulation};
use thiserror::Error;

use crate::pd::{ConfigError, ControllerState, PdConfig, PdController, PdOutput};
use crate::trajectory::Trajectory;

/// Relative timestep mismatch tolerated before warning.
const TIMESTEP_MISMATCH_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("control run aborted at iteration {iteration}")]
    Aborted {
        iteration: usize,
        #[source]
        source: SimError,
    },
}

/// One control-loop iteration as seen by the log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogSample {
    /// Measured position before the command was issued
    pub position: f64,
    /// Saturated force actually commanded
    pub force: f64,
}

/// Append-only record of a control run
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LogBuffer {
    samples: Vec<LogSample>,
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: LogSample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[LogSample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogSample> {
        self.samples.iter()
    }

    pub fn last(&self) -> Option<&LogSample> {
        self.samples.last()
    }

    pub fn positions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.position).collect()
    }

    pub fn forces(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.force).collect()
    }

    /// `(position, force)` pairs in iteration order.
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.samples.iter().map(|s| (s.position, s.force)).collect()
    }

    /// Number of iterations whose force sat exactly on `±limit`.
    pub fn saturation_count(&self, limit: f64) -> usize {
        self.samples.iter().filter(|s| s.force.abs() == limit).count()
    }
}

impl<'a> IntoIterator for &'a LogBuffer {
    type Item = &'a LogSample;
    type IntoIter = std::slice::Iter<'a, LogSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Open-loop velocity drive on a joint, independent of any feedback loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VelocityDirective {
    pub joint: JointHandle,
    pub target_velocity: f64,
    pub force_limit: f64,
}

impl VelocityDirective {
    pub fn new(joint: JointHandle, target_velocity: f64, force_limit: f64) -> Self {
        Self {
            joint,
            target_velocity,
            force_limit,
        }
    }

    /// Installs the directive; it persists across simulation steps.
    pub fn apply<S: Simulation + ?Sized>(&self, sim: &mut S) -> Result<(), SimError> {
        log::debug!(
            "Driving {} at {} rad/s (limit {} N·m)",
            self.joint,
            self.target_velocity,
            self.force_limit
        );
        self.joint.command(
            sim,
            JointCommand::Velocity {
                target_velocity: self.target_velocity,
                force_limit: self.force_limit,
            },
        )
    }
}

/// PD tracking controller bound to one simulated joint
#[derive(Debug, Clone)]
pub struct TrajectoryController {
    joint: JointHandle,
    pd: PdController,
    last_output: Option<PdOutput>,
}

impl TrajectoryController {
    pub fn new(joint: JointHandle, config: PdConfig) -> Result<Self, ControlError> {
        Ok(Self {
            joint,
            pd: PdController::new(config)?,
            last_output: None,
        })
    }

    pub fn joint(&self) -> JointHandle {
        self.joint
    }

    pub fn config(&self) -> &PdConfig {
        self.pd.config()
    }

    pub fn state(&self) -> &ControllerState {
        self.pd.state()
    }

    pub fn last_output(&self) -> Option<&PdOutput> {
        self.last_output.as_ref()
    }

    /// Switches the joint to torque actuation with zero torque.
    pub fn engage<S: Simulation + ?Sized>(&self, sim: &mut S) -> Result<(), SimError> {
        self.joint.command(sim, JointCommand::Torque { torque: 0.0 })
    }

    /// One control iteration: read, compute, command, step.
    pub fn step<S: Simulation + ?Sized>(
        &mut self,
        sim: &mut S,
        setpoint: f64,
        dt: f64,
    ) -> Result<LogSample, SimError> {
        let position = self.joint.position(sim)?;
        let output = self.pd.update(setpoint, position, dt);
        self.joint.command(sim, JointCommand::Torque { torque: output.force })?;
        sim.step()?;

        self.last_output = Some(output);
        Ok(LogSample {
            position,
            force: output.force,
        })
    }

    /// Tracks every sample of `trajectory` in lockstep with the simulation.
    pub fn run<S: Simulation + ?Sized>(
        &mut self,
        sim: &mut S,
        trajectory: &Trajectory,
    ) -> Result<LogBuffer, ControlError> {
        let dt = trajectory.dt();
        let sim_dt = sim.timestep();
        if (sim_dt - dt).abs() > TIMESTEP_MISMATCH_TOLERANCE * dt {
            log::warn!(
                "Trajectory timestep {} s differs from simulation timestep {} s",
                dt,
                sim_dt
            );
        }

        log::debug!(
            "Tracking {} setpoints on {} (kp = {}, kd = {}, limit = {})",
            trajectory.len(),
            self.joint,
            self.config().kp,
            self.config().kd,
            self.config().force_limit
        );

        let mut log_buffer = LogBuffer::with_capacity(trajectory.len());
        for (iteration, setpoint) in trajectory.iter().enumerate() {
            let sample = self
                .step(sim, setpoint, dt)
                .map_err(|source| ControlError::Aborted { iteration, source })?;
            log::trace!("#{} sp = {} {:?}", iteration, setpoint, sample);
            log_buffer.push(sample);
        }

        log::debug!(
            "Run complete: {} iterations, {} saturated",
            log_buffer.len(),
            log_buffer.saturation_count(self.config().force_limit)
        );
        Ok(log_buffer)
    }
}

/// Runs a fresh controller on `joint` over `trajectory`.
pub fn run<S: Simulation + ?Sized>(
    sim: &mut S,
    joint: JointHandle,
    trajectory: &Trajectory,
    config: PdConfig,
) -> Result<LogBuffer, ControlError> {
    TrajectoryController::new(joint, config)?.run(sim, trajectory)
}
