//! PD (Proportional-Derivative) position controller
//!
//! Discrete-time PD law with a backward-difference derivative on the error
//! and a hard symmetric output clamp modelling actuator saturation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("gain {name} must be positive and finite, got {value}")]
    InvalidGain { name: &'static str, value: f64 },
    #[error("force limit must be positive and finite, got {0}")]
    InvalidForceLimit(f64),
}

/// Configuration for a PD controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdConfig {
    /// Proportional gain
    pub kp: f64,
    /// Derivative gain
    pub kd: f64,
    /// Symmetric output limit, N·m
    pub force_limit: f64,
}

impl Default for PdConfig {
    fn default() -> Self {
        Self {
            kp: 1000.0,
            kd: 500.0,
            force_limit: 500.0,
        }
    }
}

impl PdConfig {
    pub fn new(kp: f64, kd: f64, force_limit: f64) -> Self {
        Self { kp, kd, force_limit }
    }

    /// Set output limit
    pub fn with_limit(mut self, force_limit: f64) -> Self {
        self.force_limit = force_limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.kp) {
            return Err(ConfigError::InvalidGain { name: "kp", value: self.kp });
        }
        if !positive(self.kd) {
            return Err(ConfigError::InvalidGain { name: "kd", value: self.kd });
        }
        if !positive(self.force_limit) {
            return Err(ConfigError::InvalidForceLimit(self.force_limit));
        }
        Ok(())
    }
}

/// Loop-carried error terms. Zeroed on construction and never reset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub error_prev: f64,
    pub error: f64,
}

/// Everything computed during one controller update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdOutput {
    pub error: f64,
    pub error_derivative: f64,
    /// `kp·e + kd·ė` before the clamp
    pub unsaturated: f64,
    /// Clamped force; the value to apply and log
    pub force: f64,
    pub saturated: bool,
}

/// Clamps `value` to `[-limit, limit]`; `limit` must be non-negative.
pub fn saturate(value: f64, limit: f64) -> f64 {
    value.clamp(-limit, limit)
}

/// PD controller with state
#[derive(Debug, Clone)]
pub struct PdController {
    config: PdConfig,
    state: ControllerState,
}

impl PdController {
    pub fn new(config: PdConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: ControllerState::default(),
        })
    }

    /// Update the controller with a new setpoint/measurement pair sampled `dt` after the last one.
    pub fn update(&mut self, setpoint: f64, measurement: f64, dt: f64) -> PdOutput {
        self.state.error_prev = self.state.error;
        self.state.error = setpoint - measurement;

        let error_derivative = (self.state.error - self.state.error_prev) / dt;
        let unsaturated = self.config.kp * self.state.error + self.config.kd * error_derivative;
        let force = saturate(unsaturated, self.config.force_limit);

        PdOutput {
            error: self.state.error,
            error_derivative,
            unsaturated,
            force,
            saturated: force != unsaturated,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn config(&self) -> &PdConfig {
        &self.config
    }
}
