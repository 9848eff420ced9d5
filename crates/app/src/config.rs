use std::path::Path;

use control::PdConfig;
use mechanics::{EndEffectorPose, PlanarArmConfig};
use serde::{Deserialize, Serialize};

/// Open-loop velocity drive on the joint not under PD control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisturbanceConfig {
    pub joint: usize,
    /// rad/s
    pub target_velocity: f64,
    /// N·m
    pub force_limit: f64,
}

/// Everything needed to set up and run one tracking scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Opaque description the body is created from.
    pub model: String,
    pub arm: PlanarArmConfig,
    /// m/s²
    pub gravity: [f64; 3],
    /// Simulation and trajectory timestep (s)
    pub dt: f64,
    pub steps: usize,
    pub controlled_joint: usize,
    /// Ramp setpoint slope (rad/s)
    pub ramp_rate: f64,
    pub gains: PdConfig,
    pub disturbance: Option<DisturbanceConfig>,
    /// End-effector goals checked for reachability before the run.
    pub waypoints: Vec<EndEffectorPose>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            model: "planar_2r".to_string(),
            arm: PlanarArmConfig::default(),
            gravity: [0.0, 0.0, -9.81],
            dt: 0.00001,
            steps: 100_000,
            controlled_joint: 0,
            ramp_rate: 10.0,
            gains: PdConfig::new(1000.0, 500.0, 500.0),
            disturbance: Some(DisturbanceConfig {
                joint: 1,
                target_velocity: 1.0,
                force_limit: 100.0,
            }),
            waypoints: vec![
                EndEffectorPose::new(2.0, 0.0),
                EndEffectorPose::new(1.0, 1.0),
                EndEffectorPose::new(3.0, 0.0),
            ],
        }
    }
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// The open-loop drive must act on a different joint than the PD loop.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(disturbance) = &self.disturbance {
            anyhow::ensure!(
                disturbance.joint != self.controlled_joint,
                "disturbance and controller both target joint {}",
                self.controlled_joint
            );
        }
        Ok(())
    }
}
