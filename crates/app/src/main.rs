use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use control::{LogBuffer, Ramp, Trajectory, TrajectoryController, VelocityDirective};
use mechanics::{ElbowBranch, World};
use simcore::{JointHandle, Simulation};

mod config;

use config::ScenarioConfig;

#[derive(Parser)]
#[command(version, propagate_version = true)]
#[command(about = "Planar 2R arm joint tracking simulation", long_about = None)]
struct Args {
    /// Scenario file (JSON). Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where to write the tracking log (CSV).
    #[arg(short, long, default_value = "tracking_log.csv")]
    output: PathBuf,
    /// Override the number of control iterations.
    #[arg(long)]
    steps: Option<usize>,
    /// Level of verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut log_config = simplelog::ConfigBuilder::new();
    log_config.set_target_level(log::LevelFilter::Off);
    log_config.set_location_level(log::LevelFilter::Off);

    let log_level = match args.verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    simplelog::TermLogger::init(
        log_level,
        log_config.build(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let mut scenario = match &args.config {
        Some(path) => ScenarioConfig::load(path)
            .with_context(|| format!("failed to load scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };
    if let Some(steps) = args.steps {
        scenario.steps = steps;
    }
    scenario.validate()?;

    log::trace!("{:#?}", scenario);

    let reachable = check_reach(&scenario)?;
    log::info!("{} of {} waypoints reachable", reachable, scenario.waypoints.len());

    let mut world = World::new().with_model(scenario.model.clone(), scenario.arm.clone())?;
    world.set_gravity(scenario.gravity)?;
    world.set_timestep(scenario.dt)?;
    let body = world.create_body(&scenario.model)?;

    if let Some(disturbance) = scenario.disturbance {
        let joint = JointHandle::new(body, disturbance.joint);
        VelocityDirective::new(joint, disturbance.target_velocity, disturbance.force_limit)
            .apply(&mut world)?;
        log::info!(
            "Driving {} open-loop at {} rad/s",
            joint,
            disturbance.target_velocity
        );
    }

    let joint = JointHandle::new(body, scenario.controlled_joint);
    let ramp = Ramp::new(scenario.ramp_rate);
    let trajectory = Trajectory::generate(scenario.dt, scenario.steps, &ramp)?;

    let mut controller = TrajectoryController::new(joint, scenario.gains)?;
    controller.engage(&mut world)?;

    log::info!(
        "Tracking {} rad/s ramp on {} for {} s",
        scenario.ramp_rate,
        joint,
        trajectory.duration()
    );

    let log_buffer = controller.run(&mut world, &trajectory)?;

    write_csv(&args.output, &trajectory, &log_buffer)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if let Some(last) = log_buffer.last() {
        let final_setpoint = trajectory[trajectory.len() - 1];
        log::info!(
            "Final position {:.6} rad (setpoint {:.6} rad, error {:.3e} rad)",
            last.position,
            final_setpoint,
            final_setpoint - last.position
        );
    }
    log::info!(
        "{} of {} iterations saturated at ±{} N·m",
        log_buffer.saturation_count(scenario.gains.force_limit),
        log_buffer.len(),
        scenario.gains.force_limit
    );
    log::info!("Wrote {} samples to {}", log_buffer.len(), args.output.display());

    Ok(())
}

/// Logs which scenario waypoints the arm can reach and with what joint
/// angles. Returns how many are reachable.
fn check_reach(scenario: &ScenarioConfig) -> anyhow::Result<usize> {
    let chain = scenario.arm.geometry()?;
    log::info!(
        "Reachable annulus: {:.3} m to {:.3} m",
        chain.reach_min(),
        chain.reach_max()
    );

    let mut reachable = 0;
    for target in &scenario.waypoints {
        match chain.inverse(*target, ElbowBranch::ElbowDown).into_result() {
            Ok(joints) => {
                reachable += 1;
                log::info!(
                    "({:.3}, {:.3}) -> theta1 = {:.4} rad, theta2 = {:.4} rad",
                    target.x,
                    target.y,
                    joints.theta1,
                    joints.theta2
                )
            }
            Err(reason) => log::warn!("({:.3}, {:.3}) {}", target.x, target.y, reason),
        }
    }
    Ok(reachable)
}

fn write_csv(
    path: &Path,
    trajectory: &Trajectory,
    log_buffer: &LogBuffer,
) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "step,t,setpoint,position,force")?;
    for (i, sample) in log_buffer.iter().enumerate() {
        writeln!(
            file,
            "{},{},{},{},{}",
            i,
            trajectory.time(i),
            trajectory[i],
            sample.position,
            sample.force
        )?;
    }
    file.flush()
}
