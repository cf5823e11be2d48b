//! # Fleet Host
//!
//! Command-line entry point for the multi-vehicle MPC rollout. Loads a
//! scenario record (JSON), runs the lock-step simulation and writes the
//! record back with the simulated future channels.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

mod config;

use control::MpcParams;
use sim::{marshal, Scenario, Simulation, TickObserver, VehicleSnapshot};

/// Multi-vehicle MPC trajectory rollout over a scenario record.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the input scenario record (JSON).
    #[arg(short, long)]
    input: PathBuf,

    /// Path for the rewritten record.
    #[arg(short, long)]
    output: PathBuf,

    /// Optional INI file overriding controller parameters.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the waypoint-padding RNG.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// Logs simulation progress once per tick.
struct Progress;

impl TickObserver for Progress {
    fn on_tick(&mut self, tick: usize, snapshots: &[VehicleSnapshot]) {
        let done = snapshots.iter().filter(|s| s.done).count();
        tracing::debug!(tick, done, total = snapshots.len(), "tick");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => config::load_params(path)?,
        None => MpcParams::default(),
    };

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read scenario {:?}", cli.input))?;
    let mut scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse scenario {:?}", cli.input))?;
    info!(
        agents = scenario.agent_count(),
        waypoints = scenario.waypoint_len(),
        "scenario loaded"
    );

    let mut simulation = Simulation::from_scenario(&scenario, &params, cli.seed)?;
    let ticks = simulation.run(&mut Progress);
    info!(ticks, "rollout complete");

    marshal::write_back(&mut scenario, &simulation);
    let serialized = serde_json::to_string(&scenario)?;
    fs::write(&cli.output, serialized)
        .with_context(|| format!("failed to write {:?}", cli.output))?;
    info!(output = ?cli.output, "record written");

    Ok(())
}
