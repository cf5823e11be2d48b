//! Lock-step multi-agent scheduler.
//!
//! All vehicles advance in a deterministic sequential loop. Within one
//! tick every controller sees the previous tick's predicted positions, so
//! tick output is independent of controller iteration order; the cache is
//! fully rewritten after all controllers have run.

use anyhow::{ensure, Result};
use control::{MpcParams, VehicleController};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::dataset::Scenario;

/// Read-only view of one vehicle after a tick.
#[derive(Debug, Clone, Copy)]
pub struct VehicleSnapshot {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub v: f64,
    pub steer: f64,
    pub done: bool,
}

/// Observer hook invoked after every tick. The default implementation does
/// nothing; renderers and progress reporters hang off this seam instead of
/// being called from inside the control loop.
pub trait TickObserver {
    fn on_tick(&mut self, _tick: usize, _snapshots: &[VehicleSnapshot]) {}
}

/// The no-op observer.
pub struct NullObserver;

impl TickObserver for NullObserver {}

/// Owns every vehicle controller plus the shared obstacle cache.
pub struct Simulation {
    vehicles: Vec<VehicleController>,
    obstacles: Vec<(f64, f64)>,
    done: Vec<bool>,
    ticks: usize,
}

impl Simulation {
    /// Builds one controller per agent in the record. The flagged ego
    /// agent is switched to waypoint playback with avoidance disabled.
    /// `seed` pins the waypoint-padding RNG so runs are reproducible.
    pub fn from_scenario(scenario: &Scenario, params: &MpcParams, seed: u64) -> Result<Self> {
        let agents = scenario.agent_count();
        ensure!(
            scenario.future_y.len() == agents,
            "scenario x/y row counts differ ({} vs {})",
            agents,
            scenario.future_y.len()
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let main_car = scenario.main_car_index();
        let mut vehicles = Vec::with_capacity(agents);
        for i in 0..agents {
            let mut vehicle = VehicleController::new(
                &scenario.future_x[i],
                &scenario.future_y[i],
                scenario.length_samples(i),
                scenario.width_samples(i),
                params.clone(),
                &mut rng,
            )?;
            if !params.obstacle_avoidance {
                vehicle.set_obstacle_avoidance(false);
            }
            if main_car == Some(i) {
                vehicle.set_playback();
            }
            vehicles.push(vehicle);
        }
        info!(agents, main_car = ?main_car, "simulation initialized");

        let done = vec![false; vehicles.len()];
        Ok(Self {
            vehicles,
            obstacles: Vec::new(),
            done,
            ticks: 0,
        })
    }

    /// Runs until every vehicle reports done. Returns the tick count.
    pub fn run(&mut self, observer: &mut dyn TickObserver) -> usize {
        loop {
            let reached = self.tick();
            observer.on_tick(self.ticks, &self.snapshots());
            if reached == self.vehicles.len() {
                break;
            }
        }
        info!(ticks = self.ticks, "simulation finished");
        self.ticks
    }

    /// Advances every vehicle one tick against the previous tick's cache,
    /// then republishes the dead-reckoned obstacle positions. Returns the
    /// number of vehicles reporting done.
    pub fn tick(&mut self) -> usize {
        let mut reached = 0;
        for (i, vehicle) in self.vehicles.iter_mut().enumerate() {
            let mut view = self.obstacles.clone();
            if !view.is_empty() {
                view.remove(i);
            }
            let done = vehicle.update(&view);
            self.done[i] = done;
            if done {
                reached += 1;
            }
        }
        self.obstacles = self
            .vehicles
            .iter()
            .map(VehicleController::predicted_position)
            .collect();
        self.ticks += 1;
        debug!(tick = self.ticks, reached, "tick complete");
        reached
    }

    pub fn snapshots(&self) -> Vec<VehicleSnapshot> {
        self.vehicles
            .iter()
            .zip(&self.done)
            .map(|(vehicle, done)| VehicleSnapshot {
                x: vehicle.state.x,
                y: vehicle.state.y,
                yaw: vehicle.state.yaw,
                v: vehicle.state.v,
                steer: vehicle.steer_cmd(),
                done: *done,
            })
            .collect()
    }

    pub fn vehicles(&self) -> &[VehicleController] {
        &self.vehicles
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }
}
