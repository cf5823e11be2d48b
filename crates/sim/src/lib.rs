//! # Sim Crate
//!
//! Lock-step multi-agent simulation over motion scenario records.
//!
//! One MPC controller is spawned per recorded agent; the flagged ego agent
//! replays its waypoints instead. Every tick the scheduler advances all
//! vehicles against the previous tick's predicted positions and republishes
//! the cache, until every vehicle reports done. The rewritten record
//! carries the simulated trajectories, normalized to the dataset width.

pub mod dataset;
pub mod marshal;
pub mod scheduler;

pub use dataset::Scenario;
pub use scheduler::{NullObserver, Simulation, TickObserver, VehicleSnapshot};
