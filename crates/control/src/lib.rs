//! # Control Crate
//!
//! Linear model-predictive trajectory tracking for car-like vehicles.
//!
//! Provides the numeric core of the fleet simulator:
//! - Kinematic bicycle model and its affine linearization
//! - Reference course construction (heading, curvature, signed speed profile)
//! - Finite-horizon QP tracking controller with iterative relinearization
//! - Reactive potential-field obstacle avoidance
//! - The per-vehicle controller aggregate driving all of the above

pub mod avoidance;
pub mod controller;
pub mod errors;
pub mod model;
pub mod params;
pub mod reference;
pub mod solver;
pub mod state;

// Re-export core types for easier access
pub use controller::{ControlMode, History, VehicleController};
pub use errors::ControlError;
pub use params::MpcParams;
pub use reference::{HorizonWindow, ReferencePath};
pub use solver::{ControlTrace, QpStatus, SolvedPlan};
pub use state::VehicleState;

use std::f64::consts::PI;

/// Wraps an angle into the `[-pi, pi]` interval.
pub fn normalize_angle(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
