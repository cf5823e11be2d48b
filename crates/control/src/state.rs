//! Vehicle state and the non-linear kinematic bicycle step.

use crate::params::MpcParams;

/// Pose and longitudinal speed of a single vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub v: f64,
}

impl VehicleState {
    pub fn new(x: f64, y: f64, yaw: f64, v: f64) -> Self {
        Self { x, y, yaw, v }
    }

    /// Advances the state by one tick of the kinematic bicycle model.
    ///
    /// Steering is clamped to the steering limit before use; the resulting
    /// speed is clamped to the speed box.
    pub fn step(&mut self, params: &MpcParams, accel: f64, steer: f64) {
        let steer = steer.clamp(-params.max_steer, params.max_steer);
        self.x += self.v * self.yaw.cos() * params.dt;
        self.y += self.v * self.yaw.sin() * params.dt;
        self.yaw += self.v / params.wheelbase * steer.tan() * params.dt;
        self.v = (self.v + accel * params.dt).clamp(params.min_speed, params.max_speed);
    }
}
