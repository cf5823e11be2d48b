//! Reactive potential-field obstacle avoidance.
//!
//! Each obstacle inside the speed-scaled detection range and within
//! ±0.52 rad of the vehicle's forward or backward axis contributes a
//! range-proportional vector to the field. The field is fused with the MPC
//! command by blending accelerations; the fused steering angle is computed
//! as well but only committed under the `pf-steer-commit` feature.

use std::f64::consts::PI;

use crate::normalize_angle;
use crate::params::MpcParams;
use crate::state::VehicleState;

/// Half-angle of the bearing gate around the longitudinal axis [rad].
const BEARING_GATE: f64 = 0.52;
/// Detection range multiplier over the current speed.
const DETECT_RATIO: f64 = 1.25;
/// Speed floor for the detection range [m/s].
const DETECT_FLOOR: f64 = 12.0;
/// Weight of the MPC steering angle in the fused steering command.
const STEER_BLEND: f64 = 0.5;
/// Weight of the MPC acceleration in the fused acceleration command.
const ACCEL_BLEND: f64 = 0.9;

/// Repulsive magnitude for an obstacle at `distance`, scaled by speed.
fn repulsion(distance: f64, v: f64) -> f64 {
    let detect_range = DETECT_RATIO * v.max(DETECT_FLOOR);
    (detect_range - distance).max(0.0)
}

/// Accumulates the field vector over all obstacles passing the range and
/// bearing gates. The vector points toward the obstacles; the blend
/// subtracts it to repel.
pub fn field_vector(state: &VehicleState, obstacles: &[(f64, f64)]) -> (f64, f64) {
    let mut force = (0.0, 0.0);
    for &(ox, oy) in obstacles {
        let distance = (state.x - ox).hypot(state.y - oy);
        if distance == 0.0 {
            continue;
        }
        let ux = (ox - state.x) / distance;
        let uy = (oy - state.y) / distance;
        let bearing = normalize_angle(uy.atan2(ux) - normalize_angle(state.yaw));
        if bearing.abs() <= BEARING_GATE || bearing.abs() >= PI - BEARING_GATE {
            let mag = repulsion(distance, state.v);
            force.0 += mag * ux;
            force.1 += mag * uy;
        }
    }
    force
}

/// Fuses the field vector into the MPC command, returning the blended
/// `(accel, steer)` pair. The inputs pass through untouched when the field
/// vector is zero.
pub fn blend(
    state: &VehicleState,
    params: &MpcParams,
    accel: f64,
    steer: f64,
    force: (f64, f64),
) -> (f64, f64) {
    if force.0 == 0.0 && force.1 == 0.0 {
        return (accel, steer);
    }

    let planned_speed = state.v + accel * params.dt;
    let vx = -force.0 + planned_speed * state.yaw.cos();
    let vy = -force.1 + planned_speed * state.yaw.sin();

    let speed = vx.hypot(vy);
    let delta_psi = normalize_angle(vy.atan2(vx) - normalize_angle(state.yaw));
    let longitudinal = speed * delta_psi.cos();

    let mut fused_steer = (steer * STEER_BLEND + delta_psi * (1.0 - STEER_BLEND)) * 2.0;
    let fused_accel =
        accel * ACCEL_BLEND + (longitudinal - state.v) / params.dt * (1.0 - ACCEL_BLEND);
    if fused_accel < 0.0 {
        fused_steer = -fused_steer;
    }

    if cfg!(feature = "pf-steer-commit") {
        (fused_accel, fused_steer)
    } else {
        (fused_accel, steer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_obstacles_are_gated_out() {
        let state = VehicleState::new(0.0, 0.0, 0.0, 5.0);
        let force = field_vector(&state, &[(0.0, 5.0), (0.0, -5.0)]);
        assert_eq!(force, (0.0, 0.0));
    }

    #[test]
    fn obstacles_ahead_and_behind_pass_the_gate() {
        let state = VehicleState::new(0.0, 0.0, 0.0, 5.0);
        let ahead = field_vector(&state, &[(5.0, 0.0)]);
        assert!(ahead.0 > 0.0);
        let behind = field_vector(&state, &[(-5.0, 0.0)]);
        assert!(behind.0 < 0.0);
    }

    #[test]
    fn out_of_range_obstacles_contribute_nothing() {
        // Detection range at 5 m/s is 1.25 * 12 = 15 m.
        let state = VehicleState::new(0.0, 0.0, 0.0, 5.0);
        let force = field_vector(&state, &[(20.0, 0.0)]);
        assert_eq!(force, (0.0, 0.0));
    }

    #[test]
    fn head_on_field_brakes_the_vehicle() {
        let params = MpcParams::default();
        let state = VehicleState::new(0.0, 0.0, 0.0, 5.0);
        let force = field_vector(&state, &[(5.0, 0.0)]);
        let (fused_accel, _) = blend(&state, &params, 0.0, 0.0, force);
        assert!(fused_accel < 0.0, "expected braking, got {fused_accel}");
    }

    #[test]
    fn zero_field_passes_the_command_through() {
        let params = MpcParams::default();
        let state = VehicleState::new(0.0, 0.0, 0.0, 5.0);
        let (a, d) = blend(&state, &params, 0.7, 0.2, (0.0, 0.0));
        assert_eq!((a, d), (0.7, 0.2));
    }

    #[cfg(not(feature = "pf-steer-commit"))]
    #[test]
    fn steering_command_is_preserved_without_the_commit_feature() {
        let params = MpcParams::default();
        let state = VehicleState::new(0.0, 0.0, 0.0, 5.0);
        let force = field_vector(&state, &[(5.0, 0.5)]);
        let (_, d) = blend(&state, &params, 0.0, 0.2, force);
        assert_eq!(d, 0.2);
    }
}
