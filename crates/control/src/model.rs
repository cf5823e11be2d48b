//! Affine linearization of the bicycle model and the non-linear rollout.

use nalgebra::{Matrix4, Matrix4x2, Vector4};

use crate::params::MpcParams;
use crate::state::VehicleState;

/// Affine model `x' = A x + B u + C` at a fixed operating point, over the
/// state `[x, y, v, yaw]` and input `[accel, steer]`.
#[derive(Debug, Clone)]
pub struct LinearModel {
    pub a: Matrix4<f64>,
    pub b: Matrix4x2<f64>,
    pub c: Vector4<f64>,
}

/// Linearizes the bicycle model around the operating point
/// `(v, phi, delta)`. `C` carries the Taylor residual, so the affine model
/// reproduces the non-linear step exactly at the operating point.
pub fn linearize(params: &MpcParams, v: f64, phi: f64, delta: f64) -> LinearModel {
    let dt = params.dt;
    let wb = params.wheelbase;

    let mut a = Matrix4::identity();
    a[(0, 2)] = dt * phi.cos();
    a[(0, 3)] = -dt * v * phi.sin();
    a[(1, 2)] = dt * phi.sin();
    a[(1, 3)] = dt * v * phi.cos();
    a[(3, 2)] = dt * delta.tan() / wb;

    let mut b = Matrix4x2::zeros();
    b[(2, 0)] = dt;
    b[(3, 1)] = dt * v / (wb * delta.cos().powi(2));

    let mut c = Vector4::zeros();
    c[0] = dt * v * phi.sin() * phi;
    c[1] = -dt * v * phi.cos() * phi;
    c[3] = -dt * v * delta / (wb * delta.cos().powi(2));

    LinearModel { a, b, c }
}

/// Rolls the non-linear model forward from `x0` under the plan
/// `(accel, steer)`. Returns the `T + 1` operating-point states, the first
/// being `x0` itself.
pub fn predict_motion(
    params: &MpcParams,
    x0: Vector4<f64>,
    accel: &[f64],
    steer: &[f64],
) -> Vec<Vector4<f64>> {
    let mut bar = Vec::with_capacity(params.horizon + 1);
    bar.push(x0);
    let mut state = VehicleState::new(x0[0], x0[1], x0[3], x0[2]);
    for (a, d) in accel.iter().zip(steer).take(params.horizon) {
        state.step(params, *a, *d);
        bar.push(Vector4::new(state.x, state.y, state.v, state.yaw));
    }
    bar
}
