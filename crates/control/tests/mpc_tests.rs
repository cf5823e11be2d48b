#![cfg(test)]

//! Solver-level invariants of the horizon QP.

use control::reference::ReferencePath;
use control::solver::{iterative_linear_mpc, solve_linear_mpc, QpStatus};
use control::{model, MpcParams, VehicleState};
use nalgebra::Vector4;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn straight_path(n: usize, target_speed: f64) -> ReferencePath {
    let mut rng = StdRng::seed_from_u64(1);
    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let ys = vec![0.0; n];
    ReferencePath::from_waypoints(&xs, &ys, target_speed, &mut rng).unwrap()
}

#[test]
fn solved_plan_respects_every_box_and_rate_limit() {
    let params = MpcParams::default();
    let path = straight_path(60, params.target_speed);
    // Slightly off-course and below the target speed.
    let state = VehicleState::new(0.0, 0.4, 0.1, 3.0);
    let (window, _) = path.horizon_window(&state, &params, 0);
    let x0 = Vector4::new(state.x, state.y, state.v, state.yaw);

    let (trace, plan) = iterative_linear_mpc(&params, &window, x0, None).unwrap();
    let plan = plan.expect("nominal tracking QP should solve");
    assert_eq!(trace.accel.len(), params.horizon);

    let eps = 1e-3;
    for &a in &plan.accel {
        assert!(a.abs() <= params.max_accel + eps, "accel {a} out of box");
    }
    for &d in &plan.steer {
        assert!(d.abs() <= params.max_steer + eps, "steer {d} out of box");
    }
    for w in plan.steer.windows(2) {
        let rate = (w[1] - w[0]).abs();
        assert!(
            rate <= params.max_dsteer * params.dt + eps,
            "steer rate {rate} over the limit"
        );
    }
    for &v in &plan.v {
        assert!(v >= params.min_speed - eps && v <= params.max_speed + eps);
    }
}

#[test]
fn solution_starts_at_the_measured_state() {
    let params = MpcParams::default();
    let path = straight_path(60, params.target_speed);
    let state = VehicleState::new(1.0, -0.2, 0.05, 4.0);
    let (window, _) = path.horizon_window(&state, &params, 0);
    let x0 = Vector4::new(state.x, state.y, state.v, state.yaw);

    let xbar = model::predict_motion(&params, x0, &vec![0.0; params.horizon], &vec![0.0; params.horizon]);
    match solve_linear_mpc(&params, &window, &xbar, x0).unwrap() {
        QpStatus::Optimal(plan) => {
            assert!((plan.x[0] - state.x).abs() < 1e-4);
            assert!((plan.y[0] - state.y).abs() < 1e-4);
            assert!((plan.v[0] - state.v).abs() < 1e-4);
            assert!((plan.yaw[0] - state.yaw).abs() < 1e-4);
        }
        other => panic!("expected an optimal plan, got {other:?}"),
    }
}

#[test]
fn rest_start_accelerates_without_steering() {
    let params = MpcParams::default();
    let path = straight_path(60, params.target_speed);
    let state = VehicleState::new(0.0, 0.0, 0.0, 0.0);
    let (window, _) = path.horizon_window(&state, &params, 0);
    let x0 = Vector4::new(0.0, 0.0, 0.0, 0.0);

    let (_, plan) = iterative_linear_mpc(&params, &window, x0, None).unwrap();
    let plan = plan.expect("rest-start QP should solve");
    assert!(plan.accel[0] >= -1e-6, "expected forward accel, got {}", plan.accel[0]);
    assert!(plan.steer[0].abs() < 0.1, "expected near-zero steer, got {}", plan.steer[0]);
}

#[test]
fn warm_started_resolve_converges_quickly() {
    let params = MpcParams::default();
    let path = straight_path(60, params.target_speed);
    let state = VehicleState::new(0.0, 0.0, 0.0, 3.0);
    let (window, _) = path.horizon_window(&state, &params, 0);
    let x0 = Vector4::new(state.x, state.y, state.v, state.yaw);

    let (trace, _) = iterative_linear_mpc(&params, &window, x0, None).unwrap();
    let warm = trace.clone();
    let (retrace, plan) = iterative_linear_mpc(&params, &window, x0, Some(warm)).unwrap();
    assert!(plan.is_some());
    // Re-solving the same problem from its own solution barely moves it.
    let drift: f64 = retrace
        .accel
        .iter()
        .zip(&trace.accel)
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(drift <= params.du_th, "warm-started drift {drift}");
}
