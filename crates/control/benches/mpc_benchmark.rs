//! Benchmark of the warm-started iterative MPC solve.

use criterion::{criterion_group, criterion_main, Criterion};
use control::reference::ReferencePath;
use control::solver::iterative_linear_mpc;
use control::{MpcParams, VehicleState};
use nalgebra::Vector4;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_iterative_solve(c: &mut Criterion) {
    let params = MpcParams::default();
    let mut rng = StdRng::seed_from_u64(7);
    let xs: Vec<f64> = (0..60).map(|i| i as f64).collect();
    let ys = vec![0.0; 60];
    let path = ReferencePath::from_waypoints(&xs, &ys, params.target_speed, &mut rng).unwrap();
    let state = VehicleState::new(0.0, 0.2, 0.0, 3.0);
    let (window, _) = path.horizon_window(&state, &params, 0);
    let x0 = Vector4::new(state.x, state.y, state.v, state.yaw);

    c.bench_function("iterative_linear_mpc", |b| {
        b.iter(|| iterative_linear_mpc(&params, &window, x0, None).unwrap())
    });
}

criterion_group!(benches, bench_iterative_solve);
criterion_main!(benches);
