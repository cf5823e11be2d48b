//! Horizon QP assembly and the iterative linearization loop.
//!
//! The finite-horizon tracking problem is stacked into OSQP's
//! `min 0.5 z'Pz + q'z  s.t.  l <= Az <= u` form over the decision vector
//! `z = [x_0 .. x_T, u_0 .. u_{T-1}]`. The dynamics rows are affine models
//! linearized around a predicted trajectory, which itself depends on the
//! plan, so the solve is wrapped in a warm-started fixed-point iteration.

use nalgebra::Vector4;
use osqp::{CscMatrix, Problem, Settings, Status};
use tracing::debug;

use crate::errors::ControlError;
use crate::model::{linearize, predict_motion};
use crate::params::MpcParams;
use crate::reference::HorizonWindow;

const NX: usize = 4;
const NU: usize = 2;

/// Open-loop control plan accepted by the iterative loop; carried across
/// ticks as the warm start of the next solve.
#[derive(Debug, Clone)]
pub struct ControlTrace {
    pub accel: Vec<f64>,
    pub steer: Vec<f64>,
}

impl ControlTrace {
    fn zeros(horizon: usize) -> Self {
        Self {
            accel: vec![0.0; horizon],
            steer: vec![0.0; horizon],
        }
    }
}

/// Full solution of one QP: planned trajectory and inputs, flattened per
/// channel.
#[derive(Debug, Clone)]
pub struct SolvedPlan {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub v: Vec<f64>,
    pub yaw: Vec<f64>,
    pub accel: Vec<f64>,
    pub steer: Vec<f64>,
}

/// Outcome taxonomy of a single QP solve.
#[derive(Debug, Clone)]
pub enum QpStatus {
    Optimal(SolvedPlan),
    /// Converged only to reduced accuracy; the plan is discarded.
    Inaccurate,
    /// Infeasible or otherwise failed.
    Infeasible,
}

/// Sparse matrix assembled from unordered `(row, col, value)` triplets.
/// Duplicate coordinates are summed.
struct TripletMatrix {
    nrows: usize,
    ncols: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl TripletMatrix {
    fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, row: usize, col: usize, value: f64) {
        self.entries.push((row, col, value));
    }

    fn into_csc(mut self) -> CscMatrix<'static> {
        self.entries.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));
        let mut indptr = vec![0usize];
        let mut indices = Vec::with_capacity(self.entries.len());
        let mut data: Vec<f64> = Vec::with_capacity(self.entries.len());
        let mut col = 0usize;
        let mut prev: Option<(usize, usize)> = None;
        for (row, c, value) in self.entries {
            while col < c {
                indptr.push(indices.len());
                col += 1;
            }
            if prev == Some((c, row)) {
                if let Some(last) = data.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(row);
                data.push(value);
                prev = Some((c, row));
            }
        }
        while col < self.ncols {
            indptr.push(indices.len());
            col += 1;
        }
        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr: indptr.into(),
            indices: indices.into(),
            data: data.into(),
        }
    }
}

/// Solves one horizon QP linearized around the operating trajectory
/// `xbar`.
pub fn solve_linear_mpc(
    params: &MpcParams,
    window: &HorizonWindow,
    xbar: &[Vector4<f64>],
    x0: Vector4<f64>,
) -> Result<QpStatus, ControlError> {
    let t_len = params.horizon;
    let nvar = NX * (t_len + 1) + NU * t_len;
    let sx = |t: usize, j: usize| NX * t + j;
    let su = |t: usize, j: usize| NX * (t_len + 1) + NU * t + j;

    // Quadratic cost. OSQP minimizes 0.5 z'Pz + q'z, so Hessian
    // coefficients are doubled; only the upper triangle is stored.
    let mut p = TripletMatrix::new(nvar, nvar);
    let mut q_lin = vec![0.0; nvar];
    for t in 1..=t_len {
        let w = if t == t_len { &params.qf } else { &params.q };
        for j in 0..NX {
            p.push(sx(t, j), sx(t, j), 2.0 * w[j]);
            q_lin[sx(t, j)] = -2.0 * w[j] * window.xref[t][j];
        }
    }
    for t in 0..t_len {
        for j in 0..NU {
            p.push(su(t, j), su(t, j), 2.0 * params.r[j]);
        }
    }
    for t in 0..t_len.saturating_sub(1) {
        for j in 0..NU {
            p.push(su(t, j), su(t, j), 2.0 * params.rd[j]);
            p.push(su(t + 1, j), su(t + 1, j), 2.0 * params.rd[j]);
            p.push(su(t, j), su(t + 1, j), -2.0 * params.rd[j]);
        }
    }

    let ncon = NX + NX * t_len + (t_len + 1) + NU * t_len + t_len.saturating_sub(1);
    let mut a = TripletMatrix::new(ncon, nvar);
    let mut lower = vec![0.0; ncon];
    let mut upper = vec![0.0; ncon];
    let mut row = 0;

    // Initial condition: x_0 pinned to the measured state.
    for j in 0..NX {
        a.push(row, sx(0, j), 1.0);
        lower[row] = x0[j];
        upper[row] = x0[j];
        row += 1;
    }

    // Dynamics: x_{t+1} = A_t x_t + B_t u_t + C_t, linearized at the
    // operating trajectory and the reference steering angle.
    for t in 0..t_len {
        let lm = linearize(params, xbar[t][2], xbar[t][3], window.dref[t]);
        for i in 0..NX {
            a.push(row, sx(t + 1, i), 1.0);
            for j in 0..NX {
                let coeff = lm.a[(i, j)];
                if coeff != 0.0 {
                    a.push(row, sx(t, j), -coeff);
                }
            }
            for j in 0..NU {
                let coeff = lm.b[(i, j)];
                if coeff != 0.0 {
                    a.push(row, su(t, j), -coeff);
                }
            }
            lower[row] = lm.c[i];
            upper[row] = lm.c[i];
            row += 1;
        }
    }

    // Speed box on every stage.
    for t in 0..=t_len {
        a.push(row, sx(t, 2), 1.0);
        lower[row] = params.min_speed;
        upper[row] = params.max_speed;
        row += 1;
    }

    // Input boxes.
    for t in 0..t_len {
        a.push(row, su(t, 0), 1.0);
        lower[row] = -params.max_accel;
        upper[row] = params.max_accel;
        row += 1;
        a.push(row, su(t, 1), 1.0);
        lower[row] = -params.max_steer;
        upper[row] = params.max_steer;
        row += 1;
    }

    // Steering-rate limit between consecutive stages.
    let dsteer_max = params.max_dsteer * params.dt;
    for t in 0..t_len.saturating_sub(1) {
        a.push(row, su(t + 1, 1), 1.0);
        a.push(row, su(t, 1), -1.0);
        lower[row] = -dsteer_max;
        upper[row] = dsteer_max;
        row += 1;
    }
    debug_assert_eq!(row, ncon);

    let settings = Settings::default()
        .verbose(false)
        .eps_abs(1e-6)
        .eps_rel(1e-6);
    let mut problem = Problem::new(p.into_csc(), &q_lin, a.into_csc(), &lower, &upper, &settings)
        .map_err(|e| ControlError::QpSetup(e.to_string()))?;

    Ok(match problem.solve() {
        Status::Solved(solution) => QpStatus::Optimal(extract_plan(solution.x(), t_len)),
        Status::SolvedInaccurate(_) => QpStatus::Inaccurate,
        _ => QpStatus::Infeasible,
    })
}

fn extract_plan(z: &[f64], t_len: usize) -> SolvedPlan {
    let off = NX * (t_len + 1);
    let mut plan = SolvedPlan {
        x: Vec::with_capacity(t_len + 1),
        y: Vec::with_capacity(t_len + 1),
        v: Vec::with_capacity(t_len + 1),
        yaw: Vec::with_capacity(t_len + 1),
        accel: Vec::with_capacity(t_len),
        steer: Vec::with_capacity(t_len),
    };
    for t in 0..=t_len {
        plan.x.push(z[NX * t]);
        plan.y.push(z[NX * t + 1]);
        plan.v.push(z[NX * t + 2]);
        plan.yaw.push(z[NX * t + 3]);
    }
    for t in 0..t_len {
        plan.accel.push(z[off + NU * t]);
        plan.steer.push(z[off + NU * t + 1]);
    }
    plan
}

/// Iteratively relinearizes around the predicted trajectory until the
/// control delta drops below the convergence threshold.
///
/// Returns the accepted trace (the warm start untouched when every solve
/// failed) and the last solved plan, if any round produced one.
pub fn iterative_linear_mpc(
    params: &MpcParams,
    window: &HorizonWindow,
    x0: Vector4<f64>,
    warm: Option<ControlTrace>,
) -> Result<(ControlTrace, Option<SolvedPlan>), ControlError> {
    let mut trace = warm.unwrap_or_else(|| ControlTrace::zeros(params.horizon));
    let mut last_plan = None;
    for _ in 0..params.max_iter {
        let xbar = predict_motion(params, x0, &trace.accel, &trace.steer);
        match solve_linear_mpc(params, window, &xbar, x0)? {
            QpStatus::Optimal(plan) => {
                let du: f64 = plan
                    .accel
                    .iter()
                    .zip(&trace.accel)
                    .chain(plan.steer.iter().zip(&trace.steer))
                    .map(|(new, old)| (new - old).abs())
                    .sum();
                trace = ControlTrace {
                    accel: plan.accel.clone(),
                    steer: plan.steer.clone(),
                };
                last_plan = Some(plan);
                if du <= params.du_th {
                    break;
                }
            }
            QpStatus::Inaccurate | QpStatus::Infeasible => {
                debug!("horizon QP not solved to optimality, keeping previous plan");
                break;
            }
        }
    }
    Ok((trace, last_plan))
}
