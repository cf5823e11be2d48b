//! Reference course construction and the per-tick horizon window.
//!
//! Raw dataset waypoints are sanitized (trailing `(-1, -1)` sentinels
//! dropped, short inputs padded), differentiated into heading and signed
//! curvature, unwrapped, and annotated with a signed speed profile. At
//! every tick the controller slices a `T + 1` window out of the course,
//! anchored at a monotonically advancing target index.

use std::f64::consts::PI;

use nalgebra::Vector4;
use rand::Rng;

use crate::errors::ControlError;
use crate::normalize_angle;
use crate::params::MpcParams;
use crate::state::VehicleState;

/// Sampled reference course with heading, curvature and a signed speed
/// profile. Immutable for the lifetime of a run; always at least three
/// samples long.
#[derive(Debug, Clone)]
pub struct ReferencePath {
    pub cx: Vec<f64>,
    pub cy: Vec<f64>,
    /// Unwrapped course heading.
    pub cyaw: Vec<f64>,
    /// Signed curvature.
    pub ck: Vec<f64>,
    /// Signed target speed per sample; the terminal sample is zero.
    pub sp: Vec<f64>,
}

/// Per-tick reference window over the horizon.
#[derive(Debug, Clone)]
pub struct HorizonWindow {
    /// Reference states `[x, y, v, yaw]`, `T + 1` entries.
    pub xref: Vec<Vector4<f64>>,
    /// Reference steering angles; zero at the operating point.
    pub dref: Vec<f64>,
}

impl ReferencePath {
    /// Builds a course from raw waypoints. Trailing `(-1, -1)` sentinel
    /// pairs are dropped; inputs shorter than three points are padded with
    /// small random offsets drawn from `rng` so the curvature stencil stays
    /// valid. Real points are never altered.
    pub fn from_waypoints(
        x_raw: &[f64],
        y_raw: &[f64],
        target_speed: f64,
        rng: &mut impl Rng,
    ) -> Result<Self, ControlError> {
        if x_raw.is_empty() || y_raw.is_empty() {
            return Err(ControlError::EmptyWaypoints);
        }
        let (cx, cy) = sanitize_waypoints(x_raw, y_raw, rng);
        let (mut cyaw, ck) = yaw_and_curvature(&cx, &cy);
        smooth_yaw(&mut cyaw);
        let sp = speed_profile(&cx, &cy, &cyaw, target_speed);
        Ok(Self { cx, cy, cyaw, ck, sp })
    }

    pub fn len(&self) -> usize {
        self.cx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cx.is_empty()
    }

    /// Final course point.
    pub fn goal(&self) -> (f64, f64) {
        (self.cx[self.len() - 1], self.cy[self.len() - 1])
    }

    /// Nearest course index within `[pind, pind + search)`, together with
    /// the lateral offset: the distance to that sample, negated when the
    /// vehicle sits on the left of the course heading.
    pub fn nearest_index(&self, state: &VehicleState, pind: usize, search: usize) -> (usize, f64) {
        let pind = pind.min(self.len() - 1);
        let end = (pind + search).min(self.len());
        let mut best = pind;
        let mut best_d2 = f64::INFINITY;
        for i in pind..end {
            let d2 = (state.x - self.cx[i]).powi(2) + (state.y - self.cy[i]).powi(2);
            if d2 < best_d2 {
                best_d2 = d2;
                best = i;
            }
        }
        let mut dist = best_d2.sqrt();
        let dxl = self.cx[best] - state.x;
        let dyl = self.cy[best] - state.y;
        if normalize_angle(self.cyaw[best] - dyl.atan2(dxl)) < 0.0 {
            dist = -dist;
        }
        (best, dist)
    }

    /// Builds the `T + 1` reference window. The returned index is the
    /// advanced target index, never below `pind`; window samples never
    /// address past the end of the course.
    pub fn horizon_window(
        &self,
        state: &VehicleState,
        params: &MpcParams,
        pind: usize,
    ) -> (HorizonWindow, usize) {
        let n = self.len();
        let (ind, _) = self.nearest_index(state, pind, params.n_ind_search);
        let ind = ind.max(pind);

        let mut xref = Vec::with_capacity(params.horizon + 1);
        let dref = vec![0.0; params.horizon + 1];
        let mut travel = 0.0;
        for _ in 0..=params.horizon {
            travel += state.v.abs() * params.dt;
            let dind = (travel / params.dl).round() as usize;
            let j = (ind + dind).min(n - 1);
            xref.push(Vector4::new(self.cx[j], self.cy[j], self.sp[j], self.cyaw[j]));
        }
        (HorizonWindow { xref, dref }, ind)
    }
}

/// Drops trailing `(-1, -1)` sentinel pairs (never below one point) and
/// pads to at least three points with offsets in `(0, 1)`.
fn sanitize_waypoints(x_raw: &[f64], y_raw: &[f64], rng: &mut impl Rng) -> (Vec<f64>, Vec<f64>) {
    let n = x_raw.len().min(y_raw.len());
    let mut xs = x_raw[..n].to_vec();
    let mut ys = y_raw[..n].to_vec();
    while xs.len() > 1 && xs[xs.len() - 1] == -1.0 && ys[ys.len() - 1] == -1.0 {
        xs.pop();
        ys.pop();
    }
    while xs.len() < 3 {
        let last_x = xs[xs.len() - 1];
        let last_y = ys[ys.len() - 1];
        xs.push(last_x + rng.gen::<f64>());
        ys.push(last_y + rng.gen::<f64>());
    }
    (xs, ys)
}

/// Heading and signed curvature from three-point difference stencils.
/// Endpoints fall back to one-sided differences. Expects at least three
/// samples.
pub fn yaw_and_curvature(wx: &[f64], wy: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = wx.len();
    let mut yaw = vec![0.0; n];
    let mut k = vec![0.0; n];
    for i in 0..n {
        let (dx, dy, ddx, ddy) = if i == 0 {
            (
                wx[1] - wx[0],
                wy[1] - wy[0],
                wx[2] + wx[0] - 2.0 * wx[1],
                wy[2] + wy[0] - 2.0 * wy[1],
            )
        } else if i == n - 1 {
            (
                wx[i] - wx[i - 1],
                wy[i] - wy[i - 1],
                wx[i] + wx[i - 2] - 2.0 * wx[i - 1],
                wy[i] + wy[i - 2] - 2.0 * wy[i - 1],
            )
        } else {
            (
                wx[i + 1] - wx[i],
                wy[i + 1] - wy[i],
                wx[i + 1] + wx[i - 1] - 2.0 * wx[i],
                wy[i + 1] + wy[i - 1] - 2.0 * wy[i],
            )
        };
        yaw[i] = dy.atan2(dx);
        let denom = (dx * dx + dy * dy).powf(1.5);
        k[i] = if denom > 0.0 {
            (ddy * dx - ddx * dy) / denom
        } else {
            0.0
        };
    }
    (yaw, k)
}

/// Unwraps heading samples in place so consecutive differences stay below
/// a half turn. Idempotent on already-smoothed input.
pub fn smooth_yaw(yaw: &mut [f64]) {
    for i in 0..yaw.len().saturating_sub(1) {
        let mut dyaw = yaw[i + 1] - yaw[i];
        while dyaw >= PI / 2.0 {
            yaw[i + 1] -= 2.0 * PI;
            dyaw = yaw[i + 1] - yaw[i];
        }
        while dyaw <= -PI / 2.0 {
            yaw[i + 1] += 2.0 * PI;
            dyaw = yaw[i + 1] - yaw[i];
        }
    }
}

/// Signed speed profile: `+target` where the travel direction agrees with
/// the course heading, `-target` where it opposes it (switch-back
/// segments), with a forced terminal stop. The direction flag only
/// re-evaluates on samples with movement in both axes.
pub fn speed_profile(cx: &[f64], cy: &[f64], cyaw: &[f64], target_speed: f64) -> Vec<f64> {
    let n = cx.len();
    let mut sp = vec![target_speed; n];
    let mut direction = 1.0;
    for i in 0..n.saturating_sub(1) {
        let dx = cx[i + 1] - cx[i];
        let dy = cy[i + 1] - cy[i];
        if dx != 0.0 && dy != 0.0 {
            let move_direction = dy.atan2(dx);
            let dangle = normalize_angle(move_direction - cyaw[i]).abs();
            direction = if dangle >= PI / 4.0 { -1.0 } else { 1.0 };
        }
        sp[i] = direction * target_speed;
    }
    if let Some(last) = sp.last_mut() {
        *last = 0.0;
    }
    sp
}
