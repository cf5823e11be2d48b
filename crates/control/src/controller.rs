//! Per-vehicle tracking controller.
//!
//! Owns the vehicle state, the reference course, the warm-started MPC plan
//! and the recorded histories. Each tick consumes a read-only obstacle view
//! and advances the vehicle either under closed-loop MPC or, for the
//! recorded ego vehicle, by scripted waypoint playback.

use std::f64::consts::PI;

use nalgebra::Vector4;
use rand::Rng;
use tracing::debug;

use crate::avoidance;
use crate::errors::ControlError;
use crate::params::MpcParams;
use crate::reference::ReferencePath;
use crate::solver::{iterative_linear_mpc, ControlTrace};
use crate::state::VehicleState;

/// How a vehicle advances each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Closed-loop MPC tracking.
    Mpc,
    /// Scripted waypoint playback (the recorded ego vehicle).
    Playback,
}

/// Recorded per-tick signals, seeded with the initial sample.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub yaw: Vec<f64>,
    pub v: Vec<f64>,
    pub vel_x: Vec<f64>,
    pub vel_y: Vec<f64>,
    pub vel_yaw: Vec<f64>,
    pub t: Vec<f64>,
    pub d: Vec<f64>,
    pub a: Vec<f64>,
}

/// A single tracked vehicle.
#[derive(Debug)]
pub struct VehicleController {
    params: MpcParams,
    pub state: VehicleState,
    pub path: ReferencePath,
    mode: ControlMode,
    avoidance_enabled: bool,
    target_ind: usize,
    trace: Option<ControlTrace>,
    accel_cmd: f64,
    steer_cmd: f64,
    time: f64,
    reached_goal: bool,
    playback_index: usize,
    playback_last_yaw: f64,
    /// Averaged bounding-box length from the dataset [m].
    pub length: f64,
    /// Averaged bounding-box width from the dataset [m].
    pub width: f64,
    pub history: History,
}

impl VehicleController {
    /// Builds a controller from raw waypoints and per-tick geometry
    /// samples. The initial speed is estimated from the first waypoint
    /// pair; the initial heading is the course heading, wrap-compensated.
    pub fn new(
        x_raw: &[f64],
        y_raw: &[f64],
        length_samples: &[f64],
        width_samples: &[f64],
        params: MpcParams,
        rng: &mut impl Rng,
    ) -> Result<Self, ControlError> {
        let path = ReferencePath::from_waypoints(x_raw, y_raw, params.target_speed, rng)?;
        let length = average_dimension(length_samples, 3.0);
        let width = average_dimension(width_samples, 2.0);

        let initial_v = if path.len() >= 2 {
            (path.cx[1] - path.cx[0]).hypot(path.cy[1] - path.cy[0]) / params.dt / 2.0
        } else {
            0.0
        };
        let mut state = VehicleState::new(path.cx[0], path.cy[0], path.cyaw[0], initial_v);

        // Initial yaw wrap compensation against the course heading.
        if state.yaw - path.cyaw[0] >= PI {
            state.yaw -= 2.0 * PI;
        } else if state.yaw - path.cyaw[0] <= -PI {
            state.yaw += 2.0 * PI;
        }

        let (target_ind, _) = path.nearest_index(&state, 0, params.n_ind_search);

        let history = History {
            x: vec![state.x],
            y: vec![state.y],
            yaw: vec![state.yaw],
            v: vec![state.v],
            vel_x: vec![state.v * state.yaw.cos()],
            vel_y: vec![state.v * state.yaw.sin()],
            vel_yaw: vec![0.0],
            t: vec![0.0],
            d: vec![0.0],
            a: vec![0.0],
        };

        Ok(Self {
            params,
            state,
            path,
            mode: ControlMode::Mpc,
            avoidance_enabled: true,
            target_ind,
            trace: None,
            accel_cmd: 0.0,
            steer_cmd: 0.0,
            time: 0.0,
            reached_goal: false,
            playback_index: 0,
            playback_last_yaw: 0.0,
            length,
            width,
            history,
        })
    }

    /// Switches the controller to scripted playback and disables
    /// avoidance.
    pub fn set_playback(&mut self) {
        self.mode = ControlMode::Playback;
        self.avoidance_enabled = false;
    }

    pub fn set_obstacle_avoidance(&mut self, enabled: bool) {
        self.avoidance_enabled = enabled;
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn reached_goal(&self) -> bool {
        self.reached_goal
    }

    pub fn target_ind(&self) -> usize {
        self.target_ind
    }

    /// Simulated time consumed by this vehicle [s].
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steer_cmd(&self) -> f64 {
        self.steer_cmd
    }

    /// One-step dead-reckoned position published to the obstacle cache.
    pub fn predicted_position(&self) -> (f64, f64) {
        (
            self.state.x + self.state.v * self.state.yaw.cos() * self.params.dt,
            self.state.y + self.state.v * self.state.yaw.sin() * self.params.dt,
        )
    }

    /// Advances the vehicle by one tick against the given obstacle view.
    /// Returns `true` once the vehicle is done: parked inside the goal
    /// tolerance or out of simulated time.
    pub fn update(&mut self, obstacles: &[(f64, f64)]) -> bool {
        if self.time >= self.params.max_time {
            return true;
        }
        if self.goal_distance() < self.params.xy_goal_tolerance {
            return true;
        }
        match self.mode {
            ControlMode::Mpc => self.update_mpc(obstacles),
            ControlMode::Playback => self.update_playback(),
        }
        false
    }

    fn goal_distance(&self) -> f64 {
        let (gx, gy) = self.path.goal();
        (self.state.x - gx).hypot(self.state.y - gy)
    }

    fn update_mpc(&mut self, obstacles: &[(f64, f64)]) {
        let (window, ind) = self
            .path
            .horizon_window(&self.state, &self.params, self.target_ind);
        self.target_ind = ind;
        let x0 = Vector4::new(self.state.x, self.state.y, self.state.v, self.state.yaw);

        match iterative_linear_mpc(&self.params, &window, x0, self.trace.take()) {
            Ok((trace, Some(plan))) => {
                self.accel_cmd = plan.accel[0];
                self.steer_cmd = plan.steer[0];
                self.trace = Some(trace);
            }
            Ok((trace, None)) => {
                // Not solved to optimality this tick: coast, keep the
                // warm start for the next one.
                self.accel_cmd = 0.0;
                self.steer_cmd = 0.0;
                self.trace = Some(trace);
            }
            Err(e) => {
                debug!(error = %e, "MPC layer failed, coasting");
                self.accel_cmd = 0.0;
                self.steer_cmd = 0.0;
            }
        }

        if self.avoidance_enabled {
            if self.reached_goal {
                // Bleed the remaining speed off in one tick and hold.
                self.accel_cmd = -self.state.v / self.params.dt;
                self.steer_cmd = 0.0;
            } else {
                let force = avoidance::field_vector(&self.state, obstacles);
                let (accel, steer) = avoidance::blend(
                    &self.state,
                    &self.params,
                    self.accel_cmd,
                    self.steer_cmd,
                    force,
                );
                self.accel_cmd = accel;
                self.steer_cmd = steer;
            }
        }

        self.state.step(&self.params, self.accel_cmd, self.steer_cmd);
        self.time += self.params.dt;
        self.record_sample();

        if self.check_goal() || self.goal_distance() < self.params.xy_goal_tolerance {
            self.reached_goal = true;
        }
    }

    fn record_sample(&mut self) {
        let s = self.state;
        self.history.x.push(s.x);
        self.history.y.push(s.y);
        self.history.yaw.push(s.yaw);
        self.history.v.push(s.v);
        self.history.vel_x.push(s.v * s.yaw.cos());
        self.history.vel_y.push(s.v * s.yaw.sin());
        self.history
            .vel_yaw
            .push(yaw_rate_signal(s.v, self.length, self.steer_cmd));
        self.history.t.push(self.time);
        self.history.d.push(self.steer_cmd);
        self.history.a.push(self.accel_cmd);
    }

    /// Near the goal, stopped, and with the target index at the end of the
    /// course.
    fn check_goal(&self) -> bool {
        let mut is_goal = self.goal_distance() <= self.params.goal_dis;
        if (self.target_ind as i64 - self.path.len() as i64).abs() >= 5 {
            is_goal = false;
        }
        let is_stopped = self.state.v.abs() <= self.params.stop_speed;
        is_goal && is_stopped
    }

    fn update_playback(&mut self) {
        let n = self.path.len();
        let i = self.playback_index;
        if i >= n {
            self.reached_goal = true;
            return;
        }
        let cx = &self.path.cx;
        let cy = &self.path.cy;
        if i + 2 < n {
            self.state.x = cx[i + 1];
            self.state.y = cy[i + 1];
            self.state.yaw = (cy[i + 2] - cy[i + 1]).atan2(cx[i + 2] - cx[i + 1]);
            self.state.v = (cx[i + 1] - cx[i]).hypot(cy[i + 1] - cy[i]) / self.params.dt;
        } else if i + 2 == n {
            self.state.x = cx[i + 1];
            self.state.y = cy[i + 1];
            self.state.yaw = (cy[i + 1] - cy[i]).atan2(cx[i + 1] - cx[i]);
            self.state.v = (cx[i + 1] - cx[i]).hypot(cy[i + 1] - cy[i]) / self.params.dt;
        } else {
            self.state.x = cx[i];
            self.state.y = cy[i];
            self.state.yaw = (cy[i] - cy[i - 1]).atan2(cx[i] - cx[i - 1]);
            self.state.v = (cx[i] - cx[i - 1]).hypot(cy[i] - cy[i - 1]) / self.params.dt;
        }

        let s = self.state;
        self.history.x.push(s.x);
        self.history.y.push(s.y);
        self.history.yaw.push(s.yaw);
        self.history.v.push(s.v);
        self.history.vel_x.push(s.v * s.yaw.cos());
        self.history.vel_y.push(s.v * s.yaw.sin());
        self.history
            .vel_yaw
            .push((s.yaw - self.playback_last_yaw) / self.params.dt);

        self.playback_index += 1;
        self.playback_last_yaw = s.yaw;
    }
}

/// Recorded yaw-rate channel; the `steer == 0` branch guards the division.
fn yaw_rate_signal(v: f64, length: f64, steer: f64) -> f64 {
    if steer == 0.0 {
        0.0
    } else {
        v / length / steer.tan()
    }
}

/// Mean of the strictly positive samples, or the fallback when none exist.
fn average_dimension(samples: &[f64], fallback: f64) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &sample in samples {
        if sample > 0.0 {
            sum += sample;
            count += 1;
        }
    }
    if count == 0 {
        fallback
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn geometry_averages_skip_non_positive_samples() {
        assert_eq!(average_dimension(&[4.0, -1.0, 0.0, 6.0], 3.0), 5.0);
        assert_eq!(average_dimension(&[], 3.0), 3.0);
        assert_eq!(average_dimension(&[-1.0, 0.0], 2.0), 2.0);
    }

    #[test]
    fn yaw_rate_signal_guards_zero_steer() {
        assert_eq!(yaw_rate_signal(5.0, 4.0, 0.0), 0.0);
        assert!(yaw_rate_signal(5.0, 4.0, 0.3).is_finite());
    }

    #[test]
    fn setup_estimates_the_initial_speed_from_the_first_segment() {
        let params = MpcParams::default();
        let mut rng = StdRng::seed_from_u64(1);
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 2.0).collect();
        let ys = vec![0.0; 20];
        let vehicle =
            VehicleController::new(&xs, &ys, &[], &[], params.clone(), &mut rng).unwrap();
        // 2 m over 0.2 s, halved.
        assert!((vehicle.state.v - 5.0).abs() < 1e-9);
        assert_eq!(vehicle.history.x.len(), 1);
        assert_eq!(vehicle.length, 3.0);
        assert_eq!(vehicle.width, 2.0);
    }

    #[test]
    fn playback_replays_the_course_and_finishes() {
        let params = MpcParams::default();
        let mut rng = StdRng::seed_from_u64(1);
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys = vec![0.0; 10];
        let mut vehicle = VehicleController::new(&xs, &ys, &[], &[], params, &mut rng).unwrap();
        vehicle.set_playback();

        let mut done = false;
        for _ in 0..20 {
            if vehicle.update(&[]) {
                done = true;
                break;
            }
        }
        assert!(done, "playback vehicle never finished");
        let (gx, gy) = vehicle.path.goal();
        assert!((vehicle.state.x - gx).hypot(vehicle.state.y - gy) < 5.0);
        // Speed replayed from the waypoint spacing: 1 m per 0.2 s.
        assert!((vehicle.state.v - 5.0).abs() < 1e-9);
    }
}
