//! Controller, vehicle and goal parameters.

use std::f64::consts::PI;

/// Tuning and limit parameters shared by the MPC controller, the bicycle
/// model and the goal logic. [`Default`] carries the reference tuning.
#[derive(Debug, Clone)]
pub struct MpcParams {
    /// MPC horizon length (steps).
    pub horizon: usize,
    /// Simulation tick [s].
    pub dt: f64,
    /// Course sample spacing [m].
    pub dl: f64,
    /// State cost diagonal over `[x, y, v, yaw]`.
    pub q: [f64; 4],
    /// Terminal state cost diagonal.
    pub qf: [f64; 4],
    /// Input cost diagonal over `[accel, steer]`.
    pub r: [f64; 2],
    /// Input difference cost diagonal.
    pub rd: [f64; 2],
    /// Target cruise speed [m/s].
    pub target_speed: f64,
    /// Width of the nearest-index search window (path samples).
    pub n_ind_search: usize,
    /// Maximum relinearization rounds per tick.
    pub max_iter: usize,
    /// Convergence threshold on the control-plan delta.
    pub du_th: f64,
    /// Wheelbase [m].
    pub wheelbase: f64,
    /// Speed box [m/s].
    pub max_speed: f64,
    pub min_speed: f64,
    /// Acceleration limit [m/s^2].
    pub max_accel: f64,
    /// Steering angle limit [rad].
    pub max_steer: f64,
    /// Steering rate limit [rad/s].
    pub max_dsteer: f64,
    /// Goal acceptance radius for the stop check [m].
    pub goal_dis: f64,
    /// Speed below which the vehicle counts as stopped [m/s].
    pub stop_speed: f64,
    /// Hard positional goal tolerance [m].
    pub xy_goal_tolerance: f64,
    /// Simulated time budget per vehicle [s].
    pub max_time: f64,
    /// Reactive potential-field avoidance (forced off for playback).
    pub obstacle_avoidance: bool,
}

impl Default for MpcParams {
    fn default() -> Self {
        let q = [1.0, 1.0, 0.5, 1.0];
        let goal_dis = 5.0;
        Self {
            horizon: 5,
            dt: 0.2,
            dl: 1.0,
            q,
            qf: q,
            r: [0.1, 0.1],
            rd: [0.1, 1.0],
            target_speed: 40.0 / 3.6,
            n_ind_search: 10,
            max_iter: 2,
            du_th: 0.1,
            wheelbase: 2.5,
            max_speed: 60.0 / 3.6,
            min_speed: 0.0,
            max_accel: 1.0,
            max_steer: 45.0 * PI / 180.0,
            max_dsteer: 30.0 * PI / 180.0,
            goal_dis,
            stop_speed: 0.5 / 3.6,
            xy_goal_tolerance: goal_dis,
            max_time: 20.0,
            obstacle_avoidance: true,
        }
    }
}
