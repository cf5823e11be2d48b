//! History normalization into fixed-width output matrices.

use crate::dataset::Scenario;
use crate::scheduler::Simulation;

/// Normalizes one history row to exactly `target` columns: truncating when
/// longer, right-padding with the last value when shorter.
pub fn normalize_row(mut row: Vec<f64>, target: usize) -> Vec<f64> {
    row.truncate(target);
    if let Some(&last) = row.last() {
        while row.len() < target {
            row.push(last);
        }
    } else {
        row.resize(target, 0.0);
    }
    row
}

/// Linear resampling of a sequence to a new length, keeping the endpoints.
pub fn resample(values: &[f64], new_len: usize) -> Vec<f64> {
    if values.is_empty() || new_len == 0 {
        return Vec::new();
    }
    if new_len == 1 {
        return vec![values[0]];
    }
    let delta = (values.len() - 1) as f64 / (new_len - 1) as f64;
    (0..new_len)
        .map(|i| lerp_at(values, i as f64 * delta))
        .collect()
}

fn lerp_at(values: &[f64], fi: f64) -> f64 {
    let last = values.len() - 1;
    let frac = fi.fract();
    let i = (fi.floor() as usize).min(last);
    let j = if frac > 0.0 { (i + 1).min(last) } else { i };
    (1.0 - frac) * values[i] + frac * values[j]
}

/// Rewrites the future channels of `scenario` from the simulated
/// histories, each normalized to `W - 1` columns.
pub fn write_back(scenario: &mut Scenario, sim: &Simulation) {
    let target = scenario.waypoint_len().saturating_sub(1);
    let rows = |f: fn(&control::History) -> &Vec<f64>| -> Vec<Vec<f64>> {
        sim.vehicles()
            .iter()
            .map(|v| normalize_row(f(&v.history).clone(), target))
            .collect()
    };
    scenario.future_x = rows(|h| &h.x);
    scenario.future_y = rows(|h| &h.y);
    scenario.future_bbox_yaw = rows(|h| &h.yaw);
    scenario.future_vel_yaw = rows(|h| &h.vel_yaw);
    scenario.future_velocity_x = rows(|h| &h.vel_x);
    scenario.future_velocity_y = rows(|h| &h.vel_y);
}
