//! Scenario record types.
//!
//! A record is a flat mapping keyed by `state/...` paths, one row per
//! agent. Only the keys the simulator consumes are typed; every other key
//! passes through serialization untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A motion scenario record.
///
/// `future_x`/`future_y` hold the per-agent waypoint rows (`-1` cells are
/// sentinels for missing samples); `past_length`/`past_width` hold
/// per-tick bounding-box samples used to average the vehicle geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(rename = "state/future/x")]
    pub future_x: Vec<Vec<f64>>,
    #[serde(rename = "state/future/y")]
    pub future_y: Vec<Vec<f64>>,
    #[serde(rename = "state/past/length", default)]
    pub past_length: Vec<Vec<f64>>,
    #[serde(rename = "state/past/width", default)]
    pub past_width: Vec<Vec<f64>>,
    /// Opaque per-agent identifiers.
    #[serde(rename = "state/id", default)]
    pub id: Vec<f64>,
    /// Per-agent ego flag; at most one entry is expected to be set.
    #[serde(rename = "state/is_sdc", default)]
    pub is_sdc: Vec<f64>,
    #[serde(
        rename = "state/future/bbox_yaw",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub future_bbox_yaw: Vec<Vec<f64>>,
    #[serde(
        rename = "state/future/vel_yaw",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub future_vel_yaw: Vec<Vec<f64>>,
    #[serde(
        rename = "state/future/velocity_x",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub future_velocity_x: Vec<Vec<f64>>,
    #[serde(
        rename = "state/future/velocity_y",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub future_velocity_y: Vec<Vec<f64>>,
    /// Keys the simulator does not consume, carried through verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Scenario {
    /// Number of agents in the record.
    pub fn agent_count(&self) -> usize {
        self.future_x.len()
    }

    /// Waypoint column count `W`.
    pub fn waypoint_len(&self) -> usize {
        self.future_x.first().map(Vec::len).unwrap_or(0)
    }

    /// Index of the agent flagged as the recorded ego vehicle, if any.
    /// When several rows carry the flag the last one wins.
    pub fn main_car_index(&self) -> Option<usize> {
        let mut found = None;
        for (i, flag) in self.is_sdc.iter().enumerate() {
            if *flag == 1.0 {
                found = Some(i);
            }
        }
        found
    }

    /// Bounding-box length samples for one agent; empty when the record
    /// carries none.
    pub fn length_samples(&self, agent: usize) -> &[f64] {
        self.past_length.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bounding-box width samples for one agent; empty when the record
    /// carries none.
    pub fn width_samples(&self, agent: usize) -> &[f64] {
        self.past_width.get(agent).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Scenario {
        serde_json::from_value(json!({
            "state/future/x": [[0.0, 1.0, 2.0], [5.0, 6.0, 7.0]],
            "state/future/y": [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            "state/past/length": [[4.5, 4.4], [-1.0, -1.0]],
            "state/past/width": [[2.0, 2.0], []],
            "state/id": [11.0, 12.0],
            "state/is_sdc": [0.0, 1.0],
            "scenario/id": "abc"
        }))
        .unwrap()
    }

    #[test]
    fn typed_keys_and_passthrough() {
        let scenario = record();
        assert_eq!(scenario.agent_count(), 2);
        assert_eq!(scenario.waypoint_len(), 3);
        assert_eq!(scenario.main_car_index(), Some(1));
        assert_eq!(scenario.extra["scenario/id"], json!("abc"));
    }

    #[test]
    fn missing_geometry_rows_yield_empty_slices() {
        let scenario = record();
        assert_eq!(scenario.length_samples(1), &[-1.0, -1.0]);
        assert_eq!(scenario.width_samples(1), &[] as &[f64]);
        assert_eq!(scenario.width_samples(7), &[] as &[f64]);
    }

    #[test]
    fn round_trip_preserves_renamed_keys() {
        let scenario = record();
        let value = serde_json::to_value(&scenario).unwrap();
        assert!(value.get("state/future/x").is_some());
        assert!(value.get("state/future/bbox_yaw").is_none());
        let back: Scenario = serde_json::from_value(value).unwrap();
        assert_eq!(back.id, scenario.id);
    }
}
