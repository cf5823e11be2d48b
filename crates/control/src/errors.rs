//! Error types for the control crate.

use thiserror::Error;

/// Errors surfaced by controller setup and the MPC layer.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No valid waypoints remained after sentinel filtering.
    #[error("waypoint list is empty")]
    EmptyWaypoints,
    /// The QP backend rejected the problem data.
    #[error("QP setup failed: {0}")]
    QpSetup(String),
}
