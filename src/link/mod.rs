//! Command link to the JalaIO vehicle control daemon.
//!
//! The daemon accepts waypoint trajectories and in-place rotation commands
//! over TCP. The [`MissionLink`] trait is the seam between the replay logic
//! and the transport, so missions can run against a mock in tests.

pub(crate) mod client;
mod mock;

pub use client::JalaClient;
pub use mock::{ActuatorCommand, MockLink};

use crate::error::Result;
use crate::tracklog::Position;

/// Accept/reject outcome of a waypoint batch submission.
#[derive(Clone, Debug)]
pub struct Acceptance {
    pub accepted: bool,
    pub message: String,
}

impl Acceptance {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// One target waypoint with its motion parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetWaypoint {
    pub position: Position,
    pub max_forward_speed: f32,
    pub heading_offset: f32,
    pub use_fixed_heading: bool,
}

/// A batch of waypoints submitted together between inspection pauses.
///
/// Built per submission, sent, and discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct WaypointBatch {
    pub frame_id: String,
    pub waypoints: Vec<TargetWaypoint>,
    pub interpolator: String,
    pub start_now: bool,
}

/// Commands the mission controller issues to the vehicle.
pub trait MissionLink: Send {
    /// Submit a waypoint batch for tracking. Returns the daemon's
    /// accept/reject response.
    fn submit_waypoints(&mut self, batch: &WaypointBatch) -> Result<Acceptance>;

    /// Command an in-place rotation at the given angular velocity (rad/s).
    fn send_scan_velocity(&mut self, angular_z: f32) -> Result<()>;

    /// Command a full stop (zero velocity).
    fn send_stop(&mut self) -> Result<()>;
}
