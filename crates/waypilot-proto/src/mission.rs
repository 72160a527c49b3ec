use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vehicle::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaypointKind {
    /// Fly to the point through the planner.
    Goto,
    /// Turn in place by `yaw` radians relative to the heading on arrival.
    Rotate,
    /// Hold the point and sweep the heading at a fixed rate.
    Spiral,
}

impl WaypointKind {
    /// Maps the integer flag used in waypoint files (0/1/2).
    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            0 => Some(Self::Goto),
            1 => Some(Self::Rotate),
            2 => Some(Self::Spiral),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Vec3,
    pub yaw: f64,
    pub kind: WaypointKind,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64, yaw: f64, kind: WaypointKind) -> Self {
        Self { position: Vec3::new(x, y, z), yaw, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionPhase {
    Init,
    Takeoff,
    TrackWaypoints,
    HoldForGoal,
    TrackGoal,
    Landing,
    Landed,
}

impl MissionPhase {
    /// Phases in which the vehicle is assumed to be off the ground.
    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            Self::Takeoff | Self::TrackWaypoints | Self::HoldForGoal | Self::TrackGoal
        )
    }
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::Takeoff => "TAKEOFF",
            Self::TrackWaypoints => "TRACK_WAYPOINTS",
            Self::HoldForGoal => "HOLD_FOR_GOAL",
            Self::TrackGoal => "TRACK_GOAL",
            Self::Landing => "LANDING",
            Self::Landed => "LANDED",
        };
        f.write_str(s)
    }
}
