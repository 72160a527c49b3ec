use serde::{Deserialize, Serialize};

use crate::mission::MissionPhase;
use crate::vehicle::Vec3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub ts_unix_ms: i64,
    pub phase: MissionPhase,
    pub cursor: usize,
    pub waypoint_count: usize,
    pub position: Vec3,
    pub yaw: f64,
    pub mode_confirmed: bool,
    pub armed_confirmed: bool,
}
