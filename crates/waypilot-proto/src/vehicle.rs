use serde::{Deserialize, Serialize};

/// Local-frame vector. x east, y north, z up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 }
    }
}

impl Quaternion {
    /// Yaw of the ZYX (roll-pitch-yaw) decomposition, in (-pi, pi].
    /// Roll and pitch are not needed anywhere in the mission core.
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }

    /// Pure yaw rotation; handy for simulators and tests.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self { w: half.cos(), x: 0.0, y: 0.0, z: half.sin() }
    }
}

/// Latest vehicle telemetry as seen by the mission core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub position: Vec3,
    pub yaw: f64,
    pub armed: bool,
    pub mode: String,
}

/// One feedforward sample from the trajectory planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerSample {
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f64,
    pub yaw_rate: f64,
}

/// A single command for one control cycle of the flight stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Setpoint {
    Position { position: Vec3, yaw: f64 },
    Velocity { velocity: Vec3, yaw: f64 },
}

impl Setpoint {
    pub fn yaw(&self) -> f64 {
        match self {
            Setpoint::Position { yaw, .. } | Setpoint::Velocity { yaw, .. } => *yaw,
        }
    }
}
