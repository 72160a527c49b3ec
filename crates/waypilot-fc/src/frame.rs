//! Conversion between the mission core's local ENU frame (x east, y north,
//! z up, yaw counter-clockwise from east) and the autopilot's local NED frame
//! (x north, y east, z down, yaw clockwise from north).
//!
//! Both conversions are their own inverse.

use waypilot_proto::{wrap_pi, Vec3};

pub fn enu_to_ned(v: Vec3) -> Vec3 {
    Vec3::new(v.y, v.x, -v.z)
}

pub fn ned_to_enu(v: Vec3) -> Vec3 {
    Vec3::new(v.y, v.x, -v.z)
}

pub fn yaw_enu_to_ned(yaw: f64) -> f64 {
    wrap_pi(std::f64::consts::FRAC_PI_2 - yaw)
}

pub fn yaw_ned_to_enu(yaw: f64) -> f64 {
    wrap_pi(std::f64::consts::FRAC_PI_2 - yaw)
}
