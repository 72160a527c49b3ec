//! Setpoint generators and completion predicates. Pure functions of the
//! latest samples; all timing state lives in the caller.

use std::time::Duration;

use waypilot_proto::{angle_diff, wrap_pi, PlannerSample, Setpoint, Vec3, VehicleState};

use crate::config::TrackingGains;

/// Feedforward velocity plus proportional position correction.
///
/// z has no feedforward term; altitude follows the planner's position only.
pub fn blended(planner: &PlannerSample, vehicle: &VehicleState, gains: &TrackingGains) -> Setpoint {
    let p = &planner.position;
    let v = &planner.velocity;
    let c = &vehicle.position;
    Setpoint::Velocity {
        velocity: Vec3::new(
            gains.kff * v.x + gains.kp * (p.x - c.x),
            gains.kff * v.y + gains.kp * (p.y - c.y),
            gains.kp * (p.z - c.z),
        ),
        yaw: planner.yaw,
    }
}

/// Hold wherever the vehicle is right now.
pub fn hold(vehicle: &VehicleState) -> Setpoint {
    fixed(vehicle.position, vehicle.yaw)
}

pub fn fixed(position: Vec3, yaw: f64) -> Setpoint {
    Setpoint::Position { position, yaw }
}

pub fn takeoff_target(origin: Vec3, altitude: f64) -> Vec3 {
    Vec3::new(origin.x, origin.y, origin.z + altitude)
}

pub fn altitude_reached(current: &Vec3, target: &Vec3, tolerance: f64) -> bool {
    (target.z - current.z).abs() < tolerance
}

/// GOTO arrival: x and y errors each under the tolerance (a square, not a
/// circle). Altitude is not checked.
pub fn goto_reached(current: &Vec3, target: &Vec3, tolerance: f64) -> bool {
    (target.x - current.x).abs() < tolerance && (target.y - current.y).abs() < tolerance
}

/// Absolute heading for a relative ROTATE waypoint.
pub fn rotate_target(current_yaw: f64, delta: f64) -> f64 {
    wrap_pi(current_yaw + delta)
}

pub fn yaw_aligned(target: f64, current: f64, tolerance: f64) -> bool {
    angle_diff(target, current).abs() <= tolerance
}

/// Heading commanded `elapsed` into a spiral sweep, or None once the sweep
/// angle has been covered.
pub fn spiral_yaw(first_yaw: f64, elapsed: Duration, rate_deg_s: f64, sweep_deg: f64) -> Option<f64> {
    let swept_deg = elapsed.as_secs_f64() * rate_deg_s;
    if swept_deg <= sweep_deg {
        Some(wrap_pi(first_yaw + swept_deg.to_radians()))
    } else {
        None
    }
}
