use serde::Deserialize;
use std::time::Duration;

use crate::waypoints::WaypointRecord;

/// Feedforward/feedback weights for planner tracking.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingGains {
    /// Weight on the planner's feedforward velocity (x/y only).
    pub kff: f64,
    /// Proportional gain on planner-vs-vehicle position error.
    pub kp: f64,
}

impl Default for TrackingGains {
    fn default() -> Self {
        Self { kff: 0.8, kp: 1.0 }
    }
}

/// Mission tunables. Every field has the reference default, so an empty
/// `[mission]` table is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Control tick period.
    pub tick_ms: u64,

    /// Mode requested from the flight stack before arming.
    pub offboard_mode: String,
    /// Ticks of neutral hold setpoints before the first mode request.
    pub priming_ticks: u32,
    /// Minimum spacing between mode/arm requests.
    pub request_cooldown_s: f64,

    pub takeoff_altitude: f64,
    pub takeoff_tolerance: f64,

    /// Ticks spent handing a GOTO waypoint to the planner before tracking.
    pub goto_priming_ticks: u32,
    /// Per-axis (x and y) arrival threshold for GOTO.
    pub goto_tolerance: f64,
    /// Heading error (rad) at which a ROTATE waypoint is done.
    pub rotate_tolerance: f64,
    pub spiral_rate_deg_s: f64,
    pub spiral_sweep_deg: f64,

    /// How long to wait for an operator goal after the last waypoint.
    pub hold_timeout_s: f64,
    /// Spacing between land requests while LANDING.
    pub land_retry_s: f64,

    pub gains: TrackingGains,

    /// Telemetry older than this is stale; the mission holds position.
    pub telemetry_timeout_s: f64,
    /// Planner samples older than this are not tracked.
    pub planner_timeout_s: f64,
    /// Stale telemetry for this long while airborne forces LANDING.
    pub stale_land_s: f64,
    /// Upper bound on how long shutdown waits for the vehicle to land.
    pub shutdown_deadline_s: f64,

    /// TOML file with `[[waypoints]]` records; overrides inline waypoints.
    pub waypoints_file: Option<String>,
    pub waypoints: Vec<WaypointRecord>,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            offboard_mode: "OFFBOARD".to_string(),
            priming_ticks: 100,
            request_cooldown_s: 0.1,
            takeoff_altitude: 1.0,
            takeoff_tolerance: 0.1,
            goto_priming_ticks: 5,
            goto_tolerance: 0.2,
            rotate_tolerance: 0.1,
            spiral_rate_deg_s: 20.0,
            spiral_sweep_deg: 360.0,
            hold_timeout_s: 3.0,
            land_retry_s: 1.0,
            gains: TrackingGains::default(),
            telemetry_timeout_s: 0.5,
            planner_timeout_s: 1.0,
            stale_land_s: 3.0,
            shutdown_deadline_s: 15.0,
            waypoints_file: None,
            waypoints: Vec::new(),
        }
    }
}

impl MissionConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn request_cooldown(&self) -> Duration {
        secs(self.request_cooldown_s)
    }

    pub fn hold_timeout(&self) -> Duration {
        secs(self.hold_timeout_s)
    }

    pub fn land_retry(&self) -> Duration {
        secs(self.land_retry_s)
    }

    pub fn telemetry_timeout(&self) -> Duration {
        secs(self.telemetry_timeout_s)
    }

    pub fn planner_timeout(&self) -> Duration {
        secs(self.planner_timeout_s)
    }

    pub fn stale_land(&self) -> Duration {
        secs(self.stale_land_s)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        secs(self.shutdown_deadline_s)
    }
}

// NaN and negatives become zero, values too large for a Duration saturate.
fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s.max(0.0)).unwrap_or(Duration::MAX)
}
