use anyhow::Result;

use crate::config::MissionConfig;
use crate::waypoints::WaypointRecord;

pub fn check_mission(cfg: &MissionConfig) -> Result<()> {
    anyhow::ensure!(cfg.tick_ms >= 1 && cfg.tick_ms <= 100, "mission.tick_ms should be 1..100");
    anyhow::ensure!(!cfg.offboard_mode.is_empty(), "mission.offboard_mode empty");
    check_secs("mission.request_cooldown_s", cfg.request_cooldown_s, 0.05, 5.0)?;
    anyhow::ensure!(cfg.takeoff_altitude > 0.2 && cfg.takeoff_altitude <= 20.0, "mission.takeoff_altitude out of range");
    anyhow::ensure!(cfg.takeoff_tolerance > 0.0, "mission.takeoff_tolerance must be > 0");
    anyhow::ensure!(cfg.goto_tolerance > 0.0, "mission.goto_tolerance must be > 0");
    anyhow::ensure!(
        cfg.rotate_tolerance > 0.0 && cfg.rotate_tolerance < 1.0,
        "mission.rotate_tolerance should be 0..1 rad"
    );
    anyhow::ensure!(
        cfg.spiral_rate_deg_s > 0.0 && cfg.spiral_rate_deg_s <= 180.0,
        "mission.spiral_rate_deg_s should be 0..180"
    );
    anyhow::ensure!(
        cfg.spiral_sweep_deg >= 0.0 && cfg.spiral_sweep_deg <= 3600.0,
        "mission.spiral_sweep_deg should be 0..3600"
    );
    anyhow::ensure!(cfg.gains.kff >= 0.0 && cfg.gains.kff <= 1.5, "mission.gains.kff out of range");
    anyhow::ensure!(cfg.gains.kp > 0.0 && cfg.gains.kp <= 5.0, "mission.gains.kp out of range");

    check_secs("mission.hold_timeout_s", cfg.hold_timeout_s, 0.0, 600.0)?;
    check_secs("mission.land_retry_s", cfg.land_retry_s, 0.1, 30.0)?;
    check_secs("mission.telemetry_timeout_s", cfg.telemetry_timeout_s, 0.0, 5.0)?;
    check_secs("mission.planner_timeout_s", cfg.planner_timeout_s, 0.0, 10.0)?;
    check_secs("mission.stale_land_s", cfg.stale_land_s, 0.0, 60.0)?;
    check_secs("mission.shutdown_deadline_s", cfg.shutdown_deadline_s, 1.0, 600.0)?;
    // stale detection must outlast a few ticks or it fires on jitter
    anyhow::ensure!(
        cfg.telemetry_timeout_s * 1000.0 >= 3.0 * cfg.tick_ms as f64,
        "mission.telemetry_timeout_s shorter than three ticks"
    );
    anyhow::ensure!(cfg.stale_land_s > cfg.telemetry_timeout_s, "mission.stale_land_s must exceed telemetry_timeout_s");
    Ok(())
}

fn check_secs(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    anyhow::ensure!(
        value.is_finite() && value >= min && value <= max,
        "{} should be {}..{} s, got {}",
        name,
        min,
        max,
        value
    );
    Ok(())
}

/// Returns how many records are usable; unknown flags are reported, not fatal.
pub fn check_waypoints(records: &[WaypointRecord]) -> Result<usize> {
    let mut usable = 0;
    for (i, r) in records.iter().enumerate() {
        anyhow::ensure!(
            r.x.is_finite() && r.y.is_finite() && r.z.is_finite() && r.yaw.is_finite(),
            "waypoint {}: non-finite coordinate",
            i
        );
        anyhow::ensure!(r.z >= 0.0, "waypoint {}: z below ground ({})", i, r.z);
        if r.to_waypoint(i).is_ok() {
            usable += 1;
        }
    }
    Ok(usable)
}
