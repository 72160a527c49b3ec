use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use waypilot_proto::{Waypoint, WaypointKind};

/// Waypoint as written in configuration: `{ x, y, z, yaw, flag }` with
/// flag 0 = GOTO, 1 = ROTATE, 2 = SPIRAL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub flag: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum WaypointError {
    #[error("waypoint {index}: unknown flag {flag}")]
    UnknownKind { index: usize, flag: i64 },
}

impl WaypointRecord {
    pub fn to_waypoint(&self, index: usize) -> Result<Waypoint, WaypointError> {
        let kind = WaypointKind::from_flag(self.flag)
            .ok_or(WaypointError::UnknownKind { index, flag: self.flag })?;
        Ok(Waypoint::new(self.x, self.y, self.z, self.yaw, kind))
    }
}

/// Converts records in order, skipping (and logging) ones with unknown flags.
pub fn from_records(records: &[WaypointRecord]) -> Vec<Waypoint> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| match r.to_waypoint(i) {
            Ok(wp) => Some(wp),
            Err(e) => {
                warn!("waypoints: skipping {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct WaypointFile {
    #[serde(default)]
    waypoints: Vec<WaypointRecord>,
}

pub fn read_file(path: &Path) -> Result<Vec<WaypointRecord>> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read waypoint file {}", path.display()))?;
    let f: WaypointFile = toml::from_str(&s)
        .with_context(|| format!("parse waypoint file {}", path.display()))?;
    Ok(f.waypoints)
}

/// Supplies the waypoint sequence once the vehicle is armed.
pub trait WaypointSource {
    fn load(&self) -> Result<Vec<Waypoint>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticWaypoints(pub Vec<Waypoint>);

impl WaypointSource for StaticWaypoints {
    fn load(&self) -> Result<Vec<Waypoint>> {
        Ok(self.0.clone())
    }
}

/// Waypoints from the mission config: the external file when one is named,
/// the inline `[[mission.waypoints]]` records otherwise.
#[derive(Debug, Clone, Default)]
pub struct ConfigWaypoints {
    pub file: Option<PathBuf>,
    pub inline: Vec<WaypointRecord>,
}

impl ConfigWaypoints {
    pub fn records(&self) -> Result<Vec<WaypointRecord>> {
        match &self.file {
            Some(path) => read_file(path),
            None => Ok(self.inline.clone()),
        }
    }
}

impl WaypointSource for ConfigWaypoints {
    fn load(&self) -> Result<Vec<Waypoint>> {
        Ok(from_records(&self.records()?))
    }
}

/// Loads from `source`; a failed load degrades to an empty mission.
pub fn load_or_empty(source: &dyn WaypointSource) -> Vec<Waypoint> {
    match source.load() {
        Ok(wps) => {
            info!("waypoints: loaded {}", wps.len());
            wps
        }
        Err(e) => {
            warn!("waypoints: load failed, flying without waypoints: {:#}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(flag: i64) -> WaypointRecord {
        WaypointRecord { x: 1.0, y: 2.0, z: 3.0, yaw: 0.5, flag }
    }

    #[test]
    fn unknown_flags_are_skipped_in_order() {
        let wps = from_records(&[rec(0), rec(7), rec(2), rec(1)]);
        let kinds: Vec<_> = wps.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WaypointKind::Goto, WaypointKind::Spiral, WaypointKind::Rotate]);
    }

    #[test]
    fn unknown_flag_error_names_index() {
        assert_eq!(rec(9).to_waypoint(4), Err(WaypointError::UnknownKind { index: 4, flag: 9 }));
    }

    #[test]
    fn file_format_parses() {
        let f: WaypointFile = toml::from_str(
            r#"
            [[waypoints]]
            x = 0.0
            y = 0.0
            z = 2.0
            flag = 0

            [[waypoints]]
            x = 0.0
            y = 0.0
            z = 2.0
            yaw = 1.57
            flag = 1
            "#,
        )
        .unwrap();
        assert_eq!(f.waypoints.len(), 2);
        assert_eq!(f.waypoints[0].yaw, 0.0);
        assert_eq!(f.waypoints[1].flag, 1);
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let src = ConfigWaypoints { file: Some(PathBuf::from("/nonexistent/waypoints.toml")), inline: vec![rec(0)] };
        assert!(src.load().is_err());
        assert!(load_or_empty(&src).is_empty());
    }

    #[test]
    fn inline_records_used_without_file() {
        let src = ConfigWaypoints { file: None, inline: vec![rec(0), rec(2)] };
        assert_eq!(load_or_empty(&src).len(), 2);
    }
}
