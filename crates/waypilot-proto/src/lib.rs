pub mod angle;
pub mod mission;
pub mod status;
pub mod vehicle;

pub use angle::{angle_diff, wrap_pi};
pub use mission::{MissionPhase, Waypoint, WaypointKind};
pub use status::StatusReport;
pub use vehicle::{PlannerSample, Quaternion, Setpoint, Vec3, VehicleState};
