use anyhow::Result;
use waypilot_proto::Vec3;

/// Outgoing channel to the trajectory planner. Publishing must not block the
/// control tick.
pub trait PlannerLink {
    fn publish_goal(&mut self, goal: Vec3) -> Result<()>;
}
