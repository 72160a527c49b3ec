use std::time::Instant;
use tracing::debug;
use waypilot_fc::CommandSink;
use waypilot_proto::{MissionPhase, PlannerSample, StatusReport, VehicleState};

use crate::config::MissionConfig;
use crate::mission::{Mission, TickInput};
use crate::negotiate::{Negotiation, Negotiator};
use crate::planner::PlannerLink;
use crate::shared::{GoalLatch, StateCell};
use crate::waypoints::{load_or_empty, WaypointSource};

/// Write ends handed to the feed adapters. Cloning shares the same cells.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub vehicle: StateCell<VehicleState>,
    pub planner: StateCell<PlannerSample>,
    pub goals: GoalLatch,
}

/// One fixed-rate tick: negotiate until armed, then run the mission.
pub struct Controller<S, P> {
    cfg: MissionConfig,
    sink: S,
    planner: P,
    source: Box<dyn WaypointSource + Send>,
    inputs: Inputs,
    negotiator: Negotiator,
    mission: Option<Mission>,
}

impl<S: CommandSink, P: PlannerLink> Controller<S, P> {
    pub fn new(cfg: MissionConfig, sink: S, planner: P, source: Box<dyn WaypointSource + Send>, inputs: Inputs) -> Self {
        let negotiator = Negotiator::new(cfg.offboard_mode.clone(), cfg.priming_ticks, cfg.request_cooldown());
        Self { cfg, sink, planner, source, inputs, negotiator, mission: None }
    }

    pub fn tick(&mut self, now: Instant) {
        let vehicle = self.inputs.vehicle.snapshot();
        let sample = self.inputs.planner.snapshot();
        let goal = self.inputs.goals.take();

        match self.negotiator.tick(now, vehicle.as_ref().map(|v| &v.value), &mut self.sink) {
            Negotiation::Pending => {
                if goal.is_some() {
                    debug!("controller: goal signal before arming ignored");
                }
                return;
            }
            Negotiation::JustArmed => {
                let waypoints = load_or_empty(self.source.as_ref());
                self.mission = Some(Mission::new(self.cfg.clone(), waypoints));
            }
            Negotiation::Ready => {}
        }
        let Some(mission) = self.mission.as_mut() else { return };

        let fallback = VehicleState::default();
        let input = TickInput {
            now,
            vehicle: vehicle.as_ref().map(|v| &v.value).unwrap_or(&fallback),
            vehicle_fresh: vehicle.as_ref().is_some_and(|v| v.is_fresh(now, self.cfg.telemetry_timeout())),
            planner: sample
                .as_ref()
                .filter(|s| s.is_fresh(now, self.cfg.planner_timeout()))
                .map(|s| &s.value),
            goal: goal.is_some(),
        };
        mission.tick(&input, &mut self.sink, &mut self.planner);
    }

    /// Starts a controlled shutdown. Returns true while the vehicle still has
    /// to land (keep ticking), false when the process may exit right away.
    pub fn request_shutdown(&mut self) -> bool {
        match self.mission.as_mut() {
            Some(m) => m.begin_landing(),
            None => false,
        }
    }

    pub fn phase(&self) -> MissionPhase {
        self.mission.as_ref().map_or(MissionPhase::Init, |m| m.phase())
    }

    pub fn is_landed(&self) -> bool {
        self.phase() == MissionPhase::Landed
    }

    pub fn mission(&self) -> Option<&Mission> {
        self.mission.as_ref()
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn status(&self) -> StatusReport {
        let vehicle = self.inputs.vehicle.snapshot().map(|v| v.value).unwrap_or_default();
        StatusReport {
            ts_unix_ms: (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            phase: self.phase(),
            cursor: self.mission.as_ref().map_or(0, |m| m.cursor()),
            waypoint_count: self.mission.as_ref().map_or(0, |m| m.waypoints().len()),
            position: vehicle.position,
            yaw: vehicle.yaw,
            mode_confirmed: self.negotiator.offboard_mode_confirmed(),
            armed_confirmed: self.negotiator.armed_confirmed(),
        }
    }
}
