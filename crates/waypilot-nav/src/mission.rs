use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use waypilot_fc::{safety::Cooldown, CommandSink};
use waypilot_proto::{MissionPhase, PlannerSample, Setpoint, Vec3, VehicleState, Waypoint, WaypointKind};

use crate::config::MissionConfig;
use crate::cursor::{Transient, WaypointCursor};
use crate::planner::PlannerLink;
use crate::setpoint;

/// What the mission sees on one tick.
#[derive(Debug, Clone)]
pub struct TickInput<'a> {
    pub now: Instant,
    /// Last known vehicle state (default if none ever arrived).
    pub vehicle: &'a VehicleState,
    pub vehicle_fresh: bool,
    /// Latest planner sample, only if fresh enough to track.
    pub planner: Option<&'a PlannerSample>,
    /// Operator goal signal drained on this tick.
    pub goal: bool,
}

#[derive(Debug, Clone)]
enum Phase {
    Init,
    Takeoff { target: Vec3, yaw: f64 },
    TrackWaypoints,
    HoldForGoal { since: Instant },
    TrackGoal,
    Landing { retry: Cooldown },
    Landed,
}

impl Phase {
    fn kind(&self) -> MissionPhase {
        match self {
            Phase::Init => MissionPhase::Init,
            Phase::Takeoff { .. } => MissionPhase::Takeoff,
            Phase::TrackWaypoints => MissionPhase::TrackWaypoints,
            Phase::HoldForGoal { .. } => MissionPhase::HoldForGoal,
            Phase::TrackGoal => MissionPhase::TrackGoal,
            Phase::Landing { .. } => MissionPhase::Landing,
            Phase::Landed => MissionPhase::Landed,
        }
    }
}

/// Mission state machine. Runs only after the vehicle is armed in offboard.
#[derive(Debug)]
pub struct Mission {
    cfg: MissionConfig,
    waypoints: Vec<Waypoint>,
    cursor: WaypointCursor,
    phase: Phase,
    stale_since: Option<Instant>,
    planner_stale: bool,
}

impl Mission {
    pub fn new(cfg: MissionConfig, waypoints: Vec<Waypoint>) -> Self {
        let cursor = WaypointCursor::new(waypoints.len());
        Self {
            cfg,
            waypoints,
            cursor,
            phase: Phase::Init,
            stale_since: None,
            planner_stale: false,
        }
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase.kind()
    }

    pub fn cursor(&self) -> usize {
        self.cursor.index()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Sends the vehicle down. Returns false when there is nothing left to
    /// land (already on the ground after a landing).
    pub fn begin_landing(&mut self) -> bool {
        match self.phase {
            Phase::Landed => false,
            Phase::Landing { .. } => true,
            _ => {
                self.enter_landing();
                true
            }
        }
    }

    pub fn tick(&mut self, input: &TickInput<'_>, sink: &mut dyn CommandSink, planner: &mut dyn PlannerLink) {
        if input.goal && !matches!(self.phase, Phase::HoldForGoal { .. }) {
            debug!("mission: goal signal ignored in {}", self.phase());
        }
        if self.guard_stale(input, sink) {
            return;
        }

        let vehicle = input.vehicle;
        match self.phase.clone() {
            Phase::Init => {
                let target = setpoint::takeoff_target(vehicle.position, self.cfg.takeoff_altitude);
                info!(
                    "mission: takeoff from ({:.2}, {:.2}, {:.2}) to z={:.2}",
                    vehicle.position.x, vehicle.position.y, vehicle.position.z, target.z
                );
                self.enter(Phase::Takeoff { target, yaw: vehicle.yaw });
                publish(sink, setpoint::fixed(target, vehicle.yaw));
            }
            Phase::Takeoff { target, yaw } => {
                publish(sink, setpoint::fixed(target, yaw));
                if setpoint::altitude_reached(&vehicle.position, &target, self.cfg.takeoff_tolerance) {
                    self.enter(Phase::TrackWaypoints);
                    self.enter_hold_if_exhausted(input.now);
                }
            }
            Phase::TrackWaypoints => {
                if self.enter_hold_if_exhausted(input.now) {
                    publish(sink, setpoint::hold(vehicle));
                    return;
                }
                self.track_waypoint(input, sink, planner);
                self.enter_hold_if_exhausted(input.now);
            }
            Phase::HoldForGoal { since } => {
                publish(sink, setpoint::hold(vehicle));
                if input.goal {
                    info!("mission: goal received, tracking planner");
                    self.enter(Phase::TrackGoal);
                } else if input.now.saturating_duration_since(since) > self.cfg.hold_timeout() {
                    info!("mission: no goal within {:?}, landing", self.cfg.hold_timeout());
                    self.enter_landing();
                }
            }
            Phase::TrackGoal => {
                let sp = self.tracking_setpoint(input);
                publish(sink, sp);
            }
            Phase::Landing { mut retry } => {
                publish(sink, setpoint::hold(vehicle));
                if retry.try_acquire(input.now) {
                    match sink.request_land() {
                        Ok(true) => {
                            info!("mission: land command accepted");
                            self.enter(Phase::Landed);
                            return;
                        }
                        Ok(false) => warn!("mission: land command refused"),
                        Err(e) => warn!("mission: land request failed: {:#}", e),
                    }
                }
                self.phase = Phase::Landing { retry };
            }
            Phase::Landed => {}
        }
    }

    fn track_waypoint(&mut self, input: &TickInput<'_>, sink: &mut dyn CommandSink, planner: &mut dyn PlannerLink) {
        let index = self.cursor.index();
        let wp = self.waypoints[index];
        let vehicle = input.vehicle;

        match wp.kind {
            WaypointKind::Goto => {
                let published = match self.cursor.transient() {
                    Transient::Goto { published } => published,
                    _ => 0,
                };
                if published < self.cfg.goto_priming_ticks {
                    if published == 0 {
                        info!("mission: waypoint {} GOTO ({:.2}, {:.2}, {:.2})", index + 1, wp.position.x, wp.position.y, wp.position.z);
                    }
                    if let Err(e) = planner.publish_goal(wp.position) {
                        warn!("mission: planner goal publish failed: {:#}", e);
                    }
                    self.cursor.set_transient(Transient::Goto { published: published + 1 });
                    publish(sink, setpoint::hold(vehicle));
                    return;
                }
                let sp = self.tracking_setpoint(input);
                publish(sink, sp);
                if setpoint::goto_reached(&vehicle.position, &wp.position, self.cfg.goto_tolerance) {
                    info!("mission: waypoint {} reached", index + 1);
                    self.cursor.advance();
                }
            }
            WaypointKind::Rotate => {
                let target_yaw = match self.cursor.transient() {
                    Transient::Rotate { target_yaw } => target_yaw,
                    _ => {
                        let target_yaw = setpoint::rotate_target(vehicle.yaw, wp.yaw);
                        info!("mission: waypoint {} ROTATE to yaw {:.3}", index + 1, target_yaw);
                        self.cursor.set_transient(Transient::Rotate { target_yaw });
                        target_yaw
                    }
                };
                publish(sink, setpoint::fixed(wp.position, target_yaw));
                if setpoint::yaw_aligned(target_yaw, vehicle.yaw, self.cfg.rotate_tolerance) {
                    info!("mission: waypoint {} heading reached", index + 1);
                    self.cursor.advance();
                } else {
                    debug!("mission: yaw target/current {:.3}/{:.3}", target_yaw, vehicle.yaw);
                }
            }
            WaypointKind::Spiral => {
                let (first_yaw, started) = match self.cursor.transient() {
                    Transient::Spiral { first_yaw, started } => (first_yaw, started),
                    _ => {
                        info!("mission: waypoint {} SPIRAL from yaw {:.3}", index + 1, vehicle.yaw);
                        self.cursor.set_transient(Transient::Spiral { first_yaw: vehicle.yaw, started: input.now });
                        (vehicle.yaw, input.now)
                    }
                };
                let elapsed = input.now.saturating_duration_since(started);
                match setpoint::spiral_yaw(first_yaw, elapsed, self.cfg.spiral_rate_deg_s, self.cfg.spiral_sweep_deg) {
                    Some(yaw) => publish(sink, setpoint::fixed(wp.position, yaw)),
                    None => {
                        info!("mission: waypoint {} sweep done after {:.2}s", index + 1, elapsed.as_secs_f64());
                        publish(sink, setpoint::fixed(wp.position, vehicle.yaw));
                        self.cursor.advance();
                    }
                }
            }
        }
    }

    /// Blended planner tracking, or a hold while no fresh planner sample exists.
    fn tracking_setpoint(&mut self, input: &TickInput<'_>) -> Setpoint {
        match input.planner {
            Some(sample) => {
                if self.planner_stale {
                    info!("mission: planner samples resumed");
                    self.planner_stale = false;
                }
                setpoint::blended(sample, input.vehicle, &self.cfg.gains)
            }
            None => {
                if !self.planner_stale {
                    warn!("mission: no fresh planner sample, holding position");
                    self.planner_stale = true;
                }
                setpoint::hold(input.vehicle)
            }
        }
    }

    /// Stale telemetry: hold the last known position, and land if it stays
    /// stale too long while airborne. Returns true when the tick was consumed.
    fn guard_stale(&mut self, input: &TickInput<'_>, sink: &mut dyn CommandSink) -> bool {
        if matches!(self.phase, Phase::Landing { .. } | Phase::Landed) {
            return false;
        }
        if input.vehicle_fresh {
            if self.stale_since.take().is_some() {
                info!("mission: telemetry resumed");
            }
            return false;
        }

        let since = *self.stale_since.get_or_insert_with(|| {
            warn!("mission: telemetry stale, holding last known position");
            input.now
        });
        publish(sink, setpoint::hold(input.vehicle));
        let stale_for: Duration = input.now.saturating_duration_since(since);
        if self.phase.kind().is_airborne() && stale_for > self.cfg.stale_land() {
            warn!("mission: telemetry stale for {:.1}s, landing", stale_for.as_secs_f64());
            self.enter_landing();
        }
        true
    }

    fn enter_hold_if_exhausted(&mut self, now: Instant) -> bool {
        if matches!(self.phase, Phase::TrackWaypoints) && self.cursor.is_exhausted() {
            info!("mission: all {} waypoints done, waiting for goal", self.waypoints.len());
            self.enter(Phase::HoldForGoal { since: now });
            return true;
        }
        false
    }

    fn enter_landing(&mut self) {
        self.enter(Phase::Landing { retry: Cooldown::new(self.cfg.land_retry()) });
    }

    fn enter(&mut self, next: Phase) {
        info!("mission: {} -> {}", self.phase.kind(), next.kind());
        self.phase = next;
    }
}

fn publish(sink: &mut dyn CommandSink, sp: Setpoint) {
    if let Err(e) = sink.publish(sp) {
        warn!("mission: setpoint publish failed: {:#}", e);
    }
}
