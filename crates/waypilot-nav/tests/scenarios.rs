use anyhow::Result;
use std::time::{Duration, Instant};

use waypilot_fc::CommandSink;
use waypilot_nav::waypoints::StaticWaypoints;
use waypilot_nav::{Controller, Inputs, MissionConfig, PlannerLink};
use waypilot_proto::{
    angle_diff, MissionPhase, PlannerSample, Setpoint, Vec3, VehicleState, Waypoint, WaypointKind,
};

const TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Setpoint(Setpoint),
    Mode(Instant),
    Arm(Instant),
    Land(Instant),
}

struct RecordingSink {
    clock: Instant,
    mode_ok: bool,
    arm_ok: bool,
    land_ok: bool,
    sent: Vec<Sent>,
}

impl RecordingSink {
    fn accepting() -> Self {
        Self { clock: Instant::now(), mode_ok: true, arm_ok: true, land_ok: true, sent: Vec::new() }
    }

    fn setpoints(&self) -> Vec<Setpoint> {
        self.sent
            .iter()
            .filter_map(|s| match s {
                Sent::Setpoint(sp) => Some(*sp),
                _ => None,
            })
            .collect()
    }

    fn last_setpoint(&self) -> Setpoint {
        *self.setpoints().last().expect("no setpoint sent")
    }

    fn mode_requests(&self) -> Vec<Instant> {
        self.sent.iter().filter_map(|s| match s { Sent::Mode(t) => Some(*t), _ => None }).collect()
    }

    fn land_requests(&self) -> usize {
        self.sent.iter().filter(|s| matches!(s, Sent::Land(_))).count()
    }
}

impl CommandSink for RecordingSink {
    fn set_position_setpoint(&mut self, position: Vec3, yaw: f64) -> Result<()> {
        self.sent.push(Sent::Setpoint(Setpoint::Position { position, yaw }));
        Ok(())
    }

    fn set_velocity_setpoint(&mut self, velocity: Vec3, yaw: f64) -> Result<()> {
        self.sent.push(Sent::Setpoint(Setpoint::Velocity { velocity, yaw }));
        Ok(())
    }

    fn request_mode(&mut self, _mode: &str) -> Result<bool> {
        self.sent.push(Sent::Mode(self.clock));
        Ok(self.mode_ok)
    }

    fn request_arm(&mut self) -> Result<bool> {
        self.sent.push(Sent::Arm(self.clock));
        Ok(self.arm_ok)
    }

    fn request_land(&mut self) -> Result<bool> {
        self.sent.push(Sent::Land(self.clock));
        if self.land_ok {
            Ok(true)
        } else {
            anyhow::bail!("land service unavailable")
        }
    }
}

#[derive(Default)]
struct RecordingPlanner {
    goals: Vec<Vec3>,
}

impl PlannerLink for RecordingPlanner {
    fn publish_goal(&mut self, goal: Vec3) -> Result<()> {
        self.goals.push(goal);
        Ok(())
    }
}

struct Harness {
    ctl: Controller<RecordingSink, RecordingPlanner>,
    inputs: Inputs,
    now: Instant,
    vehicle: VehicleState,
}

impl Harness {
    fn new(waypoints: Vec<Waypoint>, sink: RecordingSink) -> Self {
        let cfg = MissionConfig { priming_ticks: 2, ..Default::default() };
        Self::with_config(cfg, waypoints, sink)
    }

    fn with_config(cfg: MissionConfig, waypoints: Vec<Waypoint>, sink: RecordingSink) -> Self {
        let inputs = Inputs::default();
        let ctl = Controller::new(
            cfg,
            sink,
            RecordingPlanner::default(),
            Box::new(StaticWaypoints(waypoints)),
            inputs.clone(),
        );
        Self { ctl, inputs, now: Instant::now(), vehicle: VehicleState::default() }
    }

    fn step(&mut self) {
        self.inputs.vehicle.publish_at(self.vehicle.clone(), self.now + TICK);
        self.step_without_telemetry();
    }

    fn step_without_telemetry(&mut self) {
        self.now += TICK;
        self.ctl.sink_mut().clock = self.now;
        self.ctl.tick(self.now);
    }

    fn feed_planner(&mut self, position: Vec3, velocity: Vec3, yaw: f64) {
        let sample = PlannerSample { position, velocity, yaw, yaw_rate: 0.0 };
        self.inputs.planner.publish_at(sample, self.now + TICK);
    }

    fn run_until(&mut self, max_ticks: usize, mut done: impl FnMut(&Self) -> bool) {
        for _ in 0..max_ticks {
            if done(self) {
                return;
            }
            self.step();
        }
        assert!(done(self), "condition not met within {} ticks (phase {})", max_ticks, self.ctl.phase());
    }

    fn arm_and_take_off(&mut self) {
        self.run_until(100, |h| h.ctl.phase() == MissionPhase::Takeoff);
        self.vehicle.position.z = 1.0;
        self.step();
        assert_ne!(self.ctl.phase(), MissionPhase::Takeoff);
    }

    fn cursor(&self) -> usize {
        self.ctl.mission().map_or(0, |m| m.cursor())
    }
}

#[test]
fn single_goto_reaches_hold_for_goal() {
    let mut h = Harness::new(vec![Waypoint::new(0.0, 0.0, 2.0, 0.0, WaypointKind::Goto)], RecordingSink::accepting());

    h.run_until(100, |h| h.ctl.phase() == MissionPhase::Takeoff);
    match h.ctl.sink().last_setpoint() {
        Setpoint::Position { position, .. } => assert_eq!(position, Vec3::new(0.0, 0.0, 1.0)),
        other => panic!("takeoff should command a position, got {:?}", other),
    }

    h.vehicle.position.z = 1.0;
    h.step();
    assert_eq!(h.ctl.phase(), MissionPhase::TrackWaypoints);

    // goal handed to the planner for the priming ticks
    for _ in 0..5 {
        h.step();
    }
    assert_eq!(h.ctl.planner().goals, vec![Vec3::new(0.0, 0.0, 2.0); 5]);

    h.vehicle.position = Vec3::new(0.5, 0.0, 1.0);
    h.feed_planner(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.0, 0.0), 0.0);
    h.step();
    match h.ctl.sink().last_setpoint() {
        Setpoint::Velocity { velocity, yaw } => {
            assert!((velocity.x + 0.5).abs() < 1e-9);
            assert!(velocity.y.abs() < 1e-9);
            assert!((velocity.z - 1.0).abs() < 1e-9);
            assert_eq!(yaw, 0.0);
        }
        other => panic!("GOTO should track with velocity, got {:?}", other),
    }
    assert_eq!(h.cursor(), 0);
    assert_eq!(h.ctl.planner().goals.len(), 5);

    h.vehicle.position = Vec3::new(0.05, -0.05, 2.0);
    h.feed_planner(Vec3::new(0.0, 0.0, 2.0), Vec3::default(), 0.0);
    h.step();
    assert_eq!(h.cursor(), 1);
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);
    let pos = h.vehicle.position;
    assert!((pos.x - 0.0).abs() < 0.2 && (pos.y - 0.0).abs() < 0.2);
}

#[test]
fn hold_times_out_into_landing() {
    let mut h = Harness::new(Vec::new(), RecordingSink::accepting());
    h.arm_and_take_off();
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);
    let entered = h.now;

    while h.now - entered < Duration::from_secs(3) {
        h.step();
        assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal, "left hold early at {:?}", h.now - entered);
    }
    h.step();
    assert_eq!(h.now - entered, Duration::from_millis(3010));
    assert_eq!(h.ctl.phase(), MissionPhase::Landing);

    h.step();
    assert_eq!(h.ctl.phase(), MissionPhase::Landed);
    assert_eq!(h.ctl.sink().land_requests(), 1);

    // terminal: nothing more goes out
    let sent = h.ctl.sink().sent.len();
    for _ in 0..10 {
        h.step();
    }
    assert_eq!(h.ctl.sink().sent.len(), sent);
}

#[test]
fn unbounded_hold_timeout_keeps_holding() {
    let cfg: MissionConfig = toml::from_str("priming_ticks = 2\nhold_timeout_s = inf").unwrap();
    let mut h = Harness::with_config(cfg, Vec::new(), RecordingSink::accepting());
    h.arm_and_take_off();
    for _ in 0..1000 {
        h.step();
    }
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);
    assert!(matches!(h.ctl.sink().last_setpoint(), Setpoint::Position { .. }));
}

#[test]
fn hold_setpoint_is_stable_with_unchanged_telemetry() {
    let mut h = Harness::new(Vec::new(), RecordingSink::accepting());
    h.arm_and_take_off();
    h.vehicle.position = Vec3::new(0.3, -0.2, 1.02);
    h.vehicle.yaw = 0.4;
    h.step();
    let first = h.ctl.sink().last_setpoint();
    for _ in 0..50 {
        h.step();
        assert_eq!(h.ctl.sink().last_setpoint(), first);
    }
    assert_eq!(first, Setpoint::Position { position: Vec3::new(0.3, -0.2, 1.02), yaw: 0.4 });
}

#[test]
fn goal_in_hold_switches_to_planner_tracking() {
    let mut h = Harness::new(Vec::new(), RecordingSink::accepting());
    h.arm_and_take_off();
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);

    h.inputs.goals.signal(Vec3::new(5.0, 5.0, 1.0));
    h.step();
    assert_eq!(h.ctl.phase(), MissionPhase::TrackGoal);

    h.feed_planner(Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 0.0, 0.0), 0.7);
    h.step();
    match h.ctl.sink().last_setpoint() {
        Setpoint::Velocity { velocity, yaw } => {
            assert!((velocity.x - 1.8).abs() < 1e-9);
            assert!((velocity.y - 1.0).abs() < 1e-9);
            assert_eq!(yaw, 0.7);
        }
        other => panic!("expected velocity, got {:?}", other),
    }

    // no autonomous exit
    for _ in 0..500 {
        h.feed_planner(Vec3::new(1.0, 1.0, 1.0), Vec3::default(), 0.7);
        h.step();
    }
    assert_eq!(h.ctl.phase(), MissionPhase::TrackGoal);
}

#[test]
fn goal_outside_hold_is_discarded() {
    let mut h = Harness::new(vec![Waypoint::new(0.0, 0.0, 1.0, 0.0, WaypointKind::Spiral)], RecordingSink::accepting());
    h.arm_and_take_off();
    assert_eq!(h.ctl.phase(), MissionPhase::TrackWaypoints);

    h.inputs.goals.signal(Vec3::new(1.0, 1.0, 1.0));
    h.step();
    h.run_until(2000, |h| h.ctl.phase() == MissionPhase::HoldForGoal);
    h.step();
    // the early signal was drained, so hold waits for a new one
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);
}

#[test]
fn refused_mode_never_starts_mission() {
    let sink = RecordingSink { mode_ok: false, ..RecordingSink::accepting() };
    let mut h = Harness::new(vec![Waypoint::new(0.0, 0.0, 2.0, 0.0, WaypointKind::Goto)], sink);
    h.vehicle.position = Vec3::new(0.1, 0.2, 0.0);
    for _ in 0..300 {
        h.step();
    }

    assert_eq!(h.ctl.phase(), MissionPhase::Init);
    assert!(h.ctl.mission().is_none());
    assert!(!h.ctl.negotiator().offboard_mode_confirmed());
    assert!(h.ctl.planner().goals.is_empty());

    let sink = h.ctl.sink();
    assert!(sink.sent.iter().all(|s| matches!(s, Sent::Setpoint(_) | Sent::Mode(_))));
    for sp in sink.setpoints() {
        assert_eq!(sp, Setpoint::Position { position: Vec3::new(0.1, 0.2, 0.0), yaw: 0.0 });
    }
    let modes = sink.mode_requests();
    assert!(modes.len() > 1);
    for pair in modes.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(100));
    }
}

#[test]
fn rotate_turns_relative_to_arrival_heading() {
    let mut h = Harness::new(vec![Waypoint::new(1.0, 2.0, 1.0, 1.0, WaypointKind::Rotate)], RecordingSink::accepting());
    h.vehicle.yaw = 2.8;
    h.arm_and_take_off();
    h.step();

    let target = match h.ctl.sink().last_setpoint() {
        Setpoint::Position { position, yaw } => {
            assert_eq!(position, Vec3::new(1.0, 2.0, 1.0));
            yaw
        }
        other => panic!("ROTATE uses position setpoints, got {:?}", other),
    };
    assert!((angle_diff(target, 3.8)).abs() < 1e-9);
    assert!(target <= std::f64::consts::PI && target > -std::f64::consts::PI);

    // turning must not move the target
    h.vehicle.yaw = 3.1;
    h.step();
    assert_eq!(h.ctl.sink().last_setpoint().yaw(), target);
    assert_eq!(h.cursor(), 0);

    h.vehicle.yaw = target - 0.05;
    h.step();
    assert_eq!(h.cursor(), 1);
    assert!(angle_diff(h.vehicle.yaw, target).abs() <= 0.1);
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);
}

#[test]
fn spiral_completes_after_full_sweep() {
    let mut h = Harness::new(vec![Waypoint::new(0.0, 0.0, 1.0, 0.0, WaypointKind::Spiral)], RecordingSink::accepting());
    h.arm_and_take_off();

    h.step();
    let started = h.now;
    let mut last_yaw = h.ctl.sink().last_setpoint().yaw();
    assert!(last_yaw.abs() < 1e-9);

    h.run_until(2000, |h| h.cursor() == 1);
    let took = h.now - started;
    assert!(took >= Duration::from_millis(18_000), "finished early: {:?}", took);
    assert!(took <= Duration::from_millis(18_000) + TICK, "finished late: {:?}", took);

    // heading kept turning the same way during the sweep
    let yaws: Vec<f64> = h.ctl.sink().setpoints().iter().rev().skip(1).take(100).map(|s| s.yaw()).collect();
    for pair in yaws.windows(2) {
        let d = angle_diff(pair[0], pair[1]);
        assert!(d > 0.0 && d < 0.01, "step {}", d);
    }
    last_yaw = h.ctl.sink().last_setpoint().yaw();
    assert!(last_yaw.abs() < 1e-9);
}

#[test]
fn cursor_moves_forward_only() {
    let wps = vec![
        Waypoint::new(1.0, 0.0, 1.0, 0.0, WaypointKind::Goto),
        Waypoint::new(1.0, 0.0, 1.0, 0.5, WaypointKind::Rotate),
        Waypoint::new(0.0, 0.0, 1.0, 0.0, WaypointKind::Goto),
    ];
    let len = wps.len();
    let mut h = Harness::new(wps, RecordingSink::accepting());
    h.arm_and_take_off();

    let mut last = 0;
    for i in 0..600 {
        // drift the simulated vehicle toward whatever it was told
        match h.ctl.sink().last_setpoint() {
            Setpoint::Position { yaw, .. } => h.vehicle.yaw = yaw,
            Setpoint::Velocity { velocity, .. } => {
                h.vehicle.position.x += velocity.x * 0.05;
                h.vehicle.position.y += velocity.y * 0.05;
            }
        }
        let target = h.ctl.mission().unwrap().waypoints().get(h.cursor()).map(|w| w.position);
        if let Some(t) = target {
            h.feed_planner(t, Vec3::default(), 0.0);
        }
        h.step();
        let c = h.cursor();
        assert!(c >= last, "cursor went back at tick {}", i);
        assert!(c <= len);
        last = c;
    }
    assert_eq!(last, len);
    assert_eq!(h.ctl.phase(), MissionPhase::Landed);
}

#[test]
fn stale_planner_falls_back_to_hold() {
    let mut h = Harness::new(vec![Waypoint::new(3.0, 0.0, 1.0, 0.0, WaypointKind::Goto)], RecordingSink::accepting());
    h.arm_and_take_off();
    for _ in 0..6 {
        h.step();
    }
    // no planner sample has ever arrived
    assert!(matches!(h.ctl.sink().last_setpoint(), Setpoint::Position { .. }));

    h.feed_planner(Vec3::new(0.5, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), 0.0);
    h.step();
    assert!(matches!(h.ctl.sink().last_setpoint(), Setpoint::Velocity { .. }));

    for _ in 0..110 {
        h.step();
    }
    assert!(matches!(h.ctl.sink().last_setpoint(), Setpoint::Position { .. }));
    assert_eq!(h.ctl.phase(), MissionPhase::TrackWaypoints);
}

#[test]
fn lost_telemetry_holds_then_lands() {
    let mut h = Harness::new(Vec::new(), RecordingSink::accepting());
    h.arm_and_take_off();
    h.vehicle.position = Vec3::new(0.4, 0.4, 1.0);
    h.step();
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);

    let lost = h.now;
    // hold timeout would fire at 3s; a goal keeps the mission airborne
    h.inputs.goals.signal(Vec3::default());
    h.step();
    assert_eq!(h.ctl.phase(), MissionPhase::TrackGoal);

    while h.now - lost < Duration::from_millis(3400) {
        h.step_without_telemetry();
        if h.now - lost > Duration::from_millis(600) {
            assert_eq!(h.ctl.phase(), MissionPhase::TrackGoal);
            assert_eq!(
                h.ctl.sink().last_setpoint(),
                Setpoint::Position { position: Vec3::new(0.4, 0.4, 1.0), yaw: 0.0 }
            );
        }
    }
    for _ in 0..200 {
        if h.ctl.is_landed() {
            break;
        }
        h.step_without_telemetry();
    }
    assert!(h.ctl.is_landed());
    assert_eq!(h.ctl.sink().land_requests(), 1);
    assert!(h.now - lost > Duration::from_millis(3500));
}

#[test]
fn shutdown_lands_airborne_vehicle() {
    let mut h = Harness::new(Vec::new(), RecordingSink::accepting());
    assert!(!h.ctl.request_shutdown(), "nothing to land before arming");

    h.arm_and_take_off();
    assert!(h.ctl.request_shutdown());
    assert_eq!(h.ctl.phase(), MissionPhase::Landing);
    h.step();
    assert!(h.ctl.is_landed());
    assert!(!h.ctl.request_shutdown());
}

#[test]
fn failed_land_is_retried_at_interval() {
    let sink = RecordingSink { land_ok: false, ..RecordingSink::accepting() };
    let cfg = MissionConfig { priming_ticks: 2, hold_timeout_s: 0.05, ..Default::default() };
    let mut h = Harness::with_config(cfg, Vec::new(), sink);
    h.arm_and_take_off();
    h.run_until(20, |h| h.ctl.phase() == MissionPhase::Landing);

    let start = h.now;
    while h.now - start < Duration::from_millis(2500) {
        h.step();
    }
    assert_eq!(h.ctl.phase(), MissionPhase::Landing);
    assert_eq!(h.ctl.sink().land_requests(), 3);

    h.ctl.sink_mut().land_ok = true;
    h.run_until(150, |h| h.ctl.is_landed());
}

#[test]
fn empty_mission_falls_through_to_hold() {
    let mut h = Harness::new(Vec::new(), RecordingSink::accepting());
    h.arm_and_take_off();
    assert_eq!(h.ctl.phase(), MissionPhase::HoldForGoal);
    let status = h.ctl.status();
    assert_eq!(status.waypoint_count, 0);
    assert_eq!(status.cursor, 0);
    assert!(status.armed_confirmed && status.mode_confirmed);
}
