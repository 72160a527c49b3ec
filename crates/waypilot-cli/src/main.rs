mod planner;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use waypilot_fc::mav::{self, FcEvent, FcLink, FcReader};
use waypilot_fc::state::FcStatus;
use waypilot_fc::FcConfig;
use waypilot_nav::doctor as nav_doctor;
use waypilot_nav::waypoints::ConfigWaypoints;
use waypilot_nav::{Controller, Inputs, MissionConfig};
use waypilot_proto::WaypointKind;

use planner::{Bridge, ChannelPlanner, PlannerCfg};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Parser)]
#[command(name = "waypilot", version, about = "waypilot - offboard waypoint mission runner")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to the flight controller and fly the mission.
    Run,
    /// Validate configuration and waypoints without touching the vehicle.
    Doctor,
    /// Print the waypoint sequence as it will be flown.
    Waypoints,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    fc: FcConfig,
    planner: PlannerCfg,
    #[serde(default)]
    mission: MissionConfig,
}

impl Config {
    fn waypoint_source(&self) -> ConfigWaypoints {
        ConfigWaypoints {
            file: self.mission.waypoints_file.as_ref().map(PathBuf::from),
            inline: self.mission.waypoints.clone(),
        }
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Run => run(cfg).await?,
        Command::Doctor => doctor(&cfg)?,
        Command::Waypoints => waypoints(&cfg)?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    anyhow::ensure!(!cfg.fc.url.is_empty(), "fc.url missing");
    anyhow::ensure!(cfg.fc.sys_id != cfg.fc.target_sys, "fc.sys_id must differ from fc.target_sys");
    anyhow::ensure!(cfg.fc.ack_timeout() < Duration::from_secs(1), "fc.ack_timeout_ms would stall the control tick");
    cfg.planner
        .listen
        .parse::<std::net::SocketAddr>()
        .with_context(|| format!("planner.listen {}", cfg.planner.listen))?;
    cfg.planner
        .goal_addr
        .parse::<std::net::SocketAddr>()
        .with_context(|| format!("planner.goal_addr {}", cfg.planner.goal_addr))?;

    nav_doctor::check_mission(&cfg.mission)?;
    let records = cfg.waypoint_source().records()?;
    let usable = nav_doctor::check_waypoints(&records)?;
    if usable < records.len() {
        warn!("doctor: {} of {} waypoints have unknown flags and will be skipped", records.len() - usable, records.len());
    }
    if records.is_empty() {
        warn!("doctor: no waypoints, the mission will hover then land");
    }

    info!("doctor: OK ({} waypoints)", usable);
    Ok(())
}

fn waypoints(cfg: &Config) -> Result<()> {
    let records = cfg.waypoint_source().records()?;
    for (i, r) in records.iter().enumerate() {
        match r.to_waypoint(i) {
            Ok(wp) => {
                let kind = match wp.kind {
                    WaypointKind::Goto => "GOTO",
                    WaypointKind::Rotate => "ROTATE",
                    WaypointKind::Spiral => "SPIRAL",
                };
                println!("{:>3} {:<6} x={:.2} y={:.2} z={:.2} yaw={:.3}", i + 1, kind, r.x, r.y, r.z, r.yaw);
            }
            Err(e) => println!("{:>3} SKIP   {}", i + 1, e),
        }
    }
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    info!("run: starting");
    nav_doctor::check_mission(&cfg.mission)?;

    let fc_status = Arc::new(Mutex::new(FcStatus::default()));
    let (link, reader) = mav::open(&cfg.fc).context("FC open")?;
    lock(&fc_status).url = Some(cfg.fc.url.clone());

    let inputs = Inputs::default();
    spawn_reader(reader, cfg.fc.heartbeat_interval(), inputs.clone(), fc_status.clone())?;

    let bridge = Bridge::bind(&cfg.planner).await?;
    let planner_link = bridge.spawn(inputs.clone());

    let ctl = Controller::new(
        cfg.mission.clone(),
        link,
        planner_link,
        Box::new(cfg.waypoint_source()),
        inputs,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop2 = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("run: interrupt received, landing before exit");
            stop2.store(true, Ordering::SeqCst);
        }
    });

    let mission = cfg.mission.clone();
    tokio::task::spawn_blocking(move || control_loop(ctl, &mission, &stop, &fc_status))
        .await
        .context("control loop task")?
}

// Reader blocks in recv; a detached thread so exit does not wait on it.
fn spawn_reader(
    mut reader: FcReader,
    hb_interval: Duration,
    inputs: Inputs,
    fc_status: Arc<Mutex<FcStatus>>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("fc-reader".into())
        .spawn(move || {
            let mut last_hb_send: Option<Instant> = None;
            loop {
                if last_hb_send.map_or(true, |t| t.elapsed() >= hb_interval) {
                    if let Err(e) = reader.send_heartbeat() {
                        warn!("FC: heartbeat send failed: {:#}", e);
                    }
                    last_hb_send = Some(Instant::now());
                }

                match reader.poll_once() {
                    Ok(Some(FcEvent::Heartbeat { armed, mode })) => lock(&fc_status).on_heartbeat(armed, mode),
                    Ok(Some(FcEvent::Vehicle(state))) => inputs.vehicle.publish(state),
                    Ok(None) => {}
                    Err(e) => warn!("FC: read failed: {:#}", e),
                }
            }
        })
        .context("spawn fc reader thread")?;
    Ok(())
}

fn control_loop(
    mut ctl: Controller<FcLink, ChannelPlanner>,
    mission: &MissionConfig,
    stop: &AtomicBool,
    fc_status: &Mutex<FcStatus>,
) -> Result<()> {
    let period = mission.tick_period();
    let mut next = Instant::now();
    let mut last_status = Instant::now();
    let mut deadline: Option<Instant> = None;

    loop {
        let now = Instant::now();
        if deadline.is_none() && stop.load(Ordering::SeqCst) {
            if !ctl.request_shutdown() {
                info!("run: vehicle not airborne, exiting");
                return Ok(());
            }
            deadline = Some(now.checked_add(mission.shutdown_deadline()).unwrap_or(now));
        }

        ctl.tick(now);

        if ctl.is_landed() {
            info!("run: landed, mission over");
            return Ok(());
        }
        if deadline.is_some_and(|d| now >= d) {
            warn!("run: not landed within {:?}, exiting anyway", mission.shutdown_deadline());
            return Ok(());
        }

        if now.duration_since(last_status) >= Duration::from_secs(1) {
            log_status(&ctl, fc_status);
            last_status = now;
        }

        next += period;
        match next.checked_duration_since(Instant::now()) {
            Some(d) => std::thread::sleep(d),
            None => next = Instant::now(),
        }
    }
}

fn log_status(ctl: &Controller<FcLink, ChannelPlanner>, fc_status: &Mutex<FcStatus>) {
    let st = lock(fc_status).clone();
    if st.hb_age().map_or(true, |age| age > Duration::from_secs(3)) {
        warn!("FC: no heartbeat from {}", st.url.as_deref().unwrap_or("?"));
    }
    match serde_json::to_string(&ctl.status()) {
        Ok(s) => info!("status: {} fc_mode={:?} fc_armed={}", s, st.mode, st.armed),
        Err(e) => warn!("status: encode failed: {}", e),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
