use anyhow::{Context, Result};
use mavlink::{
    common::{
        MavAutopilot, MavCmd, MavFrame, MavMessage, MavModeFlag, MavResult, MavState, MavType,
        PositionTargetTypemask, COMMAND_ACK_DATA, COMMAND_LONG_DATA, HEARTBEAT_DATA,
        SET_POSITION_TARGET_LOCAL_NED_DATA,
    },
    MavConnection, MavHeader,
};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use waypilot_proto::{Quaternion, Setpoint, Vec3, VehicleState};

use crate::frame::{enu_to_ned, ned_to_enu, yaw_enu_to_ned, yaw_ned_to_enu};
use crate::modes::{px4_mode, px4_mode_name};
use crate::sink::{CommandError, CommandSink};
use crate::FcConfig;

/// Position + yaw; velocity, acceleration and yaw rate ignored.
pub const POSITION_TYPE_MASK: u16 = 0b1011_1111_1000;
/// Velocity + yaw; position, acceleration and yaw rate ignored.
pub const VELOCITY_TYPE_MASK: u16 = 0b1011_1100_0111;

/// Shared outgoing side of the MAVLink connection. Sequence numbers must be
/// shared between the command link and the heartbeat sender.
struct Wire {
    conn: Box<dyn MavConnection<MavMessage> + Send + Sync>,
    system_id: u8,
    component_id: u8,
    sequence: AtomicU8,
}

impl Wire {
    fn send(&self, msg: &MavMessage) -> Result<()> {
        let hdr = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        self.conn.send(&hdr, msg).context("mavlink send")?;
        Ok(())
    }
}

/// Opens the connection and splits it into the command side (used by the
/// control tick) and the telemetry side (driven by a dedicated reader thread).
pub fn open(cfg: &FcConfig) -> Result<(FcLink, FcReader)> {
    if let Some(rest) = cfg.url.strip_prefix("serial:") {
        // quick validate device so a wrong path fails with a readable error
        let (dev, baud) = rest
            .rsplit_once(':')
            .with_context(|| format!("serial url must be serial:<dev>:<baud>, got {}", cfg.url))?;
        let baud: u32 = baud.parse().with_context(|| format!("bad baud rate in {}", cfg.url))?;
        let _ = tokio_serial::new(dev, baud)
            .open()
            .with_context(|| format!("open fc serial device {}", dev))?;
    }

    let conn = mavlink::connect::<MavMessage>(&cfg.url)
        .with_context(|| format!("mavlink connect {}", cfg.url))?;
    info!("FC: connected to {}", cfg.url);

    let wire = Arc::new(Wire {
        conn,
        system_id: cfg.sys_id,
        component_id: cfg.comp_id,
        sequence: AtomicU8::new(0),
    });
    let (ack_tx, ack_rx) = flume::bounded(16);

    let link = FcLink {
        wire: wire.clone(),
        target_sys: cfg.target_sys,
        target_comp: cfg.target_comp,
        acks: ack_rx,
        ack_timeout: cfg.ack_timeout(),
        boot: Instant::now(),
    };
    let reader = FcReader {
        wire,
        target_sys: cfg.target_sys,
        target_comp: cfg.target_comp,
        acks: ack_tx,
        state: VehicleState::default(),
        have_position: false,
        have_attitude: false,
    };
    Ok((link, reader))
}

pub struct FcLink {
    wire: Arc<Wire>,
    target_sys: u8,
    target_comp: u8,
    acks: flume::Receiver<COMMAND_ACK_DATA>,
    ack_timeout: Duration,
    boot: Instant,
}

/// SET_POSITION_TARGET_LOCAL_NED for one setpoint. The core works in ENU,
/// the wire in NED; axes the mask ignores are sent as zero.
pub fn position_target(
    setpoint: &Setpoint,
    time_boot_ms: u32,
    target_system: u8,
    target_component: u8,
) -> SET_POSITION_TARGET_LOCAL_NED_DATA {
    let (type_mask, p, v) = match *setpoint {
        Setpoint::Position { position, .. } => (POSITION_TYPE_MASK, enu_to_ned(position), Vec3::default()),
        Setpoint::Velocity { velocity, .. } => (VELOCITY_TYPE_MASK, Vec3::default(), enu_to_ned(velocity)),
    };
    SET_POSITION_TARGET_LOCAL_NED_DATA {
        time_boot_ms,
        x: p.x as f32,
        y: p.y as f32,
        z: p.z as f32,
        vx: v.x as f32,
        vy: v.y as f32,
        vz: v.z as f32,
        afx: 0.0,
        afy: 0.0,
        afz: 0.0,
        yaw: yaw_enu_to_ned(setpoint.yaw()) as f32,
        yaw_rate: 0.0,
        type_mask: PositionTargetTypemask::from_bits_truncate(type_mask),
        target_system,
        target_component,
        coordinate_frame: MavFrame::MAV_FRAME_LOCAL_NED,
    }
}

/// COMMAND_LONG params for MAV_CMD_DO_SET_MODE with a PX4 custom mode.
pub fn set_mode_params(mode: &str) -> Result<[f32; 7], CommandError> {
    let (main, sub) = px4_mode(mode).ok_or_else(|| CommandError::UnknownMode(mode.to_string()))?;
    let base = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits() as f32;
    Ok([base, main as f32, sub as f32, 0.0, 0.0, 0.0, 0.0])
}

// Saturates instead of wrapping once the link has been up ~49 days.
fn boot_ms(uptime: Duration) -> u32 {
    u32::try_from(uptime.as_millis()).unwrap_or(u32::MAX)
}

impl FcLink {
    fn send_setpoint(&self, setpoint: Setpoint) -> Result<()> {
        let data = position_target(&setpoint, boot_ms(self.boot.elapsed()), self.target_sys, self.target_comp);
        self.wire.send(&MavMessage::SET_POSITION_TARGET_LOCAL_NED(data))
    }

    /// Sends COMMAND_LONG and waits (bounded) for its COMMAND_ACK.
    fn command(&mut self, label: &'static str, command: MavCmd, params: [f32; 7]) -> Result<bool> {
        // acks for earlier, timed-out requests would be mistaken for ours
        while self.acks.try_recv().is_ok() {}

        let cmd = COMMAND_LONG_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            command,
            confirmation: 0,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        };
        debug!("FC: sending {}", label);
        self.wire.send(&MavMessage::COMMAND_LONG(cmd))?;

        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.acks.recv_timeout(remaining) {
                Ok(ack) if ack.command == command => match ack.result {
                    MavResult::MAV_RESULT_ACCEPTED => return Ok(true),
                    MavResult::MAV_RESULT_IN_PROGRESS => continue,
                    other => {
                        debug!("FC: {} answered {:?}", label, other);
                        return Ok(false);
                    }
                },
                Ok(_) => continue,
                Err(flume::RecvTimeoutError::Timeout) => {
                    return Err(CommandError::AckTimeout {
                        command: label,
                        timeout_ms: self.ack_timeout.as_millis() as u64,
                    }
                    .into())
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    return Err(CommandError::LinkClosed.into())
                }
            }
        }
    }
}

impl CommandSink for FcLink {
    fn set_position_setpoint(&mut self, position: Vec3, yaw: f64) -> Result<()> {
        self.send_setpoint(Setpoint::Position { position, yaw })
    }

    fn set_velocity_setpoint(&mut self, velocity: Vec3, yaw: f64) -> Result<()> {
        self.send_setpoint(Setpoint::Velocity { velocity, yaw })
    }

    fn request_mode(&mut self, mode: &str) -> Result<bool> {
        let params = set_mode_params(mode)?;
        self.command("DO_SET_MODE", MavCmd::MAV_CMD_DO_SET_MODE, params)
    }

    fn request_arm(&mut self) -> Result<bool> {
        self.command(
            "ARM",
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn request_land(&mut self) -> Result<bool> {
        // NaN yaw/lat/lon: land straight down at the current position
        self.command(
            "NAV_LAND",
            MavCmd::MAV_CMD_NAV_LAND,
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, 0.0],
        )
    }
}

#[derive(Debug, Clone)]
pub enum FcEvent {
    Heartbeat { armed: bool, mode: Option<String> },
    /// Merged telemetry; only emitted once both position and attitude arrived.
    Vehicle(VehicleState),
}

pub struct FcReader {
    wire: Arc<Wire>,
    target_sys: u8,
    target_comp: u8,
    acks: flume::Sender<COMMAND_ACK_DATA>,
    state: VehicleState,
    have_position: bool,
    have_attitude: bool,
}

impl FcReader {
    /// Blocks until the next message. Returns Ok(None) for messages that do
    /// not change the vehicle picture and for receive errors.
    pub fn poll_once(&mut self) -> Result<Option<FcEvent>> {
        let (hdr, msg) = match self.wire.conn.recv() {
            Ok(m) => m,
            Err(e) => {
                debug!("FC: recv failed: {:?}", e);
                return Ok(None);
            }
        };
        if hdr.system_id != self.target_sys {
            return Ok(None);
        }

        match msg {
            MavMessage::HEARTBEAT(hb) if hdr.component_id == self.target_comp => {
                let armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                let mode = if hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED) {
                    px4_mode_name(hb.custom_mode).map(str::to_string)
                } else {
                    None
                };
                self.state.armed = armed;
                self.state.mode = mode.clone().unwrap_or_default();
                Ok(Some(FcEvent::Heartbeat { armed, mode }))
            }
            MavMessage::LOCAL_POSITION_NED(p) => {
                self.state.position = ned_to_enu(Vec3::new(p.x as f64, p.y as f64, p.z as f64));
                self.have_position = true;
                Ok(self.vehicle_event())
            }
            MavMessage::ATTITUDE_QUATERNION(a) => {
                let q = Quaternion { w: a.q1 as f64, x: a.q2 as f64, y: a.q3 as f64, z: a.q4 as f64 };
                self.state.yaw = yaw_ned_to_enu(q.yaw());
                self.have_attitude = true;
                Ok(self.vehicle_event())
            }
            MavMessage::COMMAND_ACK(ack) => {
                debug!("FC: ack {:?} -> {:?}", ack.command, ack.result);
                if self.acks.try_send(ack).is_err() {
                    warn!("FC: ack queue full, dropping ack");
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn vehicle_event(&self) -> Option<FcEvent> {
        (self.have_position && self.have_attitude).then(|| FcEvent::Vehicle(self.state.clone()))
    }

    pub fn send_heartbeat(&self) -> Result<()> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_ONBOARD_CONTROLLER,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.wire.send(&MavMessage::HEARTBEAT(hb))
    }
}
