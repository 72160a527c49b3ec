pub mod frame;
pub mod mav;
pub mod modes;
pub mod safety;
pub mod sink;
pub mod state;

pub use sink::{CommandError, CommandSink};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FcConfig {
    /// MAVLink connection string, e.g. "udpin:0.0.0.0:14540" for PX4 SITL
    /// or "serial:/dev/ttyACM0:921600" for a USB-attached autopilot.
    pub url: String,

    /// MAVLink ids we use (companion side)
    pub sys_id: u8,
    pub comp_id: u8,

    /// target system/component (FC side). 1/1 is common for PX4.
    pub target_sys: u8,
    pub target_comp: u8,

    /// How long a mode/arm/land request waits for COMMAND_ACK. Default 80ms.
    pub ack_timeout_ms: Option<u64>,

    /// Companion heartbeat send rate. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,
}

impl FcConfig {
    pub fn ack_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ack_timeout_ms.unwrap_or(80))
    }

    pub fn heartbeat_interval(&self) -> std::time::Duration {
        let hz = self.send_heartbeat_hz.unwrap_or(1.0).max(0.2);
        std::time::Duration::from_secs_f32(1.0 / hz)
    }
}
