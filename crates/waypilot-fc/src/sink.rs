use anyhow::Result;
use thiserror::Error;
use waypilot_proto::{Setpoint, Vec3};

/// Where setpoints and mode/arm/land requests go.
///
/// Setpoints are fire-and-forget. Requests answer `Ok(true)` when the flight
/// stack accepted them, `Ok(false)` when it refused, and `Err` when no answer
/// could be obtained (link down, ack timeout). Callers treat both failure
/// forms as retryable.
pub trait CommandSink {
    fn set_position_setpoint(&mut self, position: Vec3, yaw: f64) -> Result<()>;
    fn set_velocity_setpoint(&mut self, velocity: Vec3, yaw: f64) -> Result<()>;
    fn request_mode(&mut self, mode: &str) -> Result<bool>;
    fn request_arm(&mut self) -> Result<bool>;
    fn request_land(&mut self) -> Result<bool>;

    fn publish(&mut self, setpoint: Setpoint) -> Result<()> {
        match setpoint {
            Setpoint::Position { position, yaw } => self.set_position_setpoint(position, yaw),
            Setpoint::Velocity { velocity, yaw } => self.set_velocity_setpoint(velocity, yaw),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no COMMAND_ACK for {command} within {timeout_ms}ms")]
    AckTimeout { command: &'static str, timeout_ms: u64 },
    #[error("telemetry reader stopped, acks can no longer arrive")]
    LinkClosed,
    #[error("unknown flight mode {0:?}")]
    UnknownMode(String),
}
