use std::time::{Duration, Instant};
use tracing::{info, warn};
use waypilot_fc::{safety::Cooldown, CommandSink};
use waypilot_proto::{Setpoint, VehicleState};

use crate::setpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Still priming, switching mode or arming. Mission logic must not run.
    Pending,
    /// Arming was confirmed on this tick.
    JustArmed,
    Ready,
}

/// Brings the flight stack into the offboard mode and arms it.
///
/// Until armed, a neutral hold setpoint goes out every tick: the flight stack
/// refuses offboard unless a setpoint stream is already flowing. Mode and arm
/// requests share one cooldown, so no two requests are closer than it.
#[derive(Debug)]
pub struct Negotiator {
    mode: String,
    priming_ticks: u32,
    primed: u32,
    offboard_mode_confirmed: bool,
    armed_confirmed: bool,
    cooldown: Cooldown,
}

impl Negotiator {
    pub fn new(mode: impl Into<String>, priming_ticks: u32, cooldown: Duration) -> Self {
        Self {
            mode: mode.into(),
            priming_ticks,
            primed: 0,
            offboard_mode_confirmed: false,
            armed_confirmed: false,
            cooldown: Cooldown::new(cooldown),
        }
    }

    pub fn offboard_mode_confirmed(&self) -> bool {
        self.offboard_mode_confirmed
    }

    pub fn armed_confirmed(&self) -> bool {
        self.armed_confirmed
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.cooldown.last_attempt()
    }

    pub fn tick(
        &mut self,
        now: Instant,
        vehicle: Option<&VehicleState>,
        sink: &mut dyn CommandSink,
    ) -> Negotiation {
        if self.armed_confirmed {
            return Negotiation::Ready;
        }

        if let Err(e) = sink.publish(neutral_hold(vehicle)) {
            warn!("negotiate: priming setpoint failed: {:#}", e);
        }
        if self.primed < self.priming_ticks {
            self.primed += 1;
            return Negotiation::Pending;
        }

        if !self.offboard_mode_confirmed {
            if vehicle.is_some_and(|v| v.mode.eq_ignore_ascii_case(&self.mode)) {
                info!("negotiate: flight stack already in {}", self.mode);
                self.offboard_mode_confirmed = true;
            } else if self.cooldown.try_acquire(now) {
                match sink.request_mode(&self.mode) {
                    Ok(true) => {
                        info!("negotiate: {} mode set", self.mode);
                        self.offboard_mode_confirmed = true;
                    }
                    Ok(false) => warn!("negotiate: {} mode refused", self.mode),
                    Err(e) => warn!("negotiate: {} mode request failed: {:#}", self.mode, e),
                }
            }
            // arming waits for the next tick even when the mode just landed
            return Negotiation::Pending;
        }

        if vehicle.is_some_and(|v| v.armed) {
            info!("negotiate: vehicle reports armed");
            self.armed_confirmed = true;
            return Negotiation::JustArmed;
        }
        if self.cooldown.try_acquire(now) {
            match sink.request_arm() {
                Ok(true) => {
                    info!("negotiate: armed, lift off");
                    self.armed_confirmed = true;
                    return Negotiation::JustArmed;
                }
                Ok(false) => warn!("negotiate: arm refused"),
                Err(e) => warn!("negotiate: arm request failed: {:#}", e),
            }
        }
        Negotiation::Pending
    }
}

fn neutral_hold(vehicle: Option<&VehicleState>) -> Setpoint {
    match vehicle {
        Some(v) => setpoint::hold(v),
        None => setpoint::hold(&VehicleState::default()),
    }
}
