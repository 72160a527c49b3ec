use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct FcStatus {
    pub connected: bool,
    pub url: Option<String>,
    pub armed: bool,
    pub mode: Option<String>,
    pub last_heartbeat: Option<Instant>,
}

impl FcStatus {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    pub fn on_heartbeat(&mut self, armed: bool, mode: Option<String>) {
        self.connected = true;
        self.armed = armed;
        self.mode = mode;
        self.last_heartbeat = Some(Instant::now());
    }
}
