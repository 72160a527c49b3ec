use std::time::{Duration, Instant};

/// Minimum spacing between requests sent to the flight stack.
///
/// One instance is shared by every request kind that must not crowd the
/// autopilot, so a mode request followed by an arm request still observes
/// the interval.
#[derive(Debug, Clone)]
pub struct Cooldown {
    last: Option<Instant>,
    min_interval: Duration,
}

impl Cooldown {
    pub fn new(min_interval: Duration) -> Self {
        Self { last: None, min_interval }
    }

    /// True when a request may go out at `now`. Does not record the attempt.
    pub fn ready(&self, now: Instant) -> bool {
        match self.last {
            Some(t) => now.saturating_duration_since(t) >= self.min_interval,
            None => true,
        }
    }

    /// Records an attempt at `now` if allowed and reports whether it was.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.ready(now) {
            return false;
        }
        self.last = Some(now);
        true
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last
    }
}
