use std::time::Instant;

/// Per-waypoint scratch state. Belongs to the waypoint under the cursor and
/// is wiped on every advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transient {
    Fresh,
    Goto { published: u32 },
    Rotate { target_yaw: f64 },
    Spiral { first_yaw: f64, started: Instant },
}

/// Position in the waypoint sequence. `index == len` means exhausted.
#[derive(Debug, Clone)]
pub struct WaypointCursor {
    index: usize,
    len: usize,
    transient: Transient,
}

impl WaypointCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len, transient: Transient::Fresh }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.len
    }

    pub fn advance(&mut self) {
        self.index = (self.index + 1).min(self.len);
        self.transient = Transient::Fresh;
    }

    pub fn transient(&self) -> Transient {
        self.transient
    }

    pub fn set_transient(&mut self, t: Transient) {
        self.transient = t;
    }
}
