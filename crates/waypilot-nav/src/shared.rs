//! Latest-value cells between the asynchronous feeds (telemetry reader,
//! planner bridge, operator goals) and the control tick.
//!
//! Each cell has one writer and one reader. A write replaces the previous
//! value wholesale under the lock, so the tick never sees a half-updated
//! struct; there is no queue, the newest write wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use waypilot_proto::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub at: Instant,
}

impl<T> Stamped<T> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.at)
    }

    pub fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        self.age(now) <= max_age
    }
}

#[derive(Debug)]
pub struct StateCell<T> {
    inner: Arc<Mutex<Option<Stamped<T>>>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> Default for StateCell<T> {
    fn default() -> Self {
        Self { inner: Arc::new(Mutex::new(None)) }
    }
}

impl<T: Clone> StateCell<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, value: T) {
        self.publish_at(value, Instant::now());
    }

    pub fn publish_at(&self, value: T, at: Instant) {
        *lock(&self.inner) = Some(Stamped { value, at });
    }

    pub fn snapshot(&self) -> Option<Stamped<T>> {
        lock(&self.inner).clone()
    }
}

/// Single-slot latch for the operator's goal signal.
#[derive(Debug, Clone, Default)]
pub struct GoalLatch {
    inner: Arc<Mutex<Option<Vec3>>>,
}

impl GoalLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, goal: Vec3) {
        *lock(&self.inner) = Some(goal);
    }

    pub fn take(&self) -> Option<Vec3> {
        lock(&self.inner).take()
    }
}

// A writer that panicked mid-update still left a whole value behind.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
