//! Monotonic time source for TTL bookkeeping.

use std::{
  sync::Mutex,
  time::{Duration, Instant},
};

pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant { Instant::now() }
}

/// A clock that only moves when told to. Lets dedup windows be tested
/// without sleeping.
#[derive(Debug)]
pub struct ManualClock {
  start:   Instant,
  elapsed: Mutex<Duration>,
}

impl ManualClock {
  pub fn new() -> Self {
    Self { start: Instant::now(), elapsed: Mutex::new(Duration::ZERO) }
  }

  pub fn advance(&self, by: Duration) {
    let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
    *elapsed += by;
  }
}

impl Default for ManualClock {
  fn default() -> Self { Self::new() }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    let elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
    self.start + *elapsed
  }
}
