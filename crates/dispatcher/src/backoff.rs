//! Exponential reconnect backoff
//!
//! `sleep = respawn_delay ^ failures`, with the failure counter clamped at
//! `max_failure`. The counter is shared across batches and only reset by a
//! successful reconnect.

use std::time::Duration;

/// Failure counter and sleep-time policy
#[derive(Debug, Clone)]
pub struct Backoff {
    respawn_delay: u64,
    max_failure: u32,
    failures: u32,
}

impl Backoff {
    /// Create a backoff with the given base (seconds) and counter clamp
    pub fn new(respawn_delay: u64, max_failure: u32) -> Self {
        Self {
            respawn_delay,
            max_failure,
            failures: 0,
        }
    }

    /// Count a failure and return how long to sleep before reconnecting
    pub fn record_failure(&mut self) -> Duration {
        self.failures = (self.failures + 1).min(self.max_failure);
        Duration::from_secs(self.respawn_delay.saturating_pow(self.failures))
    }

    /// Reset after a successful reconnect
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Current consecutive failure count
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
