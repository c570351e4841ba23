//! Geometric reconnect backoff

use std::time::Duration;

/// Backoff factor between successive reconnect attempts
const BACKOFF_FACTOR: f64 = 1.5;

/// Retry timer for the reconnect supervisor.
///
/// Yields `base * 1.5^attempt` for each attempt until the cap, then `None`.
/// One instance lives per disconnect episode, so a successful reconnect
/// resets the schedule by construction.
pub struct Backoff {
    base: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempts: 0,
        }
    }

    /// The delay before the next attempt, or `None` once attempts are
    /// exhausted. The first call returns the base interval unscaled.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let delay = self.base.mul_f64(BACKOFF_FACTOR.powi(self.attempts as i32));
        self.attempts += 1;
        Some(delay)
    }

    /// Attempts consumed so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
