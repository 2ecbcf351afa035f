//! Capped exponential reconnect delay.

use std::time::Duration;

/// Doubles the delay after every failed attempt, up to a cap.
///
/// Call [`reset`](Backoff::reset) after a successful connection so the
/// next outage starts again from the initial delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Create a backoff starting at `initial` and never exceeding `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait before the next attempt; advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.checked_mul(2).unwrap_or(self.max).min(self.max);
        delay
    }

    /// Restart the sequence from the initial delay.
    pub const fn reset(&mut self) {
        self.current = self.initial;
    }
}
