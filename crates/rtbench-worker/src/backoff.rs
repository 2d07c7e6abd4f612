//! Backoff for spawn attempts that fail on a resource shortage.

use std::time::Duration;

pub const INITIAL_SPAWN_BACKOFF: Duration = Duration::from_secs(5);
pub const MAX_SPAWN_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff: 5s, 10s, 20s, 40s, then 60s until reset.
#[derive(Debug, Clone)]
pub struct SpawnBackoff {
    initial: Duration,
    max: Duration,
    attempts: u32,
}

impl Default for SpawnBackoff {
    fn default() -> Self {
        Self::new(INITIAL_SPAWN_BACKOFF, MAX_SPAWN_BACKOFF)
    }
}

impl SpawnBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            attempts: 0,
        }
    }

    /// Delay before the next retry; advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempts.min(16));
        self.attempts = self.attempts.saturating_add(1);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Number of consecutive failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
