//! Bounded exponential backoff between append attempts.

use std::time::Duration;

use verdict_core::config::CoordinatorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.effective_backoff_base_ms()),
            Duration::from_millis(config.effective_backoff_max_ms()),
        )
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}
