//! Exponential retry backoff for failed deliveries

use chrono::Duration;
use rand::Rng;

use crate::config::RetryBackoffConfig;

/// Stateless backoff calculator: the delay depends only on how many
/// attempts a job has already made, so it can be recomputed per job.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    config: RetryBackoffConfig,
}

impl RetryBackoff {
    pub fn new(config: RetryBackoffConfig) -> Self {
        Self { config }
    }

    /// Backoff without jitter, for predictable tests
    pub fn without_jitter(mut config: RetryBackoffConfig) -> Self {
        config.jitter_factor = 0.0;
        Self { config }
    }

    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let base = self.config.initial_delay_secs as f64 * self.config.multiplier.powi(exponent);
        let capped = base.min(self.config.max_delay_secs as f64);

        let jitter_range = capped * self.config.jitter_factor.clamp(0.0, 1.0);
        let with_jitter = if jitter_range > 0.0 {
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            capped + jitter
        } else {
            capped
        };

        Duration::milliseconds((with_jitter.max(1.0) * 1000.0) as i64)
    }
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self::new(RetryBackoffConfig::default())
    }
}
