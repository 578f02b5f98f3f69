//! Reconnect policy.
//!
//! Exponential backoff with jitter for re-establishing the chat session.
//! Delays double per failed attempt starting at `min`, are capped at `max`,
//! and get up to 25% random jitter added (still clamped to `[min, max]`).
//! The caller resets the policy once a session has stayed up long enough.
//!
//! Rate-limit responses bypass the exponential schedule: the server-suggested
//! delay is honoured and up to one second of jitter is added on top.
//!
//! Jitter is passed in as a fraction in `[0, 1)`, so the policy itself stays
//! deterministic and testable.

use std::time::Duration;

use crate::config::CoordinatorConfig;

/// Largest share of the base delay added as jitter.
const JITTER_SHARE: f64 = 0.25;

/// Largest jitter added to a server-suggested rate-limit delay.
const RATE_LIMIT_JITTER: Duration = Duration::from_secs(1);

/// Exponential backoff state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    min: Duration,
    max: Duration,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Create a policy with the given bounds.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max: max.max(min), attempt: 0 }
    }

    /// Create a policy from the configured bounds.
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(config.backoff_min, config.backoff_max)
    }

    /// Number of consecutive failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forget previous failures after a sustained connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay before the next attempt, advancing the schedule.
    ///
    /// # Arguments
    /// * `jitter` - Random fraction in `[0, 1)`
    pub fn next_delay(&mut self, jitter: f64) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(31));
        let base = self.min.saturating_mul(factor).min(self.max);
        let extra = base.mul_f64(JITTER_SHARE * jitter.clamp(0.0, 1.0));

        self.attempt = self.attempt.saturating_add(1);
        (base + extra).clamp(self.min, self.max)
    }

    /// Delay after a rate-limit response.
    ///
    /// Honours `retry_after` exactly, plus jitter. Does not advance the
    /// exponential schedule.
    pub fn rate_limited_delay(&self, retry_after: Duration, jitter: f64) -> Duration {
        retry_after.saturating_add(RATE_LIMIT_JITTER.mul_f64(jitter.clamp(0.0, 1.0)))
    }
}
