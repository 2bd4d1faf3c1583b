use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retry settings for outbound platform calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts for transient failures, including the first call
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Rate-limit cooldowns honored before giving up
    pub max_rate_limit_waits: u32,
    /// Upper bound for a provider-requested cooldown
    pub max_cooldown_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
            max_rate_limit_waits: 5,
            max_cooldown_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based) of a transient failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Wait for a rate-limited call, capped at `max_cooldown_secs`.
    pub fn cooldown(&self, retry_after_secs: u64) -> Duration {
        Duration::from_secs(retry_after_secs.min(self.max_cooldown_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_progression() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(6), Duration::from_millis(8000));
    }

    #[test]
    fn test_cooldown_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.cooldown(3), Duration::from_secs(3));
        assert_eq!(policy.cooldown(3600), Duration::from_secs(60));
    }
}
