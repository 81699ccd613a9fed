//! Reconnection policy for change subscriptions

use std::time::Duration;

/// Subscription configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionConfig {
    /// Reconnect automatically after a failure
    pub auto_reconnect: bool,
    /// Delay before the first retry; doubles per attempt
    pub base_delay: Duration,
    /// Upper bound on any single retry delay
    pub max_delay: Duration,
    /// Failures tolerated before giving up
    pub max_reconnect_attempts: u32,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        SubscriptionConfig {
            auto_reconnect: true,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_reconnect_attempts: 5,
        }
    }
}

impl SubscriptionConfig {
    /// Delay before retry number `attempts` (zero-based)
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        backoff_delay(attempts, self.base_delay, self.max_delay)
    }

    /// May another retry be scheduled after `attempts` retries?
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.auto_reconnect && attempts < self.max_reconnect_attempts
    }
}

/// `min(base * 2^attempts, max)` without overflow
pub fn backoff_delay(attempts: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}
