//! Per-sink retry policy.
//!
//! # Design Decisions
//! - Each sink owns its policy; no retry state is shared across sinks
//! - Only transient failures (connect, timeout, 5xx, 429) are retried
//! - Attempts include the first try: `max_attempts = 1` disables retries

use std::time::Duration;

use crate::resilience::backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        backoff::delay_for(self, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(5000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_budget() {
        let policy = RetryPolicy { max_attempts: 3, ..RetryPolicy::default() };
        assert!(policy.allows_retry_after(1));
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));

        let single = RetryPolicy { max_attempts: 1, ..RetryPolicy::default() };
        assert!(!single.allows_retry_after(1));
    }

    #[test]
    fn test_delay_grows() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_after(2) >= policy.delay_after(1));
    }
}
