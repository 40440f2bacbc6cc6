//! Exponential backoff with jitter, bounded by a sink's [`RetryPolicy`].

use std::time::Duration;

use rand::Rng;

use crate::resilience::RetryPolicy;

/// Delay after failed attempt `attempt` (1-based): `base_delay` doubled per
/// attempt, capped at `max_delay`, plus up to 10% jitter. Jitter never takes
/// the delay past `max_delay`.
pub fn delay_for(policy: &RetryPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let doubling = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    let delay = policy.base_delay.saturating_mul(doubling).min(policy.max_delay);

    let headroom = policy.max_delay.saturating_sub(delay).min(delay / 10);
    if headroom.is_zero() {
        return delay;
    }
    delay + rand::thread_rng().gen_range(Duration::ZERO..headroom)
}
