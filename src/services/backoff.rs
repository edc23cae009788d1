//! Exponential backoff with jitter for retry scheduling.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the random jitter, as a fraction of the exponential delay.
const JITTER_FRACTION: f64 = 0.1;

/// Delay before retry number `attempt` (0-indexed).
///
/// Computed as `min(max_delay, base_delay * 2^attempt * (1 + U(0, 0.1)))`.
/// The jitter desynchronizes concurrent callers retrying against the same
/// account.
pub fn calculate_backoff(base_delay: Duration, max_delay: Duration, attempt: u32) -> Duration {
    let jitter: f64 = rand::rng().random_range(0.0..JITTER_FRACTION);
    backoff_with_jitter(base_delay, max_delay, attempt, jitter)
}

fn backoff_with_jitter(
    base_delay: Duration,
    max_delay: Duration,
    attempt: u32,
    jitter: f64,
) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let backoff = base_delay.as_secs_f64() * 2f64.powi(exponent) * (1.0 + jitter);

    if !backoff.is_finite() || backoff >= max_delay.as_secs_f64() {
        return max_delay;
    }
    Duration::from_secs_f64(backoff)
}
