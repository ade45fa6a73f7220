//! Exponential backoff with symmetric jitter.

use std::time::Duration;

use rand::RngExt;

/// Backoff parameters used when scheduling a retry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Jitter ratio in `[0.0, 1.0]`; the delay is drawn from
    /// `raw * (1 - jitter)..=raw * (1 + jitter)`.
    pub jitter: f64,
}

impl BackoffPolicy {
    /// Policy applied to retries triggered by transport errors.
    pub const ERROR_RETRY: Self = Self { jitter: 0.25 };

    /// Policy without jitter. Scheduled delays equal the raw backoff.
    pub const EXACT: Self = Self { jitter: 0.0 };

    /// Compute the delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32, base: Duration, max: Duration) -> Duration {
        next_delay(attempt, base, max, self.jitter)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::ERROR_RETRY
    }
}

/// Exponential delay before jitter: `min(base * 2^attempt, max)`.
///
/// Saturates to `max` instead of overflowing for large attempt counts.
pub fn raw_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(max, |delay| delay.min(max))
}

/// Delay before retry number `attempt`, with jitter drawn from the thread RNG.
pub fn next_delay(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    if jitter == 0.0 {
        return raw_delay(attempt, base, max);
    }
    let unit = rand::rng().random_range(0.0..=1.0);
    jittered_delay(raw_delay(attempt, base, max), jitter, unit)
}

/// Spread `raw` by `jitter` using a uniform sample `unit` in `[0.0, 1.0]`.
///
/// `unit = 0.0` yields `raw * (1 - jitter)`, `unit = 1.0` yields
/// `raw * (1 + jitter)`. Saturates to `Duration::MAX`.
pub fn jittered_delay(raw: Duration, jitter: f64, unit: f64) -> Duration {
    let jitter = jitter.clamp(0.0, 1.0);
    let unit = unit.clamp(0.0, 1.0);
    let scale = 1.0 - jitter + 2.0 * jitter * unit;
    Duration::try_from_secs_f64(raw.as_secs_f64() * scale).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_raw_delay_doubles_until_cap() {
        let delays: Vec<u128> = (0..5)
            .map(|attempt| raw_delay(attempt, SECOND, Duration::from_secs(8)).as_millis())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 8000]);
    }

    #[test]
    fn test_raw_delay_saturates() {
        let max = Duration::from_secs(30);
        assert_eq!(raw_delay(31, SECOND, max), max);
        assert_eq!(raw_delay(32, SECOND, max), max);
        assert_eq!(raw_delay(u32::MAX, SECOND, max), max);
    }

    #[test]
    fn test_next_delay_within_jitter_bounds() {
        let max = Duration::from_secs(30);
        for attempt in 0..=10 {
            let raw = raw_delay(attempt, SECOND, max).as_secs_f64();
            for _ in 0..200 {
                let delay = next_delay(attempt, SECOND, max, 0.25).as_secs_f64();
                assert!(
                    delay >= raw * 0.75 - 1e-9 && delay <= raw * 1.25 + 1e-9,
                    "attempt {attempt}: {delay} outside [{}, {}]",
                    raw * 0.75,
                    raw * 1.25
                );
            }
        }
    }

    #[test]
    fn test_jittered_delay_edges() {
        let raw = Duration::from_millis(2000);
        assert_eq!(jittered_delay(raw, 0.25, 0.0), Duration::from_millis(1500));
        assert_eq!(jittered_delay(raw, 0.25, 0.5), Duration::from_millis(2000));
        assert_eq!(jittered_delay(raw, 0.25, 1.0), Duration::from_millis(2500));
    }

    #[test]
    fn test_jitter_saturates_near_duration_max() {
        let raw = raw_delay(0, Duration::MAX, Duration::MAX);
        assert_eq!(raw, Duration::MAX);
        assert_eq!(jittered_delay(raw, 0.25, 1.0), Duration::MAX);
        assert!(jittered_delay(raw, 0.25, 0.0) < Duration::MAX);

        let delay = BackoffPolicy::ERROR_RETRY.delay(3, Duration::MAX, Duration::MAX);
        assert!(delay > Duration::ZERO);
    }

    #[test]
    fn test_exact_policy_has_no_jitter() {
        let max = Duration::from_secs(8);
        assert_eq!(BackoffPolicy::EXACT.delay(2, SECOND, max), Duration::from_secs(4));
        assert_eq!(BackoffPolicy::default(), BackoffPolicy::ERROR_RETRY);
    }
}
