//! Backoff policy for transient fetch failures.

use std::time::Duration;

/// Retry policy for transient per-unit failures.
///
/// A unit is attempted at most `max_retries + 1` times; every retry
/// re-acquires the shared rate limiter before fetching again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Calculates the backoff delay before retry number `attempt`
    /// (1-based), with exponential growth, a cap, and jitter.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // Exponential backoff: base_delay * 2^attempt
        let exp_delay = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));

        let capped_delay = exp_delay.min(self.max_delay_ms);

        // Jitter inside [-25%, +25%], derived from the attempt number so
        // delays stay reproducible without a random number generator.
        let jitter_range = capped_delay / 4;
        let jitter = if jitter_range > 0 {
            (u64::from(attempt) * 17) % (jitter_range * 2)
        } else {
            0
        };

        let final_delay = (capped_delay - jitter_range + jitter).max(100);
        Duration::from_millis(final_delay)
    }

    /// Picks the delay before retry number `attempt`, honoring a server
    /// supplied wait hint when it is longer than the computed backoff.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.backoff_delay(attempt);
        hint.map_or(backoff, |h| h.max(backoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_until_cap() {
        let policy = RetryPolicy::default();

        let delays: Vec<_> = (1..=10).map(|a| policy.backoff_delay(a)).collect();

        // Non-decreasing while below the cap region, never above cap +25%.
        for pair in delays.windows(2) {
            assert!(pair[1] >= pair[0], "delay shrank: {pair:?}");
        }
        for d in &delays {
            assert!(d.as_millis() as u64 <= policy.max_delay_ms + policy.max_delay_ms / 4);
        }

        // First delay lands inside the jittered band around 1000ms.
        assert!(delays[0] >= Duration::from_millis(750));
        assert!(delays[0] <= Duration::from_millis(1250));
    }

    #[test]
    fn test_backoff_floor() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
        };
        assert!(policy.backoff_delay(1) >= Duration::from_millis(100));
    }

    #[test]
    fn test_delay_honors_longer_hint() {
        let policy = RetryPolicy::default();

        let hinted = policy.delay_for(1, Some(Duration::from_secs(60)));
        assert_eq!(hinted, Duration::from_secs(60));

        // A hint shorter than the backoff does not shrink the wait.
        let short_hint = policy.delay_for(1, Some(Duration::from_millis(1)));
        assert_eq!(short_hint, policy.backoff_delay(1));

        assert_eq!(policy.delay_for(1, None), policy.backoff_delay(1));
    }
}
