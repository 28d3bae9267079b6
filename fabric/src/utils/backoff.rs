//! Capped exponential backoff with jitter

use rand::Rng;
use std::time::Duration;

/// `min(base * 2^attempt, cap)` plus up to `jitter` of that delay at random.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
    /// Fraction of the delay added as random jitter, `0.0..=1.0`.
    pub jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            jitter: 0.1,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let cap_ms = self.cap.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
    }

    /// Delay before retry number `attempt` (0-based), with jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        let max_jitter_ms = (delay.as_millis() as f64 * self.jitter) as u64;
        if max_jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=max_jitter_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles_until_cap() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(30_000));
        assert_eq!(backoff.base_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(16_000));
        assert_eq!(backoff.base_delay(5), Duration::from_millis(30_000));
        assert_eq!(backoff.base_delay(200), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(30_000));
        for _ in 0..100 {
            let d = backoff.delay(1);
            assert!(d >= Duration::from_millis(2000));
            assert!(d <= Duration::from_millis(2200));
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let backoff =
            Backoff::new(Duration::from_millis(10), Duration::from_millis(100)).with_jitter(0.0);
        assert_eq!(backoff.delay(3), Duration::from_millis(80));
    }
}
