//! Exponential backoff with jitter for the Redis trigger subscriber

use std::time::Duration;

use rand::Rng;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound for any delay
    pub max: Duration,
    /// Growth factor applied after each attempt
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Reconnection delay calculator
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.config.initial.as_millis() as f64
            * self.config.multiplier.powi(self.attempt.min(32) as i32);
        let capped_ms = base_ms.min(self.config.max.as_millis() as f64);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_range = capped_ms * self.config.jitter_factor.clamp(0.0, 1.0);
        let jittered = if jitter_range > 0.0 {
            capped_ms + rand::rng().random_range(-jitter_range..jitter_range)
        } else {
            capped_ms
        };

        Duration::from_millis(jittered.max(1.0) as u64)
    }

    /// Back to the initial delay, after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64) -> ExponentialBackoff {
        ExponentialBackoff::new(BackoffConfig {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
            multiplier: 2.0,
            jitter_factor: 0.0,
        })
    }

    #[test]
    fn test_delays_double_until_cap() {
        let mut backoff = no_jitter(100, 500);

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_reset() {
        let mut backoff = no_jitter(100, 10_000);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut backoff = ExponentialBackoff::default();
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(450));
        assert!(delay <= Duration::from_millis(550));
    }
}
