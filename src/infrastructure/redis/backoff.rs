//! Reconnect delays for the document event subscriber

use std::time::Duration;

use rand::Rng;

use crate::config::RedisConfig;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Growth factor applied after every failed attempt
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl From<&RedisConfig> for BackoffConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            initial_delay_ms: config.backoff_initial_delay_ms,
            max_delay_ms: config.backoff_max_delay_ms,
            ..Self::default()
        }
    }
}

/// Exponential backoff with jitter. The first delay equals the initial delay.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    next_base_ms: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms as f64;
        Self {
            config,
            next_base_ms: initial,
            attempt: 0,
        }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let base = self.next_base_ms.min(self.config.max_delay_ms as f64);
        self.next_base_ms = (base * self.config.multiplier).min(self.config.max_delay_ms as f64);

        let delay = if self.config.jitter_factor > 0.0 && base > 0.0 {
            let spread = base * self.config.jitter_factor;
            base + rand::rng().random_range(-spread..=spread)
        } else {
            base
        };

        Duration::from_millis(delay.max(1.0) as u64)
    }

    /// Reset after a successful connection
    pub fn reset(&mut self) {
        self.next_base_ms = self.config.initial_delay_ms as f64;
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

    fn no_jitter(initial: u64, max: u64) -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: initial,
            max_delay_ms: max,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn test_first_delay_is_initial_then_doubles() {
        let mut backoff = ExponentialBackoff::new(no_jitter(100, 10_000));

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.attempt(), 3);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let mut backoff = ExponentialBackoff::new(no_jitter(1_000, 5_000));

        for _ in 0..10 {
            backoff.next_delay();
        }

        assert_eq!(backoff.next_delay(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = ExponentialBackoff::new(no_jitter(100, 10_000));
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let config = BackoffConfig {
            jitter_factor: 0.5,
            ..no_jitter(1_000, 1_000)
        };
        let mut backoff = ExponentialBackoff::new(config);

        for _ in 0..20 {
            let delay = backoff.next_delay().as_millis();
            assert!((500..=1_500).contains(&delay));
        }
    }
}
