//! Connect Backoff
//!
//! Exponential backoff with jitter between attempts to open the connection.
//! Only used before the first request; a connection that drops mid-run is
//! never re-opened.

use std::time::Duration;

use rand::Rng;

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Random spread as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Total connection attempts, including the first.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 3,
        }
    }
}

impl BackoffConfig {
    /// Default timing with a custom attempt budget.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

/// Backoff state for one connect sequence.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    next_base: Duration,
    failures: u32,
}

impl Backoff {
    /// Start a connect sequence.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self {
            next_base: config.initial_delay,
            config,
            failures: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.config.max_attempts.max(1) {
            return None;
        }

        let base = self.next_base;
        let grown = base.mul_f64(self.config.multiplier.max(1.0));
        self.next_base = grown.min(self.config.max_delay);
        Some(jittered(base.min(self.config.max_delay), self.config.jitter_factor))
    }

    /// Failed attempts so far.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}

fn jittered(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }
    let spread = factor.min(1.0);
    let scale = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
    delay.mul_f64(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(max_attempts: u32) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn delays_grow_and_cap() {
        let mut backoff = Backoff::new(no_jitter(10));
        assert_eq!(backoff.on_failure(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.on_failure(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.on_failure(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.on_failure(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn attempt_budget_includes_first_attempt() {
        let mut backoff = Backoff::new(no_jitter(3));
        assert!(backoff.on_failure().is_some());
        assert!(backoff.on_failure().is_some());
        assert!(backoff.on_failure().is_none());
        assert_eq!(backoff.failures(), 3);
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut backoff = Backoff::new(no_jitter(1));
        assert!(backoff.on_failure().is_none());

        let mut zero = Backoff::new(no_jitter(0));
        assert!(zero.on_failure().is_none());
    }

    #[test]
    fn jitter_stays_in_bounds() {
        for _ in 0..100 {
            let mut backoff = Backoff::new(BackoffConfig {
                initial_delay: Duration::from_millis(1000),
                jitter_factor: 0.1,
                ..BackoffConfig::default()
            });
            let millis = backoff.on_failure().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of range");
        }
    }
}
