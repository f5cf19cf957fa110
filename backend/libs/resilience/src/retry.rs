/// Retry policy with capped exponential backoff and jitter
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Ceiling for any single delay
    pub max_backoff: Duration,
    /// Growth factor applied after every failed attempt
    pub backoff_multiplier: f64,
    /// Spread each delay by ±30%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Stateful delay generator: doubles (by `backoff_multiplier`) up to
/// `max_backoff` and never goes back down until [`Backoff::reset`].
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            current: config.initial_backoff,
            config,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True once `max_retries` delays have been handed out.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.config.max_retries
    }

    pub fn ceiling(&self) -> Duration {
        self.config.max_backoff
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial_backoff;
        self.attempts = 0;
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current.min(self.config.max_backoff);
        self.attempts += 1;

        let grown = self.current.as_millis() as f64 * self.config.backoff_multiplier;
        self.current = Duration::from_millis(grown.min(self.config.max_backoff.as_millis() as f64) as u64);

        if self.config.jitter {
            apply_jitter(base).min(self.config.max_backoff)
        } else {
            base
        }
    }
}

fn apply_jitter(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.7..1.3);
    Duration::from_millis((base.as_millis() as f64 * factor) as u64)
}
