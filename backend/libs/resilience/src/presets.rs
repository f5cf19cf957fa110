/// Preset configurations for the dependencies Marquee talks to
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for one kind of dependency
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub retry: Option<RetryConfig>,
}

/// Cache backend operations (Redis GET/SET/SCAN)
///
/// - Timeout: 250ms, a slow cache is treated as a miss
/// - No retry: the caller falls back to the source of truth instead
pub fn cache_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_millis(250),
        },
        retry: None,
    }
}

/// Pattern invalidation (SCAN + DEL over the whole keyspace)
///
/// - Timeout: 5s for the full sweep, many round trips on a large keyspace
/// - No retry: a cut-off sweep keeps what it already deleted
pub fn invalidation_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(5),
        },
        retry: None,
    }
}

/// Upstream streaming-source providers
///
/// - Timeout: 10s per call, after which the provider counts as failed
/// - No retry: the aggregator falls through to the next provider
pub fn provider_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        retry: None,
    }
}

/// Redis reconnect rounds
///
/// - Timeout: 2s per connection attempt
/// - Retry: 6 attempts, 100ms doubling to a 10s ceiling
pub fn reconnect_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(2),
        },
        retry: Some(RetryConfig {
            max_retries: 6,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_ops_fail_fast() {
        let config = cache_config();
        assert!(config.timeout.duration < Duration::from_secs(1));
        assert!(config.retry.is_none());
    }

    #[test]
    fn invalidation_outlasts_single_cache_ops() {
        assert!(invalidation_config().timeout.duration > cache_config().timeout.duration * 10);
    }

    #[test]
    fn provider_timeout_is_ten_seconds() {
        assert_eq!(provider_config().timeout.duration, Duration::from_secs(10));
    }

    #[test]
    fn reconnect_backoff_is_capped() {
        let retry = reconnect_config().retry.unwrap();
        assert_eq!(retry.max_backoff, Duration::from_secs(10));
        assert_eq!(retry.backoff_multiplier, 2.0);
    }
}
