/// Timeout wrappers for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
}

/// Run `future`, giving up after `duration`.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_inside_deadline() {
        let value = with_timeout(Duration::from_secs(1), async { "cached" }).await;
        assert_eq!(value.unwrap(), "cached");
    }

    #[tokio::test]
    async fn slow_future_is_cut_off() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
        })
        .await;

        assert!(matches!(
            result,
            Err(TimeoutError::Elapsed(d)) if d == Duration::from_millis(10)
        ));
    }
}
