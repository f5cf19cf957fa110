use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use resilience::{reconnect_config, with_timeout, Backoff, RetryConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Shared Redis connection slot. `None` until the first successful connect.
pub type SharedConnectionManager = Arc<RwLock<Option<ConnectionManager>>>;

/// Reconnect and health-check tuning.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Backoff for one reconnect round (bounded attempts, capped doubling).
    pub retry: RetryConfig,
    /// Deadline for a single connect or PING.
    pub connect_timeout: Duration,
    /// How often a healthy connection is PINGed.
    pub health_interval: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let preset = reconnect_config();
        Self {
            retry: preset.retry.unwrap_or_default(),
            connect_timeout: preset.timeout.duration,
            health_interval: Duration::from_secs(5),
        }
    }
}

/// Redis connection pool that tracks health and reconnects in the background.
///
/// Startup never fails because Redis is down: the pool starts unavailable and
/// the supervisor keeps trying. Callers check [`RedisPool::connection`] and
/// treat `None` as "cache absent".
pub struct RedisPool {
    manager: SharedConnectionManager,
    available: Arc<AtomicBool>,
    wake: Arc<Notify>,
    _supervisor: Supervisor,
}

impl RedisPool {
    pub async fn connect(redis_url: &str, config: ReconnectConfig) -> Result<Self> {
        let client = Client::open(redis_url).context("failed to parse REDIS_URL connection string")?;

        let initial = match with_timeout(config.connect_timeout, ConnectionManager::new(client.clone())).await {
            Ok(Ok(manager)) => {
                info!("Connected to Redis");
                Some(manager)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Redis unavailable at startup; continuing without cache");
                None
            }
            Err(err) => {
                warn!(error = %err, "Redis connect timed out at startup; continuing without cache");
                None
            }
        };

        let available = Arc::new(AtomicBool::new(initial.is_some()));
        let manager = Arc::new(RwLock::new(initial));
        let wake = Arc::new(Notify::new());

        let supervisor = Supervisor::spawn(
            client,
            manager.clone(),
            available.clone(),
            wake.clone(),
            config,
        );

        Ok(Self {
            manager,
            available,
            wake,
            _supervisor: supervisor,
        })
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// A cloned handle to the live connection, or `None` while Redis is down.
    pub async fn connection(&self) -> Option<ConnectionManager> {
        if !self.is_available() {
            return None;
        }
        self.manager.read().await.clone()
    }

    /// Record a failed command. Connection-level failures flip the pool to
    /// unavailable and wake the supervisor so reconnecting starts right away.
    pub fn report_failure(&self, err: &RedisError) {
        if is_connection_error(err) && self.available.swap(false, Ordering::AcqRel) {
            warn!(error = %err, "Redis connection lost; cache disabled until reconnect");
            self.wake.notify_one();
        }
    }
}

/// Errors that mean the connection itself is gone, as opposed to a bad
/// command or a type mismatch.
pub fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

struct Supervisor {
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl Supervisor {
    fn spawn(
        client: Client,
        manager: SharedConnectionManager,
        available: Arc<AtomicBool>,
        wake: Arc<Notify>,
        config: ReconnectConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = tokio::spawn(async move {
            supervise(client, manager, available, wake, config, shutdown_rx).await;
        });

        Self { shutdown_tx, handle }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        self.handle.abort();
    }
}

async fn supervise(
    client: Client,
    manager: SharedConnectionManager,
    available: Arc<AtomicBool>,
    wake: Arc<Notify>,
    config: ReconnectConfig,
    mut shutdown: watch::Receiver<()>,
) {
    let mut backoff = Backoff::new(config.retry.clone());

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Redis supervisor shutting down");
                break;
            }
            _ = sleep(config.health_interval) => {}
            _ = wake.notified() => {}
        }

        if available.load(Ordering::Acquire) {
            if ping(&manager, config.connect_timeout).await {
                continue;
            }
            warn!("Redis health check failed; cache disabled until reconnect");
            available.store(false, Ordering::Release);
        }

        // One reconnect round: bounded attempts with capped doubling delays.
        backoff.reset();
        loop {
            match with_timeout(config.connect_timeout, ConnectionManager::new(client.clone())).await {
                Ok(Ok(new_manager)) => {
                    *manager.write().await = Some(new_manager);
                    available.store(true, Ordering::Release);
                    info!(attempts = backoff.attempts() + 1, "Redis reconnected; cache enabled");
                    break;
                }
                Ok(Err(err)) => debug!(error = %err, "Redis reconnect attempt failed"),
                Err(err) => debug!(error = %err, "Redis reconnect attempt timed out"),
            }

            if backoff.exhausted() {
                error!(
                    attempts = backoff.attempts() + 1,
                    retry_in_secs = backoff.ceiling().as_secs(),
                    "Redis reconnect round exhausted"
                );
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = sleep(backoff.ceiling()) => {}
                }
                backoff.reset();
                continue;
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = sleep(delay) => {}
            }
        }
    }
}

async fn ping(manager: &SharedConnectionManager, deadline: Duration) -> bool {
    let Some(mut conn) = manager.read().await.clone() else {
        return false;
    };

    matches!(
        with_timeout(deadline, redis::cmd("PING").query_async::<_, String>(&mut conn)).await,
        Ok(Ok(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_reconnect_preset() {
        let config = ReconnectConfig::default();
        assert_eq!(config.retry.max_backoff, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.health_interval, Duration::from_secs(5));
    }

    #[test]
    fn io_errors_are_connection_errors() {
        let err = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(is_connection_error(&err));
    }

    #[test]
    fn type_errors_are_not_connection_errors() {
        let err = RedisError::from((redis::ErrorKind::TypeError, "not an integer"));
        assert!(!is_connection_error(&err));
    }

    #[tokio::test]
    async fn unreachable_redis_starts_unavailable() {
        let config = ReconnectConfig {
            connect_timeout: Duration::from_millis(200),
            ..Default::default()
        };

        let pool = RedisPool::connect("redis://127.0.0.1:1", config).await.unwrap();
        assert!(!pool.is_available());
        assert!(pool.connection().await.is_none());
    }

    #[tokio::test]
    async fn malformed_url_is_rejected() {
        let result = RedisPool::connect("not a url", ReconnectConfig::default()).await;
        assert!(result.is_err());
    }
}
