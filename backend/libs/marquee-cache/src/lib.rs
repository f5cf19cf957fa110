//! Marquee cache layer
//!
//! A key-value cache with TTLs that degrades to a permanent miss when the
//! backend is slow or gone:
//! - Versioned key schema ([`CacheKey`])
//! - Every backend call bounded by an operation timeout
//! - SCAN-based pattern invalidation (no blocking KEYS)
//! - Hit/miss/error accounting for the admin surface and Prometheus
//!
//! Callers never see a cache error. Failures are logged, counted and turned
//! into "miss" / `false` / `None`.

mod backend;
mod error;
mod keys;
mod memory;
mod metrics;

pub use backend::{CacheBackend, RedisBackend};
pub use error::{CacheError, CacheResult};
pub use keys::{escape_glob, CacheKey, CACHE_VERSION};
pub use memory::{glob_match, MemoryBackend};
pub use metrics::{CacheMetrics, CacheStats};

use redis_utils::RedisPool;
use resilience::{cache_config, invalidation_config, with_timeout};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default TTL values (seconds)
pub mod ttl {
    pub const SOURCES: u64 = 3600; // 1 hour
    pub const NO_SOURCES: u64 = 60; // 1 minute for "no sources" results
    pub const SESSION: u64 = 86_400; // 24 hours
    pub const ENDED_SESSION: u64 = 300; // 5 minutes
    pub const PROGRESS: u64 = 604_800; // 7 days
    pub const PROVIDER_FAILURES: u64 = 3600; // 1 hour window
    pub const RESPONSE: u64 = 300; // 5 minutes
}

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Expires(u64),
    Persistent,
    Missing,
}

impl KeyTtl {
    fn from_redis(raw: i64) -> Self {
        match raw {
            -1 => KeyTtl::Persistent,
            n if n < 0 => KeyTtl::Missing,
            n => KeyTtl::Expires(n as u64),
        }
    }

    pub fn seconds(&self) -> Option<u64> {
        match self {
            KeyTtl::Expires(secs) => Some(*secs),
            _ => None,
        }
    }
}

/// Cache handle shared by every component, cheap to clone
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    metrics: CacheMetrics,
    op_timeout: Duration,
    /// Budget for a whole SCAN + DEL sweep
    pattern_timeout: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            metrics: CacheMetrics::new(),
            op_timeout: cache_config().timeout.duration,
            pattern_timeout: invalidation_config().timeout.duration,
        }
    }

    /// Store backed by a supervised Redis pool
    pub fn redis(pool: Arc<RedisPool>) -> Self {
        Self::new(Arc::new(RedisBackend::new(pool)))
    }

    /// Process-local store; returns the backend too so callers can flip its
    /// availability.
    pub fn in_memory() -> (Self, MemoryBackend) {
        let backend = MemoryBackend::new();
        (Self::new(Arc::new(backend.clone())), backend)
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn with_pattern_timeout(mut self, pattern_timeout: Duration) -> Self {
        self.pattern_timeout = pattern_timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.is_available())
    }

    /// Run one backend call under the operation timeout. Any failure is
    /// logged and counted, and comes back as `None`.
    async fn guarded<T, F>(&self, op: &'static str, key: &str, call: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        self.guarded_within(self.op_timeout, op, key, call).await
    }

    async fn guarded_within<T, F>(
        &self,
        limit: Duration,
        op: &'static str,
        key: &str,
        call: F,
    ) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        if !self.backend.is_available() {
            debug!(op, key, "Cache unavailable, skipping");
            self.metrics.record_error(key, CacheError::Unavailable.kind());
            return None;
        }

        let err = match with_timeout(limit, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err,
            Err(_) => CacheError::Timeout(limit),
        };

        match err {
            // Lost the race with an outage; the pool already logged it.
            CacheError::Unavailable => debug!(op, key, "Cache unavailable"),
            ref e => warn!(op, key, error = %e, "Cache operation failed"),
        }
        self.metrics.record_error(key, err.kind());
        None
    }

    /// Get a JSON value. Corrupt entries are dropped and read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                self.metrics.record_error(key, "serialize");
                self.delete(key).await;
                None
            }
        }
    }

    /// Get the stored string as-is
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        match self.guarded("get", key, self.backend.get(key)).await.flatten() {
            Some(raw) => {
                self.metrics.record_hit(key);
                debug!(key, "Cache hit");
                Some(raw)
            }
            None => {
                self.metrics.record_miss(key);
                None
            }
        }
    }

    /// Serialize as JSON and store with a TTL. False when nothing was written.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, raw, ttl_secs).await,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache value");
                self.metrics.record_error(key, "serialize");
                false
            }
        }
    }

    pub async fn set_raw(&self, key: &str, raw: String, ttl_secs: u64) -> bool {
        let written = self
            .guarded("set", key, self.backend.set_ex(key, raw, ttl_secs))
            .await
            .is_some();
        if written {
            self.metrics.record_write(key);
        }
        written
    }

    pub async fn delete(&self, key: &str) -> bool {
        let removed = self
            .guarded("delete", key, self.backend.del(key))
            .await
            .unwrap_or(false);
        if removed {
            self.metrics.record_invalidation(key, 1);
        }
        removed
    }

    /// Delete every key matching a Redis glob. Returns how many were removed.
    /// The sweep runs under its own, longer budget than single-key calls.
    pub async fn delete_pattern(&self, pattern: &str) -> usize {
        let deleted = self
            .guarded_within(
                self.pattern_timeout,
                "delete_pattern",
                pattern,
                self.backend.scan_del(pattern),
            )
            .await
            .unwrap_or(0);
        if deleted > 0 {
            self.metrics.record_invalidation(pattern, deleted);
        }
        debug!(pattern, deleted, "Pattern invalidation");
        deleted
    }

    /// Atomic increment. A missing key starts at zero and has no TTL.
    pub async fn increment(&self, key: &str, by: i64) -> Option<i64> {
        self.guarded("increment", key, self.backend.incr(key, by))
            .await
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> bool {
        self.guarded("expire", key, self.backend.expire(key, ttl_secs))
            .await
            .unwrap_or(false)
    }

    /// Remaining lifetime; an unavailable cache reports every key missing.
    pub async fn ttl(&self, key: &str) -> KeyTtl {
        self.guarded("ttl", key, self.backend.ttl(key))
            .await
            .map(KeyTtl::from_redis)
            .unwrap_or(KeyTtl::Missing)
    }
}
