//! Storage backends behind [`crate::CacheStore`]

use crate::{CacheError, CacheResult};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline, RedisError};
use redis_utils::RedisPool;
use std::sync::Arc;
use tracing::debug;

/// Raw key-value operations with TTL. Values are already serialized.
///
/// Implementations report errors honestly; turning them into misses is the
/// job of [`crate::CacheStore`].
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    /// Whether the backend is currently believed reachable.
    fn is_available(&self) -> bool;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> CacheResult<()>;

    /// Returns true if a key was removed.
    async fn del(&self, key: &str) -> CacheResult<bool>;

    /// Delete every key matching a glob pattern, returning how many went.
    async fn scan_del(&self, pattern: &str) -> CacheResult<usize>;

    async fn incr(&self, key: &str, by: i64) -> CacheResult<i64>;

    /// Returns true if the key existed and now carries the TTL.
    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool>;

    /// Redis TTL semantics: seconds left, -1 for no expiry, -2 for missing.
    async fn ttl(&self, key: &str) -> CacheResult<i64>;
}

/// Redis backend over a supervised [`RedisPool`]
#[derive(Clone)]
pub struct RedisBackend {
    pool: Arc<RedisPool>,
}

impl RedisBackend {
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> CacheResult<ConnectionManager> {
        self.pool.connection().await.ok_or(CacheError::Unavailable)
    }

    fn fail(&self, err: RedisError) -> CacheError {
        self.pool.report_failure(&err);
        CacheError::Redis(err)
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisBackend {
    fn is_available(&self) -> bool {
        self.pool.is_available()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| self.fail(e))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| self.fail(e))
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await.map_err(|e| self.fail(e))?;
        Ok(removed > 0)
    }

    async fn scan_del(&self, pattern: &str) -> CacheResult<usize> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            // SCAN instead of KEYS to avoid blocking the server
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| self.fail(e))?;

            if !keys.is_empty() {
                let mut pipe = Pipeline::new();
                for key in &keys {
                    pipe.del(key);
                }
                pipe.query_async::<_, ()>(&mut conn)
                    .await
                    .map_err(|e| self.fail(e))?;

                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted = total_deleted, "Redis scan delete");
        Ok(total_deleted)
    }

    async fn incr(&self, key: &str, by: i64) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        conn.incr::<_, _, i64>(key, by)
            .await
            .map_err(|e| self.fail(e))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        conn.expire::<_, bool>(key, ttl_secs as i64)
            .await
            .map_err(|e| self.fail(e))
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        conn.ttl::<_, i64>(key).await.map_err(|e| self.fail(e))
    }
}
