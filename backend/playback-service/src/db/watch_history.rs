/// PostgreSQL watch history
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{StoreResult, WatchHistoryStore, HISTORY_LIMIT};
use crate::models::{PopularContent, ProgressRecord, WatchHistoryEntry};

#[derive(Clone)]
pub struct PgWatchHistory {
    pool: PgPool,
}

impl PgWatchHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[derive(sqlx::FromRow)]
struct WatchHistoryRow {
    user_id: String,
    content_id: String,
    last_position: f64,
    duration: f64,
    progress: f64,
    last_watched: DateTime<Utc>,
}

impl From<WatchHistoryRow> for ProgressRecord {
    fn from(row: WatchHistoryRow) -> Self {
        Self {
            user_id: row.user_id,
            content_id: row.content_id,
            current_position: row.last_position,
            duration: row.duration,
            progress_percent: row.progress,
            last_update_time: row.last_watched,
        }
    }
}

impl From<WatchHistoryRow> for WatchHistoryEntry {
    fn from(row: WatchHistoryRow) -> Self {
        Self {
            content_id: row.content_id,
            last_position: row.last_position,
            duration: row.duration,
            progress: row.progress,
            last_watched: row.last_watched,
        }
    }
}

#[async_trait::async_trait]
impl WatchHistoryStore for PgWatchHistory {
    async fn upsert_progress(&self, record: &ProgressRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO watch_history (user_id, content_id, last_position, duration, progress, last_watched) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, content_id) DO UPDATE SET \
             last_position = EXCLUDED.last_position, duration = EXCLUDED.duration, \
             progress = EXCLUDED.progress, last_watched = EXCLUDED.last_watched \
             WHERE watch_history.last_watched <= EXCLUDED.last_watched",
        )
        .bind(&record.user_id)
        .bind(&record.content_id)
        .bind(record.current_position)
        .bind(record.duration)
        .bind(record.progress_percent)
        .bind(record.last_update_time)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM watch_history WHERE user_id = $1 AND content_id NOT IN ( \
             SELECT content_id FROM watch_history WHERE user_id = $1 \
             ORDER BY last_watched DESC LIMIT $2)",
        )
        .bind(&record.user_id)
        .bind(HISTORY_LIMIT)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_progress(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> StoreResult<Option<ProgressRecord>> {
        let row = sqlx::query_as::<_, WatchHistoryRow>(
            "SELECT user_id, content_id, last_position, duration, progress, last_watched \
             FROM watch_history WHERE user_id = $1 AND content_id = $2",
        )
        .bind(user_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn history(&self, user_id: &str, limit: i64) -> StoreResult<Vec<WatchHistoryEntry>> {
        let rows = sqlx::query_as::<_, WatchHistoryRow>(
            "SELECT user_id, content_id, last_position, duration, progress, last_watched \
             FROM watch_history WHERE user_id = $1 \
             ORDER BY last_watched DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.clamp(1, HISTORY_LIMIT))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn most_watched(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<PopularContent>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT content_id, COUNT(DISTINCT user_id) AS viewers \
             FROM watch_history WHERE last_watched >= $1 \
             GROUP BY content_id ORDER BY viewers DESC, content_id ASC LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(content_id, viewers)| PopularContent { content_id, viewers })
            .collect())
    }
}
