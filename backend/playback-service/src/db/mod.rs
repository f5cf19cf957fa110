/// Durable user record store
///
/// Progress lands here from the flush job. Each user keeps a bounded watch
/// history: one row per content item, most recent [`HISTORY_LIMIT`] kept.
pub mod memory;
pub mod watch_history;

pub use memory::InMemoryWatchHistory;
pub use watch_history::PgWatchHistory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{PopularContent, ProgressRecord, WatchHistoryEntry};

/// Entries kept per user
pub const HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait::async_trait]
pub trait WatchHistoryStore: Send + Sync {
    /// Update the user's entry for this content, or append one, then trim
    /// the history to [`HISTORY_LIMIT`]. A record older than the stored one
    /// is ignored, so a late write never rolls progress back.
    async fn upsert_progress(&self, record: &ProgressRecord) -> StoreResult<()>;

    async fn find_progress(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> StoreResult<Option<ProgressRecord>>;

    /// Most recently watched first
    async fn history(&self, user_id: &str, limit: i64) -> StoreResult<Vec<WatchHistoryEntry>>;

    /// Content with the most distinct viewers since `since`
    async fn most_watched(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<PopularContent>>;
}
