/// In-process watch history with the same trimming rules as Postgres.
/// Can be told to fail so flush retries are observable.
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{StoreError, StoreResult, WatchHistoryStore, HISTORY_LIMIT};
use crate::models::{PopularContent, ProgressRecord, WatchHistoryEntry};

#[derive(Default)]
pub struct InMemoryWatchHistory {
    users: RwLock<HashMap<String, Vec<ProgressRecord>>>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryWatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every upsert fails
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful upserts so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WatchHistoryStore for InMemoryWatchHistory {
    async fn upsert_progress(&self, record: &ProgressRecord) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is failing".to_string()));
        }

        let mut users = self.users.write();
        let entries = users.entry(record.user_id.clone()).or_default();
        match entries
            .iter_mut()
            .find(|e| e.content_id == record.content_id)
        {
            Some(existing) if existing.last_update_time > record.last_update_time => {}
            Some(existing) => *existing = record.clone(),
            None => entries.push(record.clone()),
        }

        entries.sort_by(|a, b| b.last_update_time.cmp(&a.last_update_time));
        entries.truncate(HISTORY_LIMIT as usize);

        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_progress(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> StoreResult<Option<ProgressRecord>> {
        Ok(self
            .users
            .read()
            .get(user_id)
            .and_then(|entries| entries.iter().find(|e| e.content_id == content_id))
            .cloned())
    }

    async fn history(&self, user_id: &str, limit: i64) -> StoreResult<Vec<WatchHistoryEntry>> {
        let limit = limit.clamp(1, HISTORY_LIMIT) as usize;
        Ok(self
            .users
            .read()
            .get(user_id)
            .map(|entries| {
                entries
                    .iter()
                    .take(limit)
                    .map(|r| WatchHistoryEntry {
                        content_id: r.content_id.clone(),
                        last_position: r.current_position,
                        duration: r.duration,
                        progress: r.progress_percent,
                        last_watched: r.last_update_time,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn most_watched(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<PopularContent>> {
        let mut viewers: HashMap<String, HashSet<String>> = HashMap::new();
        for (user_id, entries) in self.users.read().iter() {
            for entry in entries.iter().filter(|e| e.last_update_time >= since) {
                viewers
                    .entry(entry.content_id.clone())
                    .or_default()
                    .insert(user_id.clone());
            }
        }

        let mut ranked: Vec<PopularContent> = viewers
            .into_iter()
            .map(|(content_id, users)| PopularContent {
                content_id,
                viewers: users.len() as i64,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.viewers
                .cmp(&a.viewers)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }
}
