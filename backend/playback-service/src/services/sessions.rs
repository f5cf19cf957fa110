//! Playback sessions and progress
//!
//! Per (user, content): NoSession -> Active -> Ended. Live state sits in the
//! cache; progress reaches the durable store through [`PendingUpdates`],
//! drained by the flush job, or immediately when a session ends.

use chrono::Utc;
use marquee_cache::{escape_glob, ttl, CacheKey, CacheStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::WatchHistoryStore;
use crate::error::{AppError, Result};
use crate::models::{ProgressRecord, ProgressUpdate, Session, SessionView, WatchHistoryEntry};
use crate::services::pending::PendingUpdates;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_ttl: u64,
    pub progress_ttl: u64,
    pub ended_session_ttl: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: ttl::SESSION,
            progress_ttl: ttl::PROGRESS,
            ended_session_ttl: ttl::ENDED_SESSION,
        }
    }
}

/// Result of persisting one pending entry
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    Persisted,
    Retry { reason: String },
}

/// Tally of one flush tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub persisted: usize,
    /// Failed and put back for the next tick
    pub retried: usize,
    /// Failed, but a newer update was already waiting
    pub superseded: usize,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.persisted == 0 && self.retried == 0 && self.superseded == 0
    }
}

pub struct SessionManager {
    cache: CacheStore,
    store: Arc<dyn WatchHistoryStore>,
    pending: Arc<PendingUpdates>,
    config: SessionConfig,
}

/// Memoized history pages of one user
fn history_pattern(user_id: &str) -> String {
    CacheKey::response_pattern(&format!("/api/v1/users/{}/history*", escape_glob(user_id)))
}

fn require_ids(user_id: &str, content_id: &str) -> Result<()> {
    if user_id.trim().is_empty() || content_id.trim().is_empty() {
        return Err(AppError::Validation(
            "userId and contentId are required".to_string(),
        ));
    }
    Ok(())
}

impl SessionManager {
    pub fn new(
        cache: CacheStore,
        store: Arc<dyn WatchHistoryStore>,
        pending: Arc<PendingUpdates>,
        config: SessionConfig,
    ) -> Self {
        Self {
            cache,
            store,
            pending,
            config,
        }
    }

    pub fn pending(&self) -> &PendingUpdates {
        &self.pending
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        content_id: &str,
        quality: Option<String>,
        provider: Option<String>,
    ) -> Result<Session> {
        require_ids(user_id, content_id)?;

        let mut session = Session::start(user_id, content_id, Utc::now());
        session.quality = quality;
        session.provider = provider;

        self.cache
            .set(&CacheKey::session(user_id, content_id), &session, self.config.session_ttl)
            .await;
        info!(session_id = %session.session_id, "Playback session started");
        Ok(session)
    }

    /// Record a position report. Starts a session if none is active.
    pub async fn update_progress(
        &self,
        user_id: &str,
        content_id: &str,
        update: ProgressUpdate,
    ) -> Result<ProgressRecord> {
        require_ids(user_id, content_id)?;
        update.validate().map_err(AppError::Validation)?;

        let now = Utc::now();
        let session_key = CacheKey::session(user_id, content_id);
        let mut session = match self.cache.get::<Session>(&session_key).await {
            Some(existing) if existing.is_active => existing,
            _ => {
                debug!(user_id, content_id, "Implicit session start");
                Session::start(user_id, content_id, now)
            }
        };

        session.current_position = update.current_time;
        session.duration = update.duration;
        session.progress = update.progress_percent();
        session.last_update_time = now;
        if update.quality.is_some() {
            session.quality = update.quality;
        }
        if update.provider.is_some() {
            session.provider = update.provider;
        }

        let record = session.to_progress();
        self.cache
            .set(&session_key, &session, self.config.session_ttl)
            .await;
        self.cache
            .set(
                &CacheKey::progress(user_id, content_id),
                &record,
                self.config.progress_ttl,
            )
            .await;
        self.pending.insert(record.clone());

        Ok(record)
    }

    /// Mark the session ended and write its latest progress durably now.
    /// A failed write stays queued for the flush job.
    pub async fn end_session(&self, user_id: &str, content_id: &str) -> Result<Option<Session>> {
        require_ids(user_id, content_id)?;

        let session_key = CacheKey::session(user_id, content_id);
        let session = match self.cache.get::<Session>(&session_key).await {
            Some(mut session) => {
                session.is_active = false;
                self.cache
                    .set(&session_key, &session, self.config.ended_session_ttl)
                    .await;
                Some(session)
            }
            None => None,
        };

        let latest = self
            .pending
            .take(user_id, content_id)
            .or_else(|| session.as_ref().filter(|s| s.duration > 0.0).map(Session::to_progress));

        if let Some(record) = latest {
            match self.persist(&record).await {
                FlushOutcome::Persisted => self.invalidate_history(user_id).await,
                FlushOutcome::Retry { reason } => {
                    warn!(user_id, content_id, reason = %reason, "End-of-session flush failed; queued for retry");
                    self.pending.requeue_if_absent(record);
                }
            }
        }

        info!(user_id, content_id, "Playback session ended");
        Ok(session)
    }

    /// Cache first; on a miss read the durable record and put it back in
    /// the cache.
    pub async fn get_progress(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<Option<ProgressRecord>> {
        require_ids(user_id, content_id)?;

        let key = CacheKey::progress(user_id, content_id);
        if let Some(record) = self.cache.get::<ProgressRecord>(&key).await {
            return Ok(Some(record));
        }

        let record = self.store.find_progress(user_id, content_id).await?;
        if let Some(record) = &record {
            self.cache.set(&key, record, self.config.progress_ttl).await;
        }
        Ok(record)
    }

    pub async fn get_session(&self, user_id: &str, content_id: &str) -> Result<Option<SessionView>> {
        require_ids(user_id, content_id)?;

        let key = CacheKey::session(user_id, content_id);
        let Some(session) = self.cache.get::<Session>(&key).await else {
            return Ok(None);
        };
        Ok(Some(SessionView {
            session,
            expires_in_seconds: self.cache.ttl(&key).await.seconds(),
        }))
    }

    pub async fn watch_history(&self, user_id: &str, limit: i64) -> Result<Vec<WatchHistoryEntry>> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        Ok(self.store.history(user_id, limit).await?)
    }

    /// Persist everything pending. Each entry stands alone: one failure
    /// neither stops the batch nor loses its siblings. History pages of
    /// every user with a landed write are dropped afterwards.
    pub async fn flush_pending(&self) -> FlushReport {
        let batch = self.pending.drain();
        let mut report = FlushReport::default();
        let mut written_users = BTreeSet::new();

        for (_, record) in batch {
            match self.persist(&record).await {
                FlushOutcome::Persisted => {
                    report.persisted += 1;
                    written_users.insert(record.user_id);
                }
                FlushOutcome::Retry { reason } => {
                    warn!(
                        user_id = %record.user_id,
                        content_id = %record.content_id,
                        reason = %reason,
                        "Progress flush failed"
                    );
                    if self.pending.requeue_if_absent(record) {
                        report.retried += 1;
                    } else {
                        report.superseded += 1;
                    }
                }
            }
        }

        for user_id in &written_users {
            self.invalidate_history(user_id).await;
        }

        report
    }

    async fn invalidate_history(&self, user_id: &str) {
        let deleted = self.cache.delete_pattern(&history_pattern(user_id)).await;
        debug!(user_id, deleted, "Dropped memoized history pages");
    }

    async fn persist(&self, record: &ProgressRecord) -> FlushOutcome {
        match self.store.upsert_progress(record).await {
            Ok(()) => FlushOutcome::Persisted,
            Err(e) => FlushOutcome::Retry {
                reason: e.to_string(),
            },
        }
    }
}
