//! Periodic cache warming
//!
//! Recomputes a few hot views on a timer, independent of traffic, and writes
//! them under the exact keys the read path uses. The admin endpoint can run
//! the same pass on demand.

use actix_middleware::{response_key, CachedResponse};
use marquee_cache::CacheStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::db::WatchHistoryStore;
use crate::error::{AppError, Result};
use crate::models::SourceQuery;
use crate::services::catalog::{self, POPULAR_DEFAULT_LIMIT};
use crate::services::SourceAggregator;

const DEFAULT_WARM_INTERVAL: Duration = Duration::from_secs(600);

/// Path whose memoized response the popular-view warmer maintains
pub const POPULAR_PATH: &str = "/api/v1/catalog/popular";

/// One view to keep warm
#[async_trait::async_trait]
pub trait WarmTask: Send + Sync {
    fn name(&self) -> &str;

    /// Returns how many cache entries were written
    async fn warm(&self) -> Result<usize>;
}

/// The popular-content page, stored as the response cache would store it
pub struct PopularViewWarmer {
    store: Arc<dyn WatchHistoryStore>,
    cache: CacheStore,
    ttl_secs: u64,
}

impl PopularViewWarmer {
    pub fn new(store: Arc<dyn WatchHistoryStore>, cache: CacheStore, ttl_secs: u64) -> Self {
        Self {
            store,
            cache,
            ttl_secs,
        }
    }
}

#[async_trait::async_trait]
impl WarmTask for PopularViewWarmer {
    fn name(&self) -> &str {
        "popular_view"
    }

    async fn warm(&self) -> Result<usize> {
        let view = catalog::popular(self.store.as_ref(), POPULAR_DEFAULT_LIMIT).await?;
        let entry = CachedResponse::json(&view)?;
        let key = response_key(POPULAR_PATH, "", None);

        if self.cache.set(&key, &entry, self.ttl_secs).await {
            Ok(1)
        } else {
            Err(AppError::Internal("cache rejected popular view".to_string()))
        }
    }
}

/// Source lists of featured content, re-fetched from providers
pub struct FeaturedSourcesWarmer {
    aggregator: Arc<SourceAggregator>,
    content_ids: Vec<String>,
}

impl FeaturedSourcesWarmer {
    pub fn new(aggregator: Arc<SourceAggregator>, content_ids: Vec<String>) -> Self {
        Self {
            aggregator,
            content_ids,
        }
    }
}

#[async_trait::async_trait]
impl WarmTask for FeaturedSourcesWarmer {
    fn name(&self) -> &str {
        "featured_sources"
    }

    async fn warm(&self) -> Result<usize> {
        let mut warmed = 0;
        for content_id in &self.content_ids {
            let aggregated = self.aggregator.refresh(SourceQuery::movie(content_id.as_str())).await;
            if !aggregated.result.is_empty() {
                warmed += 1;
            }
        }
        Ok(warmed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmTaskReport {
    pub task: String,
    pub warmed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs every [`WarmTask`] on a fixed interval
#[derive(Clone)]
pub struct CacheWarmer {
    cache: CacheStore,
    tasks: Vec<Arc<dyn WarmTask>>,
    interval: Duration,
}

impl CacheWarmer {
    pub fn new(cache: CacheStore, tasks: Vec<Arc<dyn WarmTask>>) -> Self {
        Self {
            cache,
            tasks,
            interval: DEFAULT_WARM_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One pass over all tasks. Skipped entirely while the cache is down.
    pub async fn warm_all(&self) -> Vec<WarmTaskReport> {
        if !self.cache.is_available() {
            debug!("Cache unavailable; skipping warm pass");
            return Vec::new();
        }

        let mut reports = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let report = match task.warm().await {
                Ok(warmed) => WarmTaskReport {
                    task: task.name().to_string(),
                    warmed,
                    error: None,
                },
                Err(e) => {
                    warn!(task = task.name(), error = %e, "Cache warm task failed");
                    WarmTaskReport {
                        task: task.name().to_string(),
                        warmed: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }
        reports
    }

    /// Run the warm loop until `shutdown` fires. The first pass runs
    /// immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now(), self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Cache warmer started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reports = self.warm_all().await;
                    let warmed: usize = reports.iter().map(|r| r.warmed).sum();
                    debug!(warmed, "Cache warm pass finished");
                }
                _ = shutdown.changed() => {
                    info!("Cache warmer stopped");
                    return;
                }
            }
        }
    }

    /// Spawn the warm loop as a Tokio task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
