#![allow(dead_code)]

use marquee_cache::{CacheStore, MemoryBackend};
use parking_lot::Mutex;
use playback_service::db::{InMemoryWatchHistory, WatchHistoryStore};
use playback_service::jobs::{CacheWarmer, PopularViewWarmer, WarmTask};
use playback_service::models::SourceQuery;
use playback_service::providers::{ProviderError, RawSource, SourceProvider};
use playback_service::services::{
    AggregatorConfig, PendingUpdates, SessionConfig, SessionManager, SourceAggregator,
};
use playback_service::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider double with a fixed reply, an optional delay and a call counter
pub struct StubProvider {
    name: String,
    reply: Mutex<Option<Vec<RawSource>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn ok(name: &str, sources: Vec<RawSource>) -> Self {
        Self {
            name: name.to_string(),
            reply: Mutex::new(Some(sources)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: Mutex::new(None),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SourceProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_sources(&self, _query: &SourceQuery) -> Result<Vec<RawSource>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.lock().clone().ok_or(ProviderError::Status(503))
    }
}

pub fn aggregator(
    cache: &CacheStore,
    primary: &Arc<StubProvider>,
    fallbacks: &[Arc<StubProvider>],
) -> SourceAggregator {
    aggregator_with(cache, primary, fallbacks, AggregatorConfig::default())
}

pub fn aggregator_with(
    cache: &CacheStore,
    primary: &Arc<StubProvider>,
    fallbacks: &[Arc<StubProvider>],
    config: AggregatorConfig,
) -> SourceAggregator {
    SourceAggregator::new(
        cache.clone(),
        primary.clone() as Arc<dyn SourceProvider>,
        fallbacks
            .iter()
            .map(|p| p.clone() as Arc<dyn SourceProvider>)
            .collect(),
        config,
    )
}

/// A session manager over an in-memory cache and store
pub struct SessionFixture {
    pub cache: CacheStore,
    pub backend: MemoryBackend,
    pub store: Arc<InMemoryWatchHistory>,
    pub sessions: Arc<SessionManager>,
}

pub fn sessions() -> SessionFixture {
    let (cache, backend) = CacheStore::in_memory();
    let store = Arc::new(InMemoryWatchHistory::new());
    let sessions = Arc::new(SessionManager::new(
        cache.clone(),
        store.clone() as Arc<dyn WatchHistoryStore>,
        Arc::new(PendingUpdates::new()),
        SessionConfig::default(),
    ));
    SessionFixture {
        cache,
        backend,
        store,
        sessions,
    }
}

/// Full application state with one primary and one fallback provider
pub struct AppFixture {
    pub state: AppState,
    pub backend: MemoryBackend,
    pub store: Arc<InMemoryWatchHistory>,
    pub primary: Arc<StubProvider>,
    pub fallback: Arc<StubProvider>,
}

pub fn app_state(primary: StubProvider, fallback: StubProvider) -> AppFixture {
    let SessionFixture {
        cache,
        backend,
        store,
        sessions,
    } = sessions();
    let primary = Arc::new(primary);
    let fallback = Arc::new(fallback);
    let aggregator = Arc::new(aggregator(&cache, &primary, &[fallback.clone()]));
    let store_dyn = store.clone() as Arc<dyn WatchHistoryStore>;

    let tasks: Vec<Arc<dyn WarmTask>> = vec![Arc::new(PopularViewWarmer::new(
        store_dyn.clone(),
        cache.clone(),
        60,
    ))];
    let warmer = CacheWarmer::new(cache.clone(), tasks);

    AppFixture {
        state: AppState {
            cache,
            aggregator,
            sessions,
            store: store_dyn,
            warmer,
            response_ttl: 60,
        },
        backend,
        store,
        primary,
        fallback,
    }
}

pub fn hls(url: &str, quality: &str) -> RawSource {
    RawSource::new(url).with_quality(quality).with_type("hls")
}

pub fn embed(url: &str, quality: &str) -> RawSource {
    RawSource::new(url).with_quality(quality).with_type("embed")
}
