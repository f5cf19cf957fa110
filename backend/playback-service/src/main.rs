/// Playback Service - HTTP Server
///
/// Source aggregation, playback sessions and progress tracking.
use actix_middleware::MetricsMiddleware;
use actix_web::{middleware::Logger, App, HttpServer};
use anyhow::Context;
use marquee_cache::CacheStore;
use playback_service::config::CacheBackendKind;
use playback_service::db::{PgWatchHistory, WatchHistoryStore};
use playback_service::jobs::{
    CacheWarmer, FeaturedSourcesWarmer, PopularViewWarmer, ProgressFlushJob, WarmTask,
};
use playback_service::providers::{HttpContentMetadata, HttpSourceProvider, SourceProvider};
use playback_service::services::{
    AggregatorConfig, PendingUpdates, SessionConfig, SessionManager, SourceAggregator,
};
use playback_service::{configure, logging, AppState, Config};
use redis_utils::RedisPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    // Durable store
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    let watch_history = PgWatchHistory::new(db_pool);
    watch_history
        .migrate()
        .await
        .context("Failed to run database migrations")?;
    let store: Arc<dyn WatchHistoryStore> = Arc::new(watch_history);

    // Cache. Redis being down at startup is not fatal.
    let cache = match config.cache.backend {
        CacheBackendKind::Redis => {
            let pool = RedisPool::connect(&config.cache.redis_url, config.cache.reconnect.clone())
                .await
                .context("Invalid REDIS_URL")?;
            CacheStore::redis(Arc::new(pool))
        }
        CacheBackendKind::Memory => {
            tracing::warn!("CACHE_BACKEND=memory; cache is local to this process");
            CacheStore::in_memory().0
        }
    }
    .with_op_timeout(config.cache.op_timeout);

    // Providers
    let providers = &config.providers;
    let primary: Arc<dyn SourceProvider> = Arc::new(HttpSourceProvider::new(
        providers.primary.name.clone(),
        &providers.primary.url,
        providers.timeout,
    )?);
    let fallbacks = providers
        .fallbacks
        .iter()
        .map(|endpoint| {
            HttpSourceProvider::new(endpoint.name.clone(), &endpoint.url, providers.timeout)
                .map(|p| Arc::new(p) as Arc<dyn SourceProvider>)
        })
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(
        primary = %providers.primary.name,
        fallbacks = fallbacks.len(),
        "Source providers configured"
    );

    let mut aggregator = SourceAggregator::new(
        cache.clone(),
        primary,
        fallbacks,
        AggregatorConfig {
            provider_timeout: providers.timeout,
            ..AggregatorConfig::default()
        },
    );
    if let Some(catalog_url) = &providers.catalog_url {
        aggregator = aggregator.with_metadata(Arc::new(HttpContentMetadata::new(
            catalog_url,
            providers.timeout,
        )?));
    }
    let aggregator = Arc::new(aggregator);

    let sessions = Arc::new(SessionManager::new(
        cache.clone(),
        store.clone(),
        Arc::new(PendingUpdates::new()),
        SessionConfig {
            session_ttl: config.sessions.session_ttl,
            progress_ttl: config.sessions.progress_ttl,
            ended_session_ttl: config.sessions.ended_session_ttl,
        },
    ));

    let warm_tasks: Vec<Arc<dyn WarmTask>> = vec![
        Arc::new(PopularViewWarmer::new(
            store.clone(),
            cache.clone(),
            config.cache.response_ttl,
        )),
        Arc::new(FeaturedSourcesWarmer::new(
            aggregator.clone(),
            config.warmer.featured_content_ids.clone(),
        )),
    ];
    let warmer = CacheWarmer::new(cache.clone(), warm_tasks).with_interval(config.warmer.interval);

    // Background jobs
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flush_handle = ProgressFlushJob::new(sessions.clone())
        .with_interval(config.sessions.flush_interval)
        .spawn(shutdown_rx.clone());
    let warm_handle = warmer.clone().spawn(shutdown_rx);

    let state = AppState {
        cache,
        aggregator,
        sessions,
        store,
        warmer,
        response_ttl: config.cache.response_ttl,
    };

    tracing::info!(address = %bind_address, "Playback service starting HTTP server");
    let server_result = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(MetricsMiddleware)
            .wrap(Logger::default())
            .configure(move |cfg| configure(cfg, &state))
    })
    .bind(&bind_address)?
    .run()
    .await;

    // Server stopped: final progress flush before exit
    tracing::info!("HTTP server stopped, shutting down background jobs");
    let _ = shutdown_tx.send(true);
    if let Err(e) = flush_handle.await {
        tracing::error!(error = %e, "Progress flush job panicked");
    }
    if let Err(e) = warm_handle.await {
        tracing::error!(error = %e, "Cache warmer panicked");
    }

    server_result?;
    Ok(())
}
