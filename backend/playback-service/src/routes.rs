/// Route table and shared application state
use actix_middleware::{CacheInvalidation, ResponseCache};
use actix_web::web;
use marquee_cache::CacheStore;
use std::sync::Arc;

use crate::db::WatchHistoryStore;
use crate::handlers;
use crate::jobs::CacheWarmer;
use crate::services::{SessionManager, SourceAggregator};

/// History pages touched by a progress write
const HISTORY_PATTERNS: [&str; 1] = ["/api/v1/users/{userId}/history*"];

/// Everything the handlers need, cloned into each worker
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheStore,
    pub aggregator: Arc<SourceAggregator>,
    pub sessions: Arc<SessionManager>,
    pub store: Arc<dyn WatchHistoryStore>,
    pub warmer: CacheWarmer,
    pub response_ttl: u64,
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.cache.clone()))
        .app_data(web::Data::new(state.aggregator.clone()))
        .app_data(web::Data::new(state.sessions.clone()))
        .app_data(web::Data::new(state.store.clone()))
        .app_data(web::Data::new(state.warmer.clone()))
        .service(
            web::scope("/api/v1")
                .route("/health", web::get().to(handlers::health))
                .service(
                    web::scope("/sources")
                        .route("/{contentId}", web::get().to(handlers::get_sources))
                        .route("/{contentId}/embed", web::get().to(handlers::get_embed))
                        .route("/{contentId}/cache", web::delete().to(handlers::invalidate_sources)),
                )
                .service(
                    web::resource("/progress/{userId}/{contentId}")
                        .wrap(CacheInvalidation::new(state.cache.clone(), HISTORY_PATTERNS))
                        .route(web::get().to(handlers::get_progress))
                        .route(web::post().to(handlers::record_progress)),
                )
                .service(
                    web::scope("/sessions")
                        .route("/start", web::post().to(handlers::start_session))
                        .route("/end", web::post().to(handlers::end_session))
                        .route("/{userId}/{contentId}", web::get().to(handlers::get_session)),
                )
                .service(
                    web::resource("/users/{userId}/history")
                        .wrap(ResponseCache::new(state.cache.clone(), state.response_ttl))
                        .route(web::get().to(handlers::get_history)),
                )
                .service(
                    web::resource("/catalog/popular")
                        .wrap(ResponseCache::new(state.cache.clone(), state.response_ttl))
                        .route(web::get().to(handlers::get_popular)),
                )
                .service(
                    web::scope("/cache")
                        .route("/metrics", web::get().to(handlers::cache_metrics))
                        .route("/warm", web::post().to(handlers::warm_cache))
                        .route("/invalidate", web::post().to(handlers::invalidate_cache)),
                )
                .route("/providers/health", web::get().to(handlers::provider_health)),
        );
}
