/// Operational endpoints: cache admin, provider health, service health
use actix_web::{web, HttpResponse};
use marquee_cache::CacheStore;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::jobs::CacheWarmer;
use crate::services::{SessionManager, SourceAggregator};

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub patterns: Vec<String>,
}

/// GET /api/v1/cache/metrics
pub async fn cache_metrics(cache: web::Data<CacheStore>) -> HttpResponse {
    HttpResponse::Ok().json(cache.stats())
}

/// POST /api/v1/cache/warm
pub async fn warm_cache(warmer: web::Data<CacheWarmer>) -> HttpResponse {
    let tasks = warmer.warm_all().await;
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "tasks": tasks,
    }))
}

/// POST /api/v1/cache/invalidate
pub async fn invalidate_cache(
    cache: web::Data<CacheStore>,
    body: web::Json<InvalidateRequest>,
) -> Result<HttpResponse> {
    let patterns: Vec<String> = body
        .into_inner()
        .patterns
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return Err(AppError::BadRequest("patterns must not be empty".to_string()));
    }

    let mut total = 0;
    let mut results = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let deleted = cache.delete_pattern(&pattern).await;
        total += deleted;
        results.push(serde_json::json!({ "pattern": pattern, "deleted": deleted }));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "deleted": total,
        "patterns": results,
    })))
}

/// GET /api/v1/providers/health
pub async fn provider_health(aggregator: web::Data<Arc<SourceAggregator>>) -> HttpResponse {
    HttpResponse::Ok().json(aggregator.provider_health().await)
}

/// GET /api/v1/health
pub async fn health(
    cache: web::Data<CacheStore>,
    sessions: web::Data<Arc<SessionManager>>,
) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "cache": if cache.is_available() { "up" } else { "degraded" },
        "pendingProgress": sessions.pending().len(),
    }))
}
