/// Read views over the watch history: per-user history and popular content
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{WatchHistoryStore, HISTORY_LIMIT};
use crate::error::Result;
use crate::services::catalog::{self, POPULAR_DEFAULT_LIMIT};
use crate::services::SessionManager;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

/// GET /api/v1/users/{userId}/history
pub async fn get_history(
    sessions: web::Data<Arc<SessionManager>>,
    user_id: web::Path<String>,
    params: web::Query<LimitParams>,
) -> Result<HttpResponse> {
    let limit = params.limit.unwrap_or(HISTORY_LIMIT);
    let entries = sessions.watch_history(&user_id, limit).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "userId": user_id.into_inner(),
        "items": entries,
    })))
}

/// GET /api/v1/catalog/popular
pub async fn get_popular(
    store: web::Data<Arc<dyn WatchHistoryStore>>,
    params: web::Query<LimitParams>,
) -> Result<HttpResponse> {
    let limit = params.limit.unwrap_or(POPULAR_DEFAULT_LIMIT);
    let view = catalog::popular(store.get_ref().as_ref(), limit).await?;
    Ok(HttpResponse::Ok().json(view))
}
