/// Progress handlers
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::error::Result;
use crate::models::ProgressUpdate;
use crate::services::SessionManager;

/// POST /api/v1/progress/{userId}/{contentId}
pub async fn record_progress(
    sessions: web::Data<Arc<SessionManager>>,
    path: web::Path<(String, String)>,
    body: web::Json<ProgressUpdate>,
) -> Result<HttpResponse> {
    let (user_id, content_id) = path.into_inner();
    let progress = sessions
        .update_progress(&user_id, &content_id, body.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "progress": progress,
    })))
}

/// GET /api/v1/progress/{userId}/{contentId}
pub async fn get_progress(
    sessions: web::Data<Arc<SessionManager>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, content_id) = path.into_inner();
    let progress = sessions.get_progress(&user_id, &content_id).await?;
    Ok(HttpResponse::Ok().json(progress))
}
