/// Session handlers
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{EndSessionRequest, StartSessionRequest};
use crate::services::SessionManager;

/// POST /api/v1/sessions/start
pub async fn start_session(
    sessions: web::Data<Arc<SessionManager>>,
    body: web::Json<StartSessionRequest>,
) -> Result<HttpResponse> {
    let req = body.into_inner();
    let session = sessions
        .start_session(&req.user_id, &req.content_id, req.quality, req.provider)
        .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "ok": true,
        "session": session,
    })))
}

/// POST /api/v1/sessions/end
pub async fn end_session(
    sessions: web::Data<Arc<SessionManager>>,
    body: web::Json<EndSessionRequest>,
) -> Result<HttpResponse> {
    let req = body.into_inner();
    let session = sessions.end_session(&req.user_id, &req.content_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "session": session,
    })))
}

/// GET /api/v1/sessions/{userId}/{contentId}
pub async fn get_session(
    sessions: web::Data<Arc<SessionManager>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, content_id) = path.into_inner();
    let view = sessions
        .get_session(&user_id, &content_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    Ok(HttpResponse::Ok().json(view))
}
