/// Source handlers - ranked playable sources per content item
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{MediaType, NoSourcesResponse, SourceQuery, SourcesResponse};
use crate::services::SourceAggregator;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesParams {
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub external_id: Option<String>,
}

impl SourcesParams {
    fn into_query(self, content_id: String) -> Result<SourceQuery> {
        if content_id.trim().is_empty() {
            return Err(AppError::BadRequest("contentId is required".to_string()));
        }
        Ok(SourceQuery {
            content_id,
            media_type: self.media_type.unwrap_or_default(),
            season: self.season,
            episode: self.episode,
            title: self.title.filter(|t| !t.trim().is_empty()),
            year: self.year,
            external_id: self.external_id.filter(|t| !t.trim().is_empty()),
        })
    }
}

/// GET /api/v1/sources/{contentId}
pub async fn get_sources(
    aggregator: web::Data<Arc<SourceAggregator>>,
    content_id: web::Path<String>,
    params: web::Query<SourcesParams>,
) -> Result<HttpResponse> {
    let query = params.into_inner().into_query(content_id.into_inner())?;
    let aggregated = aggregator.get_sources(query).await;

    if aggregated.result.is_empty() {
        return Ok(HttpResponse::NotFound().json(NoSourcesResponse {
            success: false,
            message: "No sources available".to_string(),
            metadata: aggregated.result.metadata,
        }));
    }

    Ok(HttpResponse::Ok().json(SourcesResponse {
        success: true,
        sources: aggregated.result.sources,
        metadata: aggregated.result.metadata,
        cached: aggregated.cached,
        cache_age_seconds: aggregated.cache_age_seconds,
    }))
}

/// GET /api/v1/sources/{contentId}/embed
pub async fn get_embed(
    aggregator: web::Data<Arc<SourceAggregator>>,
    content_id: web::Path<String>,
    params: web::Query<SourcesParams>,
) -> Result<HttpResponse> {
    let query = params.into_inner().into_query(content_id.into_inner())?;
    let embed = aggregator
        .best_source(query)
        .await
        .ok_or_else(|| AppError::NotFound("No sources available".to_string()))?;

    Ok(HttpResponse::Ok().json(embed))
}

/// DELETE /api/v1/sources/{contentId}/cache
pub async fn invalidate_sources(
    aggregator: web::Data<Arc<SourceAggregator>>,
    content_id: web::Path<String>,
) -> Result<HttpResponse> {
    let content_id = content_id.into_inner();
    let deleted = aggregator.invalidate(&content_id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "contentId": content_id,
        "deleted": deleted,
    })))
}
