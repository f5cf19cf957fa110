mod common;

use actix_web::{test, App};
use common::{app_state, embed, hls, AppFixture, StubProvider};
use playback_service::configure;
use serde_json::{json, Value};
use std::time::Duration;

fn working_providers() -> AppFixture {
    app_state(
        StubProvider::ok(
            "primary",
            vec![
                embed("https://primary.example/embed/603", "720p"),
                hls("https://primary.example/603.m3u8", "1080p"),
            ],
        ),
        StubProvider::ok("fallback", vec![]),
    )
}

macro_rules! app {
    ($fx:expr) => {{
        let state = $fx.state.clone();
        test::init_service(App::new().configure(move |cfg| configure(cfg, &state))).await
    }};
}

fn x_cache(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn test_sources_endpoint_ranks_and_caches() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/v1/sources/603").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["cached"], false);
    assert_eq!(body["sources"][0]["url"], "https://primary.example/603.m3u8");
    assert_eq!(body["sources"][0]["type"], "hls");
    assert_eq!(body["sources"][0]["priority"], 90);
    assert_eq!(body["metadata"]["primaryProviderSucceeded"], true);

    let req = test::TestRequest::get().uri("/api/v1/sources/603").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["cached"], true);
    assert!(body["cacheAgeSeconds"].is_number());
    assert_eq!(fx.primary.calls(), 1);
}

#[actix_web::test]
async fn test_no_sources_is_a_structured_404() {
    let fx = app_state(StubProvider::failing("primary"), StubProvider::failing("fallback"));
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri("/api/v1/sources/1399?type=tv&season=1&episode=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No sources available");
    assert_eq!(body["metadata"]["fallbackUsed"], true);
    assert_eq!(body["metadata"]["providers"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get().uri("/api/v1/sources/1399/embed").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[actix_web::test]
async fn test_embed_returns_best_source() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/v1/sources/603/embed").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({
            "url": "https://primary.example/603.m3u8",
            "provider": "primary",
            "quality": "1080p",
            "type": "hls",
        })
    );
}

#[actix_web::test]
async fn test_source_cache_can_be_dropped() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/v1/sources/603").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::delete().uri("/api/v1/sources/603/cache").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["deleted"], 1);

    let req = test::TestRequest::get().uri("/api/v1/sources/603").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["cached"], false);
    assert_eq!(fx.primary.calls(), 2);
}

#[actix_web::test]
async fn test_progress_round_trip_and_validation() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/progress/u1/603")
        .set_json(json!({ "currentTime": 300.0, "duration": 7200.0, "quality": "1080p" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["progress"]["currentPosition"], 300.0);

    let req = test::TestRequest::get().uri("/api/v1/progress/u1/603").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["currentPosition"], 300.0);
    assert_eq!(body["duration"], 7200.0);

    let req = test::TestRequest::get().uri("/api/v1/progress/u1/unknown").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body.is_null());

    let req = test::TestRequest::post()
        .uri("/api/v1/progress/u1/603")
        .set_json(json!({ "currentTime": 10.0, "duration": 0.0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["status"], 400);
}

#[actix_web::test]
async fn test_history_is_cached_until_progress_changes() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/progress/u1/603")
        .set_json(json!({ "currentTime": 100.0, "duration": 1000.0 }))
        .to_request();
    test::call_service(&app, req).await;
    fx.state.sessions.flush_pending().await;
    // Let the write's invalidation finish before the first read
    tokio::time::sleep(Duration::from_millis(50)).await;

    let req = test::TestRequest::get().uri("/api/v1/users/u1/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "MISS");

    let req = test::TestRequest::get().uri("/api/v1/users/u1/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "HIT");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["items"][0]["lastPosition"], 100.0);

    let req = test::TestRequest::post()
        .uri("/api/v1/progress/u1/603")
        .set_json(json!({ "currentTime": 200.0, "duration": 1000.0 }))
        .to_request();
    test::call_service(&app, req).await;
    fx.state.sessions.flush_pending().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let req = test::TestRequest::get().uri("/api/v1/users/u1/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "MISS");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["items"][0]["lastPosition"], 200.0);
}

#[actix_web::test]
async fn test_history_read_before_flush_is_refreshed_by_it() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/progress/u1/603")
        .set_json(json!({ "currentTime": 100.0, "duration": 1000.0 }))
        .to_request();
    test::call_service(&app, req).await;

    // Nothing durable yet
    let req = test::TestRequest::get().uri("/api/v1/users/u1/history").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    fx.state.sessions.flush_pending().await;

    let req = test::TestRequest::get().uri("/api/v1/users/u1/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "MISS");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["items"][0]["lastPosition"], 100.0);
}

#[actix_web::test]
async fn test_session_lifecycle() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/sessions/start")
        .set_json(json!({ "userId": "u1", "contentId": "603", "quality": "1080p" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["session"]["isActive"], true);

    let req = test::TestRequest::post()
        .uri("/api/v1/progress/u1/603")
        .set_json(json!({ "currentTime": 300.0, "duration": 7200.0 }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/v1/sessions/u1/603").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["isActive"], true);
    assert_eq!(body["currentPosition"], 300.0);
    assert!(body["expiresInSeconds"].as_u64().unwrap() > 300);

    let req = test::TestRequest::post()
        .uri("/api/v1/sessions/end")
        .set_json(json!({ "userId": "u1", "contentId": "603" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["session"]["isActive"], false);
    assert_eq!(fx.store.write_count(), 1);

    let req = test::TestRequest::get().uri("/api/v1/sessions/u1/603").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["isActive"], false);
    assert!(body["expiresInSeconds"].as_u64().unwrap() <= 300);

    let req = test::TestRequest::get().uri("/api/v1/sessions/u2/603").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_warm_pass_primes_popular_view() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::post().uri("/api/v1/cache/warm").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["tasks"][0]["task"], "popular_view");
    assert_eq!(body["tasks"][0]["warmed"], 1);

    let req = test::TestRequest::get().uri("/api/v1/catalog/popular").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "HIT");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["windowDays"], 7);
}

#[actix_web::test]
async fn test_cache_admin_endpoints() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/v1/sources/603").to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/v1/cache/metrics").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["available"], true);
    assert!(body["misses"].as_u64().unwrap() >= 1);
    assert!(body["writes"].as_u64().unwrap() >= 1);
    assert!(body["hitRate"].is_number());

    let req = test::TestRequest::post()
        .uri("/api/v1/cache/invalidate")
        .set_json(json!({ "patterns": [] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri("/api/v1/cache/invalidate")
        .set_json(json!({ "patterns": ["v1:sources:*"] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["deleted"], 1);
    assert_eq!(body["patterns"][0]["pattern"], "v1:sources:*");
}

#[actix_web::test]
async fn test_health_reports_degraded_cache() {
    let fx = working_providers();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache"], "up");

    fx.backend.set_available(false);
    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["cache"], "degraded");

    let req = test::TestRequest::get().uri("/api/v1/providers/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let providers = body.as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["name"], "primary");
    assert_eq!(providers[0]["recentFailures"], 0);
}
