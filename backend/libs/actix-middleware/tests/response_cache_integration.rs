use actix_middleware::{CacheInvalidation, ResponseCache};
use actix_web::{test, web, App, HttpResponse};
use marquee_cache::CacheStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Calls(AtomicUsize);

async fn popular(calls: web::Data<Calls>) -> HttpResponse {
    let n = calls.0.fetch_add(1, Ordering::SeqCst) + 1;
    HttpResponse::Ok().json(serde_json::json!({ "generation": n }))
}

async fn history(calls: web::Data<Calls>, path: web::Path<String>) -> HttpResponse {
    calls.0.fetch_add(1, Ordering::SeqCst);
    HttpResponse::Ok().json(serde_json::json!({ "user": path.into_inner() }))
}

async fn missing() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "success": false }))
}

async fn record_progress() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

fn x_cache(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_web::test]
async fn test_second_request_is_served_without_handler() {
    let (cache, _) = CacheStore::in_memory();
    let calls = web::Data::new(Calls(AtomicUsize::new(0)));

    let app = test::init_service(
        App::new().app_data(calls.clone()).service(
            web::resource("/catalog/popular")
                .wrap(ResponseCache::new(cache.clone(), 60))
                .route(web::get().to(popular)),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/catalog/popular?limit=5&page=1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "MISS");
    let first: serde_json::Value = test::read_body_json(resp).await;

    // Same query, different order
    let req = test::TestRequest::get().uri("/catalog/popular?page=1&limit=5").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "HIT");
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let second: serde_json::Value = test::read_body_json(resp).await;

    assert_eq!(first, second);
    assert_eq!(calls.0.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn test_error_responses_are_not_cached() {
    let (cache, backend) = CacheStore::in_memory();

    let app = test::init_service(
        App::new().service(
            web::resource("/missing")
                .wrap(ResponseCache::new(cache.clone(), 60))
                .route(web::get().to(missing)),
        ),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/missing").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(x_cache(&resp), "MISS");
    }
    assert!(backend.is_empty());
}

#[actix_web::test]
async fn test_unavailable_cache_bypasses() {
    let (cache, backend) = CacheStore::in_memory();
    backend.set_available(false);
    let calls = web::Data::new(Calls(AtomicUsize::new(0)));

    let app = test::init_service(
        App::new().app_data(calls.clone()).service(
            web::resource("/catalog/popular")
                .wrap(ResponseCache::new(cache.clone(), 60))
                .route(web::get().to(popular)),
        ),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/catalog/popular").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(x_cache(&resp), "BYPASS");
    }
    assert_eq!(calls.0.load(Ordering::SeqCst), 2);

    backend.set_available(true);
    assert!(backend.is_empty());
}

#[actix_web::test]
async fn test_vary_by_user_keeps_entries_apart() {
    let (cache, _) = CacheStore::in_memory();
    let calls = web::Data::new(Calls(AtomicUsize::new(0)));

    let app = test::init_service(
        App::new().app_data(calls.clone()).service(
            web::resource("/catalog/popular")
                .wrap(ResponseCache::new(cache.clone(), 60).vary_by_user())
                .route(web::get().to(popular)),
        ),
    )
    .await;

    for user in ["alice", "bob", "alice"] {
        let req = test::TestRequest::get()
            .uri("/catalog/popular")
            .insert_header(("X-User-Id", user))
            .to_request();
        test::call_service(&app, req).await;
    }
    assert_eq!(calls.0.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn test_write_invalidates_matching_entries() {
    let (cache, _) = CacheStore::in_memory();
    let calls = web::Data::new(Calls(AtomicUsize::new(0)));

    let app = test::init_service(
        App::new()
            .app_data(calls.clone())
            .service(
                web::resource("/users/{userId}/history")
                    .wrap(ResponseCache::new(cache.clone(), 60))
                    .route(web::get().to(history)),
            )
            .service(
                web::resource("/progress/{userId}/{contentId}")
                    .wrap(CacheInvalidation::new(
                        cache.clone(),
                        ["/users/{userId}/history*"],
                    ))
                    .route(web::post().to(record_progress)),
            ),
    )
    .await;

    for user in ["u1", "u2"] {
        let req = test::TestRequest::get()
            .uri(&format!("/users/{user}/history"))
            .to_request();
        test::call_service(&app, req).await;
    }
    assert_eq!(calls.0.load(Ordering::SeqCst), 2);

    let req = test::TestRequest::post().uri("/progress/u1/603").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    // Invalidation runs in the background
    tokio::time::sleep(Duration::from_millis(50)).await;

    let req = test::TestRequest::get().uri("/users/u1/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "MISS");

    let req = test::TestRequest::get().uri("/users/u2/history").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(x_cache(&resp), "HIT");

    assert_eq!(calls.0.load(Ordering::SeqCst), 3);
}

#[actix_web::test]
async fn test_encoded_ids_are_invalidated() {
    let (cache, _) = CacheStore::in_memory();
    let calls = web::Data::new(Calls(AtomicUsize::new(0)));

    let app = test::init_service(
        App::new()
            .app_data(calls.clone())
            .service(
                web::resource("/users/{userId}/history")
                    .wrap(ResponseCache::new(cache.clone(), 60))
                    .route(web::get().to(history)),
            )
            .service(
                web::resource("/progress/{userId}/{contentId}")
                    .wrap(CacheInvalidation::new(
                        cache.clone(),
                        ["/users/{userId}/history*"],
                    ))
                    .route(web::post().to(record_progress)),
            ),
    )
    .await;

    let req = test::TestRequest::get().uri("/users/j%C3%B6rg%20k/history").to_request();
    assert_eq!(x_cache(&test::call_service(&app, req).await), "MISS");
    let req = test::TestRequest::get().uri("/users/j%C3%B6rg%20k/history").to_request();
    assert_eq!(x_cache(&test::call_service(&app, req).await), "HIT");

    let req = test::TestRequest::post().uri("/progress/j%C3%B6rg%20k/603").to_request();
    assert!(test::call_service(&app, req).await.status().is_success());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let req = test::TestRequest::get().uri("/users/j%C3%B6rg%20k/history").to_request();
    assert_eq!(x_cache(&test::call_service(&app, req).await), "MISS");
    assert_eq!(calls.0.load(Ordering::SeqCst), 2);
}
