//! Cache-aside middleware for read endpoints
//!
//! GET responses are stored in the [`CacheStore`] under a key built from the
//! path and the sorted query string, optionally suffixed with the caller's
//! `X-User-Id`. Every response carries an `X-Cache` header:
//! `HIT` (served from cache, handler not called), `MISS` (handler called) or
//! `BYPASS` (cache unavailable, nothing read or written).

use actix_web::{
    body::{self, BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{HeaderName, HeaderValue, CONTENT_TYPE},
        Method, StatusCode,
    },
    Error, HttpResponse,
};
use futures::future::{ready, Ready};
use marquee_cache::{CacheKey, CacheStore};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use tracing::{debug, warn};

pub const X_CACHE: &str = "x-cache";
pub const X_USER_ID: &str = "x-user-id";

/// What gets stored for one memoized response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl CachedResponse {
    /// A 200 JSON response, as a handler built with `HttpResponse::Ok().json(..)`
    /// would produce it.
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self {
            status: StatusCode::OK.as_u16(),
            content_type: Some("application/json".to_string()),
            body: serde_json::to_string(value)?,
        })
    }

    fn into_http_response(self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut builder = HttpResponse::build(status);
        if let Some(content_type) = self.content_type {
            builder.insert_header((CONTENT_TYPE, content_type));
        }
        builder.body(self.body)
    }
}

/// Percent-decoded form of a path or route segment. Response keys and
/// invalidation patterns are both built from it.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Cache key for a request. Query parameter order never changes the key.
pub fn response_key(path: &str, query: &str, user_id: Option<&str>) -> String {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    pairs.sort();

    let sorted = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();

    let mut key = CacheKey::response(&format!("{}?{}", decode_path(path), sorted));
    if let Some(user) = user_id {
        key.push_str(":u:");
        key.push_str(user);
    }
    key
}

/// Response cache middleware
///
/// ```ignore
/// web::resource("/catalog/popular")
///     .wrap(ResponseCache::new(cache.clone(), 300))
///     .route(web::get().to(popular));
/// ```
#[derive(Clone)]
pub struct ResponseCache {
    cache: CacheStore,
    ttl_secs: u64,
    vary_by_user: bool,
}

impl ResponseCache {
    pub fn new(cache: CacheStore, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl_secs,
            vary_by_user: false,
        }
    }

    /// Keep a separate entry per `X-User-Id`
    pub fn vary_by_user(mut self) -> Self {
        self.vary_by_user = true;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for ResponseCache
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = ResponseCacheService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ResponseCacheService {
            service: Rc::new(service),
            config: self.clone(),
        }))
    }
}

pub struct ResponseCacheService<S> {
    service: Rc<S>,
    config: ResponseCache,
}

impl<S, B> Service<ServiceRequest> for ResponseCacheService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();

        Box::pin(async move {
            if req.method() != Method::GET {
                return Ok(service.call(req).await?.map_into_boxed_body());
            }

            if !config.cache.is_available() {
                let mut res = service.call(req).await?.map_into_boxed_body();
                res.headers_mut()
                    .insert(HeaderName::from_static(X_CACHE), HeaderValue::from_static("BYPASS"));
                return Ok(res);
            }

            let user_id = if config.vary_by_user {
                req.headers()
                    .get(X_USER_ID)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_owned)
            } else {
                None
            };
            let key = response_key(req.path(), req.query_string(), user_id.as_deref());

            if let Some(cached) = config.cache.get::<CachedResponse>(&key).await {
                debug!(key = %key, "Serving response from cache");
                let mut response = cached.into_http_response();
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(X_CACHE), HeaderValue::from_static("HIT"));
                return Ok(req.into_response(response));
            }

            let res = service.call(req).await?;
            let (req, res) = res.into_parts();
            let (head, body) = res.into_parts();

            let bytes = body::to_bytes(body).await.map_err(|e| {
                let err: Box<dyn std::error::Error> = e.into();
                actix_web::error::ErrorInternalServerError(err.to_string())
            })?;

            let status = head.status();
            if status.is_success() {
                match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        let entry = CachedResponse {
                            status: status.as_u16(),
                            content_type: head
                                .headers()
                                .get(CONTENT_TYPE)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_owned),
                            body: text.to_owned(),
                        };
                        config.cache.set(&key, &entry, config.ttl_secs).await;
                    }
                    Err(_) => warn!(key = %key, "Skipping cache for non UTF-8 body"),
                }
            }

            let mut response = head.set_body(BoxBody::new(bytes));
            response
                .headers_mut()
                .insert(HeaderName::from_static(X_CACHE), HeaderValue::from_static("MISS"));
            Ok(ServiceResponse::new(req, response))
        })
    }
}
