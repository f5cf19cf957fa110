//! Write-side companion of [`crate::ResponseCache`]
//!
//! After a successful write, every memoized response whose key matches one of
//! the configured path globs is deleted in the background. `{name}`
//! placeholders are filled from the matched route, so
//! `/api/v1/users/{userId}/history*` drops only that user's history pages.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error,
};
use futures::future::{ready, Ready};
use marquee_cache::{escape_glob, CacheKey, CacheStore};

use crate::response_cache::decode_path;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CacheInvalidation {
    cache: CacheStore,
    patterns: Arc<Vec<String>>,
}

impl CacheInvalidation {
    pub fn new<I, P>(cache: CacheStore, path_patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            cache,
            patterns: Arc::new(path_patterns.into_iter().map(Into::into).collect()),
        }
    }
}

/// Replace `{name}` with the glob-escaped value of route parameter `name`.
/// Unknown parameters become `*` so the pattern errs on deleting more.
pub fn fill_pattern<F>(pattern: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..open + close];
        match lookup(name) {
            Some(value) => out.push_str(&escape_glob(&value)),
            None => out.push('*'),
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

impl<S, B> Transform<S, ServiceRequest> for CacheInvalidation
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CacheInvalidationService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CacheInvalidationService {
            service: Rc::new(service),
            config: self.clone(),
        }))
    }
}

pub struct CacheInvalidationService<S> {
    service: Rc<S>,
    config: CacheInvalidation,
}

impl<S, B> Service<ServiceRequest> for CacheInvalidationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let is_write = !matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
            let res = service.call(req).await?;

            if !is_write || !res.status().is_success() {
                return Ok(res);
            }

            let match_info = res.request().match_info();
            let patterns: Vec<String> = config
                .patterns
                .iter()
                .map(|p| {
                    CacheKey::response_pattern(&fill_pattern(p, |name| {
                        match_info.get(name).map(|v| decode_path(v).into_owned())
                    }))
                })
                .collect();

            let cache = config.cache.clone();
            tokio::spawn(async move {
                for pattern in patterns {
                    let deleted = cache.delete_pattern(&pattern).await;
                    if deleted > 0 {
                        debug!(pattern = %pattern, deleted, "Invalidated cached responses");
                    } else if !cache.is_available() {
                        warn!(pattern = %pattern, "Cache unavailable, invalidation skipped");
                    }
                }
            });

            Ok(res)
        })
    }
}
