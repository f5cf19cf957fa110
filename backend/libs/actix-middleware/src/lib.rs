//! # Actix Middleware Library
//!
//! Shared middleware for Marquee actix services
//!
//! ## Modules
//! - `response_cache`: cache-aside memoization of GET responses
//! - `invalidation`: pattern invalidation of memoized responses after writes
//! - `metrics`: Prometheus request metrics

pub mod invalidation;
pub mod metrics;
pub mod response_cache;

pub use invalidation::{fill_pattern, CacheInvalidation};
pub use metrics::MetricsMiddleware;
pub use response_cache::{response_key, CachedResponse, ResponseCache, X_CACHE, X_USER_ID};
