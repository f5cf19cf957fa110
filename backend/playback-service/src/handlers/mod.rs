/// HTTP handlers for playback endpoints
///
/// This module contains handlers for:
/// - Sources: ranked sources, best embed, per-content invalidation
/// - Progress and sessions: live playback state
/// - Catalog: watch history and popular content
/// - Admin: cache metrics/warm/invalidate, provider and service health
pub mod admin;
pub mod catalog;
pub mod progress;
pub mod sessions;
pub mod sources;

pub use admin::{cache_metrics, health, invalidate_cache, provider_health, warm_cache};
pub use catalog::{get_history, get_popular};
pub use progress::{get_progress, record_progress};
pub use sessions::{end_session, get_session, start_session};
pub use sources::{get_embed, get_sources, invalidate_sources};
