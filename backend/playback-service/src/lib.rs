//! Playback service
//!
//! Resolves playable sources for a content item across several upstream
//! providers, tracks live playback sessions and progress in the cache, and
//! persists progress to the watch history in coalesced batches.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod providers;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::{configure, AppState};
