/// Background jobs, each a spawned task with a shutdown signal
pub mod cache_warmer;
pub mod progress_flush;

pub use cache_warmer::{CacheWarmer, FeaturedSourcesWarmer, PopularViewWarmer, WarmTask, WarmTaskReport};
pub use progress_flush::ProgressFlushJob;
