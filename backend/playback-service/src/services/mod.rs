/// Business logic layer
pub mod aggregator;
pub mod catalog;
pub mod pending;
pub mod scoring;
pub mod sessions;

pub use aggregator::{Aggregated, AggregatorConfig, ProviderHealth, SourceAggregator};
pub use pending::PendingUpdates;
pub use sessions::{FlushOutcome, FlushReport, SessionConfig, SessionManager};
