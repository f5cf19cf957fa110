/// Data models for playback-service
pub mod session;
pub mod source;

pub use session::{
    EndSessionRequest, PopularContent, ProgressRecord, ProgressUpdate, Session, SessionView,
    StartSessionRequest, WatchHistoryEntry,
};
pub use source::{
    AggregationMetadata, AggregationResult, EmbedSource, MediaType, NoSourcesResponse,
    ProviderReport, Quality, SourceMetadata, SourceQuery, SourceType, SourcesResponse,
    StreamSource, Subtitle,
};
