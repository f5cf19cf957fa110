/// Upstream collaborators: streaming source providers and content metadata
pub mod http;
pub mod metadata;

pub use http::HttpSourceProvider;
pub use metadata::{ContentDetails, ContentMetadata, HttpContentMetadata};

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::SourceQuery;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// A source exactly as a provider described it. Providers disagree on field
/// names, so common aliases are accepted; anything missing is filled in by
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSource {
    #[serde(default, alias = "file", alias = "src", alias = "link", alias = "stream")]
    pub url: Option<String>,
    #[serde(default, alias = "label", alias = "resolution", alias = "res")]
    pub quality: Option<Label>,
    #[serde(default, rename = "type", alias = "kind", alias = "format")]
    pub source_type: Option<String>,
    #[serde(default, alias = "lang")]
    pub language: Option<String>,
    #[serde(default, alias = "subtitle", alias = "tracks", alias = "captions")]
    pub subtitles: Vec<RawSubtitle>,
    #[serde(default, alias = "working", alias = "isActive")]
    pub is_working: Option<bool>,
    #[serde(default, alias = "server", alias = "host")]
    pub origin_server: Option<String>,
}

impl RawSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: &str) -> Self {
        self.quality = Some(Label::Text(quality.to_string()));
        self
    }

    pub fn with_type(mut self, source_type: &str) -> Self {
        self.source_type = Some(source_type.to_string());
        self
    }
}

/// `"1080p"` or `1080`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Text(String),
    Number(u32),
}

impl Label {
    pub fn as_text(&self) -> String {
        match self {
            Label::Text(text) => text.clone(),
            Label::Number(n) => n.to_string(),
        }
    }
}

/// Subtitle track, either a bare URL or an object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawSubtitle {
    Url(String),
    Track {
        #[serde(alias = "file", alias = "src")]
        url: String,
        #[serde(default, alias = "lang", alias = "srclang")]
        language: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
}

/// One upstream that can list playable sources for a content item
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable name, used in reports and failure counters
    fn name(&self) -> &str;

    async fn get_sources(&self, query: &SourceQuery) -> Result<Vec<RawSource>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        let raw: RawSource = serde_json::from_str(
            r#"{"file": "https://cdn.x/a.m3u8", "label": 720, "lang": "fr", "working": false,
                "tracks": ["https://cdn.x/en.vtt", {"src": "https://cdn.x/de.vtt", "srclang": "de"}]}"#,
        )
        .unwrap();

        assert_eq!(raw.url.as_deref(), Some("https://cdn.x/a.m3u8"));
        assert_eq!(raw.quality, Some(Label::Number(720)));
        assert_eq!(raw.language.as_deref(), Some("fr"));
        assert_eq!(raw.is_working, Some(false));
        assert_eq!(raw.subtitles.len(), 2);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let raw: RawSource =
            serde_json::from_str(r#"{"url": "https://a/b", "priority": 9999, "extra": {}}"#).unwrap();
        assert_eq!(raw, RawSource::new("https://a/b"));
    }
}
