/// Streaming source models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "unknown")]
    Unknown,
}

impl Quality {
    /// Lenient parse of provider labels ("1080p", "1080", "4K", "HD").
    pub fn parse(raw: &str) -> Self {
        let label = raw.trim().to_ascii_lowercase();
        let label = label.strip_suffix('p').unwrap_or(&label);
        match label {
            "2160" | "4k" | "uhd" => Quality::P2160,
            "1440" | "2k" | "qhd" => Quality::P1440,
            "1080" | "fhd" | "fullhd" => Quality::P1080,
            "720" | "hd" => Quality::P720,
            "480" | "sd" => Quality::P480,
            "360" => Quality::P360,
            "240" => Quality::P240,
            _ => Quality::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P2160 => "2160p",
            Quality::P1440 => "1440p",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::P240 => "240p",
            Quality::Unknown => "unknown",
        }
    }

    pub fn weight(&self) -> i32 {
        match self {
            Quality::P2160 => 50,
            Quality::P1440 => 45,
            Quality::P1080 => 40,
            Quality::P720 => 30,
            Quality::P480 => 20,
            Quality::P360 => 10,
            Quality::P240 => 5,
            Quality::Unknown => 0,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Hls,
    Dash,
    Direct,
    Embed,
    Iframe,
}

impl SourceType {
    /// Provider label, if it names a known type
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hls" | "m3u8" => Some(SourceType::Hls),
            "dash" | "mpd" => Some(SourceType::Dash),
            "direct" | "mp4" | "file" => Some(SourceType::Direct),
            "embed" => Some(SourceType::Embed),
            "iframe" => Some(SourceType::Iframe),
            _ => None,
        }
    }

    /// Guess from the URL path extension, falling back to `Embed`.
    pub fn infer_from_url(url: &url::Url) -> Self {
        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".m3u8") {
            SourceType::Hls
        } else if path.ends_with(".mpd") {
            SourceType::Dash
        } else if path.ends_with(".mp4") {
            SourceType::Direct
        } else {
            SourceType::Embed
        }
    }

    /// Playable by our own player, as opposed to a third-party page
    pub fn is_streamable(&self) -> bool {
        matches!(self, SourceType::Hls | SourceType::Dash | SourceType::Direct)
    }

    pub fn weight(&self) -> i32 {
        match self {
            SourceType::Hls => 40,
            SourceType::Dash => 35,
            SourceType::Direct => 30,
            SourceType::Embed => 20,
            SourceType::Iframe => 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtitle {
    pub url: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub origin_server: Option<String>,
    pub last_checked: DateTime<Utc>,
}

/// A playable source after normalization. `priority` is always computed here,
/// never taken from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSource {
    pub url: String,
    pub quality: Quality,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub language: String,
    pub provider: String,
    pub subtitles: Vec<Subtitle>,
    pub is_working: bool,
    pub priority: i32,
    pub metadata: SourceMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// What a provider is asked for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceQuery {
    pub content_id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl SourceQuery {
    pub fn movie(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            media_type: MediaType::Movie,
            season: None,
            episode: None,
            title: None,
            year: None,
            external_id: None,
        }
    }

    pub fn episode(content_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            media_type: MediaType::Tv,
            season: Some(season),
            episode: Some(episode),
            ..Self::movie(content_id)
        }
    }

    /// Season and episode only count for tv
    pub fn cache_key(&self) -> String {
        let (season, episode) = match self.media_type {
            MediaType::Tv => (self.season, self.episode),
            MediaType::Movie => (None, None),
        };
        marquee_cache::CacheKey::sources(self.media_type.as_str(), &self.content_id, season, episode)
    }
}

/// How one provider fared for one aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReport {
    pub name: String,
    pub primary: bool,
    pub succeeded: bool,
    pub source_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationMetadata {
    pub content_id: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub total_sources: usize,
    pub primary_provider_succeeded: bool,
    pub fallback_used: bool,
    pub quality_breakdown: BTreeMap<String, usize>,
    pub provider_breakdown: BTreeMap<String, usize>,
    pub providers: Vec<ProviderReport>,
}

/// Ranked sources plus how they were obtained. Cached as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub sources: Vec<StreamSource>,
    pub metadata: AggregationMetadata,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn best(&self) -> Option<&StreamSource> {
        self.sources.first()
    }
}

/// Response body of the sources endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub success: bool,
    pub sources: Vec<StreamSource>,
    pub metadata: AggregationMetadata,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<i64>,
}

/// Body of the 404 returned when no provider had anything
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoSourcesResponse {
    pub success: bool,
    pub message: String,
    pub metadata: AggregationMetadata,
}

/// The single best source, for players that only take one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedSource {
    pub url: String,
    pub provider: String,
    pub quality: Quality,
    #[serde(rename = "type")]
    pub source_type: SourceType,
}

impl From<&StreamSource> for EmbedSource {
    fn from(source: &StreamSource) -> Self {
        Self {
            url: source.url.clone(),
            provider: source.provider.clone(),
            quality: source.quality,
            source_type: source.source_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parse() {
        assert_eq!(Quality::parse("1080p"), Quality::P1080);
        assert_eq!(Quality::parse("1080"), Quality::P1080);
        assert_eq!(Quality::parse("4K"), Quality::P2160);
        assert_eq!(Quality::parse("HD"), Quality::P720);
        assert_eq!(Quality::parse("potato"), Quality::Unknown);
    }

    #[test]
    fn test_quality_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Quality::P720).unwrap(), "\"720p\"");
        assert_eq!(serde_json::to_string(&Quality::Unknown).unwrap(), "\"unknown\"");
    }

    #[test]
    fn test_type_inference() {
        let url = |s: &str| url::Url::parse(s).unwrap();
        assert_eq!(SourceType::infer_from_url(&url("https://cdn.x/a/master.M3U8")), SourceType::Hls);
        assert_eq!(SourceType::infer_from_url(&url("https://cdn.x/a.mpd?sig=1")), SourceType::Dash);
        assert_eq!(SourceType::infer_from_url(&url("https://cdn.x/a.mp4")), SourceType::Direct);
        assert_eq!(SourceType::infer_from_url(&url("https://player.x/e/123")), SourceType::Embed);
    }

    #[test]
    fn test_movie_key_ignores_episode() {
        let mut query = SourceQuery::movie("603");
        query.season = Some(1);
        query.episode = Some(1);
        assert_eq!(query.cache_key(), "v1:sources:movie:603");
        assert_eq!(SourceQuery::episode("1396", 2, 5).cache_key(), "v1:sources:tv:1396:s2:e5");
    }
}
