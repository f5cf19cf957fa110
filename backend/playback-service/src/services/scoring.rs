//! Normalization and ranking of provider sources
//!
//! Everything here is pure: no I/O, no clocks except the one passed in.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use url::Url;

use crate::models::{Quality, SourceMetadata, SourceType, StreamSource, Subtitle};
use crate::providers::{RawSource, RawSubtitle};

pub const DEFAULT_LANGUAGE: &str = "en";
const WORKING_BONUS: i32 = 10;
const SUBTITLE_BONUS: i32 = 5;

/// Turn a provider's raw source into a [`StreamSource`] with defaults filled
/// in. Returns `None` when there is no usable http(s) URL.
pub fn normalize(raw: RawSource, provider: &str, now: DateTime<Utc>) -> Option<StreamSource> {
    let url = parse_http_url(raw.url.as_deref()?)?;

    let quality = raw
        .quality
        .as_ref()
        .map(|label| Quality::parse(&label.as_text()))
        .unwrap_or(Quality::Unknown);

    let source_type = raw
        .source_type
        .as_deref()
        .and_then(SourceType::parse)
        .unwrap_or_else(|| SourceType::infer_from_url(&url));

    let language = raw
        .language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let subtitles = raw.subtitles.into_iter().filter_map(normalize_subtitle).collect();

    let mut source = StreamSource {
        url: url.to_string(),
        quality,
        source_type,
        language,
        provider: provider.to_string(),
        subtitles,
        is_working: raw.is_working.unwrap_or(true),
        priority: 0,
        metadata: SourceMetadata {
            origin_server: raw
                .origin_server
                .or_else(|| url.host_str().map(str::to_owned)),
            last_checked: now,
        },
    };
    source.priority = score(&source);
    Some(source)
}

fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

fn normalize_subtitle(raw: RawSubtitle) -> Option<Subtitle> {
    let (url, language, label) = match raw {
        RawSubtitle::Url(url) => (url, None, None),
        RawSubtitle::Track { url, language, label } => (url, language, label),
    };
    let url = parse_http_url(&url)?;
    Some(Subtitle {
        url: url.to_string(),
        language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        label,
    })
}

/// `typeWeight + qualityWeight + 10 if working + 5 if subtitled`
pub fn score(source: &StreamSource) -> i32 {
    let mut score = source.source_type.weight() + source.quality.weight();
    if source.is_working {
        score += WORKING_BONUS;
    }
    if !source.subtitles.is_empty() {
        score += SUBTITLE_BONUS;
    }
    score
}

/// Drop repeated URLs (first seen wins) and sort by priority, highest first.
/// Ties keep discovery order.
pub fn rank(sources: Vec<StreamSource>) -> Vec<StreamSource> {
    let mut seen = HashSet::new();
    let mut unique: Vec<StreamSource> = sources
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect();

    // sort_by is stable
    unique.sort_by(|a, b| b.priority.cmp(&a.priority));
    unique
}

pub fn quality_breakdown(sources: &[StreamSource]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for source in sources {
        *counts.entry(source.quality.to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn provider_breakdown(sources: &[StreamSource]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for source in sources {
        *counts.entry(source.provider.clone()).or_insert(0) += 1;
    }
    counts
}
