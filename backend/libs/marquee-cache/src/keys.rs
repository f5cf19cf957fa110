//! Cache key schema
//!
//! Every key written by a Marquee service is built here.
//! Key format: v{VERSION}:{entity}:{identifier}[:sub_key]

/// Cache schema version - increment when changing key formats
pub const CACHE_VERSION: u32 = 1;

/// Media types that appear in source keys
pub const SOURCE_MEDIA_TYPES: [&str; 2] = ["movie", "tv"];

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    // ============= Source Keys =============

    /// Aggregated sources for one content item
    /// Format: v1:sources:{media_type}:{content_id}[:s{season}:e{episode}]
    pub fn sources(
        media_type: &str,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> String {
        match (season, episode) {
            (Some(s), Some(e)) => format!(
                "v{}:sources:{}:{}:s{}:e{}",
                CACHE_VERSION, media_type, content_id, s, e
            ),
            _ => format!("v{}:sources:{}:{}", CACHE_VERSION, media_type, content_id),
        }
    }

    /// Patterns covering every cached source list of a content item,
    /// regardless of media type or episode. The media type is spelled out so
    /// a wildcard never spans the content id and an episode suffix.
    pub fn sources_patterns(content_id: &str) -> Vec<String> {
        let id = escape_glob(content_id);
        SOURCE_MEDIA_TYPES
            .iter()
            .flat_map(|media_type| {
                [
                    format!("v{}:sources:{}:{}", CACHE_VERSION, media_type, id),
                    format!("v{}:sources:{}:{}:s*", CACHE_VERSION, media_type, id),
                ]
            })
            .collect()
    }

    /// Rolling failure counter for an upstream provider
    /// Format: v1:provider:failures:{provider}
    pub fn provider_failures(provider: &str) -> String {
        format!("v{}:provider:failures:{}", CACHE_VERSION, provider)
    }

    // ============= Playback Keys =============

    /// Live playback session
    /// Format: v1:session:{user_id}:{content_id}
    pub fn session(user_id: &str, content_id: &str) -> String {
        format!("v{}:session:{}:{}", CACHE_VERSION, user_id, content_id)
    }

    /// Last known progress, outlives the session
    /// Format: v1:progress:{user_id}:{content_id}
    pub fn progress(user_id: &str, content_id: &str) -> String {
        format!("v{}:progress:{}:{}", CACHE_VERSION, user_id, content_id)
    }

    // ============= HTTP Response Keys =============

    /// Memoized HTTP response
    /// Format: v1:resp:{normalized request identity}
    pub fn response(identity: &str) -> String {
        format!("v{}:resp:{}", CACHE_VERSION, identity)
    }

    /// Pattern over memoized responses, `path_glob` may contain `*`
    pub fn response_pattern(path_glob: &str) -> String {
        format!("v{}:resp:{}", CACHE_VERSION, path_glob)
    }

    // ============= Utility =============

    /// Extract entity type from key
    pub fn entity_type(key: &str) -> Option<&str> {
        // Format: v{N}:{entity}:...
        let mut parts = key.split(':');
        match (parts.next(), parts.next()) {
            (Some(version), Some(entity)) if version.starts_with('v') => Some(entity),
            _ => None,
        }
    }
}

/// Escape glob metacharacters so an identifier matches only itself.
pub fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
