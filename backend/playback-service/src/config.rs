/// Configuration management for playback-service
///
/// Loads configuration from environment variables with sensible defaults.
use anyhow::{bail, Context};
use marquee_cache::ttl;
use redis_utils::ReconnectConfig;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub providers: ProvidersConfig,
    pub sessions: SessionsConfig,
    pub warmer: WarmerConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => bail!("unknown CACHE_BACKEND '{other}', expected redis or memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_url: String,
    pub op_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub response_ttl: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug)]
pub struct ProvidersConfig {
    pub primary: ProviderEndpoint,
    pub fallbacks: Vec<ProviderEndpoint>,
    pub timeout: Duration,
    pub catalog_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub flush_interval: Duration,
    pub session_ttl: u64,
    pub progress_ttl: u64,
    pub ended_session_ttl: u64,
}

#[derive(Clone, Debug)]
pub struct WarmerConfig {
    pub interval: Duration,
    pub featured_content_ids: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut reconnect = ReconnectConfig::default();
        reconnect.retry.max_retries = env_parse("REDIS_RECONNECT_MAX_RETRIES", reconnect.retry.max_retries)?;
        reconnect.retry.max_backoff = Duration::from_millis(env_parse(
            "REDIS_RECONNECT_MAX_BACKOFF_MS",
            reconnect.retry.max_backoff.as_millis() as u64,
        )?);
        reconnect.health_interval = Duration::from_secs(env_parse(
            "REDIS_RECONNECT_HEALTH_INTERVAL_SECS",
            reconnect.health_interval.as_secs(),
        )?);

        Ok(Config {
            app: AppConfig {
                host: env_or("APP_HOST", "0.0.0.0"),
                port: env_parse("APP_PORT", 8080)?,
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/marquee"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            cache: CacheConfig {
                backend: env_or("CACHE_BACKEND", "redis").parse()?,
                redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
                op_timeout: Duration::from_millis(env_parse(
                    "CACHE_OP_TIMEOUT_MS",
                    resilience::cache_config().timeout.duration.as_millis() as u64,
                )?),
                reconnect,
                response_ttl: env_parse("RESPONSE_CACHE_TTL_SECS", ttl::RESPONSE)?,
            },
            providers: ProvidersConfig {
                primary: ProviderEndpoint {
                    name: env_or("PRIMARY_PROVIDER_NAME", "primary"),
                    url: env_or("PRIMARY_PROVIDER_URL", "http://localhost:9001"),
                },
                fallbacks: parse_fallback_providers(&env_or("FALLBACK_PROVIDERS", ""))?,
                timeout: Duration::from_secs(env_parse(
                    "PROVIDER_TIMEOUT_SECS",
                    resilience::provider_config().timeout.duration.as_secs(),
                )?),
                catalog_url: std::env::var("CATALOG_SERVICE_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty()),
            },
            sessions: SessionsConfig {
                flush_interval: Duration::from_secs(env_parse("PROGRESS_FLUSH_INTERVAL_SECS", 30)?),
                session_ttl: env_parse("SESSION_TTL_SECS", ttl::SESSION)?,
                progress_ttl: env_parse("PROGRESS_TTL_SECS", ttl::PROGRESS)?,
                ended_session_ttl: env_parse("ENDED_SESSION_TTL_SECS", ttl::ENDED_SESSION)?,
            },
            warmer: WarmerConfig {
                interval: Duration::from_secs(env_parse("CACHE_WARM_INTERVAL_SECS", 600)?),
                featured_content_ids: parse_list(&env_or("FEATURED_CONTENT_IDS", "")),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        _ => Ok(default),
    }
}

/// Comma-separated list, blanks dropped
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `name=url,name=url`
pub fn parse_fallback_providers(raw: &str) -> anyhow::Result<Vec<ProviderEndpoint>> {
    parse_list(raw)
        .into_iter()
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .with_context(|| format!("FALLBACK_PROVIDERS entry '{entry}' must be name=url"))?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                bail!("FALLBACK_PROVIDERS entry '{entry}' must be name=url");
            }
            Ok(ProviderEndpoint {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fallback_providers() {
        let parsed =
            parse_fallback_providers("vidsrc=http://a.local, backup = http://b.local/api ,").unwrap();
        assert_eq!(
            parsed,
            vec![
                ProviderEndpoint {
                    name: "vidsrc".into(),
                    url: "http://a.local".into()
                },
                ProviderEndpoint {
                    name: "backup".into(),
                    url: "http://b.local/api".into()
                },
            ]
        );
        assert!(parse_fallback_providers("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_fallback_entry_is_rejected() {
        assert!(parse_fallback_providers("no-separator").is_err());
        assert!(parse_fallback_providers("=http://x").is_err());
    }

    #[test]
    fn test_cache_backend_kind() {
        assert_eq!("redis".parse::<CacheBackendKind>().unwrap(), CacheBackendKind::Redis);
        assert_eq!(" Memory ".parse::<CacheBackendKind>().unwrap(), CacheBackendKind::Memory);
        assert!("memcached".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    fn test_parse_list_drops_blanks() {
        assert_eq!(parse_list(" 603, ,27205 "), vec!["603", "27205"]);
    }
}
