//! Multi-provider source aggregation
//!
//! Cache first. On a miss the primary provider is asked (bounded by the
//! provider timeout); if it fails, comes back empty or only offers embed
//! pages, every fallback is asked concurrently. Whatever survives
//! normalization is deduplicated, ranked and cached, including the empty
//! "no sources" outcome for a short while.

use chrono::Utc;
use futures::future::join_all;
use marquee_cache::{ttl, CacheKey, CacheStore};
use resilience::with_timeout;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::models::{
    AggregationMetadata, AggregationResult, EmbedSource, ProviderReport, SourceQuery,
    StreamSource,
};
use crate::providers::{ContentMetadata, ProviderError, SourceProvider};
use crate::services::scoring;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub provider_timeout: Duration,
    pub sources_ttl: u64,
    pub no_sources_ttl: u64,
    pub failure_window: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: resilience::provider_config().timeout.duration,
            sources_ttl: ttl::SOURCES,
            no_sources_ttl: ttl::NO_SOURCES,
            failure_window: ttl::PROVIDER_FAILURES,
        }
    }
}

/// An aggregation result and whether it came from the cache
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub result: AggregationResult,
    pub cached: bool,
    pub cache_age_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub name: String,
    pub primary: bool,
    pub recent_failures: i64,
    pub window_remaining_seconds: Option<u64>,
}

pub struct SourceAggregator {
    cache: CacheStore,
    primary: Arc<dyn SourceProvider>,
    fallbacks: Vec<Arc<dyn SourceProvider>>,
    metadata: Option<Arc<dyn ContentMetadata>>,
    config: AggregatorConfig,
}

impl SourceAggregator {
    pub fn new(
        cache: CacheStore,
        primary: Arc<dyn SourceProvider>,
        fallbacks: Vec<Arc<dyn SourceProvider>>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            cache,
            primary,
            fallbacks,
            metadata: None,
            config,
        }
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn ContentMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub async fn get_sources(&self, query: SourceQuery) -> Aggregated {
        let key = query.cache_key();

        if let Some(result) = self.cache.get::<AggregationResult>(&key).await {
            let age = (Utc::now() - result.metadata.timestamp).num_seconds().max(0);
            debug!(key = %key, age, "Sources served from cache");
            return Aggregated {
                result,
                cached: true,
                cache_age_seconds: Some(age),
            };
        }

        self.refresh(query).await
    }

    /// Ask the providers regardless of what is cached and overwrite the
    /// cache entry.
    pub async fn refresh(&self, mut query: SourceQuery) -> Aggregated {
        let key = query.cache_key();
        self.enrich(&mut query).await;

        let mut reports = Vec::with_capacity(1 + self.fallbacks.len());
        let (primary_report, mut sources) = self.ask(self.primary.as_ref(), &query, true).await;
        let primary_succeeded = primary_report.succeeded;
        reports.push(primary_report);

        let streamable = sources.iter().any(|s| s.source_type.is_streamable());
        let fallback_used = !streamable && !self.fallbacks.is_empty();
        if fallback_used {
            info!(
                content_id = %query.content_id,
                primary_succeeded,
                fallbacks = self.fallbacks.len(),
                "Primary provider had no streamable source; querying fallbacks"
            );
            let answers = join_all(
                self.fallbacks
                    .iter()
                    .map(|provider| self.ask(provider.as_ref(), &query, false)),
            )
            .await;
            for (report, found) in answers {
                reports.push(report);
                sources.extend(found);
            }
        }

        let sources = scoring::rank(sources);
        let result = AggregationResult {
            metadata: AggregationMetadata {
                content_id: query.content_id.clone(),
                title: query.title.clone(),
                year: query.year,
                timestamp: Utc::now(),
                total_sources: sources.len(),
                primary_provider_succeeded: primary_succeeded,
                fallback_used,
                quality_breakdown: scoring::quality_breakdown(&sources),
                provider_breakdown: scoring::provider_breakdown(&sources),
                providers: reports,
            },
            sources,
        };

        let ttl = if result.is_empty() {
            warn!(content_id = %query.content_id, "No sources available from any provider");
            self.config.no_sources_ttl
        } else {
            self.config.sources_ttl
        };
        self.cache.set(&key, &result, ttl).await;

        Aggregated {
            result,
            cached: false,
            cache_age_seconds: None,
        }
    }

    /// Top-ranked source only
    pub async fn best_source(&self, query: SourceQuery) -> Option<EmbedSource> {
        self.get_sources(query).await.result.best().map(EmbedSource::from)
    }

    /// Drop every cached source list for a content item
    pub async fn invalidate(&self, content_id: &str) -> usize {
        let mut deleted = 0;
        for pattern in CacheKey::sources_patterns(content_id) {
            deleted += self.cache.delete_pattern(&pattern).await;
        }
        info!(content_id, deleted, "Invalidated cached sources");
        deleted
    }

    pub async fn provider_health(&self) -> Vec<ProviderHealth> {
        let providers = std::iter::once((&self.primary, true))
            .chain(self.fallbacks.iter().map(|p| (p, false)));

        let mut health = Vec::new();
        for (provider, primary) in providers {
            let key = CacheKey::provider_failures(provider.name());
            health.push(ProviderHealth {
                name: provider.name().to_string(),
                primary,
                recent_failures: self.cache.get::<i64>(&key).await.unwrap_or(0),
                window_remaining_seconds: self.cache.ttl(&key).await.seconds(),
            });
        }
        health
    }

    async fn enrich(&self, query: &mut SourceQuery) {
        let Some(metadata) = &self.metadata else {
            return;
        };
        if query.title.is_some() && query.year.is_some() && query.external_id.is_some() {
            return;
        }

        match with_timeout(self.config.provider_timeout, metadata.get_details(&query.content_id)).await {
            Ok(Ok(Some(details))) => {
                query.title = query.title.take().or(details.title);
                query.year = query.year.or(details.year);
                query.external_id = query.external_id.take().or(details.external_id);
            }
            Ok(Ok(None)) => debug!(content_id = %query.content_id, "No catalog metadata"),
            Ok(Err(e)) => debug!(content_id = %query.content_id, error = %e, "Catalog lookup failed"),
            Err(e) => debug!(content_id = %query.content_id, error = %e, "Catalog lookup timed out"),
        }
    }

    /// Ask one provider. Errors and timeouts come back as an empty list plus
    /// a failed report.
    async fn ask(
        &self,
        provider: &dyn SourceProvider,
        query: &SourceQuery,
        primary: bool,
    ) -> (ProviderReport, Vec<StreamSource>) {
        let name = provider.name();
        let started = Instant::now();

        let outcome = match with_timeout(self.config.provider_timeout, provider.get_sources(query)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.provider_timeout)),
        };

        let (sources, error) = match outcome {
            Ok(raw) => {
                let now = Utc::now();
                let sources: Vec<StreamSource> = raw
                    .into_iter()
                    .filter_map(|r| scoring::normalize(r, name, now))
                    .collect();
                (sources, None)
            }
            Err(e) => {
                warn!(provider = name, primary, error = %e, "Provider failed");
                self.record_failure(name).await;
                (Vec::new(), Some(e.to_string()))
            }
        };

        let report = ProviderReport {
            name: name.to_string(),
            primary,
            succeeded: !sources.is_empty(),
            source_count: sources.len(),
            error,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        (report, sources)
    }

    /// Rolling failure count; the window starts at the first failure
    async fn record_failure(&self, provider: &str) {
        let key = CacheKey::provider_failures(provider);
        if self.cache.increment(&key, 1).await == Some(1) {
            self.cache.expire(&key, self.config.failure_window).await;
        }
    }
}
