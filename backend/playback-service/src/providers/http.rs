/// HTTP JSON source provider
///
/// `GET {base_url}/sources?contentId=..&type=..[&season=..&episode=..]`. The
/// body may be a bare array, `{"sources": [..]}` or `{"data": {"sources": [..]}}`.
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ProviderError, RawSource, SourceProvider};
use crate::models::SourceQuery;

#[derive(Deserialize)]
#[serde(untagged)]
enum SourcesPayload {
    Bare(Vec<RawSource>),
    Wrapped { sources: Vec<RawSource> },
    Nested { data: Box<SourcesPayload> },
}

impl SourcesPayload {
    fn into_sources(self) -> Vec<RawSource> {
        match self {
            SourcesPayload::Bare(sources) | SourcesPayload::Wrapped { sources } => sources,
            SourcesPayload::Nested { data } => data.into_sources(),
        }
    }
}

pub struct HttpSourceProvider {
    name: String,
    endpoint: Url,
    client: Client,
}

impl HttpSourceProvider {
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ProviderError::InvalidPayload(format!("bad provider URL {base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("sources")
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            name: name.into(),
            endpoint,
            client,
        })
    }
}

#[async_trait::async_trait]
impl SourceProvider for HttpSourceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_sources(&self, query: &SourceQuery) -> Result<Vec<RawSource>, ProviderError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let payload: SourcesPayload = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        let sources = payload.into_sources();

        debug!(provider = %self.name, count = sources.len(), "Provider responded");
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<RawSource> {
        serde_json::from_str::<SourcesPayload>(json).unwrap().into_sources()
    }

    #[test]
    fn test_payload_shapes() {
        assert_eq!(parse(r#"[{"url": "https://a/1"}]"#).len(), 1);
        assert_eq!(parse(r#"{"sources": [{"url": "https://a/1"}, {"url": "https://a/2"}]}"#).len(), 2);
        assert_eq!(parse(r#"{"data": {"sources": []}}"#).len(), 0);
    }

    #[test]
    fn test_endpoint_is_relative_to_base() {
        let provider =
            HttpSourceProvider::new("alpha", "http://alpha.internal/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(provider.endpoint.as_str(), "http://alpha.internal/api/sources");
        assert_eq!(provider.name(), "alpha");

        let bare =
            HttpSourceProvider::new("beta", "http://beta.internal/v2", Duration::from_secs(1)).unwrap();
        assert_eq!(bare.endpoint.as_str(), "http://beta.internal/v2/sources");
    }

    #[test]
    fn test_bad_base_url() {
        assert!(HttpSourceProvider::new("x", "not a url", Duration::from_secs(1)).is_err());
    }
}
