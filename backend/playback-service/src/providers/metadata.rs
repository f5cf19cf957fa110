/// Content metadata lookup (title, year, external id) used to enrich
/// provider queries. Optional: a missing or failing catalog means no
/// enrichment, never a failed request.
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::ProviderError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    pub title: Option<String>,
    pub year: Option<i32>,
    #[serde(alias = "imdbId")]
    pub external_id: Option<String>,
}

#[async_trait::async_trait]
pub trait ContentMetadata: Send + Sync {
    async fn get_details(&self, content_id: &str) -> Result<Option<ContentDetails>, ProviderError>;
}

/// `GET {base_url}/content/{id}`; 404 means unknown content
pub struct HttpContentMetadata {
    base: Url,
    client: Client,
}

impl HttpContentMetadata {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let base = Url::parse(base_url)
            .map_err(|e| ProviderError::InvalidPayload(format!("bad catalog URL {base_url}: {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }
}

#[async_trait::async_trait]
impl ContentMetadata for HttpContentMetadata {
    async fn get_details(&self, content_id: &str) -> Result<Option<ContentDetails>, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidPayload("catalog URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["content", content_id]);

        let response = self.client.get(url).send().await?;
        match response.status() {
            s if s == reqwest::StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await?)),
            s => Err(ProviderError::Status(s.as_u16())),
        }
    }
}
