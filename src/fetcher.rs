//! ORG.JSON document fetchers.
//!
//! A fetcher turns the `orgJsonUri` registered for an ORGiD into the JSON
//! credential it points at. The HTTP fetcher lives here; the IPFS one is in
//! [`crate::ipfs`].

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{DappError, DappResult};
use crate::types::FetcherConfig;

/// Id of the generic HTTP fetcher
pub const HTTP_FETCHER_ID: &str = "http";

/// Id of the IPFS fetcher
pub const IPFS_FETCHER_ID: &str = "ipfs";

/// Fetches an ORG.JSON document by URI
#[async_trait]
pub trait OrgJsonFetcher: Send + Sync {
    async fn get_org_json(&self, uri: &str) -> DappResult<serde_json::Value>;
}

/// Fetches ORG.JSON documents over plain HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrgJsonFetcher for HttpFetcher {
    async fn get_org_json(&self, uri: &str) -> DappResult<serde_json::Value> {
        let url = Url::parse(uri)?;
        debug!(%url, "fetching ORG.JSON over HTTP");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DappError::ResolutionFailed(format!(
                "HTTP {} when fetching ORG.JSON from {}",
                response.status(),
                uri
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            DappError::MalformedContent(format!("Unable to parse ORG.JSON from {}: {}", uri, e))
        })
    }
}

/// Builds the descriptor of the generic HTTP fetcher
pub fn build_http_fetcher_config(client: Client) -> FetcherConfig {
    FetcherConfig {
        id: HTTP_FETCHER_ID.to_string(),
        name: "ORG.JSON HTTP fetcher".to_string(),
        fetcher: std::sync::Arc::new(HttpFetcher::new(client)),
    }
}

/// Picks the fetcher id able to serve the given URI
pub fn fetcher_id_for_uri(uri: &str) -> &'static str {
    let lower = uri.trim().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        HTTP_FETCHER_ID
    } else {
        IPFS_FETCHER_ID
    }
}
