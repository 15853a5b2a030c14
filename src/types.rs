//! Core types for ORGiD resolution.
//!
//! This module provides the resolution response returned for every resolution
//! attempt, together with the chain and fetcher descriptors the resolver is
//! configured with.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetcher::OrgJsonFetcher;

/// JSON-LD context of a DID resolution response
pub const DID_RESOLUTION_CONTEXT: &str = "https://w3id.org/did-resolution/v1";

/// Content type of a resolved ORGiD DID document
pub const DID_DOCUMENT_CONTENT_TYPE: &str = "application/did+ld+json";

/// Result of a single DID resolution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResponse {
    #[serde(rename = "@context")]
    pub context: String,

    /// The DID that was resolved
    pub did: String,

    /// The resolved DID document, kept as raw JSON since ORG.JSON is open-ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<serde_json::Value>,

    /// Metadata about the resolution process
    pub did_resolution_metadata: ResolutionMetadata,

    /// Metadata about the resolved document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<DidDocumentMetadata>,
}

impl ResolutionResponse {
    /// Builds a response for a resolution that started at `started`.
    ///
    /// The duration is measured up to now. When `error` is set the response
    /// reports a failed resolution, whether or not a document is attached.
    pub fn build(
        did: &str,
        started: DateTime<Utc>,
        did_document: Option<serde_json::Value>,
        did_document_metadata: Option<DidDocumentMetadata>,
        error: Option<String>,
    ) -> Self {
        let retrieved = Utc::now();
        let duration = (retrieved - started).num_milliseconds().max(0) as u64;

        Self {
            context: DID_RESOLUTION_CONTEXT.to_string(),
            did: did.to_string(),
            did_document,
            did_resolution_metadata: ResolutionMetadata {
                content_type: DID_DOCUMENT_CONTENT_TYPE.to_string(),
                retrieved,
                duration,
                error,
            },
            did_document_metadata,
        }
    }

    /// Whether the resolver reported an error
    pub fn is_error(&self) -> bool {
        self.did_resolution_metadata.error.is_some()
    }
}

/// Metadata about the resolution process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetadata {
    /// Content type of the resolved document
    pub content_type: String,

    /// When the document was retrieved
    pub retrieved: DateTime<Utc>,

    /// How long the resolution took, in milliseconds
    pub duration: u64,

    /// Any error that occurred during resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metadata about the resolved DID document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    pub deactivated: bool,

    /// Where the ORG.JSON credential was fetched from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_json_uri: Option<String>,

    /// Owner address registered for the ORGiD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// EVM chain the ORGiD registry contract is deployed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmChainConfig {
    pub chain_id: u64,
    /// Always `eip155` for EVM chains
    pub blockchain_type: String,
    /// Address of the ORGiD registry contract
    pub contract_address: String,
    /// JSON-RPC endpoint
    pub rpc: String,
}

/// A named document fetcher the resolver can use
#[derive(Clone)]
pub struct FetcherConfig {
    pub id: String,
    pub name: String,
    pub fetcher: Arc<dyn OrgJsonFetcher>,
}

impl std::fmt::Debug for FetcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Everything the resolver needs to resolve DIDs on one chain
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub chain: EvmChainConfig,
    pub fetchers: Vec<FetcherConfig>,
}

impl ResolverOptions {
    /// Finds a fetcher by id
    pub fn fetcher(&self, id: &str) -> Option<&FetcherConfig> {
        self.fetchers.iter().find(|f| f.id == id)
    }
}
