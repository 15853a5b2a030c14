//! Core ORGiD resolution functionality.
//!
//! This module builds the per-chain resolver configuration, resolves ORGiD
//! DIDs (registry lookup, ORG.JSON fetch, DID document extraction) and
//! orchestrates a full resolution from a DID string.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::chain::{parse_org_id, JsonRpcRegistry, OrgIdRegistry};
use crate::config::DappConfig;
use crate::did::ParsedDid;
use crate::error::{DappError, DappResult};
use crate::fetcher::{build_http_fetcher_config, fetcher_id_for_uri, OrgJsonFetcher};
use crate::ipfs::build_ipfs_fetcher_config;
use crate::types::{DidDocumentMetadata, EvmChainConfig, ResolutionResponse, ResolverOptions};

/// DID method served by [`OrgIdResolver`]
pub const ORGID_METHOD: &str = "orgid";

/// Blockchain type of EVM chains
pub const EIP155: &str = "eip155";

/// Turns a DID into a resolution response
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> DappResult<ResolutionResponse>;
}

/// Builds the chain descriptor and the HTTP + IPFS fetchers for a network
pub fn build_resolver_options(
    network: u64,
    config: &DappConfig,
    client: &Client,
    ipfs: Arc<dyn OrgJsonFetcher>,
) -> DappResult<ResolverOptions> {
    let network = config.network_by_chain_id(network)?;

    let chain = EvmChainConfig {
        chain_id: network.chain_id,
        blockchain_type: EIP155.to_string(),
        contract_address: network.address.clone(),
        rpc: network.rpc.clone(),
    };

    Ok(ResolverOptions {
        chain,
        fetchers: vec![
            build_http_fetcher_config(client.clone()),
            build_ipfs_fetcher_config(ipfs),
        ],
    })
}

/// Resolver for `did:orgid` identifiers on a single chain
pub struct OrgIdResolver {
    options: ResolverOptions,
    registry: Arc<dyn OrgIdRegistry>,
}

impl OrgIdResolver {
    /// Creates a resolver talking to the chain's JSON-RPC endpoint
    pub fn new(options: ResolverOptions, client: Client) -> Self {
        let registry = Arc::new(JsonRpcRegistry::new(client, options.chain.clone()));
        Self { options, registry }
    }

    /// Creates a resolver on top of an arbitrary registry
    pub fn with_registry(options: ResolverOptions, registry: Arc<dyn OrgIdRegistry>) -> Self {
        Self { options, registry }
    }

    async fn resolve_document(&self, did: &str) -> DappResult<(Value, DidDocumentMetadata)> {
        let parsed = ParsedDid::parse(did)?;

        if parsed.method != ORGID_METHOD {
            return Err(DappError::ResolutionFailed(format!(
                "Unsupported DID method: {}",
                parsed.method
            )));
        }
        if parsed.network != self.options.chain.chain_id {
            return Err(DappError::ResolutionFailed(format!(
                "Chain {} is not supported by this resolver",
                parsed.network
            )));
        }

        parse_org_id(&parsed.org_id)?;
        let record = self
            .registry
            .get_org_id(&parsed.org_id)
            .await?
            .ok_or_else(|| DappError::ResolutionFailed(format!("ORGiD not found: {}", parsed.org_id)))?;
        debug!(org_json_uri = %record.org_json_uri, owner = %record.owner, "ORGiD found");

        let fetcher_id = fetcher_id_for_uri(&record.org_json_uri);
        let fetcher = self
            .options
            .fetcher(fetcher_id)
            .ok_or_else(|| DappError::ResolutionFailed(format!("Fetcher {} is not configured", fetcher_id)))?;

        let vc = fetcher.fetcher.get_org_json(&record.org_json_uri).await?;
        let document = vc
            .get("credentialSubject")
            .filter(|subject| subject.is_object())
            .cloned()
            .ok_or_else(|| DappError::MalformedContent("ORG.JSON VC has no credentialSubject".to_string()))?;

        verify_subject_id(&parsed, &document)?;

        let issued = timestamp(&vc, "issuanceDate").or_else(|| timestamp(&vc, "validFrom"));
        let metadata = DidDocumentMetadata {
            created: timestamp(&document, "created").or(issued),
            updated: timestamp(&document, "updated").or(issued),
            deactivated: false,
            org_json_uri: Some(record.org_json_uri),
            owner: Some(record.owner),
        };

        Ok((document, metadata))
    }
}

#[async_trait]
impl DidResolver for OrgIdResolver {
    async fn resolve(&self, did: &str) -> DappResult<ResolutionResponse> {
        let started = Utc::now();

        match self.resolve_document(did).await {
            Ok((document, metadata)) => Ok(ResolutionResponse::build(
                did,
                started,
                Some(document),
                Some(metadata),
                None,
            )),
            Err(e) => {
                warn!(did, error = %e, "ORGiD resolution failed");
                Ok(ResolutionResponse::build(did, started, None, None, Some(e.to_string())))
            }
        }
    }
}

/// The ORG.JSON subject must describe the DID being resolved
fn verify_subject_id(parsed: &ParsedDid, document: &Value) -> DappResult<()> {
    let subject_id = document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DappError::MalformedContent("ORG.JSON has no id".to_string()))?;
    let subject = ParsedDid::parse(subject_id)?;

    if subject.method != parsed.method
        || subject.network != parsed.network
        || !subject.org_id.eq_ignore_ascii_case(&parsed.org_id)
    {
        return Err(DappError::ResolutionFailed(format!(
            "ORG.JSON id {} does not match the resolved DID {}",
            subject_id, parsed.did
        )));
    }
    Ok(())
}

fn timestamp(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Everything needed to resolve DIDs on any configured network
#[derive(Clone)]
pub struct ResolverContext {
    pub config: DappConfig,
    pub client: Client,
    /// IPFS resource getter handed to the IPFS fetcher
    pub ipfs: Arc<dyn OrgJsonFetcher>,
}

impl ResolverContext {
    pub fn new(config: DappConfig, client: Client, ipfs: Arc<dyn OrgJsonFetcher>) -> Self {
        Self { config, client, ipfs }
    }
}

#[async_trait]
impl DidResolver for ResolverContext {
    async fn resolve(&self, did: &str) -> DappResult<ResolutionResponse> {
        resolve_did(did, self).await
    }
}

/// Resolves a DID: parse, build the chain configuration, run the ORGiD resolver
///
/// Malformed DIDs and unknown networks are returned as errors; failures past
/// that point are reported inside the response.
pub async fn resolve_did(did: &str, context: &ResolverContext) -> DappResult<ResolutionResponse> {
    let parsed = ParsedDid::parse(did)?;
    let options = build_resolver_options(parsed.network, &context.config, &context.client, context.ipfs.clone())?;

    let resolver = OrgIdResolver::new(options, context.client.clone());
    resolver.resolve(did).await
}
