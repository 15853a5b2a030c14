//! Resolution core for ORGiD decentralized identifiers.
//!
//! This library parses ORGiD DIDs, looks them up in the on-chain ORGiD
//! registry, fetches the backing ORG.JSON credential over HTTP or IPFS and
//! normalizes every attempt into a resolution history record. It also keeps
//! the key-management records of the dashboard it was built for.

mod chain;
mod config;
mod dapp;
mod did;
mod error;
mod fetcher;
mod history;
mod ipfs;
mod keys;
mod resolver;
mod storage;
mod store;
mod types;

pub use chain::{decode_get_org_id, encode_get_org_id, JsonRpcRegistry, OrgIdRecord, OrgIdRegistry};
pub use config::{DappConfig, NetworkConfig};
pub use dapp::Dapp;
pub use did::{parse_did, ParsedDid, DEFAULT_NETWORK};
pub use error::{DappError, DappResult};
pub use fetcher::{build_http_fetcher_config, HttpFetcher, OrgJsonFetcher};
pub use history::{
    get_record_by_did, get_record_by_id, normalize, organization_name, HistoryRecord, HistoryRecordRaw,
    ResolutionResult, UNKNOWN_ORGID,
};
pub use ipfs::{
    build_ipfs_fetcher_config, ByteStream, GatewayIpfsNode, IpfsFetcher, IpfsNode, IPFS_FETCH_TIMEOUT,
    MAX_IPFS_CONTENT_SIZE,
};
pub use keys::{KeyRecord, KeyRecordRaw, KeyType, Revocation, RevocationReason};
pub use resolver::{build_resolver_options, resolve_did, DidResolver, OrgIdResolver, ResolverContext};
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
pub use store::{Action, Collection, State, StateRecord};
pub use types::{
    DidDocumentMetadata,
    EvmChainConfig,
    FetcherConfig,
    ResolutionMetadata,
    ResolutionResponse,
    ResolverOptions,
};

/// Resolves a DID with a dApp wired from environment configuration
///
/// # Example
/// ```no_run
/// use orgid_dapp::{resolve, ResolutionResult};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let record = resolve(
///         "did:orgid:4:0x7b8e5b8ea43e4da2ae6c4af8e4ba4ee8a1aa2f77e5a5c7c0a4ea5ec0a3f2ed00",
///     ).await?;
///
///     if record.record.result == ResolutionResult::Ok {
///         println!("Resolved {}", record.record.name);
///     }
///     Ok(())
/// }
/// ```
pub async fn resolve(did: &str) -> DappResult<HistoryRecord> {
    let mut dapp = Dapp::from_config(DappConfig::from_env()?)?;
    dapp.resolve(did).await
}
