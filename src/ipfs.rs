//! IPFS content fetching.
//!
//! [`IpfsFetcher`] reads content-addressed ORG.JSON documents through an
//! [`IpfsNode`], racing the whole read against a hard timeout. The bundled
//! [`GatewayIpfsNode`] streams content from an HTTP gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base58::FromBase58;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use multihash::Multihash;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::{DappError, DappResult};
use crate::fetcher::{OrgJsonFetcher, IPFS_FETCHER_ID};
use crate::types::FetcherConfig;

/// How long a single CID read may take before it is abandoned
pub const IPFS_FETCH_TIMEOUT: Duration = Duration::from_secs(70);

/// Largest document accepted from IPFS
pub const MAX_IPFS_CONTENT_SIZE: usize = 4 * 1024 * 1024;

const SHA2_256: u64 = 0x12;
const IPFS_URI_PREFIX: &str = "ipfs://";

/// Stream of raw content chunks
pub type ByteStream = BoxStream<'static, DappResult<Vec<u8>>>;

/// A content-addressed read capability
#[async_trait]
pub trait IpfsNode: Send + Sync {
    /// Starts reading the content behind `cid`, which may carry a `/`-separated path
    async fn cat(&self, cid: &str) -> DappResult<ByteStream>;
}

/// Reads IPFS content through an HTTP gateway (`GET {gateway}/ipfs/{cid}`)
#[derive(Debug, Clone)]
pub struct GatewayIpfsNode {
    client: Client,
    gateway: Url,
}

impl GatewayIpfsNode {
    pub fn new(client: Client, gateway: &str) -> DappResult<Self> {
        let mut gateway = Url::parse(gateway)?;
        if !gateway.path().ends_with('/') {
            let path = format!("{}/", gateway.path());
            gateway.set_path(&path);
        }
        Ok(Self { client, gateway })
    }
}

#[async_trait]
impl IpfsNode for GatewayIpfsNode {
    async fn cat(&self, cid: &str) -> DappResult<ByteStream> {
        let url = self.gateway.join(&format!("ipfs/{}", cid))?;
        debug!(%url, "reading CID from gateway");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                DappError::IpfsUnavailable(e.to_string())
            } else {
                DappError::from(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(DappError::IpfsUnavailable(format!(
                "gateway returned HTTP {} for cid: {}",
                response.status(),
                cid
            )));
        }

        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(DappError::from)
            .boxed())
    }
}

/// Fetches and parses JSON documents stored on IPFS
#[derive(Clone)]
pub struct IpfsFetcher {
    node: Arc<dyn IpfsNode>,
    timeout: Duration,
}

impl IpfsFetcher {
    pub fn new(node: Arc<dyn IpfsNode>) -> Self {
        Self {
            node,
            timeout: IPFS_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads the CID (optionally `ipfs://`-prefixed, optionally with a path) and parses it as JSON
    pub async fn get(&self, uri: &str) -> DappResult<serde_json::Value> {
        let cid = normalize_cid(uri)?;

        let read = tokio::time::timeout(self.timeout, self.read_chunks(&cid)).await;
        let raw = match read {
            Ok(raw) => raw?,
            Err(_) => {
                warn!(%cid, timeout = ?self.timeout, "IPFS read timed out");
                return Err(DappError::FetchTimeout(cid));
            }
        };

        let text = String::from_utf8(raw).map_err(|_| {
            DappError::MalformedContent(format!("Content of the CID: {} is not valid UTF-8", cid))
        })?;

        serde_json::from_str(&text).map_err(|_| {
            DappError::MalformedContent(format!("Unable to parse ORGiD VC from the CID: {}", cid))
        })
    }

    async fn read_chunks(&self, cid: &str) -> DappResult<Vec<u8>> {
        let mut stream = self.node.cat(cid).await?;
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if buffer.len() + chunk.len() > MAX_IPFS_CONTENT_SIZE {
                return Err(DappError::MalformedContent(format!(
                    "Content of the CID: {} exceeds {} bytes",
                    cid, MAX_IPFS_CONTENT_SIZE
                )));
            }
            buffer.extend_from_slice(&chunk);
        }
        debug!(%cid, bytes = buffer.len(), "read CID content");
        Ok(buffer)
    }
}

#[async_trait]
impl OrgJsonFetcher for IpfsFetcher {
    async fn get_org_json(&self, uri: &str) -> DappResult<serde_json::Value> {
        self.get(uri).await
    }
}

/// Builds the descriptor of the IPFS fetcher bound to the given getter
pub fn build_ipfs_fetcher_config(getter: Arc<dyn OrgJsonFetcher>) -> FetcherConfig {
    FetcherConfig {
        id: IPFS_FETCHER_ID.to_string(),
        name: "ORG.JSON IPFS fetcher".to_string(),
        fetcher: getter,
    }
}

/// Strips an `ipfs://` prefix and validates the remaining CID and content path
pub fn normalize_cid(uri: &str) -> DappResult<String> {
    let invalid = || DappError::MalformedContent(format!("Invalid CID: {}", uri));

    let content = uri.trim();
    let content = content.strip_prefix(IPFS_URI_PREFIX).unwrap_or(content);
    let content = content.trim_end_matches('/');

    let (cid, path) = match content.split_once('/') {
        Some((cid, path)) => (cid, Some(path)),
        None => (content, None),
    };

    if cid.is_empty() || !cid.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    if let Some(path) = path {
        let bad_segment = |s: &str| s.is_empty() || s == "." || s == ".." || s.contains(&['?', '#', '\\'][..]);
        if path.split('/').any(bad_segment) {
            return Err(invalid());
        }
    }

    // CIDv0 is a bare base58btc sha2-256 multihash
    if cid.starts_with("Qm") {
        verify_cid_v0(cid)?;
    }

    Ok(content.to_string())
}

fn verify_cid_v0(cid: &str) -> DappResult<()> {
    let bytes = cid
        .from_base58()
        .map_err(|e| DappError::MalformedContent(format!("Invalid CID {}: {:?}", cid, e)))?;
    let multihash = Multihash::<64>::from_bytes(&bytes)
        .map_err(|e| DappError::MalformedContent(format!("Invalid CID {}: {}", cid, e)))?;

    if multihash.code() != SHA2_256 || multihash.size() != 32 {
        return Err(DappError::MalformedContent(format!(
            "Invalid CID {}: expected a sha2-256 multihash",
            cid
        )));
    }
    Ok(())
}
