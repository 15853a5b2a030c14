//! ORGiD registry lookups over Ethereum JSON-RPC.
//!
//! The registry contract exposes
//! `getOrgId(bytes32) returns (bool exists, bytes32 orgId, string orgJsonUri, address owner)`.
//! Calls are issued with `eth_call`; the ABI encoding of the call and the
//! decoding of its result are done here by hand since only this one method
//! is needed.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{DappError, DappResult};
use crate::types::EvmChainConfig;

/// First four bytes of `keccak256("getOrgId(bytes32)")`
pub const GET_ORG_ID_SELECTOR: [u8; 4] = [0x03, 0x76, 0x40, 0xdf];

const WORD: usize = 32;

/// An ORGiD as registered on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgIdRecord {
    /// `0x`-prefixed 32-byte hex identifier
    pub org_id: String,
    /// Where the ORG.JSON credential lives (HTTP URL or IPFS CID)
    pub org_json_uri: String,
    /// `0x`-prefixed owner address
    pub owner: String,
}

/// Read access to the ORGiD registry
#[async_trait]
pub trait OrgIdRegistry: Send + Sync {
    /// Looks an ORGiD up; `None` when it is not registered
    async fn get_org_id(&self, org_id: &str) -> DappResult<Option<OrgIdRecord>>;
}

/// Registry client talking to a JSON-RPC endpoint
#[derive(Debug)]
pub struct JsonRpcRegistry {
    client: Client,
    chain: EvmChainConfig,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl JsonRpcRegistry {
    pub fn new(client: Client, chain: EvmChainConfig) -> Self {
        Self {
            client,
            chain,
            next_id: AtomicU64::new(1),
        }
    }

    async fn eth_call(&self, data: &[u8]) -> DappResult<Vec<u8>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "eth_call",
            "params": [
                {
                    "to": self.chain.contract_address,
                    "data": format!("0x{}", hex::encode(data)),
                },
                "latest"
            ]
        });

        let response = self
            .client
            .post(self.chain.rpc.as_str())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DappError::ResolutionFailed(format!(
                "HTTP {} from JSON-RPC endpoint of chain {}",
                response.status(),
                self.chain.chain_id
            )));
        }

        let response: RpcResponse = response.json().await?;
        if let Some(error) = response.error {
            return Err(DappError::ResolutionFailed(format!(
                "JSON-RPC error {}: {}",
                error.code, error.message
            )));
        }

        let result = response
            .result
            .ok_or_else(|| DappError::ResolutionFailed("JSON-RPC response without result".to_string()))?;
        decode_hex(&result)
    }
}

#[async_trait]
impl OrgIdRegistry for JsonRpcRegistry {
    async fn get_org_id(&self, org_id: &str) -> DappResult<Option<OrgIdRecord>> {
        debug!(org_id, chain_id = self.chain.chain_id, "calling getOrgId");
        let data = encode_get_org_id(org_id)?;
        let result = self.eth_call(&data).await?;
        decode_get_org_id(&result)
    }
}

/// Parses a `0x`-prefixed 32-byte hex ORGiD
pub fn parse_org_id(org_id: &str) -> DappResult<[u8; 32]> {
    let invalid = || DappError::InvalidDidFormat(format!("ORGiD must be a 0x-prefixed 32-byte hex string: {}", org_id));
    let digits = org_id.strip_prefix("0x").ok_or_else(invalid)?;
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

/// ABI-encodes a `getOrgId(bytes32)` call
pub fn encode_get_org_id(org_id: &str) -> DappResult<Vec<u8>> {
    let id = parse_org_id(org_id)?;
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&GET_ORG_ID_SELECTOR);
    data.extend_from_slice(&id);
    Ok(data)
}

/// Decodes the `(bool, bytes32, string, address)` result of `getOrgId`
pub fn decode_get_org_id(data: &[u8]) -> DappResult<Option<OrgIdRecord>> {
    let exists = word(data, 0)?.iter().any(|b| *b != 0);
    if !exists {
        return Ok(None);
    }

    let org_id = format!("0x{}", hex::encode(word(data, 1)?));

    let offset = word_to_usize(word(data, 2)?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| abi_error("string offset out of bounds"))?;
    let len_word = data
        .get(offset..start)
        .ok_or_else(|| abi_error("string offset out of bounds"))?;
    let len = word_to_usize(len_word)?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| abi_error("string length out of bounds"))?;
    let uri_bytes = data
        .get(start..end)
        .ok_or_else(|| abi_error("string length out of bounds"))?;
    let org_json_uri = String::from_utf8(uri_bytes.to_vec()).map_err(|_| abi_error("orgJsonUri is not UTF-8"))?;

    let owner = format!("0x{}", hex::encode(&word(data, 3)?[12..]));

    Ok(Some(OrgIdRecord {
        org_id,
        org_json_uri,
        owner,
    }))
}

fn word(data: &[u8], index: usize) -> DappResult<&[u8]> {
    data.get(index * WORD..(index + 1) * WORD)
        .ok_or_else(|| abi_error("result too short"))
}

fn word_to_usize(word: &[u8]) -> DappResult<usize> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(abi_error("integer overflow"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| abi_error("integer overflow"))
}

fn decode_hex(value: &str) -> DappResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| abi_error(&e.to_string()))
}

fn abi_error(reason: &str) -> DappError {
    DappError::ResolutionFailed(format!("Invalid getOrgId result: {}", reason))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;

    pub(crate) const ORG_ID: &str = "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
    pub(crate) const OWNER: &str = "0x00a0636fef4a2b4b5e7e2b1e3b2c9f1d7c6e5f41";

    /// ABI-encodes a `getOrgId` result the way the contract returns it
    pub(crate) fn encode_get_org_id_result(exists: bool, org_id: &str, uri: &str, owner: &str) -> Vec<u8> {
        let mut data = vec![0u8; 4 * WORD];
        data[WORD - 1] = exists as u8;
        data[WORD..2 * WORD].copy_from_slice(&parse_org_id(org_id).unwrap());
        data[3 * WORD - 1] = (4 * WORD) as u8;
        let owner = hex::decode(owner.trim_start_matches("0x")).unwrap();
        data[4 * WORD - 20..].copy_from_slice(&owner);

        let mut len = [0u8; WORD];
        len[WORD - 8..].copy_from_slice(&(uri.len() as u64).to_be_bytes());
        data.extend_from_slice(&len);
        let mut tail = uri.as_bytes().to_vec();
        tail.resize(uri.len().div_ceil(WORD) * WORD, 0);
        data.extend_from_slice(&tail);
        data
    }

    fn test_chain(rpc: String) -> EvmChainConfig {
        EvmChainConfig {
            chain_id: 4,
            blockchain_type: "eip155".to_string(),
            contract_address: "0x0000000000000000000000000000000000000a11".to_string(),
            rpc,
        }
    }

    #[test]
    fn test_encode_call() {
        let data = encode_get_org_id(ORG_ID).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &GET_ORG_ID_SELECTOR);
        assert_eq!(format!("0x{}", hex::encode(&data[4..])), ORG_ID);
    }

    #[test]
    fn test_invalid_org_ids() {
        for invalid in ["", "0x", "1234", "0x1234", "0xzz34567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef"] {
            assert!(
                matches!(parse_org_id(invalid), Err(DappError::InvalidDidFormat(_))),
                "{invalid} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_result() {
        let uri = "ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
        let data = encode_get_org_id_result(true, ORG_ID, uri, OWNER);

        let record = decode_get_org_id(&data).unwrap().unwrap();
        assert_eq!(record.org_id, ORG_ID);
        assert_eq!(record.org_json_uri, uri);
        assert_eq!(record.owner, OWNER);
    }

    #[test]
    fn test_decode_missing_org_id() {
        let data = encode_get_org_id_result(false, &format!("0x{}", "00".repeat(32)), "", &format!("0x{}", "00".repeat(20)));
        assert_eq!(decode_get_org_id(&data).unwrap(), None);
    }

    #[test]
    fn test_decode_truncated_result() {
        let data = encode_get_org_id_result(true, ORG_ID, "https://example.com/org.json", OWNER);

        assert!(matches!(decode_get_org_id(&data[..64]), Err(DappError::ResolutionFailed(_))));
        assert!(matches!(decode_get_org_id(&data[..4 * WORD + 16]), Err(DappError::ResolutionFailed(_))));
    }

    #[tokio::test]
    async fn test_json_rpc_lookup() {
        let uri = "https://example.com/org.json";
        let result = format!("0x{}", hex::encode(encode_get_org_id_result(true, ORG_ID, uri, OWNER)));

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_includes("eth_call");
                then.status(200).json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": result }));
            })
            .await;

        let registry = JsonRpcRegistry::new(Client::new(), test_chain(server.url("/")));
        let record = registry.get_org_id(ORG_ID).await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(record.org_json_uri, uri);
        assert_eq!(record.owner, OWNER);
    }

    #[tokio::test]
    async fn test_json_rpc_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32000, "message": "execution reverted" }
                }));
            })
            .await;

        let registry = JsonRpcRegistry::new(Client::new(), test_chain(server.url("/")));
        let err = registry.get_org_id(ORG_ID).await.unwrap_err();

        assert!(matches!(err, DappError::ResolutionFailed(ref msg) if msg.contains("execution reverted")));
    }
}
