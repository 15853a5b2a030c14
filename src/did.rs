//! DID parsing.
//!
//! This module splits DID strings of the form
//! `did:<method>:<network?>:<id>[?query][#fragment]` into their components.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DappError, DappResult};

/// Chain id used when the DID carries no network segment (Ethereum mainnet)
pub const DEFAULT_NETWORK: u64 = 1;

/// Represents a parsed DID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDid {
    /// The DID exactly as it was given
    pub did: String,
    /// The DID method, e.g. `orgid`
    pub method: String,
    /// Chain id of the network the identifier lives on
    pub network: u64,
    /// The method-specific organization identifier
    pub org_id: String,
    /// Optional query part, without the leading `?`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Optional fragment part, without the leading `#`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl ParsedDid {
    /// Parses and validates a DID string
    pub fn parse(did: &str) -> DappResult<Self> {
        let invalid = || DappError::InvalidDidFormat(did.to_string());

        let (rest, fragment) = match did.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (did, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (rest, None),
        };

        let parts: Vec<&str> = path.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 || parts[0] != "did" {
            return Err(invalid());
        }

        let method = parts[1];
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        // Network segment is optional
        let (network, org_id) = if parts.len() == 4 {
            let network = parts[2];
            if network.is_empty() || !network.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            // Network 0 stands for the default network
            let network = match network.parse::<u64>().map_err(|_| invalid())? {
                0 => DEFAULT_NETWORK,
                network => network,
            };
            (network, parts[3])
        } else {
            (DEFAULT_NETWORK, parts[2])
        };

        if org_id.is_empty() || org_id.contains('/') {
            return Err(invalid());
        }

        Ok(Self {
            did: did.to_string(),
            method: method.to_string(),
            network,
            org_id: org_id.to_string(),
            query,
            fragment,
        })
    }

    /// The canonical `did:<method>:<network>:<id>` form, without query or fragment
    pub fn canonical(&self) -> String {
        format!("did:{}:{}:{}", self.method, self.network, self.org_id)
    }
}

impl fmt::Display for ParsedDid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.did)
    }
}

/// Parses a DID string, failing with [`DappError::InvalidDidFormat`] on malformed input
pub fn parse_did(did: &str) -> DappResult<ParsedDid> {
    ParsedDid::parse(did)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORG_ID: &str = "0x7b8e5b8ea43e4da2ae6c4af8e4ba4ee8a1aa2f77e5a5c7c0a4ea5ec0a3f2ed00";

    #[test]
    fn test_did_parsing() {
        let with_network = format!("did:orgid:4:{}", ORG_ID);
        let without_network = format!("did:orgid:{}", ORG_ID);
        let with_query = format!("did:orgid:3:{}?versionId=2#key-1", ORG_ID);
        let test_cases = vec![
            (with_network.as_str(), ("orgid", 4, None, None)),
            (without_network.as_str(), ("orgid", 1, None, None)),
            (with_query.as_str(), ("orgid", 3, Some("versionId=2"), Some("key-1"))),
        ];

        for (input, expected) in test_cases {
            let parsed = ParsedDid::parse(input).unwrap();
            assert_eq!(parsed.did, input);
            assert_eq!(parsed.method, expected.0);
            assert_eq!(parsed.network, expected.1);
            assert_eq!(parsed.org_id, ORG_ID);
            assert_eq!(parsed.query.as_deref(), expected.2);
            assert_eq!(parsed.fragment.as_deref(), expected.3);
        }
    }

    #[test]
    fn test_invalid_did_format() {
        let invalid_dids = vec![
            "",
            "did",
            "did:orgid",
            "did:orgid:",
            "orgid:1:0xabc",
            "did::1:0xabc",
            "did:org-id:1:0xabc",
            "did:orgid:ropsten:0xabc",
            "did:orgid:1:0xabc:extra",
            "did:orgid:1:0xabc/path",
        ];

        for did in invalid_dids {
            assert!(
                matches!(ParsedDid::parse(did), Err(DappError::InvalidDidFormat(_))),
                "{did} should be rejected"
            );
        }
    }

    #[test]
    fn test_canonical_round_trip() {
        let test_cases = vec![
            ("orgid", 1u64, "0xabc"),
            ("orgid", 4, ORG_ID),
            ("example", 1337, "abcDEF123"),
        ];

        for (method, network, id) in test_cases {
            let did = format!("did:{}:{}:{}", method, network, id);
            let parsed = parse_did(&did).unwrap();
            assert_eq!(parsed.canonical(), did);
            assert_eq!(parse_did(&parsed.canonical()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_default_network_canonical_form() {
        let parsed = parse_did("did:orgid:0xabc#owner").unwrap();
        assert_eq!(parsed.network, DEFAULT_NETWORK);
        assert_eq!(parsed.canonical(), "did:orgid:1:0xabc");
    }

    #[test]
    fn test_zero_network_is_default_network() {
        let parsed = parse_did("did:orgid:0:0xabc").unwrap();
        assert_eq!(parsed.network, DEFAULT_NETWORK);
        assert_eq!(parsed.canonical(), "did:orgid:1:0xabc");
        assert_eq!(parse_did("did:orgid:000:0xabc").unwrap().network, DEFAULT_NETWORK);
    }
}
