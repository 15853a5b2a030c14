//! Key-management records.
//!
//! Keys are Ethereum account addresses registered under a unique tag, which
//! can later be revoked with a reason.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DappError, DappResult};

/// Verification method types a key may have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    EcdsaSecp256k1VerificationKey2019,
}

/// Why a key was revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevocationReason {
    KeyCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    PrivilegeWithdrawn,
}

impl RevocationReason {
    pub const ALL: [RevocationReason; 5] = [
        RevocationReason::KeyCompromise,
        RevocationReason::AffiliationChanged,
        RevocationReason::Superseded,
        RevocationReason::CessationOfOperation,
        RevocationReason::PrivilegeWithdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::KeyCompromise => "keyCompromise",
            RevocationReason::AffiliationChanged => "affiliationChanged",
            RevocationReason::Superseded => "superseded",
            RevocationReason::CessationOfOperation => "cessationOfOperation",
            RevocationReason::PrivilegeWithdrawn => "privilegeWithdrawn",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationReason {
    type Err = DappError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == s)
            .ok_or_else(|| DappError::InvalidRecord(format!("Unknown revocation reason: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revocation {
    pub reason: RevocationReason,
    pub invalidity_date: DateTime<Utc>,
}

/// A key before it gets an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecordRaw {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    /// Ethereum account address
    pub public_key: String,
    /// Unique across records
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<Revocation>,
}

/// A stored key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: String,
    #[serde(flatten)]
    pub key: KeyRecordRaw,
}

impl KeyRecord {
    pub fn new(id: String, key: KeyRecordRaw) -> Self {
        Self { id, key }
    }

    pub fn tag(&self) -> &str {
        &self.key.tag
    }

    pub fn is_revoked(&self) -> bool {
        self.key.revocation.is_some()
    }
}

/// Checks a key record before it is stored
pub fn validate_key(record: &KeyRecord) -> DappResult<()> {
    if record.id.is_empty() {
        return Err(DappError::InvalidRecord("key id must not be empty".to_string()));
    }
    if record.key.tag.trim().is_empty() {
        return Err(DappError::InvalidRecord("key tag must not be empty".to_string()));
    }
    if !is_account_address(&record.key.public_key) {
        return Err(DappError::InvalidRecord(format!(
            "public key must be an Ethereum account address: {}",
            record.key.public_key
        )));
    }
    Ok(())
}

fn is_account_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|digits| digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

pub fn find_key_by_id<'a>(keys: &'a [KeyRecord], id: &str) -> Option<&'a KeyRecord> {
    keys.iter().find(|k| k.id == id)
}

pub fn find_key_by_tag<'a>(keys: &'a [KeyRecord], tag: &str) -> Option<&'a KeyRecord> {
    keys.iter().find(|k| k.key.tag == tag)
}
