//! Error types for ORGiD resolution and dApp state operations.
//!
//! Every fallible operation in the crate returns [`DappResult`]. Resolution-time
//! failures are additionally turned into ERROR history records by the
//! [`Dapp`](crate::Dapp) facade, so most of these never reach a user as a
//! hard failure.

use thiserror::Error;
use url::ParseError;

/// Errors that can occur while resolving ORGiD DIDs or managing dApp state
#[derive(Error, Debug)]
pub enum DappError {
    /// The DID does not match `did:<method>:<network?>:<id>[?query][#fragment]`
    #[error("Invalid DID format: {0}")]
    InvalidDidFormat(String),

    /// The chain id is not present in the network registry
    #[error("Network not found in the configuration: {0}")]
    UnknownNetwork(u64),

    /// The IPFS node could not be reached
    #[error("IPFS node is not accessible: {0}")]
    IpfsUnavailable(String),

    /// The content read did not finish before the timeout
    #[error("Timeout occurred during getting cid: {0}")]
    FetchTimeout(String),

    /// Fetched content is not valid UTF-8 JSON, or a CID is malformed
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    /// Catch-all failure reported by the resolver
    #[error("DID resolution failed: {0}")]
    ResolutionFailed(String),

    /// A history or key record failed validation
    #[error("Record validation error: {0}")]
    InvalidRecord(String),

    /// No history record with the given id
    #[error("Resolution record with id: {0} does not exists")]
    RecordNotFound(String),

    /// No key with the given id or tag
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key tag is already taken
    #[error("Provided tag already used, pick another one: {0}")]
    DuplicateTag(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistent storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlError(#[from] ParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type DappResult<T> = Result<T, DappError>;
