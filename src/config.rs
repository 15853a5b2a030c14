//! Configuration management for the ORGiD dApp core

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DappError, DappResult};
use crate::ipfs::IPFS_FETCH_TIMEOUT;

const ENV_PREFIX: &str = "ORGID_DAPP_";
const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io";
const DEFAULT_DATA_FILE: &str = "orgid-dapp.json";

/// One entry of the static network registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// ORGiD registry contract address
    pub address: String,
    /// JSON-RPC endpoint
    pub rpc: String,
    pub block_explorer: String,
}

/// Main dApp configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappConfig {
    pub infura_id: Option<String>,
    pub default_network_id: u64,
    pub networks: Vec<NetworkConfig>,
    pub ipfs_gateway: String,
    #[serde(with = "duration_secs")]
    pub ipfs_timeout: Duration,
    /// JSON file holding history and key records
    pub data_file: PathBuf,
}

impl Default for DappConfig {
    fn default() -> Self {
        Self {
            infura_id: None,
            default_network_id: 1,
            networks: Vec::new(),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            ipfs_timeout: IPFS_FETCH_TIMEOUT,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
        }
    }
}

/// Networks the dApp knows by name: (name, chain id, block explorer)
const KNOWN_NETWORKS: &[(&str, u64, &str)] = &[
    ("mainnet", 1, "https://etherscan.io"),
    ("ropsten", 3, "https://ropsten.etherscan.io"),
    ("rinkeby", 4, "https://rinkeby.etherscan.io"),
    ("goerli", 5, "https://goerli.etherscan.io"),
];

impl DappConfig {
    /// Load configuration from environment variables (and `.env`)
    ///
    /// A known network is registered only when its registry contract address is
    /// provided in `ORGID_DAPP_CONTRACT_<chainId>`. Its RPC endpoint is taken
    /// from `ORGID_DAPP_RPC_<chainId>`, or built from `ORGID_DAPP_INFURA_ID`.
    pub fn from_env() -> DappResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup (keys without prefix)
    pub fn from_lookup<F>(lookup: F) -> DappResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let infura_id = lookup("INFURA_ID").filter(|v| !v.is_empty());

        let default_network_id = match lookup("NETWORK_ID") {
            Some(v) => v
                .parse()
                .map_err(|_| DappError::Config(format!("NETWORK_ID must be a chain id, got: {}", v)))?,
            None => defaults.default_network_id,
        };

        let mut networks = Vec::new();
        for (name, chain_id, block_explorer) in KNOWN_NETWORKS {
            let Some(address) = lookup(&format!("CONTRACT_{}", chain_id)) else {
                continue;
            };
            let rpc = match (lookup(&format!("RPC_{}", chain_id)), &infura_id) {
                (Some(rpc), _) => rpc,
                (None, Some(infura_id)) => format!("https://{}.infura.io/v3/{}", name, infura_id),
                (None, None) => {
                    return Err(DappError::Config(format!(
                        "RPC_{} or INFURA_ID must be provided for network {}",
                        chain_id, name
                    )))
                }
            };
            networks.push(NetworkConfig {
                name: name.to_string(),
                chain_id: *chain_id,
                address,
                rpc,
                block_explorer: block_explorer.to_string(),
            });
        }

        let ipfs_gateway = lookup("IPFS_GATEWAY").unwrap_or(defaults.ipfs_gateway);
        let ipfs_timeout = match lookup("IPFS_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| DappError::Config(format!("IPFS_TIMEOUT_SECS must be a number, got: {}", v)))?,
            ),
            None => defaults.ipfs_timeout,
        };
        let data_file = lookup("DATA_FILE").map(PathBuf::from).unwrap_or(defaults.data_file);

        Ok(Self {
            infura_id,
            default_network_id,
            networks,
            ipfs_gateway,
            ipfs_timeout,
            data_file,
        })
    }

    /// Looks a network up by chain id
    pub fn network_by_chain_id(&self, chain_id: u64) -> DappResult<&NetworkConfig> {
        self.networks
            .iter()
            .find(|n| n.chain_id == chain_id)
            .ok_or(DappError::UnknownNetwork(chain_id))
    }

    pub fn default_network(&self) -> DappResult<&NetworkConfig> {
        self.network_by_chain_id(self.default_network_id)
    }

    pub fn network_ids(&self) -> Vec<u64> {
        self.networks.iter().map(|n| n.chain_id).collect()
    }

    pub fn network_names(&self) -> Vec<&str> {
        self.networks.iter().map(|n| n.name.as_str()).collect()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
