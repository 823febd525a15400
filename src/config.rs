use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use alloy_primitives::{Bytes, U256};
use anyhow::{Context, Result, anyhow, ensure};
use chain::{ChainConfig, MAINNET_CONFIG, ROPSTEN_CONFIG, mainnet_genesis, ropsten_genesis};
use containers::{BlockHeader, PeerId};
use networking::sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Which chain to follow: a well-known network or a custom network id whose
/// genesis comes from [`GenesisConfig`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Ropsten,
    #[serde(untagged)]
    Custom(u64),
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "ropsten" => Ok(Network::Ropsten),
            id => id
                .parse()
                .map(Network::Custom)
                .map_err(|_| anyhow!("unknown network {id:?}")),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Ropsten => write!(f, "ropsten"),
            Network::Custom(id) => write!(f, "{id}"),
        }
    }
}

/// Genesis of a custom network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub difficulty: U256,
    pub gas_limit: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            difficulty: U256::from(131_072),
            gas_limit: 3_141_592,
            timestamp: 0,
            extra_data: Bytes::new(),
        }
    }
}

/// A peer to dial: `host:port`, optionally prefixed with the node's hex
/// public key and `@`, as in an enode URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerAddress {
    pub id: Option<PeerId>,
    pub address: String,
}

impl FromStr for PeerAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("enode://").unwrap_or(s);
        let (id, address) = match s.split_once('@') {
            Some((id, address)) => {
                let id: PeerId = id.parse().with_context(|| format!("invalid node id in {s:?}"))?;
                (Some(id), address)
            }
            None => (None, s),
        };
        ensure!(address.contains(':'), "peer address {address:?} has no port");
        Ok(Self {
            id,
            address: address.to_string(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: Network,
    pub genesis: GenesisConfig,
    /// Peers dialled at startup.
    pub peers: Vec<String>,
    /// Accept inbound LES connections on this address.
    pub listen: Option<SocketAddr>,
    pub sync: SyncConfig,
}

impl NodeConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// The chain to follow and its genesis header.
    pub fn chain(&self) -> (ChainConfig, BlockHeader) {
        match self.network {
            Network::Mainnet => (MAINNET_CONFIG, mainnet_genesis()),
            Network::Ropsten => (ROPSTEN_CONFIG, ropsten_genesis()),
            Network::Custom(network_id) => {
                let genesis = BlockHeader::genesis(
                    self.genesis.difficulty,
                    self.genesis.gas_limit,
                    self.genesis.timestamp,
                    self.genesis.extra_data.clone(),
                );
                (ChainConfig::new(network_id, genesis.hash()), genesis)
            }
        }
    }

    pub fn peer_addresses(&self) -> Result<Vec<PeerAddress>> {
        self.peers.iter().map(|peer| peer.parse()).collect()
    }
}
