use alloy_consensus::Header;
use alloy_primitives::{b256, b64, bytes, B256, U256};
use containers::BlockHeader;

/// LES protocol version spoken by this client.
pub const LES_PROTOCOL_VERSION: u32 = 1;

pub const MAINNET_NETWORK_ID: u64 = 1;
pub const ROPSTEN_NETWORK_ID: u64 = 3;

pub const MAINNET_GENESIS_HASH: B256 =
    b256!("d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3");
pub const ROPSTEN_GENESIS_HASH: B256 =
    b256!("41941023680923e0fe4d74a34bdac8141f2540e3ae90623718e47d66d1ca4a2d");

/// Identity of the chain a node is following. Peers whose handshake does not
/// match it are disconnected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    pub network_id: u64,
    pub genesis_hash: B256,
    pub protocol_version: u32,
}

impl ChainConfig {
    pub const fn new(network_id: u64, genesis_hash: B256) -> Self {
        Self {
            network_id,
            genesis_hash,
            protocol_version: LES_PROTOCOL_VERSION,
        }
    }
}

pub const MAINNET_CONFIG: ChainConfig = ChainConfig::new(MAINNET_NETWORK_ID, MAINNET_GENESIS_HASH);

pub const ROPSTEN_CONFIG: ChainConfig = ChainConfig::new(ROPSTEN_NETWORK_ID, ROPSTEN_GENESIS_HASH);

const EMPTY_OMMERS_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");
const EMPTY_TRIE_ROOT: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// Genesis header of the Ethereum main network.
pub fn mainnet_genesis() -> BlockHeader {
    BlockHeader::new(Header {
        ommers_hash: EMPTY_OMMERS_HASH,
        state_root: b256!("d7f8974fb5ac78d9ac099b9ad5018bedc2ce0a72dad1827a1709da30580f0544"),
        transactions_root: EMPTY_TRIE_ROOT,
        receipts_root: EMPTY_TRIE_ROOT,
        difficulty: U256::from(0x4_0000_0000u64),
        gas_limit: 5000,
        extra_data: bytes!("11bbe8db4e347b4e8c937c1c8370e4b5ed33adb3db69cbdb7a38e1e50b1b82fa"),
        nonce: b64!("0000000000000042"),
        ..Default::default()
    })
}

/// Genesis header of the Ropsten test network.
pub fn ropsten_genesis() -> BlockHeader {
    BlockHeader::new(Header {
        ommers_hash: EMPTY_OMMERS_HASH,
        state_root: b256!("217b0bbcfb72e2d57e28f33cb361b9983513177755dc3f33ce3e7022ed62b77b"),
        transactions_root: EMPTY_TRIE_ROOT,
        receipts_root: EMPTY_TRIE_ROOT,
        difficulty: U256::from(0x10_0000u64),
        gas_limit: 0x100_0000,
        extra_data: bytes!("3535353535353535353535353535353535353535353535353535353535353535"),
        nonce: b64!("0000000000000042"),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_networks_are_distinct() {
        assert_ne!(MAINNET_CONFIG, ROPSTEN_CONFIG);
        assert_eq!(ROPSTEN_CONFIG.network_id, 3);
        assert_eq!(MAINNET_CONFIG.protocol_version, LES_PROTOCOL_VERSION);
    }

    #[test]
    fn test_mainnet_genesis_hash() {
        let genesis = mainnet_genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.hash(), MAINNET_GENESIS_HASH);
    }
}
