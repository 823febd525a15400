use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use chain::{ChainConfig, HeaderStore, MemoryHeaderStore};
use containers::{BlockHeader, Status};

pub const TEST_NETWORK_ID: u64 = 1337;
pub const TEST_DIFFICULTY: u64 = 131_072;

pub fn genesis() -> BlockHeader {
    BlockHeader::genesis(U256::from(TEST_DIFFICULTY), 3_141_592, 0, Bytes::from_static(b"les"))
}

/// `count` children of `parent`, each with the given difficulty.
pub fn extend_chain(parent: &BlockHeader, count: usize, difficulty: u64) -> Vec<BlockHeader> {
    let mut headers = Vec::with_capacity(count);
    let mut parent = parent.clone();
    for _ in 0..count {
        let child = BlockHeader::from_parent(
            &parent,
            3_141_592,
            U256::from(difficulty),
            parent.timestamp() + 15,
            Address::ZERO,
        );
        headers.push(child.clone());
        parent = child;
    }
    headers
}

/// Sibling of the canonical header at `parent.number() + 1`, heavier by one.
pub fn heavier_child(parent: &BlockHeader) -> BlockHeader {
    BlockHeader::from_parent(
        parent,
        3_141_592,
        U256::from(TEST_DIFFICULTY + 1),
        parent.timestamp() + 16,
        Address::repeat_byte(0x0c),
    )
}

/// Store holding genesis plus `len` canonical headers. The returned vector
/// starts with genesis, so `chain[n]` is block `n`.
pub fn chain_store(len: usize) -> (Arc<MemoryHeaderStore>, Vec<BlockHeader>) {
    let genesis = genesis();
    let store = MemoryHeaderStore::new(genesis.clone());
    let mut chain = vec![genesis.clone()];
    chain.extend(extend_chain(&genesis, len, TEST_DIFFICULTY));
    store
        .persist_headers(chain[1..].to_vec())
        .expect("test chain links to genesis");
    (Arc::new(store), chain)
}

pub fn chain_config() -> ChainConfig {
    ChainConfig::new(TEST_NETWORK_ID, genesis().hash())
}

pub fn local_status<S: HeaderStore + ?Sized>(store: &S) -> Status {
    let config = chain_config();
    let head = store.canonical_chain_head().expect("store has a head");
    Status::new(config.protocol_version, config.network_id, head, config.genesis_hash)
}
