use crate::{BlockNumber, ChainScore};
use alloy_consensus::Header;
use alloy_primitives::{Address, B256, Bytes};
use alloy_rlp::{BufMut, Decodable, Encodable};
use std::hash::{Hash, Hasher};

/// An Ethereum block header together with its hash.
///
/// The hash is the keccak-256 of the header's RLP encoding and is computed
/// once, when the header is built or decoded. Two headers are equal exactly
/// when their hashes are equal.
#[derive(Clone, Debug)]
pub struct BlockHeader {
    header: Header,
    hash: B256,
}

impl BlockHeader {
    pub fn new(header: Header) -> Self {
        let hash = header.hash_slow();
        Self { header, hash }
    }

    /// Build a genesis header (number 0, zero parent).
    pub fn genesis(difficulty: ChainScore, gas_limit: u64, timestamp: u64, extra_data: Bytes) -> Self {
        Self::new(Header {
            difficulty,
            gas_limit,
            timestamp,
            extra_data,
            ..Default::default()
        })
    }

    /// Build the child of `parent` with the given parameters.
    pub fn from_parent(
        parent: &BlockHeader,
        gas_limit: u64,
        difficulty: ChainScore,
        timestamp: u64,
        coinbase: Address,
    ) -> Self {
        Self::new(Header {
            parent_hash: parent.hash(),
            number: parent.number() + 1,
            state_root: parent.header.state_root,
            gas_limit,
            difficulty,
            timestamp,
            beneficiary: coinbase,
            ..Default::default()
        })
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    pub fn difficulty(&self) -> ChainScore {
        self.header.difficulty
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn coinbase(&self) -> Address {
        self.header.beneficiary
    }

    pub fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }

    pub fn is_genesis(&self) -> bool {
        self.header.number == 0
    }

    pub fn inner(&self) -> &Header {
        &self.header
    }

    pub fn into_inner(self) -> Header {
        self.header
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for BlockHeader {}

impl Hash for BlockHeader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl From<Header> for BlockHeader {
    fn from(header: Header) -> Self {
        Self::new(header)
    }
}

impl Encodable for BlockHeader {
    fn encode(&self, out: &mut dyn BufMut) {
        self.header.encode(out);
    }

    fn length(&self) -> usize {
        self.header.length()
    }
}

impl Decodable for BlockHeader {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Header::decode(buf).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn genesis() -> BlockHeader {
        BlockHeader::genesis(U256::from(17_179_869_184u64), 5000, 0, Bytes::default())
    }

    #[test]
    fn test_from_parent_links_to_parent() {
        let genesis = genesis();
        let child = BlockHeader::from_parent(&genesis, 5000, U256::from(1000), 15, Address::ZERO);

        assert_eq!(child.parent_hash(), genesis.hash());
        assert_eq!(child.number(), 1);
        assert!(!child.is_genesis());
    }

    #[test]
    fn test_hash_depends_on_difficulty() {
        let genesis = genesis();
        let a = BlockHeader::from_parent(&genesis, 5000, U256::from(1000), 15, Address::ZERO);
        let b = BlockHeader::from_parent(&genesis, 5000, U256::from(1001), 15, Address::ZERO);

        assert_ne!(a.hash(), b.hash());
        assert_ne!(a, b);
    }

    #[test]
    fn test_decoded_header_keeps_hash() {
        let genesis = genesis();
        let child = BlockHeader::from_parent(&genesis, 5000, U256::from(1000), 15, Address::ZERO);

        let encoded = alloy_rlp::encode(&child);
        let decoded = BlockHeader::decode(&mut encoded.as_slice()).unwrap();

        assert_eq!(decoded.hash(), child.hash());
        assert_eq!(decoded.inner(), child.inner());
    }
}
