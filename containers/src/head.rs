use crate::{BlockHeader, BlockNumber, ChainScore};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Tip of a header chain: which header it is and how heavy the chain is.
///
/// Used both for the local canonical head and for the head a peer advertises
/// in its Status or Announce messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainHead {
    /// Hash of the head header.
    pub hash: B256,
    /// Block number of the head header.
    pub number: BlockNumber,
    /// Total difficulty of the chain ending at the head.
    pub score: ChainScore,
}

impl ChainHead {
    pub fn new(hash: B256, number: BlockNumber, score: ChainScore) -> Self {
        Self { hash, number, score }
    }

    pub fn from_header(header: &BlockHeader, score: ChainScore) -> Self {
        Self::new(header.hash(), header.number(), score)
    }

    /// Whether this chain is strictly heavier than `other`.
    pub fn is_heavier_than(&self, other: &ChainHead) -> bool {
        self.score > other.score
    }
}
