use alloy_primitives::B256;
use containers::{BlockHeader, BlockNumber, ChainHead, ChainScore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("parent {parent} of header #{number} is not stored")]
    ParentNotFound { number: BlockNumber, parent: B256 },

    #[error("no canonical head")]
    NoCanonicalHead,

    #[error("score of stored header {0} is missing")]
    MissingScore(B256),

    #[error("header store unavailable: {0}")]
    Unavailable(String),
}

/// Result of persisting headers: how the canonical chain moved.
///
/// `new_canonical` lists headers that became canonical, lowest number first.
/// `old_canonical` lists headers that stopped being canonical. A non-empty
/// `old_canonical` means the write caused a reorg.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub imported: usize,
    pub new_canonical: Vec<BlockHeader>,
    pub old_canonical: Vec<BlockHeader>,
}

impl PersistOutcome {
    pub fn is_reorg(&self) -> bool {
        !self.old_canonical.is_empty()
    }

    pub(crate) fn merge(&mut self, other: PersistOutcome) {
        self.imported += other.imported;
        // A later head change may undo an earlier one within the same batch.
        self.new_canonical
            .retain(|header| !other.old_canonical.contains(header));
        self.new_canonical.extend(other.new_canonical);
        self.old_canonical.extend(other.old_canonical);
    }
}

/// Append-only indexed header chain.
///
/// Implementations serialize their own mutations: `persist_headers` is
/// atomic with respect to concurrent readers and writers, and recomputes the
/// canonical chain by cumulative score (strictly higher score wins).
pub trait HeaderStore: Send + Sync + 'static {
    fn canonical_head(&self) -> Result<BlockHeader, StoreError>;

    fn canonical_header_by_number(&self, number: BlockNumber)
    -> Result<Option<BlockHeader>, StoreError>;

    fn header_by_hash(&self, hash: &B256) -> Result<Option<BlockHeader>, StoreError>;

    /// Total difficulty of the chain ending at `hash`, if the header is stored.
    fn score(&self, hash: &B256) -> Result<Option<ChainScore>, StoreError>;

    /// Store `headers`, in order. Headers already present are skipped. Fails
    /// without writing anything if any header's parent is neither stored nor
    /// earlier in the batch.
    fn persist_headers(&self, headers: Vec<BlockHeader>) -> Result<PersistOutcome, StoreError>;

    fn persist_header(&self, header: BlockHeader) -> Result<PersistOutcome, StoreError> {
        self.persist_headers(vec![header])
    }

    fn header_exists(&self, hash: &B256) -> Result<bool, StoreError> {
        Ok(self.header_by_hash(hash)?.is_some())
    }

    /// Up to `count` canonical headers starting at `start`, stopping early at
    /// the canonical head.
    fn canonical_range(
        &self,
        start: BlockNumber,
        count: usize,
    ) -> Result<Vec<BlockHeader>, StoreError> {
        let mut headers = Vec::with_capacity(count);
        for number in (start..).take(count) {
            match self.canonical_header_by_number(number)? {
                Some(header) => headers.push(header),
                None => break,
            }
        }
        Ok(headers)
    }

    /// Canonical head together with its score.
    fn canonical_chain_head(&self) -> Result<ChainHead, StoreError> {
        let head = self.canonical_head()?;
        let score = self
            .score(&head.hash())?
            .ok_or(StoreError::MissingScore(head.hash()))?;
        Ok(ChainHead::from_header(&head, score))
    }
}
