use std::collections::{BTreeMap, HashMap};

use alloy_primitives::B256;
use containers::{BlockHeader, BlockNumber, ChainScore};
use parking_lot::RwLock;
use tracing::debug;

use crate::store::{HeaderStore, PersistOutcome, StoreError};

/// Header store kept entirely in memory.
///
/// Holds every header ever persisted (canonical or not), the score of each,
/// and the number -> hash index of the canonical chain.
#[derive(Debug)]
pub struct MemoryHeaderStore {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    headers: HashMap<B256, BlockHeader>,
    scores: HashMap<B256, ChainScore>,
    canonical: BTreeMap<BlockNumber, B256>,
    head: B256,
}

impl MemoryHeaderStore {
    /// Create a store whose only header is `genesis`.
    pub fn new(genesis: BlockHeader) -> Self {
        let hash = genesis.hash();
        let mut inner = Inner {
            headers: HashMap::new(),
            scores: HashMap::new(),
            canonical: BTreeMap::new(),
            head: hash,
        };
        inner.scores.insert(hash, genesis.difficulty());
        inner.canonical.insert(genesis.number(), hash);
        inner.headers.insert(hash, genesis);

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Number of stored headers, canonical or not.
    pub fn len(&self) -> usize {
        self.inner.read().headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().headers.is_empty()
    }
}

impl Inner {
    fn head_score(&self) -> ChainScore {
        self.scores.get(&self.head).copied().unwrap_or_default()
    }

    /// Make `hash` the canonical head, rewriting the number index back to the
    /// first ancestor that is already canonical.
    fn set_canonical_head(&mut self, hash: B256) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();
        let Some(head) = self.headers.get(&hash).cloned() else {
            return outcome;
        };

        let mut new_canonical = Vec::new();
        let mut current = head.clone();
        loop {
            if self.canonical.get(&current.number()) == Some(&current.hash()) {
                break;
            }
            new_canonical.push(current.clone());
            if current.is_genesis() {
                break;
            }
            match self.headers.get(&current.parent_hash()) {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
        new_canonical.reverse();

        for header in &new_canonical {
            if let Some(old) = self.canonical.insert(header.number(), header.hash()) {
                if let Some(old) = self.headers.get(&old) {
                    outcome.old_canonical.push(old.clone());
                }
            }
        }

        let stale: Vec<BlockNumber> = self
            .canonical
            .range(head.number() + 1..)
            .map(|(number, _)| *number)
            .collect();
        for number in stale {
            if let Some(old) = self.canonical.remove(&number) {
                if let Some(old) = self.headers.get(&old) {
                    outcome.old_canonical.push(old.clone());
                }
            }
        }

        self.head = hash;
        outcome.new_canonical = new_canonical;
        outcome
    }
}

impl HeaderStore for MemoryHeaderStore {
    fn canonical_head(&self) -> Result<BlockHeader, StoreError> {
        let inner = self.inner.read();
        inner
            .headers
            .get(&inner.head)
            .cloned()
            .ok_or(StoreError::NoCanonicalHead)
    }

    fn canonical_header_by_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<BlockHeader>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .canonical
            .get(&number)
            .and_then(|hash| inner.headers.get(hash))
            .cloned())
    }

    fn header_by_hash(&self, hash: &B256) -> Result<Option<BlockHeader>, StoreError> {
        Ok(self.inner.read().headers.get(hash).cloned())
    }

    fn score(&self, hash: &B256) -> Result<Option<ChainScore>, StoreError> {
        Ok(self.inner.read().scores.get(hash).copied())
    }

    fn header_exists(&self, hash: &B256) -> Result<bool, StoreError> {
        Ok(self.inner.read().headers.contains_key(hash))
    }

    fn persist_headers(&self, headers: Vec<BlockHeader>) -> Result<PersistOutcome, StoreError> {
        let mut inner = self.inner.write();

        // Check the whole batch links up before touching anything.
        let mut staged: Vec<(BlockHeader, ChainScore)> = Vec::with_capacity(headers.len());
        let mut staged_scores: HashMap<B256, ChainScore> = HashMap::new();
        for header in headers {
            let hash = header.hash();
            if inner.headers.contains_key(&hash) || staged_scores.contains_key(&hash) {
                continue;
            }
            let parent_score = staged_scores
                .get(&header.parent_hash())
                .or_else(|| inner.scores.get(&header.parent_hash()))
                .copied()
                .ok_or(StoreError::ParentNotFound {
                    number: header.number(),
                    parent: header.parent_hash(),
                })?;
            let score = parent_score + header.difficulty();
            staged_scores.insert(hash, score);
            staged.push((header, score));
        }

        let mut outcome = PersistOutcome::default();
        for (header, score) in staged {
            let hash = header.hash();
            inner.scores.insert(hash, score);
            inner.headers.insert(hash, header);
            outcome.imported += 1;

            if score > inner.head_score() {
                outcome.merge(inner.set_canonical_head(hash));
            }
        }

        if outcome.is_reorg() {
            debug!(
                head = %inner.head,
                dropped = outcome.old_canonical.len(),
                "Canonical chain reorganized"
            );
        }

        Ok(outcome)
    }
}
