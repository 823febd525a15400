use alloy_primitives::B256;
use chain::{HeaderStore, StoreError};
use containers::{BlockHeader, BlockNumber};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("peer returned no headers")]
    Empty,

    #[error("peer returned {returned} headers, {requested} were requested")]
    TooMany { requested: u64, returned: usize },

    #[error("batch starts at #{actual}, #{expected} was requested")]
    WrongStart {
        expected: BlockNumber,
        actual: BlockNumber,
    },

    #[error("header #{number} follows #{previous}")]
    NonContiguous {
        previous: BlockNumber,
        number: BlockNumber,
    },

    #[error("parent {parent} of header #{number} is not the header before it")]
    BrokenLink { number: BlockNumber, parent: B256 },

    /// The batch is well formed but does not attach to anything stored.
    #[error("parent {parent} of header #{number} is unknown")]
    UnknownAncestor { number: BlockNumber, parent: B256 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Check that `headers` answers a forward query for `requested` headers at
/// `start` and links onto the stored chain.
///
/// The first header must be stored already or have a stored parent; every
/// later one must be the child of the header before it.
pub fn validate_batch<S>(
    store: &S,
    start: BlockNumber,
    requested: u64,
    headers: &[BlockHeader],
) -> Result<(), ValidationError>
where
    S: HeaderStore + ?Sized,
{
    let Some(first) = headers.first() else {
        return Err(ValidationError::Empty);
    };
    if headers.len() as u64 > requested {
        return Err(ValidationError::TooMany {
            requested,
            returned: headers.len(),
        });
    }
    if first.number() != start {
        return Err(ValidationError::WrongStart {
            expected: start,
            actual: first.number(),
        });
    }

    for pair in headers.windows(2) {
        let [previous, header] = pair else {
            continue;
        };
        if header.number() != previous.number() + 1 {
            return Err(ValidationError::NonContiguous {
                previous: previous.number(),
                number: header.number(),
            });
        }
        if header.parent_hash() != previous.hash() {
            return Err(ValidationError::BrokenLink {
                number: header.number(),
                parent: header.parent_hash(),
            });
        }
    }

    if !store.header_exists(&first.hash())? && !store.header_exists(&first.parent_hash())? {
        return Err(ValidationError::UnknownAncestor {
            number: first.number(),
            parent: first.parent_hash(),
        });
    }

    Ok(())
}
