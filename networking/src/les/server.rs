use chain::{HeaderStore, StoreError};
use containers::{BlockHeader, BlockNumber, HashOrNumber};

use super::commands::HeaderQuery;

/// Most headers returned for a single query, whatever the peer asks for.
pub const MAX_HEADERS_SERVE: u64 = 192;

/// Canonical headers answering `query`, never above `limit`.
///
/// Walks from the anchor `skip + 1` numbers at a time, towards genesis when
/// `query.reverse` is set. A hash anchor must name a canonical header. The
/// walk stops at the first number with no canonical header.
pub fn answer_query<S>(
    store: &S,
    query: &HeaderQuery,
    limit: BlockNumber,
) -> Result<Vec<BlockHeader>, StoreError>
where
    S: HeaderStore + ?Sized,
{
    let anchor = match query.block_number_or_hash {
        HashOrNumber::Number(number) => number,
        HashOrNumber::Hash(hash) => match store.header_by_hash(&hash)? {
            Some(header)
                if store
                    .canonical_header_by_number(header.number())?
                    .is_some_and(|canonical| canonical.hash() == hash) =>
            {
                header.number()
            }
            _ => return Ok(Vec::new()),
        },
    };

    let max_headers = query.max_headers.min(MAX_HEADERS_SERVE);
    let stride = query.skip.saturating_add(1);
    let mut headers = Vec::new();
    let mut next = Some(anchor);

    while let Some(number) = next {
        if headers.len() as u64 >= max_headers || number > limit {
            break;
        }
        match store.canonical_header_by_number(number)? {
            Some(header) => headers.push(header),
            None => break,
        }
        next = if query.reverse {
            number.checked_sub(stride)
        } else {
            number.checked_add(stride)
        };
    }

    Ok(headers)
}
