use alloy_primitives::B256;
use containers::HashOrNumber;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::les::commands::HeaderQuery;
use crate::les::server::{MAX_HEADERS_SERVE, answer_query};
use crate::test_utils::chain_store;

fn numbers(query: HeaderQuery, limit: u64) -> Vec<u64> {
    let (store, _) = chain_store(20);
    answer_query(&*store, &query, limit)
        .unwrap()
        .iter()
        .map(|header| header.number())
        .collect()
}

#[rstest]
#[case::forward(1, 5, 0, false, 20, vec![1, 2, 3, 4, 5])]
#[case::forward_past_head(18, 5, 0, false, 20, vec![18, 19, 20])]
#[case::forward_capped_by_limit(1, 20, 0, false, 10, (1..=10).collect())]
#[case::anchor_above_limit(11, 5, 0, false, 10, vec![])]
#[case::reverse(10, 3, 0, true, 20, vec![10, 9, 8])]
#[case::reverse_stops_at_genesis(1, 5, 0, true, 20, vec![1, 0])]
#[case::forward_skip(2, 3, 1, false, 20, vec![2, 4, 6])]
#[case::reverse_skip(9, 4, 2, true, 20, vec![9, 6, 3, 0])]
#[case::zero_max(1, 0, 0, false, 20, vec![])]
fn test_answer_by_number(
    #[case] anchor: u64,
    #[case] max_headers: u64,
    #[case] skip: u64,
    #[case] reverse: bool,
    #[case] limit: u64,
    #[case] expected: Vec<u64>,
) {
    let query = HeaderQuery {
        block_number_or_hash: HashOrNumber::Number(anchor),
        max_headers,
        skip,
        reverse,
    };

    assert_eq!(numbers(query, limit), expected);
}

#[test]
fn test_answer_by_hash() {
    let (store, chain) = chain_store(20);
    let query = HeaderQuery {
        block_number_or_hash: HashOrNumber::Hash(chain[5].hash()),
        max_headers: 2,
        skip: 0,
        reverse: false,
    };

    let headers = answer_query(&*store, &query, 20).unwrap();

    assert_eq!(headers, vec![chain[5].clone(), chain[6].clone()]);
}

#[test]
fn test_unknown_hash_answers_nothing() {
    let (store, _) = chain_store(5);
    let query = HeaderQuery {
        block_number_or_hash: HashOrNumber::Hash(B256::repeat_byte(0x77)),
        max_headers: 2,
        skip: 0,
        reverse: false,
    };

    assert!(answer_query(&*store, &query, 5).unwrap().is_empty());
}

#[test]
fn test_serve_cap() {
    let (store, _) = chain_store(MAX_HEADERS_SERVE as usize + 10);
    let query = HeaderQuery::forward(1, MAX_HEADERS_SERVE * 2);

    let headers = answer_query(&*store, &query, u64::MAX).unwrap();

    assert_eq!(headers.len() as u64, MAX_HEADERS_SERVE);
}
