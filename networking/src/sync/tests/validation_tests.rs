use crate::sync::{ValidationError, validate_batch};
use crate::test_utils::{TEST_DIFFICULTY, chain_store, extend_chain, genesis, heavier_child};

#[test]
fn test_batch_extending_the_head() {
    let (store, chain) = chain_store(5);
    let batch = extend_chain(&chain[5], 3, TEST_DIFFICULTY);

    assert!(validate_batch(&*store, 6, 3, &batch).is_ok());
}

#[test]
fn test_batch_overlapping_stored_headers() {
    let (store, chain) = chain_store(5);
    let mut batch = chain[4..].to_vec();
    batch.extend(extend_chain(&chain[5], 2, TEST_DIFFICULTY));

    assert!(validate_batch(&*store, 4, 10, &batch).is_ok());
}

#[test]
fn test_short_batch_is_accepted() {
    let (store, chain) = chain_store(5);
    let batch = extend_chain(&chain[5], 2, TEST_DIFFICULTY);

    assert!(validate_batch(&*store, 6, 20, &batch).is_ok());
}

#[test]
fn test_rejects_malformed_batches() {
    let (store, chain) = chain_store(5);
    let batch = extend_chain(&chain[5], 4, TEST_DIFFICULTY);

    assert!(matches!(
        validate_batch(&*store, 6, 4, &[]),
        Err(ValidationError::Empty)
    ));
    assert!(matches!(
        validate_batch(&*store, 6, 3, &batch),
        Err(ValidationError::TooMany { requested: 3, returned: 4 })
    ));
    assert!(matches!(
        validate_batch(&*store, 7, 4, &batch),
        Err(ValidationError::WrongStart { expected: 7, actual: 6 })
    ));

    let gap = vec![batch[0].clone(), batch[2].clone()];
    assert!(matches!(
        validate_batch(&*store, 6, 4, &gap),
        Err(ValidationError::NonContiguous { previous: 6, number: 8 })
    ));

    let sibling = heavier_child(&chain[5]);
    let stranger = extend_chain(&sibling, 1, TEST_DIFFICULTY).remove(0);
    let broken = vec![batch[0].clone(), stranger];
    assert!(matches!(
        validate_batch(&*store, 6, 4, &broken),
        Err(ValidationError::BrokenLink { number: 7, .. })
    ));
}

#[test]
fn test_unknown_ancestor() {
    let (store, _) = chain_store(5);
    let fork_base = heavier_child(&genesis());
    let fork = extend_chain(&fork_base, 3, TEST_DIFFICULTY);

    let err = validate_batch(&*store, 2, 3, &fork).unwrap_err();

    assert!(matches!(
        err,
        ValidationError::UnknownAncestor { number: 2, parent } if parent == fork_base.hash()
    ));
}
