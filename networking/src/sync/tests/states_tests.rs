use rstest::rstest;

use crate::sync::SyncTaskState::{self, *};

#[rstest]
#[case(Idle, Planning, true)]
#[case(Idle, Fetching, false)]
#[case(Planning, Fetching, true)]
#[case(Planning, Committed, true)]
#[case(Fetching, Fetching, true)]
#[case(Fetching, Validating, true)]
#[case(Fetching, Committed, false)]
#[case(Validating, Fetching, true)]
#[case(Validating, Planning, true)]
#[case(Validating, Committed, true)]
#[case(Validating, Abandoned, true)]
#[case(Committed, Idle, false)]
#[case(Abandoned, Planning, false)]
fn test_transitions(
    #[case] from: SyncTaskState,
    #[case] to: SyncTaskState,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn test_default_is_idle() {
    assert_eq!(SyncTaskState::default(), Idle);
    assert!(!Idle.is_terminal());
    assert!(Committed.is_terminal());
    assert!(Abandoned.is_terminal());
}
