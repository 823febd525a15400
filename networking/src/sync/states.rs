/// Sync task state machine.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncTaskState {
    /// Created, not started yet.
    #[default]
    Idle,

    /// Reading the local head and choosing where to start fetching.
    Planning,

    /// A GetBlockHeaders for the current batch is outstanding.
    Fetching,

    /// Checking the returned batch links onto the local chain.
    Validating,

    /// Caught up with the target. Terminal.
    Committed,

    /// Gave up: no peer left to ask, validation budget spent, store failure
    /// or engine shutdown. Terminal.
    Abandoned,
}

impl SyncTaskState {
    /// Check if a transition to the target state is valid.
    ///
    /// Batches loop through Fetching and Validating until the target is
    /// reached. A failed request goes back to Fetching (retry or another
    /// peer), an unlinked batch goes back to Planning (wider look-back).
    pub fn can_transition_to(&self, target: SyncTaskState) -> bool {
        use SyncTaskState::*;

        match self {
            Idle => matches!(target, Planning | Abandoned),
            Planning => matches!(target, Fetching | Committed | Abandoned),
            Fetching => matches!(target, Fetching | Validating | Abandoned),
            Validating => matches!(target, Fetching | Planning | Committed | Abandoned),
            Committed | Abandoned => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncTaskState::Committed | SyncTaskState::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTaskState::Idle => "idle",
            SyncTaskState::Planning => "planning",
            SyncTaskState::Fetching => "fetching",
            SyncTaskState::Validating => "validating",
            SyncTaskState::Committed => "committed",
            SyncTaskState::Abandoned => "abandoned",
        }
    }
}
