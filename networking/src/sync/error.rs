use chain::StoreError;
use containers::{BlockNumber, PeerId};
use thiserror::Error;

use super::validation::ValidationError;

/// Why a header request did not produce headers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request {request_id} to {peer} timed out")]
    Timeout { peer: PeerId, request_id: u64 },

    #[error("peer {0} disconnected")]
    PeerDisconnected(PeerId),

    #[error("peer {0} is not connected")]
    NotConnected(PeerId),

    #[error("request cancelled")]
    Cancelled,
}

/// Why a sync task was abandoned.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("batch at #{start} failed validation: {source}")]
    ChainLinkage {
        start: BlockNumber,
        #[source]
        source: ValidationError,
    },

    #[error("no common ancestor within {depth} blocks of #{start}")]
    AncestorNotFound { start: BlockNumber, depth: u64 },

    #[error("no eligible peer has headers up to #{number}")]
    NoEligiblePeer { number: BlockNumber },

    #[error("header store: {0}")]
    Store(#[from] StoreError),

    #[error("sync cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("sync engine is not running")]
pub struct EngineStopped;
