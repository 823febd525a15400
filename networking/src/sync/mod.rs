//! Header sync engine for the LES light client.
//!
//! This module keeps the local header chain in step with what connected
//! peers announce. It includes:
//!
//! - **Request Tracker**: correlates GetBlockHeaders with their responses and
//!   times them out
//! - **Peer Manager**: tracks each peer's advertised head and picks peers for
//!   requests
//! - **Sync Task**: catches up to one announced head, batch by batch
//! - **Sync Engine**: turns announcements into tasks, one per peer at a time
//!
//! ## Architecture
//!
//! The engine operates reactively:
//! 1. A peer registers (its Status head) or announces a new head
//! 2. If the head is heavier than ours and unknown, a sync task starts
//! 3. The task fetches up to `max_headers_fetch` headers per request
//! 4. Each batch is validated against the stored chain and committed
//! 5. The store picks the canonical head by total difficulty
//!
//! ## Task State Machine
//!
//! - **IDLE → PLANNING**: read the local head, choose a start
//! - **FETCHING ⇄ VALIDATING**: one batch at a time
//! - **COMMITTED** or **ABANDONED**: terminal

pub mod config;
pub mod engine;
pub mod error;
pub mod peer_manager;
pub mod request_tracker;
pub mod states;
pub mod task;
pub mod validation;

pub use config::*;
pub use engine::{EngineEvent, SyncEngine, SyncHandle, SyncStats};
pub use error::{EngineStopped, FetchError, SyncError};
pub use peer_manager::{PeerManager, SyncPeer};
pub use request_tracker::{ExpiredRequest, LesRequester, PendingRequest, RequestTracker};
pub use states::SyncTaskState;
pub use task::{HeaderRequester, SyncTarget, SyncTask, TaskReport, plan_start};
pub use validation::{ValidationError, validate_batch};

#[cfg(test)]
mod tests;
