use std::collections::{HashMap, HashSet};

use containers::{BlockNumber, ChainHead, PeerId};
use tracing::debug;

use super::config::MAX_CONCURRENT_REQUESTS;
use crate::types::ConnectionState;

/// Sync-specific peer state.
///
/// Wraps peer information with sync-specific state: advertised head and
/// request tracking.
#[derive(Debug, Clone)]
pub struct SyncPeer {
    pub peer_id: PeerId,
    pub connection_state: ConnectionState,
    pub head: Option<ChainHead>,
    pub requests_in_flight: usize,
}

impl SyncPeer {
    pub fn new(peer_id: PeerId, connection_state: ConnectionState) -> Self {
        Self {
            peer_id,
            connection_state,
            head: None,
            requests_in_flight: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// Connected and below MAX_CONCURRENT_REQUESTS.
    pub fn is_available(&self) -> bool {
        self.is_connected() && self.requests_in_flight < MAX_CONCURRENT_REQUESTS
    }

    /// Check if the peer's advertised chain reaches `number`.
    pub fn has_block(&self, number: BlockNumber) -> bool {
        self.head.is_some_and(|head| head.number >= number)
    }

    pub fn on_request_start(&mut self) {
        self.requests_in_flight += 1;
    }

    pub fn on_request_complete(&mut self) {
        self.requests_in_flight = self.requests_in_flight.saturating_sub(1);
    }
}

/// Tracks the head each peer advertised and picks peers for requests.
///
/// Heads are written only by the engine loop (handshake Status and
/// Announce). Sync tasks read them to pick replacement peers and update the
/// request counters.
#[derive(Debug, Default, Clone)]
pub struct PeerManager {
    peers: HashMap<PeerId, SyncPeer>,
}

impl PeerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(
        &mut self,
        peer_id: PeerId,
        connection_state: ConnectionState,
    ) -> &mut SyncPeer {
        self.peers
            .entry(peer_id)
            .or_insert_with(|| SyncPeer::new(peer_id, connection_state))
    }

    pub fn remove_peer(&mut self, peer_id: &PeerId) -> Option<SyncPeer> {
        self.peers.remove(peer_id)
    }

    pub fn get_peer(&self, peer_id: &PeerId) -> Option<&SyncPeer> {
        self.peers.get(peer_id)
    }

    pub fn update_connection_state(&mut self, peer_id: &PeerId, state: ConnectionState) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.connection_state = state;
        }
    }

    /// Record the head a peer advertised.
    pub fn update_head(&mut self, peer_id: &PeerId, head: ChainHead) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.head = Some(head);
        }
    }

    /// Best peer to ask for headers up to `top`.
    ///
    /// Only connected peers whose head reaches `top` and that are not in
    /// `exclude` qualify. Highest advertised score wins; among equals, peers
    /// below the concurrency limit go first, then the least busy.
    pub fn select_peer_for_request(
        &self,
        top: BlockNumber,
        exclude: &HashSet<PeerId>,
    ) -> Option<&SyncPeer> {
        self.peers
            .values()
            .filter(|peer| peer.is_connected() && peer.has_block(top))
            .filter(|peer| !exclude.contains(&peer.peer_id))
            .max_by(|a, b| {
                let score = |peer: &SyncPeer| peer.head.map(|head| head.score).unwrap_or_default();
                score(a)
                    .cmp(&score(b))
                    .then_with(|| a.is_available().cmp(&b.is_available()))
                    .then_with(|| b.requests_in_flight.cmp(&a.requests_in_flight))
                    .then_with(|| b.peer_id.cmp(&a.peer_id))
            })
    }

    /// Heaviest head advertised by a connected peer.
    pub fn best_head(&self) -> Option<ChainHead> {
        self.peers
            .values()
            .filter(|peer| peer.is_connected())
            .filter_map(|peer| peer.head)
            .max_by(|a, b| a.score.cmp(&b.score))
    }

    pub fn on_request_start(&mut self, peer_id: &PeerId) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.on_request_start();
        }
    }

    pub fn on_request_complete(&mut self, peer_id: &PeerId) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.on_request_complete();
        }
    }

    pub fn on_request_failure(&mut self, peer_id: &PeerId, reason: &str) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.on_request_complete();
            debug!(peer = %peer_id, reason, "Header request failed");
        }
    }

    pub fn connected_count(&self) -> usize {
        self.peers.values().filter(|peer| peer.is_connected()).count()
    }
}
