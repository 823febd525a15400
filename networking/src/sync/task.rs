use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chain::HeaderStore;
use containers::{BlockHeader, BlockNumber, ChainHead, PeerId};
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::error::{FetchError, SyncError};
use super::peer_manager::PeerManager;
use super::request_tracker::FetchResult;
use super::states::SyncTaskState;
use super::validation::{ValidationError, validate_batch};
use crate::les::HeaderQuery;

/// Header requester trait for fetching header batches.
///
/// Abstracts the network layer to allow testing with mocks.
#[async_trait]
pub trait HeaderRequester: Send + Sync + 'static {
    async fn request_headers(&self, peer: PeerId, query: HeaderQuery) -> FetchResult;
}

/// What a sync task is trying to reach: a head announced by `peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTarget {
    pub peer: PeerId,
    pub head: ChainHead,
    /// Number of recently announced headers the peer says it unwound.
    pub reorg_depth: u64,
}

#[derive(Debug)]
pub struct TaskReport {
    pub target: SyncTarget,
    pub state: SyncTaskState,
    pub imported: usize,
    pub error: Option<SyncError>,
}

/// First block number to fetch when catching up from `local` to `target`.
///
/// A reorg hint moves the start back from the local head. A target at or
/// below the local head is a competing fork and is fetched from its own
/// number.
pub fn plan_start(local: BlockNumber, target: BlockNumber, reorg_depth: u64) -> BlockNumber {
    let start = if reorg_depth > 0 {
        local.saturating_sub(reorg_depth)
    } else {
        local + 1
    };
    start.min(target)
}

/// One "catch up to this head" unit of work.
///
/// Fetches batches of headers one at a time from the announcing peer,
/// validates and commits each before asking for the next. A failed request
/// is retried once on the same peer, then moved to the best other peer whose
/// head covers the batch. A batch that does not attach to the local chain
/// makes the task look further back, doubling the distance each time up to
/// `max_reorg_depth`.
pub struct SyncTask<S: HeaderStore, R: HeaderRequester> {
    target: SyncTarget,
    state: SyncTaskState,
    store: Arc<S>,
    requester: Arc<R>,
    peers: Arc<Mutex<PeerManager>>,
    config: SyncConfig,
    metrics: SharedMetrics,
    head_tx: Arc<watch::Sender<ChainHead>>,
    cancel: CancellationToken,
    imported: usize,
}

impl<S: HeaderStore, R: HeaderRequester> SyncTask<S, R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        target: SyncTarget,
        store: Arc<S>,
        requester: Arc<R>,
        peers: Arc<Mutex<PeerManager>>,
        config: SyncConfig,
        metrics: SharedMetrics,
        head_tx: Arc<watch::Sender<ChainHead>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            state: SyncTaskState::default(),
            store,
            requester,
            peers,
            config,
            metrics,
            head_tx,
            cancel,
            imported: 0,
        }
    }

    pub fn state(&self) -> SyncTaskState {
        self.state
    }

    pub async fn run(mut self) -> TaskReport {
        let error = match self.sync().await {
            Ok(()) => {
                self.transition(SyncTaskState::Committed);
                None
            }
            Err(err) => {
                self.transition(SyncTaskState::Abandoned);
                Some(err)
            }
        };

        TaskReport {
            target: self.target,
            state: self.state,
            imported: self.imported,
            error,
        }
    }

    fn transition(&mut self, next: SyncTaskState) {
        if !self.state.can_transition_to(next) {
            warn!(
                peer = %self.target.peer,
                from = self.state.as_str(),
                to = next.as_str(),
                "Unexpected sync task transition"
            );
        }
        self.state = next;
    }

    async fn sync(&mut self) -> Result<(), SyncError> {
        self.transition(SyncTaskState::Planning);

        let local = self.store.canonical_chain_head()?;
        if self.is_caught_up(&local)? {
            debug!(peer = %self.target.peer, head = %local.hash, "Already caught up");
            return Ok(());
        }

        let target = self.target.head;
        let mut start = plan_start(local.number, target.number, self.target.reorg_depth);
        let mut look_back = self.target.reorg_depth.max(1);
        let mut widened = 0u64;

        debug!(
            peer = %self.target.peer,
            local = local.number,
            target = target.number,
            reorg_depth = self.target.reorg_depth,
            start,
            "Planned header sync"
        );

        while start <= target.number {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let count = (target.number - start + 1).min(self.config.max_headers_fetch.max(1));
            match self.fetch_batch(start, count).await? {
                Some(headers) => {
                    start += headers.len() as u64;
                    let local = self.commit(headers)?;
                    if local.score >= target.score {
                        break;
                    }
                }
                None => {
                    let remaining = self.config.max_reorg_depth.saturating_sub(widened);
                    if start == 0 || remaining == 0 {
                        return Err(SyncError::AncestorNotFound {
                            start,
                            depth: widened,
                        });
                    }
                    let step = look_back.min(start).min(remaining);
                    start -= step;
                    widened += step;
                    look_back = look_back.saturating_mul(2);

                    self.transition(SyncTaskState::Planning);
                    debug!(
                        peer = %self.target.peer,
                        start,
                        widened,
                        "Batch does not attach to the local chain, looking further back"
                    );
                }
            }
        }

        Ok(())
    }

    fn is_caught_up(&self, local: &ChainHead) -> Result<bool, SyncError> {
        Ok(local.score >= self.target.head.score
            || self.store.header_exists(&self.target.head.hash)?)
    }

    /// Fetch and validate `count` headers starting at `start`.
    ///
    /// `Ok(None)` means a well-formed batch that does not attach to anything
    /// stored.
    async fn fetch_batch(
        &mut self,
        start: BlockNumber,
        count: u64,
    ) -> Result<Option<Vec<BlockHeader>>, SyncError> {
        let top = (start + count).saturating_sub(1);
        let mut peer = self.target.peer;
        let mut tried = HashSet::new();
        let mut retried = false;
        let mut linkage_failures = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            self.transition(SyncTaskState::Fetching);
            let started = Instant::now();
            self.peers.lock().on_request_start(&peer);
            let result = tokio::select! {
                result = self.requester.request_headers(peer, HeaderQuery::forward(start, count)) => result,
                _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            };

            let err = match result {
                Ok(headers) => {
                    self.peers.lock().on_request_complete(&peer);
                    self.metrics.inc_header_request("ok");
                    self.transition(SyncTaskState::Validating);

                    match validate_batch(&*self.store, start, count, &headers) {
                        Ok(()) => {
                            self.metrics
                                .observe_batch_fetch_time(started.elapsed().as_secs_f64());
                            return Ok(Some(headers));
                        }
                        Err(ValidationError::UnknownAncestor { number, parent }) => {
                            debug!(peer = %peer, number, %parent, "Unknown ancestor");
                            return Ok(None);
                        }
                        Err(ValidationError::Store(err)) => return Err(err.into()),
                        Err(err) => {
                            linkage_failures += 1;
                            warn!(
                                peer = %peer,
                                start,
                                attempt = linkage_failures,
                                %err,
                                "Invalid header batch"
                            );
                            if linkage_failures > self.config.max_batch_retries {
                                return Err(SyncError::ChainLinkage { start, source: err });
                            }
                            tried.insert(peer);
                            if let Some(next) = self.select_peer(top, &tried) {
                                peer = next;
                                retried = false;
                            }
                            continue;
                        }
                    }
                }
                Err(err) => err,
            };

            self.peers.lock().on_request_failure(&peer, &err.to_string());
            match err {
                FetchError::Cancelled => return Err(SyncError::Cancelled),
                FetchError::Timeout { .. } => self.metrics.inc_header_request("timeout"),
                FetchError::PeerDisconnected(_) | FetchError::NotConnected(_) => {
                    self.metrics.inc_header_request("disconnected")
                }
            }

            if matches!(err, FetchError::Timeout { .. }) && !retried {
                debug!(peer = %peer, start, "Retrying header request");
                retried = true;
                continue;
            }

            tried.insert(peer);
            match self.select_peer(top, &tried) {
                Some(next) => {
                    info!(from = %peer, to = %next, start, %err, "Moving header batch to another peer");
                    peer = next;
                    retried = false;
                }
                None => {
                    warn!(peer = %peer, start, top, %err, "No peer left to ask for headers");
                    return Err(SyncError::NoEligiblePeer { number: top });
                }
            }
        }
    }

    fn select_peer(&self, top: BlockNumber, tried: &HashSet<PeerId>) -> Option<PeerId> {
        self.peers
            .lock()
            .select_peer_for_request(top, tried)
            .map(|peer| peer.peer_id)
    }

    /// Persist the headers of a validated batch that are not stored yet and
    /// publish the resulting canonical head.
    fn commit(&mut self, headers: Vec<BlockHeader>) -> Result<ChainHead, SyncError> {
        let mut new_headers = Vec::with_capacity(headers.len());
        for header in headers {
            if !self.store.header_exists(&header.hash())? {
                new_headers.push(header);
            }
        }

        if !new_headers.is_empty() {
            let outcome = self.store.persist_headers(new_headers)?;
            self.imported += outcome.imported;
            self.metrics.inc_headers_imported(outcome.imported as u64);
            if outcome.is_reorg() {
                self.metrics.inc_chain_reorgs();
                self.metrics
                    .observe_chain_reorg_depth(outcome.old_canonical.len() as f64);
                info!(
                    peer = %self.target.peer,
                    depth = outcome.old_canonical.len(),
                    "Canonical chain reorganized"
                );
            }
        }

        let local = self.store.canonical_chain_head()?;
        let published = self.head_tx.send_if_modified(|current| {
            if local.score > current.score {
                *current = local;
                true
            } else {
                false
            }
        });
        if published {
            self.metrics.set_local_head_number(local.number);
            debug!(head = %local.hash, number = local.number, td = %local.score, "New canonical head");
        }

        Ok(local)
    }
}
