use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use containers::{BlockHeader, PeerId};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::error::FetchError;
use super::task::HeaderRequester;
use crate::les::HeaderQuery;
use crate::peer::{PeerHandle, PeerRegistry};

pub type FetchResult = Result<Vec<BlockHeader>, FetchError>;

/// An outstanding GetBlockHeaders. Consumed exactly once: by the matching
/// response, its deadline, its peer going away or engine shutdown.
#[derive(Debug)]
pub struct PendingRequest {
    pub request_id: u64,
    pub peer: PeerId,
    /// Serial of the session the request went out on.
    pub session: u64,
    pub query: HeaderQuery,
    pub issued_at: Instant,
    pub deadline: Instant,
    sink: oneshot::Sender<FetchResult>,
}

impl PendingRequest {
    fn fail(self, err: FetchError) {
        let _ = self.sink.send(Err(err));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredRequest {
    pub peer: PeerId,
    pub request_id: u64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    pending: HashMap<(PeerId, u64), PendingRequest>,
    next_id: HashMap<PeerId, u64>,
    closed: bool,
}

/// Correlates BlockHeaders responses with the requests that asked for them.
///
/// Whoever removes an entry from the map under the lock settles it, so a
/// late response racing its timeout is settled exactly once. The tracker
/// never retries; that is up to the caller.
#[derive(Debug)]
pub struct RequestTracker {
    reply_timeout: Duration,
    inner: Mutex<TrackerInner>,
}

impl RequestTracker {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            reply_timeout,
            inner: Mutex::new(TrackerInner::default()),
        }
    }

    /// Send `query` on `handle` under a fresh request id.
    ///
    /// The receiver yields the headers, or the reason none will come.
    pub fn send(
        &self,
        handle: &PeerHandle,
        query: HeaderQuery,
    ) -> Result<(u64, oneshot::Receiver<FetchResult>), FetchError> {
        let peer = handle.id();
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(FetchError::Cancelled);
        }

        let next_id = inner.next_id.entry(peer).or_default();
        let request_id = *next_id;
        *next_id += 1;

        handle
            .send_get_block_headers(request_id, query)
            .map_err(|_| FetchError::PeerDisconnected(peer))?;

        let (sink, receiver) = oneshot::channel();
        let issued_at = Instant::now();
        inner.pending.insert(
            (peer, request_id),
            PendingRequest {
                request_id,
                peer,
                session: handle.serial(),
                query,
                issued_at,
                deadline: issued_at + self.reply_timeout,
                sink,
            },
        );
        trace!(peer = %peer, request_id, query = ?query, "Header request sent");

        Ok((request_id, receiver))
    }

    /// Complete the request `request_id` of `peer` with `headers`.
    ///
    /// Returns `false` when no such request is pending (unsolicited, late or
    /// duplicate response); the headers are dropped.
    pub fn resolve(&self, peer: PeerId, request_id: u64, headers: Vec<BlockHeader>) -> bool {
        let Some(request) = self.inner.lock().pending.remove(&(peer, request_id)) else {
            debug!(peer = %peer, request_id, "Dropping BlockHeaders for no pending request");
            return false;
        };

        trace!(
            peer = %peer,
            request_id,
            count = headers.len(),
            elapsed = ?request.issued_at.elapsed(),
            "Header request answered"
        );
        let _ = request.sink.send(Ok(headers));
        true
    }

    /// Remove and fail every request whose deadline is at or before `now`.
    pub fn poll_timeouts(&self, now: Instant) -> Vec<ExpiredRequest> {
        let expired: Vec<PendingRequest> = {
            let mut inner = self.inner.lock();
            let keys: Vec<(PeerId, u64)> = inner
                .pending
                .iter()
                .filter(|(_, request)| request.deadline <= now)
                .map(|(key, _)| *key)
                .collect();
            keys.iter()
                .filter_map(|key| inner.pending.remove(key))
                .collect()
        };

        expired
            .into_iter()
            .map(|request| {
                let expired = ExpiredRequest {
                    peer: request.peer,
                    request_id: request.request_id,
                };
                debug!(peer = %request.peer, request_id = request.request_id, "Header request timed out");
                request.fail(FetchError::Timeout {
                    peer: expired.peer,
                    request_id: expired.request_id,
                });
                expired
            })
            .collect()
    }

    /// Fail every request pending on `peer` and forget its request ids.
    /// Returns how many requests there were.
    pub fn fail_peer(&self, peer: &PeerId) -> usize {
        self.fail_where(peer, |_| true, true)
    }

    /// Fail the requests sent on one session of `peer`, leaving any other
    /// session's requests alone.
    pub fn fail_session(&self, peer: &PeerId, session: u64) -> usize {
        self.fail_where(peer, |request| request.session == session, false)
    }

    fn fail_where(
        &self,
        peer: &PeerId,
        matches: impl Fn(&PendingRequest) -> bool,
        forget_peer: bool,
    ) -> usize {
        let failed: Vec<PendingRequest> = {
            let mut inner = self.inner.lock();
            let keys: Vec<(PeerId, u64)> = inner
                .pending
                .iter()
                .filter(|&(&(owner, _), request)| owner == *peer && matches(request))
                .map(|(key, _)| *key)
                .collect();
            if forget_peer {
                inner.next_id.remove(peer);
            }
            keys.iter()
                .filter_map(|key| inner.pending.remove(key))
                .collect()
        };

        let count = failed.len();
        for request in failed {
            request.fail(FetchError::PeerDisconnected(*peer));
        }
        count
    }

    /// Fail everything pending and refuse new requests.
    pub fn cancel_all(&self) -> usize {
        let cancelled: Vec<PendingRequest> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.pending.drain().map(|(_, request)| request).collect()
        };

        let count = cancelled.len();
        for request in cancelled {
            request.fail(FetchError::Cancelled);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn pending_for(&self, peer: &PeerId) -> usize {
        self.inner
            .lock()
            .pending
            .keys()
            .filter(|(owner, _)| owner == peer)
            .count()
    }
}

/// Fetches headers from registered sessions through a [`RequestTracker`].
#[derive(Debug, Clone)]
pub struct LesRequester {
    registry: Arc<PeerRegistry>,
    tracker: Arc<RequestTracker>,
}

impl LesRequester {
    pub fn new(registry: Arc<PeerRegistry>, tracker: Arc<RequestTracker>) -> Self {
        Self { registry, tracker }
    }
}

#[async_trait]
impl HeaderRequester for LesRequester {
    async fn request_headers(&self, peer: PeerId, query: HeaderQuery) -> FetchResult {
        let handle = self
            .registry
            .get(&peer)
            .filter(|handle| !handle.is_closed())
            .ok_or(FetchError::NotConnected(peer))?;
        let (_, reply) = self.tracker.send(&handle, query)?;
        reply.await.unwrap_or(Err(FetchError::Cancelled))
    }
}
