use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::B256;
use chain::HeaderStore;
use containers::{ChainHead, PeerId};
use metrics::SharedMetrics;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, trace, warn};

use super::config::SyncConfig;
use super::error::{EngineStopped, SyncError};
use super::peer_manager::PeerManager;
use super::request_tracker::{LesRequester, RequestTracker};
use super::task::{SyncTarget, SyncTask, TaskReport};
use crate::les::{Announce, GetBlockHeaders, LesMessage, answer_query};
use crate::peer::{PeerHandle, PeerRegistry, PeerSession, RegistryEvent};
use crate::types::{ConnectionState, DisconnectReason};

/// Input to the engine loop.
#[derive(Debug)]
pub enum EngineEvent {
    /// A handshaken session, with the head from the remote Status.
    Register { session: PeerSession, head: ChainHead },
    Announce { peer: PeerId, announce: Announce },
}

/// Snapshot of engine activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub local_head: ChainHead,
    pub known_peers: usize,
    pub active_tasks: usize,
    pub queued_tasks: usize,
    pub pending_requests: usize,
    pub committed_tasks: u64,
    pub abandoned_tasks: u64,
    pub headers_imported: u64,
}

#[derive(Debug, Default)]
struct Counters {
    known_peers: usize,
    active_tasks: usize,
    queued_tasks: usize,
    committed_tasks: u64,
    abandoned_tasks: u64,
    headers_imported: u64,
}

/// Control surface of a running [`SyncEngine`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    cancel: CancellationToken,
    head: watch::Receiver<ChainHead>,
    stopped: watch::Receiver<bool>,
    tracker: Arc<RequestTracker>,
    counters: Arc<Mutex<Counters>>,
}

impl SyncHandle {
    /// Hand a handshaken session to the engine. Its Status head starts a
    /// sync if it is heavier than ours.
    pub fn register_peer(&self, session: PeerSession, head: ChainHead) -> Result<(), EngineStopped> {
        self.events
            .send(EngineEvent::Register { session, head })
            .map_err(|_| EngineStopped)
    }

    /// Latest canonical head published by the engine.
    pub fn head(&self) -> ChainHead {
        *self.head.borrow()
    }

    /// Watch the canonical head; the receiver sees every head the engine
    /// publishes after the current one.
    pub fn subscribe_head(&self) -> watch::Receiver<ChainHead> {
        self.head.clone()
    }

    /// Resolves once `hash` becomes the canonical head.
    pub async fn wait_for_head(&self, hash: B256) -> Result<ChainHead, EngineStopped> {
        let mut head = self.head.clone();
        head.wait_for(|head| head.hash == hash)
            .await
            .map(|head| *head)
            .map_err(|_| EngineStopped)
    }

    pub fn stats(&self) -> SyncStats {
        let counters = self.counters.lock();
        SyncStats {
            local_head: *self.head.borrow(),
            known_peers: counters.known_peers,
            active_tasks: counters.active_tasks,
            queued_tasks: counters.queued_tasks,
            pending_requests: self.tracker.pending_count(),
            committed_tasks: counters.committed_tasks,
            abandoned_tasks: counters.abandoned_tasks,
            headers_imported: counters.headers_imported,
        }
    }

    /// Stop the engine and wait for [`SyncEngine::run`] to return.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        let mut stopped = self.stopped.clone();
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }
}

/// Keeps the local header chain in step with what peers announce.
///
/// The engine loop owns the per-peer task table: at most one sync task per
/// peer runs at a time, and announcements arriving meanwhile are queued
/// (latest wins). Tasks run on their own tokio tasks and commit to the store
/// independently; the store's score rule settles overlaps.
pub struct SyncEngine<S: HeaderStore> {
    store: Arc<S>,
    registry: Arc<PeerRegistry>,
    tracker: Arc<RequestTracker>,
    requester: Arc<LesRequester>,
    peers: Arc<Mutex<PeerManager>>,
    config: SyncConfig,
    metrics: SharedMetrics,
    head_tx: Arc<watch::Sender<ChainHead>>,
    stopped_tx: watch::Sender<bool>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    registry_rx: mpsc::UnboundedReceiver<RegistryEvent>,
    cancel: CancellationToken,
    counters: Arc<Mutex<Counters>>,
    tasks: JoinSet<(PeerId, Result<TaskReport, JoinError>)>,
    active: HashMap<PeerId, SyncTarget>,
    queued: HashMap<PeerId, SyncTarget>,
    handle: SyncHandle,
}

impl<S: HeaderStore> SyncEngine<S> {
    pub fn new(
        store: Arc<S>,
        registry: Arc<PeerRegistry>,
        config: SyncConfig,
        metrics: SharedMetrics,
    ) -> Self {
        let tracker = Arc::new(RequestTracker::new(config.reply_timeout));
        let requester = Arc::new(LesRequester::new(registry.clone(), tracker.clone()));
        let registry_rx = registry.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (head_tx, head_rx) = watch::channel(store.canonical_chain_head().unwrap_or_default());
        let (stopped_tx, stopped_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let counters = Arc::new(Mutex::new(Counters::default()));

        let handle = SyncHandle {
            events: events_tx.clone(),
            cancel: cancel.clone(),
            head: head_rx,
            stopped: stopped_rx,
            tracker: tracker.clone(),
            counters: counters.clone(),
        };

        Self {
            store,
            registry,
            tracker,
            requester,
            peers: Arc::new(Mutex::new(PeerManager::new())),
            config,
            metrics,
            head_tx: Arc::new(head_tx),
            stopped_tx,
            events_tx,
            events_rx,
            registry_rx,
            cancel,
            counters,
            tasks: JoinSet::new(),
            active: HashMap::new(),
            queued: HashMap::new(),
            handle,
        }
    }

    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Run until [`SyncHandle::cancel`] is called.
    ///
    /// Fails only if the local head cannot be read at startup.
    pub async fn run(mut self) -> Result<(), SyncError> {
        let head = self.store.canonical_chain_head()?;
        self.head_tx.send_replace(head);
        self.metrics.set_local_head_number(head.number);
        info!(
            head = %head.hash,
            number = head.number,
            td = %head.score,
            "Sync engine started"
        );

        let mut sweep = tokio::time::interval(self.config.timeout_sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.on_event(event),
                Some(event) = self.registry_rx.recv() => self.on_registry_event(event),
                Some(joined) = self.tasks.join_next() => self.on_task_joined(joined),
                _ = sweep.tick() => self.sweep_timeouts(),
            }
            self.update_counters();
        }

        self.shutdown().await;
        Ok(())
    }

    fn on_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Register { session, head } => self.register(session, head),
            EngineEvent::Announce { peer, announce } => {
                let head = announce.head();
                debug!(
                    peer = %peer,
                    number = head.number,
                    td = %head.score,
                    reorg_depth = announce.reorg_depth,
                    "Announce received"
                );
                self.peers.lock().update_head(&peer, head);
                self.on_target(SyncTarget {
                    peer,
                    head,
                    reorg_depth: announce.reorg_depth,
                });
            }
        }
    }

    fn register(&mut self, session: PeerSession, head: ChainHead) {
        let handle = session.handle().clone();
        let peer = handle.id();
        let direction = handle.direction().as_str();

        if !self.registry.add(handle.clone()) {
            warn!(peer = %peer, "Rejecting second session with peer");
            handle.disconnect(DisconnectReason::DisconnectRequested);
            self.metrics.inc_peer_connection(direction, "duplicate");
            return;
        }
        self.metrics.inc_peer_connection(direction, "success");

        {
            let mut peers = self.peers.lock();
            peers.add_peer(peer, ConnectionState::Connected);
            peers.update_connection_state(&peer, ConnectionState::Connected);
            peers.update_head(&peer, head);
        }

        tokio::spawn(dispatch(
            session,
            self.store.clone(),
            self.tracker.clone(),
            self.events_tx.clone(),
            self.metrics.clone(),
        ));

        self.on_target(SyncTarget {
            peer,
            head,
            reorg_depth: 0,
        });
    }

    /// Start, queue or drop a sync toward `target`.
    fn on_target(&mut self, target: SyncTarget) {
        let local = match self.store.canonical_chain_head() {
            Ok(local) => local,
            Err(err) => {
                error!(%err, "Cannot read local head");
                return;
            }
        };
        if target.head.score <= local.score {
            trace!(peer = %target.peer, td = %target.head.score, "Peer is not ahead");
            return;
        }
        match self.store.header_exists(&target.head.hash) {
            Ok(false) => {}
            Ok(true) => return,
            Err(err) => {
                error!(%err, "Cannot look up announced head");
                return;
            }
        }

        if self.active.contains_key(&target.peer) {
            self.queued
                .entry(target.peer)
                .and_modify(|queued| {
                    queued.head = target.head;
                    queued.reorg_depth = queued.reorg_depth.saturating_add(target.reorg_depth);
                })
                .or_insert(target);
            debug!(peer = %target.peer, number = target.head.number, "Sync queued behind running task");
            return;
        }

        self.spawn_task(target);
    }

    fn spawn_task(&mut self, target: SyncTarget) {
        info!(
            peer = %target.peer,
            number = target.head.number,
            td = %target.head.score,
            reorg_depth = target.reorg_depth,
            "Starting sync task"
        );

        let task = SyncTask::new(
            target,
            self.store.clone(),
            self.requester.clone(),
            self.peers.clone(),
            self.config.clone(),
            self.metrics.clone(),
            self.head_tx.clone(),
            self.cancel.child_token(),
        );
        let running = AbortOnDropHandle::new(tokio::spawn(task.run()));
        self.tasks.spawn(async move { (target.peer, running.await) });

        self.active.insert(target.peer, target);
        self.metrics.set_active_sync_tasks(self.active.len() as i64);
    }

    fn on_task_joined(&mut self, joined: Result<(PeerId, Result<TaskReport, JoinError>), JoinError>) {
        let (peer, result) = match joined {
            Ok(joined) => joined,
            Err(err) => {
                error!(%err, "Sync task supervisor failed");
                return;
            }
        };
        self.active.remove(&peer);
        self.metrics.set_active_sync_tasks(self.active.len() as i64);

        match result {
            Ok(report) => self.on_task_report(report),
            Err(err) => {
                error!(peer = %peer, %err, "Sync task failed");
                self.counters.lock().abandoned_tasks += 1;
                self.metrics.inc_sync_task("failed");
            }
        }

        if let Some(next) = self.queued.remove(&peer) {
            self.on_target(next);
        }
    }

    fn on_task_report(&mut self, report: TaskReport) {
        let peer = report.target.peer;
        self.metrics.inc_sync_task(report.state.as_str());

        let mut counters = self.counters.lock();
        counters.headers_imported += report.imported as u64;
        match report.error {
            None => {
                counters.committed_tasks += 1;
                info!(
                    peer = %peer,
                    number = report.target.head.number,
                    imported = report.imported,
                    "Sync task committed"
                );
            }
            Some(err) => {
                counters.abandoned_tasks += 1;
                warn!(
                    peer = %peer,
                    number = report.target.head.number,
                    imported = report.imported,
                    %err,
                    "Sync task abandoned"
                );
            }
        }
    }

    fn on_registry_event(&mut self, event: RegistryEvent) {
        self.metrics.set_peers(self.registry.len() as i64);
        match event {
            RegistryEvent::Added(peer) => debug!(peer = %peer, "Peer added to sync engine"),
            RegistryEvent::Removed { peer, session } => {
                let failed = self.tracker.fail_session(&peer, session);
                // A replacement session may already be registered.
                if self
                    .registry
                    .get(&peer)
                    .is_some_and(|handle| !handle.is_closed())
                {
                    debug!(peer = %peer, failed_requests = failed, "Peer session replaced");
                    return;
                }
                let failed = failed + self.tracker.fail_peer(&peer);
                self.peers.lock().remove_peer(&peer);
                self.queued.remove(&peer);
                info!(peer = %peer, failed_requests = failed, "Peer removed from sync engine");
            }
        }
    }

    fn sweep_timeouts(&mut self) {
        let expired = self.tracker.poll_timeouts(Instant::now());
        if !expired.is_empty() {
            self.metrics.inc_request_timeouts(expired.len() as u64);
        }
    }

    fn update_counters(&self) {
        let known_peers = self.peers.lock().connected_count();
        let mut counters = self.counters.lock();
        counters.known_peers = known_peers;
        counters.active_tasks = self.active.len();
        counters.queued_tasks = self.queued.len();
    }

    async fn shutdown(&mut self) {
        info!("Sync engine stopping");

        let cancelled = self.tracker.cancel_all();
        self.queued.clear();
        while let Some(joined) = self.tasks.join_next().await {
            self.on_task_joined(joined);
        }
        self.registry.disconnect_all(DisconnectReason::DisconnectRequested);
        self.update_counters();

        self.stopped_tx.send_replace(true);
        info!(cancelled_requests = cancelled, "Sync engine stopped");
    }
}

/// Route one session's inbound messages until it closes.
async fn dispatch<S: HeaderStore>(
    mut session: PeerSession,
    store: Arc<S>,
    tracker: Arc<RequestTracker>,
    events: mpsc::UnboundedSender<EngineEvent>,
    metrics: SharedMetrics,
) {
    let handle = session.handle().clone();
    let peer = handle.id();

    while let Some(message) = session.recv().await {
        match message {
            LesMessage::Announce(announce) => {
                if events.send(EngineEvent::Announce { peer, announce }).is_err() {
                    break;
                }
            }
            LesMessage::BlockHeaders(response) => {
                trace!(
                    peer = %peer,
                    request_id = response.request_id,
                    buffer_value = response.buffer_value,
                    "BlockHeaders received"
                );
                tracker.resolve(peer, response.request_id, response.headers);
            }
            LesMessage::GetBlockHeaders(request) => serve_headers(&*store, &handle, request),
            LesMessage::Status(_) => {
                warn!(peer = %peer, "Status received after handshake");
                handle.disconnect(DisconnectReason::BreachOfProtocol);
                break;
            }
        }
    }

    if let Some(reason) = handle.disconnect_reason() {
        metrics.inc_peer_disconnection(reason.as_str());
    }
}

fn serve_headers<S: HeaderStore + ?Sized>(store: &S, handle: &PeerHandle, request: GetBlockHeaders) {
    let limit = match store.canonical_head() {
        Ok(head) => head.number(),
        Err(err) => {
            warn!(peer = %handle.id(), %err, "Cannot serve headers");
            return;
        }
    };

    match answer_query(store, &request.query, limit) {
        Ok(headers) => {
            debug!(
                peer = %handle.id(),
                request_id = request.request_id,
                count = headers.len(),
                "Serving headers"
            );
            let _ = handle.send_block_headers(request.request_id, 0, headers);
        }
        Err(err) => warn!(peer = %handle.id(), %err, "Cannot serve headers"),
    }
}
