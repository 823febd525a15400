//! In-memory peers for driving the sync engine end to end.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chain::{HeaderStore, MemoryHeaderStore};
use containers::{ChainHead, PeerId, Status};
use metrics::Metrics;
use tokio::task::JoinHandle;

use crate::les::{LesCodec, LesMessage, answer_query};
use crate::peer::{PeerHandle, PeerRegistry, PeerSession};
use crate::sync::{SyncConfig, SyncEngine, SyncError, SyncHandle};
use crate::test_utils::{chain_config, local_status};
use crate::types::Direction;

pub(super) const IDLE: Duration = Duration::from_secs(60);

pub(super) fn test_config() -> SyncConfig {
    SyncConfig {
        max_headers_fetch: 20,
        reply_timeout: Duration::from_secs(1),
        conn_idle_timeout: IDLE,
        ..SyncConfig::default()
    }
}

pub(super) struct RunningEngine {
    pub handle: SyncHandle,
    pub registry: Arc<PeerRegistry>,
    pub task: JoinHandle<Result<(), SyncError>>,
}

pub(super) fn start_engine(store: Arc<MemoryHeaderStore>, config: SyncConfig) -> RunningEngine {
    let registry = Arc::new(PeerRegistry::new());
    let engine = SyncEngine::new(
        store,
        registry.clone(),
        config,
        Arc::new(Metrics::default()),
    );
    let handle = engine.handle();
    RunningEngine {
        handle,
        registry,
        task: tokio::spawn(engine.run()),
    }
}

/// Two sessions talking to each other over an in-memory stream.
pub(super) fn session_pair() -> (PeerSession, PeerSession) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let codec = LesCodec::default();
    (
        PeerSession::spawn(PeerId::random(), Direction::Outbound, a, codec, IDLE),
        PeerSession::spawn(PeerId::random(), Direction::Inbound, b, codec, IDLE),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Behaviour {
    /// Answers every GetBlockHeaders from its store, up to the serve limit.
    Honest,
    /// Never answers.
    Silent,
}

/// Remote node serving headers to the engine under test.
pub(super) struct ServerPeer {
    pub id: PeerId,
    /// Highest block number the peer is willing to serve.
    pub serve_limit: Arc<AtomicU64>,
    pub handle: PeerHandle,
}

/// Handshake with the engine, advertising `head`, and hand the engine's end
/// of the connection to it. Returns the remote end.
pub(super) async fn connect_raw(
    engine: &SyncHandle,
    local_store: &MemoryHeaderStore,
    head: ChainHead,
) -> (PeerId, PeerSession) {
    let id = PeerId::random();
    (id, connect_raw_as(engine, local_store, head, id).await)
}

/// Like [`connect_raw`], with the engine seeing the peer as `id`.
pub(super) async fn connect_raw_as(
    engine: &SyncHandle,
    local_store: &MemoryHeaderStore,
    head: ChainHead,
    id: PeerId,
) -> PeerSession {
    let (client, server) = handshaken(local_store, head, id).await;
    engine.register_peer(client, head).unwrap();
    server
}

/// Handshake a session pair without registering it. The first session is
/// the engine's end, seeing the remote as `id` advertising `head`.
pub(super) async fn handshaken(
    local_store: &MemoryHeaderStore,
    head: ChainHead,
    id: PeerId,
) -> (PeerSession, PeerSession) {
    let config = chain_config();
    let local = local_status(local_store);
    let advertised = Status::new(
        config.protocol_version,
        config.network_id,
        head,
        config.genesis_hash,
    );

    let (client_stream, server_stream) = tokio::io::duplex(1024 * 1024);
    let codec = LesCodec::default();
    let (client, server) = tokio::join!(
        PeerSession::connect(id, Direction::Outbound, client_stream, codec, &local, IDLE),
        PeerSession::connect(
            PeerId::random(),
            Direction::Inbound,
            server_stream,
            codec,
            &advertised,
            IDLE
        ),
    );
    let (client, remote) = client.unwrap();
    let (server, _) = server.unwrap();
    assert_eq!(remote.head(), head);

    (client, server)
}

impl ServerPeer {
    pub async fn connect(
        engine: &SyncHandle,
        local_store: &MemoryHeaderStore,
        store: Arc<MemoryHeaderStore>,
        head: ChainHead,
        behaviour: Behaviour,
    ) -> Self {
        let (id, server) = connect_raw(engine, local_store, head).await;
        let serve_limit = Arc::new(AtomicU64::new(head.number));
        let handle = server.handle().clone();
        tokio::spawn(serve(server, store, serve_limit.clone(), behaviour));

        Self {
            id,
            serve_limit,
            handle,
        }
    }

    pub fn announce(&self, head: ChainHead, reorg_depth: u64) {
        self.serve_limit.store(head.number, Ordering::SeqCst);
        self.handle.send_announce(head, reorg_depth).unwrap();
    }
}

async fn serve(
    mut session: PeerSession,
    store: Arc<MemoryHeaderStore>,
    serve_limit: Arc<AtomicU64>,
    behaviour: Behaviour,
) {
    while let Some(message) = session.recv().await {
        let LesMessage::GetBlockHeaders(request) = message else {
            continue;
        };
        if behaviour == Behaviour::Silent {
            continue;
        }
        let limit = serve_limit.load(Ordering::SeqCst);
        let headers = answer_query(&*store, &request.query, limit).unwrap();
        let _ = session
            .handle()
            .send_block_headers(request.request_id, 1_000, headers);
    }
}

/// Head of `store` as the engine would advertise it.
pub(super) fn head_of(store: &MemoryHeaderStore, number: u64) -> ChainHead {
    let header = store.canonical_header_by_number(number).unwrap().unwrap();
    ChainHead::from_header(&header, store.score(&header.hash()).unwrap().unwrap())
}

/// Wait, in small steps, until `done` holds.
pub(super) async fn eventually(mut done: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
