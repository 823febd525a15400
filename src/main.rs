mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chain::{ChainConfig, HeaderStore, MemoryHeaderStore};
use clap::Parser;
use containers::{PeerId, Status};
use metrics::server::{MetricsServerConfig, run_metrics_server};
use metrics::{Metrics, SharedMetrics};
use networking::les::LesCodec;
use networking::peer::{PeerRegistry, PeerSession};
use networking::sync::{SyncEngine, SyncHandle};
use networking::types::Direction;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::config::{Network, NodeConfig, PeerAddress};

#[derive(Parser, Debug)]
struct Args {
    /// YAML node configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer to dial, `host:port` or `<node id>@host:port`. Repeatable.
    #[arg(short, long)]
    peer: Vec<String>,

    /// `mainnet`, `ropsten` or a numeric network id.
    #[arg(short, long)]
    network_id: Option<Network>,

    /// Accept inbound connections on this address.
    #[arg(short, long)]
    listen: Option<std::net::SocketAddr>,

    #[arg(long)]
    metrics: bool,

    #[arg(long, default_value = "127.0.0.1")]
    metrics_address: IpAddr,

    #[arg(long, default_value_t = 9090)]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => NodeConfig::default(),
    };
    if let Some(network) = args.network_id {
        config.network = network;
    }
    if args.listen.is_some() {
        config.listen = args.listen;
    }
    config.peers.extend(args.peer.iter().cloned());
    let peers = config.peer_addresses()?;

    let (chain, genesis) = config.chain();
    info!(
        network = %config.network,
        network_id = chain.network_id,
        genesis = %chain.genesis_hash,
        "Starting LES client"
    );
    let store = Arc::new(MemoryHeaderStore::new(genesis));

    let metrics: SharedMetrics = Arc::new(Metrics::new());
    if args.metrics {
        let metrics_config = MetricsServerConfig {
            metrics_address: args.metrics_address,
            metrics_port: args.metrics_port,
        };
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(err) = run_metrics_server(metrics_config, metrics).await {
                error!(%err, "Metrics server exited");
            }
        });
    }

    let registry = Arc::new(PeerRegistry::new());
    let engine = SyncEngine::new(store.clone(), registry, config.sync.clone(), metrics);
    let handle = engine.handle();
    let mut engine_task = tokio::spawn(engine.run());

    let idle_timeout = config.sync.conn_idle_timeout;
    for peer in peers {
        let handle = handle.clone();
        let store = store.clone();
        tokio::spawn(async move {
            let address = peer.address.clone();
            if let Err(err) = dial(peer, &handle, &*store, chain, idle_timeout).await {
                warn!(%address, %err, "Failed to connect to peer");
            }
        });
    }

    if let Some(listen) = config.listen {
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("failed to listen on {listen}"))?;
        info!(%listen, "Accepting LES connections");
        tokio::spawn(accept_loop(listener, handle.clone(), store.clone(), chain, idle_timeout));
    }

    tokio::select! {
        result = &mut engine_task => {
            result??;
            return Ok(());
        }
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }
    }

    handle.cancel().await;
    engine_task.await??;

    info!(head = %handle.head().hash, number = handle.head().number, "Stopped");
    Ok(())
}

fn local_status(store: &MemoryHeaderStore, chain: ChainConfig) -> Result<Status> {
    let head = store.canonical_chain_head()?;
    Ok(Status::new(chain.protocol_version, chain.network_id, head, chain.genesis_hash))
}

async fn dial(
    peer: PeerAddress,
    handle: &SyncHandle,
    store: &MemoryHeaderStore,
    chain: ChainConfig,
    idle_timeout: Duration,
) -> Result<()> {
    let stream = TcpStream::connect(&peer.address).await?;
    stream.set_nodelay(true)?;
    let id = peer.id.unwrap_or_else(PeerId::random);

    register(stream, id, Direction::Outbound, handle, store, chain, idle_timeout).await
}

async fn accept_loop(
    listener: TcpListener,
    handle: SyncHandle,
    store: Arc<MemoryHeaderStore>,
    chain: ChainConfig,
    idle_timeout: Duration,
) {
    loop {
        let (stream, address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(%err, "Failed to accept connection");
                continue;
            }
        };
        let handle = handle.clone();
        let store = store.clone();
        tokio::spawn(async move {
            // Inbound peers have no known identity here.
            let id = PeerId::random();
            let result = register(stream, id, Direction::Inbound, &handle, &*store, chain, idle_timeout);
            if let Err(err) = result.await {
                warn!(%address, %err, "Inbound handshake failed");
            }
        });
    }
}

async fn register(
    stream: TcpStream,
    id: PeerId,
    direction: Direction,
    handle: &SyncHandle,
    store: &MemoryHeaderStore,
    chain: ChainConfig,
    idle_timeout: Duration,
) -> Result<()> {
    let local = local_status(store, chain)?;
    let (session, remote) =
        PeerSession::connect(id, direction, stream, LesCodec::default(), &local, idle_timeout).await?;

    let head = remote.head();
    info!(
        peer = %id,
        direction = direction.as_str(),
        number = head.number,
        td = %head.score,
        "Peer connected"
    );
    handle.register_peer(session, head)?;
    Ok(())
}
