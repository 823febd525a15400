use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use containers::{BlockHeader, ChainHead, PeerId, Status};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::handshake::{HandshakeError, handshake};
use crate::les::{Announce, BlockHeaders, GetBlockHeaders, HeaderQuery, LesCodec, LesMessage};
use crate::types::{Direction, DisconnectReason};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
#[error("session with {0} is closed")]
pub struct SessionClosed(pub PeerId);

/// Shared teardown state of one session. The first reason recorded wins.
#[derive(Clone, Debug, Default)]
struct Teardown {
    token: CancellationToken,
    reason: Arc<Mutex<Option<DisconnectReason>>>,
}

impl Teardown {
    fn close(&self, reason: DisconnectReason) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.token.cancel();
    }

    fn reason(&self) -> Option<DisconnectReason> {
        *self.reason.lock()
    }
}

/// Cloneable sending side of a [`PeerSession`].
#[derive(Clone, Debug)]
pub struct PeerHandle {
    id: PeerId,
    serial: u64,
    direction: Direction,
    outbound: mpsc::UnboundedSender<LesMessage>,
    teardown: Teardown,
}

impl PeerHandle {
    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Distinguishes successive sessions with the same peer.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Queue `message` for the writer task.
    pub fn send(&self, message: LesMessage) -> Result<(), SessionClosed> {
        if self.is_closed() {
            return Err(SessionClosed(self.id));
        }
        self.outbound
            .send(message)
            .map_err(|_| SessionClosed(self.id))
    }

    pub fn send_announce(&self, head: ChainHead, reorg_depth: u64) -> Result<(), SessionClosed> {
        self.send(LesMessage::Announce(Announce::new(head, reorg_depth)))
    }

    pub fn send_get_block_headers(
        &self,
        request_id: u64,
        query: HeaderQuery,
    ) -> Result<(), SessionClosed> {
        self.send(LesMessage::GetBlockHeaders(GetBlockHeaders { request_id, query }))
    }

    pub fn send_block_headers(
        &self,
        request_id: u64,
        buffer_value: u64,
        headers: Vec<BlockHeader>,
    ) -> Result<(), SessionClosed> {
        self.send(LesMessage::BlockHeaders(BlockHeaders {
            request_id,
            buffer_value,
            headers,
        }))
    }

    /// Tear the session down. Has no effect on a closed session.
    pub fn disconnect(&self, reason: DisconnectReason) {
        self.teardown.close(reason);
    }

    pub fn is_closed(&self) -> bool {
        self.teardown.token.is_cancelled()
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.teardown.reason()
    }

    /// Resolves once the session has been torn down.
    pub async fn closed(&self) {
        self.teardown.token.cancelled().await;
    }
}

/// One connection to a remote node.
///
/// A reader task decodes frames into the inbound queue and a writer task
/// encodes whatever is sent through the [`PeerHandle`]. Either task tears the
/// session down on transport errors; the reader also does so on an
/// undecodable frame or when nothing arrives within the idle timeout.
#[derive(Debug)]
pub struct PeerSession {
    handle: PeerHandle,
    inbound: mpsc::UnboundedReceiver<LesMessage>,
}

impl PeerSession {
    /// Start the reader and writer tasks on an already handshaken stream.
    pub fn spawn<T>(
        id: PeerId,
        direction: Direction,
        stream: T,
        codec: LesCodec,
        idle_timeout: Duration,
    ) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let teardown = Teardown::default();

        tokio::spawn(write_loop(id, writer, codec, outbound_rx, teardown.clone()));
        tokio::spawn(read_loop(
            id,
            reader,
            codec,
            inbound_tx,
            idle_timeout,
            teardown.clone(),
        ));

        let handle = PeerHandle {
            id,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            direction,
            outbound: outbound_tx,
            teardown,
        };

        Self {
            handle,
            inbound: inbound_rx,
        }
    }

    /// Run the Status handshake on `stream`, then start the session.
    ///
    /// Returns the session together with the remote Status.
    pub async fn connect<T>(
        id: PeerId,
        direction: Direction,
        mut stream: T,
        codec: LesCodec,
        local: &Status,
        idle_timeout: Duration,
    ) -> Result<(Self, Status), HandshakeError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let remote = handshake(&mut stream, &codec, local, idle_timeout).await?;
        let session = Self::spawn(id, direction, stream, codec, idle_timeout);
        Ok((session, remote))
    }

    pub fn id(&self) -> PeerId {
        self.handle.id
    }

    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    /// Next inbound message, or `None` once the session is torn down and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<LesMessage> {
        self.inbound.recv().await
    }
}

async fn read_loop<R>(
    id: PeerId,
    mut reader: R,
    codec: LesCodec,
    inbound: mpsc::UnboundedSender<LesMessage>,
    idle_timeout: Duration,
    teardown: Teardown,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = teardown.token.cancelled() => break,
            frame = tokio::time::timeout(idle_timeout, codec.read_message(&mut reader)) => frame,
        };

        let reason = match frame {
            Ok(Ok(message)) => {
                trace!(peer = %id, message = message.name(), "Received message");
                if inbound.send(message).is_ok() {
                    continue;
                }
                DisconnectReason::DisconnectRequested
            }
            Ok(Err(err)) if err.kind() == io::ErrorKind::InvalidData => {
                warn!(peer = %id, %err, "Undecodable frame");
                DisconnectReason::BreachOfProtocol
            }
            Ok(Err(err)) => {
                debug!(peer = %id, %err, "Transport closed");
                DisconnectReason::TcpSubsystemError
            }
            Err(_) => {
                debug!(peer = %id, ?idle_timeout, "No traffic within idle timeout");
                DisconnectReason::Timeout
            }
        };
        teardown.close(reason);
        break;
    }

    info!(
        peer = %id,
        reason = teardown.reason().map(|reason| reason.as_str()),
        "Peer session closed"
    );
}

async fn write_loop<W>(
    id: PeerId,
    mut writer: W,
    codec: LesCodec,
    mut outbound: mpsc::UnboundedReceiver<LesMessage>,
    teardown: Teardown,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = teardown.token.cancelled() => break,
            message = outbound.recv() => message,
        };
        let Some(message) = message else {
            break;
        };

        trace!(peer = %id, message = message.name(), "Sending message");
        if let Err(err) = codec.write_message(&mut writer, &message).await {
            debug!(peer = %id, %err, "Write failed");
            teardown.close(DisconnectReason::TcpSubsystemError);
            break;
        }
    }

    let _ = writer.shutdown().await;
}
