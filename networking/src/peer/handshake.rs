use std::time::Duration;

use alloy_primitives::B256;
use containers::Status;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::les::{LesCodec, LesMessage};

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("transport: {0}")]
    Io(#[from] std::io::Error),

    #[error("no Status within {0:?}")]
    Timeout(Duration),

    #[error("expected Status, got {0}")]
    UnexpectedMessage(&'static str),

    #[error("protocol version {remote} does not match ours ({local})")]
    ProtocolVersionMismatch { local: u32, remote: u32 },

    #[error("network id {remote} does not match ours ({local})")]
    NetworkMismatch { local: u64, remote: u64 },

    #[error("genesis {remote} does not match ours ({local})")]
    GenesisMismatch { local: B256, remote: B256 },
}

/// Exchange Status messages and check the remote side follows our chain.
///
/// Our Status is written before the remote one is read, so both ends can
/// call this at the same time. Returns the remote Status.
pub async fn handshake<T>(
    stream: &mut T,
    codec: &LesCodec,
    local: &Status,
    timeout: Duration,
) -> Result<Status, HandshakeError>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    codec
        .write_message(stream, &LesMessage::Status(local.clone()))
        .await?;

    let message = tokio::time::timeout(timeout, codec.read_message(stream))
        .await
        .map_err(|_| HandshakeError::Timeout(timeout))??;
    let LesMessage::Status(remote) = message else {
        return Err(HandshakeError::UnexpectedMessage(message.name()));
    };

    if remote.protocol_version != local.protocol_version {
        return Err(HandshakeError::ProtocolVersionMismatch {
            local: local.protocol_version,
            remote: remote.protocol_version,
        });
    }
    if remote.network_id != local.network_id {
        return Err(HandshakeError::NetworkMismatch {
            local: local.network_id,
            remote: remote.network_id,
        });
    }
    if remote.genesis_hash != local.genesis_hash {
        return Err(HandshakeError::GenesisMismatch {
            local: local.genesis_hash,
            remote: remote.genesis_hash,
        });
    }

    debug!(
        head = %remote.head_hash,
        number = remote.head_number,
        td = %remote.head_td,
        "Handshake complete"
    );

    Ok(remote)
}
