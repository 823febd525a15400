use serde::{Deserialize, Serialize};

/// Lifecycle of a connection to a peer, as seen by the sync layer.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Session torn down; kept only until the engine forgets the peer.
    Disconnected,
    /// Handshake done, can exchange LES messages.
    Connected,
    /// Teardown in progress.
    Disconnecting,
}

/// Why a peer session ended.
///
/// Codes follow the devp2p disconnect reasons so they can be reported to
/// the remote side by a transport that speaks the base protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum DisconnectReason {
    /// Closed on request of this node (shutdown or explicit disconnect).
    DisconnectRequested = 0x00,
    /// Transport failed or the remote side closed it.
    TcpSubsystemError = 0x01,
    /// Undecodable frame or message out of place.
    BreachOfProtocol = 0x02,
    /// Peer follows a different network or genesis.
    UselessPeer = 0x03,
    /// No traffic within the idle timeout.
    Timeout = 0x0b,
}

impl DisconnectReason {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x00 => Some(DisconnectReason::DisconnectRequested),
            0x01 => Some(DisconnectReason::TcpSubsystemError),
            0x02 => Some(DisconnectReason::BreachOfProtocol),
            0x03 => Some(DisconnectReason::UselessPeer),
            0x0b => Some(DisconnectReason::Timeout),
            _ => None,
        }
    }

    pub fn code(&self) -> u64 {
        *self as u64
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::DisconnectRequested => "requested",
            DisconnectReason::TcpSubsystemError => "transport",
            DisconnectReason::BreachOfProtocol => "protocol",
            DisconnectReason::UselessPeer => "useless_peer",
            DisconnectReason::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}
