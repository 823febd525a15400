use std::time::Duration;

use containers::PeerId;

use crate::les::LesCodec;
use crate::peer::PeerSession;
use crate::types::Direction;

mod registry_tests;

const IDLE: Duration = Duration::from_secs(2);

/// Two sessions talking to each other over an in-memory stream.
fn session_pair() -> (PeerSession, PeerSession) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let codec = LesCodec::default();
    (
        PeerSession::spawn(PeerId::random(), Direction::Outbound, a, codec, IDLE),
        PeerSession::spawn(PeerId::random(), Direction::Inbound, b, codec, IDLE),
    )
}
