use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::{IDLE, session_pair};
use crate::les::LesCodec;
use crate::peer::{PeerRegistry, PeerSession, RegistryEvent};
use crate::types::{DisconnectReason, Direction};

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<RegistryEvent>,
) -> RegistryEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("registry event in time")
        .expect("registry alive")
}

#[tokio::test]
async fn test_add_notifies_subscribers() {
    let registry = Arc::new(PeerRegistry::new());
    let mut events = registry.subscribe();
    let (a, _b) = session_pair();
    let id = a.id();

    assert!(registry.add(a.handle().clone()));

    assert_eq!(next_event(&mut events).await, RegistryEvent::Added(id));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(&id).map(|handle| handle.id()), Some(id));
}

#[tokio::test]
async fn test_live_duplicate_is_rejected() {
    let registry = Arc::new(PeerRegistry::new());
    let (a, _b) = session_pair();

    assert!(registry.add(a.handle().clone()));
    assert!(!registry.add(a.handle().clone()));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_teardown_unregisters() {
    let registry = Arc::new(PeerRegistry::new());
    let mut events = registry.subscribe();
    let (a, _b) = session_pair();
    let id = a.id();
    registry.add(a.handle().clone());
    next_event(&mut events).await;

    a.handle().disconnect(DisconnectReason::DisconnectRequested);

    assert_eq!(
        next_event(&mut events).await,
        RegistryEvent::Removed {
            peer: id,
            session: a.handle().serial(),
        }
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_disconnect_all() {
    let registry = Arc::new(PeerRegistry::new());
    let (a, b) = session_pair();
    registry.add(a.handle().clone());
    registry.add(b.handle().clone());

    registry.disconnect_all(DisconnectReason::DisconnectRequested);

    a.handle().closed().await;
    b.handle().closed().await;
    assert_eq!(
        a.handle().disconnect_reason(),
        Some(DisconnectReason::DisconnectRequested)
    );
    assert_eq!(
        b.handle().disconnect_reason(),
        Some(DisconnectReason::DisconnectRequested)
    );
}

#[tokio::test]
async fn test_closed_session_is_replaced() {
    let registry = Arc::new(PeerRegistry::new());
    let mut events = registry.subscribe();
    let (a, _b) = session_pair();
    let id = a.id();
    registry.add(a.handle().clone());
    next_event(&mut events).await;

    let (stream, _remote) = tokio::io::duplex(1024);
    let replacement = PeerSession::spawn(id, Direction::Inbound, stream, LesCodec::default(), IDLE);
    a.handle().disconnect(DisconnectReason::DisconnectRequested);
    assert!(registry.add(replacement.handle().clone()));

    assert_eq!(
        next_event(&mut events).await,
        RegistryEvent::Removed {
            peer: id,
            session: a.handle().serial(),
        }
    );
    assert_eq!(next_event(&mut events).await, RegistryEvent::Added(id));
    assert_eq!(
        registry.get(&id).map(|handle| handle.serial()),
        Some(replacement.handle().serial())
    );
}
