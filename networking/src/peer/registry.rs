use std::collections::HashMap;
use std::sync::Arc;

use containers::PeerId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::session::PeerHandle;
use crate::types::DisconnectReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(PeerId),
    /// `session` is the serial of the session that went away.
    Removed { peer: PeerId, session: u64 },
}

/// Live peer sessions, keyed by peer id.
///
/// A session leaves the registry on its own when it is torn down, and
/// every subscriber hears about it.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<RegistryEvent>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Register a session. Returns `false`, leaving the registry untouched,
    /// if a live session with the same peer is already registered.
    pub fn add(self: &Arc<Self>, handle: PeerHandle) -> bool {
        let id = handle.id();
        let replaced = {
            let mut peers = self.peers.lock();
            if peers.get(&id).is_some_and(|existing| !existing.is_closed()) {
                debug!(peer = %id, "Peer already registered");
                return false;
            }
            peers.insert(id, handle.clone())
        };
        if let Some(replaced) = replaced {
            self.notify(RegistryEvent::Removed {
                peer: id,
                session: replaced.serial(),
            });
        }
        info!(peer = %id, direction = handle.direction().as_str(), "Peer registered");
        self.notify(RegistryEvent::Added(id));

        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            handle.closed().await;
            if let Some(registry) = registry.upgrade() {
                registry.remove_session(&handle);
            }
        });

        true
    }

    /// Unregister a peer without closing its session.
    pub fn remove(&self, id: &PeerId) -> Option<PeerHandle> {
        let removed = self.peers.lock().remove(id);
        if let Some(handle) = &removed {
            self.notify(RegistryEvent::Removed {
                peer: *id,
                session: handle.serial(),
            });
        }
        removed
    }

    fn remove_session(&self, handle: &PeerHandle) {
        let id = handle.id();
        let removed = {
            let mut peers = self.peers.lock();
            match peers.get(&id) {
                Some(current) if current.serial() == handle.serial() => peers.remove(&id),
                _ => None,
            }
        };
        if removed.is_some() {
            info!(peer = %id, "Peer unregistered");
            self.notify(RegistryEvent::Removed {
                peer: id,
                session: handle.serial(),
            });
        }
    }

    pub fn get(&self, id: &PeerId) -> Option<PeerHandle> {
        self.peers.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Tear down every registered session.
    pub fn disconnect_all(&self, reason: DisconnectReason) {
        let handles: Vec<PeerHandle> = self.peers.lock().values().cloned().collect();
        for handle in handles {
            handle.disconnect(reason);
        }
    }

    fn notify(&self, event: RegistryEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event).is_ok());
    }
}
