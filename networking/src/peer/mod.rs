//! Connected peers.
//!
//! - **Handshake**: Status exchange before a session starts
//! - **Session**: one reader and one writer task per connection
//! - **Registry**: the set of live sessions, with add/remove notifications

pub mod handshake;
pub mod registry;
pub mod session;

pub use handshake::{HandshakeError, handshake};
pub use registry::{PeerRegistry, RegistryEvent};
pub use session::{PeerHandle, PeerSession, SessionClosed};

#[cfg(test)]
mod tests;
