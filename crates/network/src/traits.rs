//! Transport seam between the synchronizer and the network backend.
//!
//! The synchronizer registers itself as a [`Reactor`] for its protocol tags
//! and receives a [`ProtocolHandler`] to send through. Backends own sockets,
//! encryption, and peer discovery; none of that crosses this boundary.
//!
//! All `ProtocolHandler` methods are called with no locks held; reactor
//! callbacks run under the synchronizer's mutex, sends never do.

use crate::codec::CodecError;
use std::sync::Arc;
use syncline_messages::VerifyError;
use syncline_types::{PeerId, Protocol};

/// Error returned when a send fails.
///
/// Send failures are not fatal to the protocol: the next round-state
/// exchange reconciles whatever was lost.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("peer unreachable: {0}")]
    PeerUnreachable(PeerId),

    #[error("send queue full")]
    QueueFull,

    #[error("transport closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Error returned when reactor registration fails.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("reactor name already registered: {0}")]
    DuplicateName(String),

    #[error("protocol tag already claimed: {0}")]
    DuplicateProtocol(Protocol),

    #[error("network manager not running")]
    NotRunning,
}

/// Error a reactor reports back for an inbound message, so the transport
/// can penalize the sender.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("engine rejected message: {0}")]
    Rejected(String),
}

/// Scope of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastScope {
    /// Directly connected peers only.
    Neighbors,
    /// Every reachable peer, flooded.
    All,
}

/// Outbound send surface obtained from reactor registration.
///
/// Implementations are concurrent-safe; the synchronizer calls them from
/// peer tasks and timer callbacks without coordination.
pub trait ProtocolHandler: Send + Sync {
    /// Send one message to one peer.
    fn unicast(&self, protocol: Protocol, bytes: &[u8], to: PeerId) -> Result<(), NetworkError>;

    /// Send one message to every peer in scope.
    fn broadcast(
        &self,
        protocol: Protocol,
        bytes: &[u8],
        scope: BroadcastScope,
    ) -> Result<(), NetworkError>;
}

/// Inbound callbacks a registered reactor receives.
///
/// The transport invokes these from its delivery threads; the synchronizer's
/// implementations take the shared consensus mutex as their first action.
pub trait Reactor: Send + Sync {
    /// One message arrived for a registered protocol tag.
    ///
    /// `Ok(true)` means the message was consumed, `Ok(false)` that it was
    /// ignored (e.g. the reactor is stopped). Errors flow back to the
    /// transport for sender penalties.
    fn on_receive(
        &self,
        protocol: Protocol,
        bytes: &[u8],
        from: PeerId,
    ) -> Result<bool, ReceiveError>;

    /// A previously accepted outbound message failed to send.
    fn on_failure(&self, error: NetworkError, protocol: Protocol, bytes: &[u8]);

    /// A peer connected.
    fn on_join(&self, peer: PeerId);

    /// A peer disconnected.
    fn on_leave(&self, peer: PeerId);
}

/// Registration surface of the network backend.
pub trait NetworkManager: Send + Sync {
    /// Register a reactor for a set of protocol tags at the given priority,
    /// returning the handler to send through.
    fn register_reactor(
        &self,
        name: &str,
        reactor: Arc<dyn Reactor>,
        protocols: &[Protocol],
        priority: u8,
    ) -> Result<Arc<dyn ProtocolHandler>, RegistrationError>;

    /// Currently connected peers.
    fn peers(&self) -> Vec<PeerId>;
}
