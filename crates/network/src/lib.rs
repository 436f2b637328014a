//! Wire codec and transport seam for the gossip synchronizer.
//!
//! This crate owns the byte-level concerns (SBOR encoding plus LZ4
//! compression) and the traits the synchronizer talks to the transport
//! through: [`NetworkManager`] for reactor registration, [`ProtocolHandler`]
//! for sends, and [`Reactor`] for inbound callbacks. Transport backends
//! implement the traits; the synchronizer never sees sockets.

mod codec;
mod traits;
mod wire;

pub use codec::{decode_message, decode_raw, encode_message, CodecError, Message};
pub use traits::{
    BroadcastScope, NetworkError, NetworkManager, ProtocolHandler, Reactor, ReceiveError,
    RegistrationError,
};
pub use wire::{compress, decompress, WireError};
