//! Error taxonomy for the synchronizer and its collaborator seams.

use crate::config::ConfigError;
use syncline_network::RegistrationError;
use syncline_types::BlockHeight;
use thiserror::Error;

/// Errors the synchronizer surfaces to its caller.
///
/// Only startup can fail; everything after that is logged and absorbed or
/// returned to the network reactor.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Why the engine refused a delivered part or vote.
///
/// A rejection aborts processing of the current message only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("block part index {index} out of range at height {height}")]
    PartOutOfRange { height: BlockHeight, index: u16 },

    #[error("message outside the engine's height window")]
    OutOfWindow,

    #[error("engine rejected message: {0}")]
    Rejected(String),
}

/// Errors from the canonical block store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no block at height {0}")]
    NotFound(BlockHeight),

    #[error("block store error: {0}")]
    Backend(String),
}

/// Errors from the bulk fast-sync service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FastSyncError {
    #[error("fetch cancelled")]
    Cancelled,

    #[error("no peer could serve the requested range")]
    NoPeers,

    #[error("fast sync failed: {0}")]
    Failed(String),
}
