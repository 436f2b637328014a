//! Consensus gossip synchronizer.
//!
//! Sits between a BFT consensus engine and the peer-to-peer network and
//! makes sure every honest neighbor eventually holds the block parts and
//! votes it needs at the current height and round.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────┐
//!  NetworkManager │       GossipSynchronizer      │  FastSyncManager
//!  (reactor cbs) ─┤  peer task │ peer task │ ...  ├─ (bulk catch-up)
//!                 │      shared mutex + Engine    │
//!                 └───────────────────────────────┘
//! ```
//!
//! One cooperative task runs per peer. On each wakeup it takes the shared
//! mutex, picks the single most useful message for that peer (commit
//! precommits first, then block parts, then vote fills), releases the
//! mutex, and unicasts. A configurable bytes-per-second cap paces the
//! wakeups. Peers that advertise a height far above ours trigger one bulk
//! fast-sync fetch instead of part-by-part gossip.
//!
//! The engine, block store, network, and fast-sync service are external
//! collaborators behind [`Engine`], [`BlockStore`], [`FastSyncManager`],
//! and the transport traits in `syncline-network`.

mod config;
mod error;
mod fastsync;
mod peer;
mod syncer;
#[cfg(test)]
mod testutil;
mod traits;

pub use config::{ConfigError, SyncConfig};
pub use error::{EngineError, FastSyncError, StoreError, SyncError};
pub use fastsync::{
    decode_commit_votes, CommitVotesDecoder, FastSyncManager, FetchHandle, FetchListener,
};
pub use syncer::{GossipSynchronizer, SyncerStatus};
pub use traits::{BlockStore, Engine};
