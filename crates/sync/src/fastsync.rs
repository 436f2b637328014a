//! Seam to the bulk fast-sync service.
//!
//! When a peer advertises a height too far above ours for part-by-part
//! gossip, the synchronizer anchors a fetch at its last committed block and
//! lets the fast-sync service stream whole blocks back through a
//! [`FetchListener`]. At most one fetch is outstanding at a time; the
//! synchronizer keeps the [`FetchHandle`] for the duration and cancels it
//! on shutdown.

use crate::error::FastSyncError;
use crate::syncer::Shared;
use std::sync::{Arc, Weak};
use syncline_network::CodecError;
use syncline_types::{Block, BlockHeight, BlockResult, VoteList};
use tracing::debug;

/// Decoder for the commit-vote bytes that accompany fetched blocks.
///
/// Passed into [`FastSyncManager::fetch_blocks`] so the service can parse
/// and sanity-check vote payloads without depending on the engine.
pub type CommitVotesDecoder = fn(&[u8]) -> Result<VoteList, CodecError>;

/// Decode a serialized commit-vote list.
///
/// The canonical [`CommitVotesDecoder`]; fetched vote payloads use the same
/// SBOR encoding the vote-list wire message does.
pub fn decode_commit_votes(bytes: &[u8]) -> Result<VoteList, CodecError> {
    sbor::basic_decode(bytes).map_err(|e| CodecError::SborDecode(format!("{:?}", e)))
}

/// Receives the results of a block fetch.
///
/// Callbacks are invoked asynchronously from the fast-sync service's own
/// tasks, never from inside [`FastSyncManager::fetch_blocks`]. The
/// synchronizer's listener takes the shared consensus mutex as its first
/// action.
pub trait FetchListener: Send + Sync {
    /// One fetched block, delivered in height order.
    fn on_block(&self, result: BlockResult);

    /// The fetch finished; `None` means the requested range was exhausted.
    /// After this call the fetch's handle is dead.
    fn on_end(&self, error: Option<FastSyncError>);
}

/// Cancels an outstanding fetch.
pub struct FetchHandle {
    cancel: Box<dyn FnOnce() -> bool + Send>,
}

impl FetchHandle {
    /// Wrap a cancel function supplied by the fast-sync service.
    pub fn new(cancel: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Cancel the fetch. Returns whether the fetch was still in flight.
    pub fn cancel(self) -> bool {
        (self.cancel)()
    }
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle").finish_non_exhaustive()
    }
}

/// The bulk block-download service.
///
/// `start_server`/`stop_server` bracket the synchronizer's lifetime: while
/// running, the service also answers other nodes' fetch requests.
pub trait FastSyncManager: Send {
    /// Begin serving fetch requests from other peers.
    fn start_server(&mut self);

    /// Stop serving fetch requests.
    fn stop_server(&mut self);

    /// Fetch blocks from `from` up to `to` inclusive (`None` = until the
    /// service decides the chain tip is reached), anchored at our last
    /// committed block. Results stream to `listener`.
    fn fetch_blocks(
        &mut self,
        from: BlockHeight,
        to: Option<BlockHeight>,
        anchor: Block,
        votes_decoder: CommitVotesDecoder,
        listener: Arc<dyn FetchListener>,
    ) -> Result<FetchHandle, FastSyncError>;
}

/// Forwards fetch results into the synchronizer.
///
/// Holds only a weak back-reference: the fast-sync service may outlive a
/// dropped synchronizer, and the reverse edge (synchronizer → handle) is
/// the owning one.
pub(crate) struct FetchRelay {
    shared: Weak<Shared>,
}

impl FetchRelay {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }
}

impl FetchListener for FetchRelay {
    fn on_block(&self, result: BlockResult) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock();
        if !inner.running {
            return;
        }
        debug!(height = %result.block().height, "fast-sync block received");
        inner.engine.receive_block(result);
    }

    fn on_end(&self, error: Option<FastSyncError>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut inner = shared.inner.lock();
        if !inner.running {
            return;
        }
        match &error {
            Some(err) => debug!(error = %err, "fast-sync fetch ended"),
            None => debug!("fast-sync fetch complete"),
        }
        inner.fetch = None;
    }
}
