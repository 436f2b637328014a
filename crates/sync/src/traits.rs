//! Seams to the consensus engine and the canonical block store.
//!
//! The engine lives behind the synchronizer's mutex (see
//! [`GossipSynchronizer::with_engine`](crate::GossipSynchronizer::with_engine));
//! every method here is called with that lock held. Block store queries are
//! pure reads and carry no locking requirement of their own.

use crate::error::{EngineError, StoreError};
use syncline_messages::BlockPartMessage;
use syncline_types::{
    BitArray, Block, BlockHeight, BlockResult, PartSet, PeerRoundState, Round, Step, Vote, VoteList,
};

/// The consensus engine as the synchronizer sees it.
///
/// Reads describe the engine's position and holdings; the `receive_*`
/// methods deliver gossip the network produced. Signature verification
/// happens behind this trait, never in the synchronizer.
pub trait Engine: Send {
    /// Current height.
    fn height(&self) -> BlockHeight;

    /// Current round within the height.
    fn round(&self) -> Round;

    /// Current step within the round.
    fn step(&self) -> Step;

    /// The part set of the block committed at `height`. For heights the
    /// engine has not committed, an empty part set is returned and nothing
    /// will be gossiped.
    fn commit_block_parts(&self, height: BlockHeight) -> PartSet;

    /// The precommits that justified committing `height`.
    fn commit_precommits(&self, height: BlockHeight) -> VoteList;

    /// All precommits the engine holds for `round` at the current height.
    fn precommits(&self, round: Round) -> VoteList;

    /// The engine's votes at `round` restricted to the given missing-vote
    /// masks (bit `i` set = the peer lacks validator `i`'s vote).
    fn votes(
        &self,
        round: Round,
        missing_prevotes: &BitArray,
        missing_precommits: &BitArray,
    ) -> VoteList;

    /// What we advertise to peers right now.
    fn round_state(&self) -> PeerRoundState;

    /// Deliver one block part. Returns the accepted part index.
    fn receive_block_part(
        &mut self,
        msg: &BlockPartMessage,
        unicast: bool,
    ) -> Result<usize, EngineError>;

    /// Deliver one vote. Returns the voter's validator index.
    fn receive_vote(&mut self, vote: &Vote, unicast: bool) -> Result<usize, EngineError>;

    /// Deliver a block fetched by fast-sync.
    fn receive_block(&mut self, result: BlockResult);
}

/// Read-only access to the canonical block store.
pub trait BlockStore: Send {
    /// The committed block at `height`.
    fn block_at(&self, height: BlockHeight) -> Result<Block, StoreError>;
}
