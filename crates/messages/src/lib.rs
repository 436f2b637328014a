//! Wire messages for the gossip synchronizer.
//!
//! Three messages travel between peers: a block part, a round-state
//! advertisement, and a vote list. Each carries a protocol tag for reactor
//! dispatch and a shape-only `verify` contract; signature semantics belong
//! to the consensus engine.

mod block_part;
mod round_state;
mod vote_list;

pub use block_part::BlockPartMessage;
pub use round_state::RoundStateMessage;
pub use vote_list::VoteListMessage;

use sbor::prelude::{BasicDecode, BasicEncode};
use syncline_types::Protocol;

/// Shape errors detected by [`SyncMessage::verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("height {0} below genesis")]
    HeightBelowGenesis(u64),

    #[error("empty block part payload")]
    EmptyPayload,

    #[error("vote mask sizes differ: prevotes {prevotes}, precommits {precommits}")]
    MaskSizeMismatch { prevotes: usize, precommits: usize },

    #[error("vote {index} has no signature")]
    UnsignedVote { index: usize },
}

/// A message the synchronizer can put on the wire.
///
/// `verify` performs size and shape checks only; it runs on every inbound
/// message before dispatch so malformed senders can be penalized.
pub trait SyncMessage: BasicEncode + BasicDecode {
    /// The protocol tag this message is sent and dispatched under.
    fn protocol() -> Protocol;

    /// Check sizes and shapes. Cheap; no cryptography.
    fn verify(&self) -> Result<(), VerifyError>;
}
