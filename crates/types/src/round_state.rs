//! A peer's self-advertised consensus position.

use crate::{BitArray, BlockHeight, Round};
use sbor::prelude::*;

/// What one side of a link claims to have at its current height and round.
///
/// Received states are immutable: an update replaces the whole value. The
/// synchronizer's "clear after send" transition is expressed by the peer
/// record holding `Option<PeerRoundState>`, never by mutating fields here.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct PeerRoundState {
    /// The peer's current height; at least 1.
    pub height: BlockHeight,
    /// The peer's current round within `height`.
    pub round: Round,
    /// Whether the peer wants gossip from us at all.
    pub sync: bool,
    /// Present iff the peer is inside commit for `height`; bit `i` is set
    /// when the peer already has block part `i`.
    pub block_parts_mask: Option<BitArray>,
    /// Bit `i` set when the peer has validator `i`'s prevote at `round`.
    pub prevotes_mask: BitArray,
    /// Bit `i` set when the peer has validator `i`'s precommit at `round`.
    pub precommits_mask: BitArray,
}

impl PeerRoundState {
    /// A fresh advertisement with empty vote masks sized to the validator
    /// set, outside of commit.
    pub fn new(height: BlockHeight, round: Round, sync: bool, validators: usize) -> Self {
        Self {
            height,
            round,
            sync,
            block_parts_mask: None,
            prevotes_mask: BitArray::new(validators),
            precommits_mask: BitArray::new(validators),
        }
    }
}
