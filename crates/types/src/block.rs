//! Minimal block representation used by the synchronizer.
//!
//! The canonical block store and the fast-sync service exchange whole
//! blocks; the synchronizer itself only needs identity, height, and the
//! serialized body it chunks into parts.

use crate::{BlockHeight, Hash, VoteList};
use sbor::prelude::*;

/// A committed or candidate block.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Block {
    /// Height of this block.
    pub height: BlockHeight,
    /// Id of the parent block.
    pub parent_id: Hash,
    /// Serialized block body.
    pub payload: Vec<u8>,
}

impl Block {
    /// Content id of this block.
    pub fn id(&self) -> Hash {
        Hash::from_parts(&[
            &self.height.0.to_le_bytes(),
            self.parent_id.as_bytes(),
            &self.payload,
        ])
    }
}

/// A block delivered by a fast-sync fetch, together with the commit votes
/// that justified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    /// The fetched block.
    pub block: Block,
    /// The precommits that committed it.
    pub commit_votes: VoteList,
}

impl BlockResult {
    /// The fetched block.
    pub fn block(&self) -> &Block {
        &self.block
    }
}
