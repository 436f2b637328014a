//! Core types for the syncline gossip synchronizer.
//!
//! This crate provides the foundational types used throughout the
//! synchronizer:
//!
//! - **Primitives**: Hash, bit arrays
//! - **Identifiers**: BlockHeight, Round, PeerId
//! - **Consensus types**: Vote, VoteList, Part, PartSet, Block
//! - **Gossip state**: PeerRoundState, Step
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer.

mod bit_array;
mod block;
mod hash;
mod identifiers;
mod part_set;
mod protocol;
mod round_state;
mod step;
mod vote;

pub use bit_array::BitArray;
pub use block::{Block, BlockResult};
pub use hash::{Hash, HexError};
pub use identifiers::{BlockHeight, PeerId, Round};
pub use part_set::{Part, PartSet};
pub use protocol::Protocol;
pub use round_state::PeerRoundState;
pub use step::Step;
pub use vote::{Vote, VoteKind, VoteList};
