//! Identifier newtypes used across the synchronizer.

use sbor::prelude::BasicSbor;
use serde::Serialize;
use std::fmt;

/// Block height in the chain. The genesis block is height 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BasicSbor, Serialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    /// The height below which no block exists.
    pub const GENESIS: Self = Self(1);

    /// The next height.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The previous height, saturating at zero.
    pub fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consensus round within a height. Increments on timeout, starts at 0.
pub type Round = u32;

/// Stable identity of a network peer.
///
/// Assigned by the transport layer; the synchronizer treats it as opaque.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BasicSbor, Serialize,
)]
#[sbor(transparent)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}
