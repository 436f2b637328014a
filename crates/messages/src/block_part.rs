//! BlockPart wire message.

use crate::{SyncMessage, VerifyError};
use sbor::prelude::BasicSbor;
use syncline_types::{BlockHeight, Protocol};

/// One piece of a committed block, unicast to a peer that is catching up.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockPartMessage {
    /// Height of the committed block the piece belongs to.
    pub height: BlockHeight,
    /// Position of the piece within the block's part set.
    pub index: u16,
    /// The piece's bytes.
    pub payload: Vec<u8>,
}

impl BlockPartMessage {
    /// Create a block part message.
    pub fn new(height: BlockHeight, index: u16, payload: Vec<u8>) -> Self {
        Self {
            height,
            index,
            payload,
        }
    }
}

impl SyncMessage for BlockPartMessage {
    fn protocol() -> Protocol {
        Protocol::BlockPart
    }

    fn verify(&self) -> Result<(), VerifyError> {
        if self.height < BlockHeight::GENESIS {
            return Err(VerifyError::HeightBelowGenesis(self.height.0));
        }
        if self.payload.is_empty() {
            return Err(VerifyError::EmptyPayload);
        }
        Ok(())
    }
}
