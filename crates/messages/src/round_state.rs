//! RoundState wire message.

use crate::{SyncMessage, VerifyError};
use sbor::prelude::BasicSbor;
use syncline_types::{BlockHeight, PeerRoundState, Protocol};

/// The sender's self-advertisement: its position in consensus and the masks
/// of votes and block parts it already has. Drives the receiver's
/// message-selection algorithm.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct RoundStateMessage {
    /// The advertised state.
    pub state: PeerRoundState,
}

impl RoundStateMessage {
    /// Wrap a round state for the wire.
    pub fn new(state: PeerRoundState) -> Self {
        Self { state }
    }

    /// Consume and return the advertised state.
    pub fn into_state(self) -> PeerRoundState {
        self.state
    }
}

impl SyncMessage for RoundStateMessage {
    fn protocol() -> Protocol {
        Protocol::RoundState
    }

    fn verify(&self) -> Result<(), VerifyError> {
        if self.state.height < BlockHeight::GENESIS {
            return Err(VerifyError::HeightBelowGenesis(self.state.height.0));
        }
        let prevotes = self.state.prevotes_mask.len();
        let precommits = self.state.precommits_mask.len();
        if prevotes != precommits {
            return Err(VerifyError::MaskSizeMismatch {
                prevotes,
                precommits,
            });
        }
        Ok(())
    }
}
