//! VoteList wire message.

use crate::{SyncMessage, VerifyError};
use sbor::prelude::BasicSbor;
use syncline_types::{BlockHeight, Protocol, VoteList};

/// An ordered batch of votes. Sent when a peer is missing prevotes or
/// precommits we hold; the list may be empty on the wire but the sender
/// never bothers transmitting one.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct VoteListMessage {
    /// The votes, in sender order.
    pub votes: VoteList,
}

impl VoteListMessage {
    /// Wrap a vote list for the wire.
    pub fn new(votes: VoteList) -> Self {
        Self { votes }
    }
}

impl SyncMessage for VoteListMessage {
    fn protocol() -> Protocol {
        Protocol::VoteList
    }

    fn verify(&self) -> Result<(), VerifyError> {
        for (index, vote) in self.votes.iter().enumerate() {
            if vote.height < BlockHeight::GENESIS {
                return Err(VerifyError::HeightBelowGenesis(vote.height.0));
            }
            if vote.signature.is_empty() {
                return Err(VerifyError::UnsignedVote { index });
            }
        }
        Ok(())
    }
}
