//! Protocol tags for synchronizer wire messages.
//!
//! Every message carries one of three tags so the network reactor can
//! dispatch inbound bytes to the right decoder. Tags are stable wire
//! constants; never renumber them.

use std::fmt;

/// Wire protocol tag for a synchronizer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Protocol {
    /// One piece of a committed block.
    BlockPart = 0x0100,
    /// A peer's round-state advertisement.
    RoundState = 0x0101,
    /// An ordered list of votes.
    VoteList = 0x0102,
}

impl Protocol {
    /// Every tag the synchronizer registers with the network reactor.
    pub const ALL: [Protocol; 3] = [Protocol::BlockPart, Protocol::RoundState, Protocol::VoteList];

    /// The numeric wire tag.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Look up a tag by its wire id.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x0100 => Some(Protocol::BlockPart),
            0x0101 => Some(Protocol::RoundState),
            0x0102 => Some(Protocol::VoteList),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::BlockPart => "block.part",
            Protocol::RoundState => "round.state",
            Protocol::VoteList => "vote.list",
        };
        write!(f, "{}", name)
    }
}
