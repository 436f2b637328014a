//! Consensus engine step within a round.

use sbor::prelude::*;

/// The engine's position inside a round.
///
/// Steps are ordered: comparisons like `step >= Step::Commit` mirror how the
/// selection algorithm asks "has the engine reached commit yet". The wait
/// steps are entered when the engine has a quorum of votes but is holding
/// for stragglers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BasicSbor)]
#[repr(u8)]
pub enum Step {
    /// Waiting for or broadcasting a proposal.
    Propose = 0,
    /// Collecting prevotes.
    Prevote = 1,
    /// Prevote quorum reached, waiting out the round timer.
    PrevoteWait = 2,
    /// Collecting precommits.
    Precommit = 3,
    /// Precommit quorum reached, waiting out the round timer.
    PrecommitWait = 4,
    /// The round's block is being committed.
    Commit = 5,
}
