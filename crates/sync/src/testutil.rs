//! Stub collaborators for in-crate tests.

use crate::error::{EngineError, FastSyncError, StoreError};
use crate::fastsync::{CommitVotesDecoder, FastSyncManager, FetchHandle, FetchListener};
use crate::traits::{BlockStore, Engine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use syncline_messages::BlockPartMessage;
use syncline_network::{
    BroadcastScope, NetworkError, NetworkManager, ProtocolHandler, Reactor, RegistrationError,
};
use syncline_types::{
    BitArray, Block, BlockHeight, BlockResult, Hash, PartSet, PeerId, PeerRoundState, Protocol,
    Round, Step, Vote, VoteKind, VoteList,
};

/// Mutable state of the stub engine, shared with the test body.
#[derive(Default)]
pub(crate) struct StubEngineState {
    pub height: u64,
    pub round: Round,
    pub step: Option<Step>,
    pub validators: usize,
    /// Committed part sets by height.
    pub commit_parts: HashMap<u64, PartSet>,
    /// Commit precommits by height.
    pub commit_precommits: HashMap<u64, VoteList>,
    /// Precommits by round at the current height.
    pub precommits: HashMap<Round, VoteList>,
    /// Votes at the current round, one slot per validator.
    pub prevotes: Vec<Option<Vote>>,
    pub round_precommits: Vec<Option<Vote>>,
    /// Deliveries observed.
    pub received_parts: Vec<BlockPartMessage>,
    pub received_votes: Vec<Vote>,
    pub received_blocks: Vec<BlockResult>,
}

#[derive(Clone)]
pub(crate) struct StubEngine {
    pub state: Arc<Mutex<StubEngineState>>,
}

impl StubEngine {
    pub fn new(height: u64, round: Round, step: Step, validators: usize) -> Self {
        let state = StubEngineState {
            height,
            round,
            step: Some(step),
            validators,
            prevotes: vec![None; validators],
            round_precommits: vec![None; validators],
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubEngineState> {
        self.state.lock().expect("stub engine state poisoned")
    }
}

impl Engine for StubEngine {
    fn height(&self) -> BlockHeight {
        BlockHeight(self.lock().height)
    }

    fn round(&self) -> Round {
        self.lock().round
    }

    fn step(&self) -> Step {
        self.lock().step.expect("stub step unset")
    }

    fn commit_block_parts(&self, height: BlockHeight) -> PartSet {
        self.lock()
            .commit_parts
            .get(&height.0)
            .cloned()
            .unwrap_or_else(|| PartSet::new(0))
    }

    fn commit_precommits(&self, height: BlockHeight) -> VoteList {
        self.lock()
            .commit_precommits
            .get(&height.0)
            .cloned()
            .unwrap_or_default()
    }

    fn precommits(&self, round: Round) -> VoteList {
        self.lock().precommits.get(&round).cloned().unwrap_or_default()
    }

    fn votes(
        &self,
        _round: Round,
        missing_prevotes: &BitArray,
        missing_precommits: &BitArray,
    ) -> VoteList {
        let state = self.lock();
        let mut votes = VoteList::new();
        for index in 0..state.validators {
            if missing_prevotes.get(index) {
                if let Some(Some(vote)) = state.prevotes.get(index) {
                    votes.push(vote.clone());
                }
            }
        }
        for index in 0..state.validators {
            if missing_precommits.get(index) {
                if let Some(Some(vote)) = state.round_precommits.get(index) {
                    votes.push(vote.clone());
                }
            }
        }
        votes
    }

    fn round_state(&self) -> PeerRoundState {
        let state = self.lock();
        PeerRoundState::new(BlockHeight(state.height), state.round, true, state.validators)
    }

    fn receive_block_part(
        &mut self,
        msg: &BlockPartMessage,
        _unicast: bool,
    ) -> Result<usize, EngineError> {
        let mut state = self.lock();
        let count = state
            .commit_parts
            .get(&msg.height.0)
            .map(|parts| parts.count())
            .unwrap_or(0);
        if msg.index >= count {
            return Err(EngineError::PartOutOfRange {
                height: msg.height,
                index: msg.index,
            });
        }
        state.received_parts.push(msg.clone());
        Ok(msg.index as usize)
    }

    fn receive_vote(&mut self, vote: &Vote, _unicast: bool) -> Result<usize, EngineError> {
        let mut state = self.lock();
        state.received_votes.push(vote.clone());
        Ok(vote.validator_index as usize)
    }

    fn receive_block(&mut self, result: BlockResult) {
        self.lock().received_blocks.push(result);
    }
}

/// Build a vote for tests.
pub(crate) fn make_vote(height: u64, round: Round, kind: VoteKind, index: u16) -> Vote {
    Vote {
        height: BlockHeight(height),
        round,
        kind,
        block_id: Hash::from_bytes(b"block under vote"),
        validator_index: index,
        timestamp: 1_700_000_000_000,
        signature: vec![0x51; 64],
    }
}

/// Block store backed by a map.
#[derive(Clone, Default)]
pub(crate) struct StubStore {
    pub blocks: Arc<Mutex<HashMap<u64, Block>>>,
}

impl StubStore {
    pub fn with_block(self, block: Block) -> Self {
        self.blocks
            .lock()
            .expect("stub store poisoned")
            .insert(block.height.0, block);
        self
    }
}

impl BlockStore for StubStore {
    fn block_at(&self, height: BlockHeight) -> Result<Block, StoreError> {
        self.blocks
            .lock()
            .expect("stub store poisoned")
            .get(&height.0)
            .cloned()
            .ok_or(StoreError::NotFound(height))
    }
}

/// One observed `fetch_blocks` call.
pub(crate) struct FetchCall {
    pub from: BlockHeight,
    pub to: Option<BlockHeight>,
    pub anchor_height: BlockHeight,
    pub cancelled: Arc<AtomicBool>,
    pub listener: Arc<dyn FetchListener>,
}

/// Fast-sync stub recording server lifecycle and fetches.
#[derive(Clone, Default)]
pub(crate) struct StubFastSync {
    pub calls: Arc<Mutex<Vec<FetchCall>>>,
    pub server_running: Arc<AtomicBool>,
}

impl FastSyncManager for StubFastSync {
    fn start_server(&mut self) {
        self.server_running.store(true, Ordering::SeqCst);
    }

    fn stop_server(&mut self) {
        self.server_running.store(false, Ordering::SeqCst);
    }

    fn fetch_blocks(
        &mut self,
        from: BlockHeight,
        to: Option<BlockHeight>,
        anchor: Block,
        _votes_decoder: CommitVotesDecoder,
        listener: Arc<dyn FetchListener>,
    ) -> Result<FetchHandle, FastSyncError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.calls
            .lock()
            .expect("stub fast-sync poisoned")
            .push(FetchCall {
                from,
                to,
                anchor_height: anchor.height,
                cancelled: Arc::clone(&cancelled),
                listener,
            });
        Ok(FetchHandle::new(move || {
            !cancelled.swap(true, Ordering::SeqCst)
        }))
    }
}

/// Recorded outbound traffic.
#[derive(Default)]
pub(crate) struct SendLog {
    pub unicasts: Vec<(Protocol, Vec<u8>, PeerId)>,
    pub broadcasts: Vec<(Protocol, Vec<u8>)>,
}

/// Protocol handler that records instead of sending.
#[derive(Clone, Default)]
pub(crate) struct StubHandler {
    pub log: Arc<Mutex<SendLog>>,
}

impl ProtocolHandler for StubHandler {
    fn unicast(&self, protocol: Protocol, bytes: &[u8], to: PeerId) -> Result<(), NetworkError> {
        self.log
            .lock()
            .expect("send log poisoned")
            .unicasts
            .push((protocol, bytes.to_vec(), to));
        Ok(())
    }

    fn broadcast(
        &self,
        protocol: Protocol,
        bytes: &[u8],
        _scope: BroadcastScope,
    ) -> Result<(), NetworkError> {
        self.log
            .lock()
            .expect("send log poisoned")
            .broadcasts
            .push((protocol, bytes.to_vec()));
        Ok(())
    }
}

/// Network manager handing out a [`StubHandler`].
#[derive(Clone, Default)]
pub(crate) struct StubNetwork {
    pub initial_peers: Vec<PeerId>,
    pub handler: StubHandler,
    pub registered: Arc<AtomicBool>,
}

impl NetworkManager for StubNetwork {
    fn register_reactor(
        &self,
        _name: &str,
        _reactor: Arc<dyn Reactor>,
        _protocols: &[Protocol],
        _priority: u8,
    ) -> Result<Arc<dyn ProtocolHandler>, RegistrationError> {
        self.registered.store(true, Ordering::SeqCst);
        Ok(Arc::new(self.handler.clone()))
    }

    fn peers(&self) -> Vec<PeerId> {
        self.initial_peers.clone()
    }
}
