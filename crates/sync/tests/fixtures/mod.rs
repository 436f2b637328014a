//! Shared fixtures for synchronizer integration tests: a scriptable engine,
//! a recording network, a map-backed block store, and a scripted fast-sync
//! service.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use syncline_messages::BlockPartMessage;
use syncline_network::{
    decode_message, BroadcastScope, Message, NetworkError, NetworkManager, ProtocolHandler,
    Reactor, RegistrationError,
};
use syncline_sync::{
    BlockStore, CommitVotesDecoder, Engine, EngineError, FastSyncError, FastSyncManager,
    FetchHandle, FetchListener, StoreError,
};
use syncline_types::{
    BitArray, Block, BlockHeight, BlockResult, Hash, PartSet, PeerId, PeerRoundState, Protocol,
    Round, Step, Vote, VoteKind, VoteList,
};

// ═══════════════════════════════════════════════════════════════════════
// Engine
// ═══════════════════════════════════════════════════════════════════════

/// Mutable state of the mock engine, shared with the test body.
#[derive(Default)]
pub struct MockEngineState {
    pub height: u64,
    pub round: Round,
    pub step: Option<Step>,
    pub validators: usize,
    pub commit_parts: HashMap<u64, PartSet>,
    pub commit_precommits: HashMap<u64, VoteList>,
    pub precommits: HashMap<Round, VoteList>,
    pub prevotes: Vec<Option<Vote>>,
    pub round_precommits: Vec<Option<Vote>>,
    pub received_parts: Vec<BlockPartMessage>,
    pub received_votes: Vec<Vote>,
    pub received_blocks: Vec<BlockResult>,
}

/// Scriptable consensus engine.
#[derive(Clone)]
pub struct MockEngine {
    pub state: Arc<Mutex<MockEngineState>>,
}

impl MockEngine {
    pub fn new(height: u64, round: Round, step: Step, validators: usize) -> Self {
        let state = MockEngineState {
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

    pub fn lock(&self) -> std::sync::MutexGuard<'_, MockEngineState> {
        self.state.lock().expect("mock engine state poisoned")
    }
}

impl Engine for MockEngine {
    fn height(&self) -> BlockHeight {
        BlockHeight(self.lock().height)
    }

    fn round(&self) -> Round {
        self.lock().round
    }

    fn step(&self) -> Step {
        self.lock().step.expect("mock step unset")
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

/// Build a signed-looking vote.
pub fn make_vote(height: u64, round: Round, kind: VoteKind, index: u16) -> Vote {
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

/// Commit precommits for `height` from validators `0..count`.
pub fn commit_votes(height: u64, count: u16) -> VoteList {
    VoteList::from_votes(
        (0..count)
            .map(|index| make_vote(height, 0, VoteKind::Precommit, index))
            .collect(),
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Block store
// ═══════════════════════════════════════════════════════════════════════

/// Map-backed canonical block store.
#[derive(Clone, Default)]
pub struct MemoryBlockStore {
    blocks: Arc<Mutex<HashMap<u64, Block>>>,
}

impl MemoryBlockStore {
    pub fn with_block(self, block: Block) -> Self {
        self.blocks
            .lock()
            .expect("block store poisoned")
            .insert(block.height.0, block);
        self
    }
}

impl BlockStore for MemoryBlockStore {
    fn block_at(&self, height: BlockHeight) -> Result<Block, StoreError> {
        self.blocks
            .lock()
            .expect("block store poisoned")
            .get(&height.0)
            .cloned()
            .ok_or(StoreError::NotFound(height))
    }
}

pub fn make_block(height: u64) -> Block {
    Block {
        height: BlockHeight(height),
        parent_id: Hash::from_bytes(&height.to_le_bytes()),
        payload: vec![0xb0; 32],
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Network
// ═══════════════════════════════════════════════════════════════════════

/// One message the synchronizer put on the wire, decoded for assertions.
#[derive(Debug)]
pub enum Sent {
    Unicast {
        protocol: Protocol,
        message: Message,
        to: PeerId,
    },
    Broadcast {
        protocol: Protocol,
        message: Message,
    },
}

#[derive(Clone)]
struct ChannelHandler {
    sent_tx: Sender<Sent>,
}

impl ProtocolHandler for ChannelHandler {
    fn unicast(&self, protocol: Protocol, bytes: &[u8], to: PeerId) -> Result<(), NetworkError> {
        let message = decode_message(protocol, bytes).expect("synchronizer sent undecodable bytes");
        let _ = self.sent_tx.send(Sent::Unicast {
            protocol,
            message,
            to,
        });
        Ok(())
    }

    fn broadcast(
        &self,
        protocol: Protocol,
        bytes: &[u8],
        _scope: BroadcastScope,
    ) -> Result<(), NetworkError> {
        let message = decode_message(protocol, bytes).expect("synchronizer sent undecodable bytes");
        let _ = self.sent_tx.send(Sent::Broadcast { protocol, message });
        Ok(())
    }
}

/// Network manager that records every send on a channel.
#[derive(Clone)]
pub struct RecordingNet {
    pub initial_peers: Vec<PeerId>,
    pub sent_rx: Receiver<Sent>,
    handler: ChannelHandler,
}

impl RecordingNet {
    pub fn new(initial_peers: Vec<PeerId>) -> Self {
        let (sent_tx, sent_rx) = unbounded();
        Self {
            initial_peers,
            sent_rx,
            handler: ChannelHandler { sent_tx },
        }
    }
}

impl NetworkManager for RecordingNet {
    fn register_reactor(
        &self,
        _name: &str,
        _reactor: Arc<dyn Reactor>,
        _protocols: &[Protocol],
        _priority: u8,
    ) -> Result<Arc<dyn ProtocolHandler>, RegistrationError> {
        Ok(Arc::new(self.handler.clone()))
    }

    fn peers(&self) -> Vec<PeerId> {
        self.initial_peers.clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Fast sync
// ═══════════════════════════════════════════════════════════════════════

/// One observed `fetch_blocks` call.
pub struct FetchCall {
    pub from: BlockHeight,
    pub to: Option<BlockHeight>,
    pub anchor_height: BlockHeight,
    pub cancelled: Arc<AtomicBool>,
    pub listener: Arc<dyn FetchListener>,
}

/// Fast-sync service that records fetches and lets the test drive the
/// listener by hand.
#[derive(Clone, Default)]
pub struct ScriptedFastSync {
    pub calls: Arc<Mutex<Vec<FetchCall>>>,
    pub server_running: Arc<AtomicBool>,
}

impl ScriptedFastSync {
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("fast-sync calls poisoned").len()
    }

    pub fn listener(&self, index: usize) -> Arc<dyn FetchListener> {
        Arc::clone(&self.calls.lock().expect("fast-sync calls poisoned")[index].listener)
    }
}

impl FastSyncManager for ScriptedFastSync {
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
            .expect("fast-sync calls poisoned")
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
