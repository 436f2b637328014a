//! The gossip synchronizer: peer set, inbound dispatch, periodic
//! round-state broadcast, and fast-sync triggering.
//!
//! # Locking
//!
//! One coarse mutex guards everything: the engine, the peer list, the
//! fetch handle, the timer generation. Either the engine is advancing or
//! the synchronizer is deciding, never both. The invariant the rest of the
//! module upholds is that message marshaling and all network I/O happen
//! **after** the guard is dropped; every public operation computes what to
//! send under the lock and sends unlocked.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::fastsync::{FastSyncManager, FetchHandle};
use crate::peer::PeerRecord;
use crate::traits::{BlockStore, Engine};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;
use syncline_messages::RoundStateMessage;
use syncline_network::{
    decode_message, encode_message, BroadcastScope, Message, NetworkError, NetworkManager,
    ProtocolHandler, Reactor, ReceiveError,
};
use syncline_types::{PeerId, Protocol, Step};
use tracing::{debug, error, trace, warn};

/// Name the synchronizer registers its reactor under.
const REACTOR_NAME: &str = "consensus.sync";

/// Everything behind the shared mutex.
pub(crate) struct Inner {
    pub(crate) engine: Box<dyn Engine>,
    pub(crate) store: Box<dyn BlockStore>,
    pub(crate) fast_sync: Box<dyn FastSyncManager>,
    pub(crate) config: SyncConfig,
    pub(crate) handler: Option<Arc<dyn ProtocolHandler>>,
    pub(crate) peers: Vec<PeerRecord>,
    pub(crate) running: bool,
    /// Identity of the currently armed rebroadcast timer. A fired timer
    /// whose generation no longer matches was replaced and does nothing.
    pub(crate) timer_gen: u64,
    pub(crate) last_broadcast: Option<Instant>,
    /// Present iff a fast-sync fetch is outstanding.
    pub(crate) fetch: Option<FetchHandle>,
    /// Back-reference for peer tasks, timers, and the fetch relay.
    pub(crate) weak: Weak<Shared>,
}

impl Inner {
    /// Whether the peer's task should keep running. Absent records count as
    /// stopped; both leave and stop remove the record before the task gets
    /// to look.
    pub(crate) fn peer_running(&self, id: PeerId) -> bool {
        self.peers
            .iter()
            .find(|peer| peer.id == id)
            .is_some_and(|peer| peer.running)
    }
}

/// The mutex plus the lock-free collaborators.
pub(crate) struct Shared {
    pub(crate) network: Arc<dyn NetworkManager>,
    pub(crate) inner: Mutex<Inner>,
}

/// Point-in-time view of the synchronizer, for status APIs.
#[derive(Debug, Clone, Serialize)]
pub struct SyncerStatus {
    /// Whether `start` succeeded and `stop` has not run.
    pub running: bool,
    /// Number of peers with live gossip tasks.
    pub peer_count: usize,
    /// Whether a fast-sync fetch is outstanding.
    pub fetch_outstanding: bool,
    /// Milliseconds since the last round-state broadcast.
    pub last_broadcast_age_ms: Option<u64>,
}

/// Keeps every honest neighbor supplied with the block parts and votes it
/// needs at the current height and round.
///
/// Cloning is cheap and shares the same synchronizer.
#[derive(Clone)]
pub struct GossipSynchronizer {
    pub(crate) shared: Arc<Shared>,
}

impl GossipSynchronizer {
    /// Create a synchronizer. Validates the configuration and starts the
    /// fast-sync server; gossip itself does not begin until [`start`].
    ///
    /// [`start`]: GossipSynchronizer::start
    pub fn new(
        engine: Box<dyn Engine>,
        store: Box<dyn BlockStore>,
        network: Arc<dyn NetworkManager>,
        mut fast_sync: Box<dyn FastSyncManager>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        fast_sync.start_server();
        let shared = Arc::new_cyclic(|weak| Shared {
            network,
            inner: Mutex::new(Inner {
                engine,
                store,
                fast_sync,
                config,
                handler: None,
                peers: Vec::new(),
                running: false,
                timer_gen: 0,
                last_broadcast: None,
                fetch: None,
                weak: weak.clone(),
            }),
        });
        Ok(Self { shared })
    }

    /// Register with the network reactor, spawn a task per current peer,
    /// and emit the initial round-state broadcast.
    pub fn start(&self) -> Result<(), SyncError> {
        let priority = self.shared.inner.lock().config.protocol_priority;
        let reactor: Arc<dyn Reactor> = Arc::new(self.clone());
        let handler =
            self.shared
                .network
                .register_reactor(REACTOR_NAME, reactor, &Protocol::ALL, priority)?;

        {
            let mut inner = self.shared.inner.lock();
            inner.handler = Some(handler);
            for id in self.shared.network.peers() {
                debug!(peer = %id, "starting peer task");
                let record = PeerRecord::spawn(Arc::downgrade(&self.shared), id);
                inner.peers.push(record);
            }
            inner.running = true;
        }

        broadcast_round_state(&self.shared, None);
        Ok(())
    }

    /// Tear down every peer task, cancel any in-flight fetch, disarm the
    /// broadcast timer, and stop the fast-sync server.
    ///
    /// Returns only after every peer task has observed the stop; the waits
    /// happen with the mutex released so the tasks can take it one last
    /// time.
    pub fn stop(&self) {
        let (done, fetch) = {
            let mut inner = self.shared.inner.lock();
            inner.running = false;
            inner.timer_gen = inner.timer_gen.wrapping_add(1);
            let mut done = Vec::with_capacity(inner.peers.len());
            for peer in &mut inner.peers {
                peer.running = false;
                peer.wake();
                done.push(peer.done_rx.clone());
            }
            inner.peers.clear();
            inner.fast_sync.stop_server();
            (done, inner.fetch.take())
        };

        if let Some(handle) = fetch {
            handle.cancel();
        }
        for done_rx in done {
            let _ = done_rx.recv();
        }
        debug!("synchronizer stopped");
    }

    /// The engine reached a new step.
    ///
    /// Acquires the shared mutex as its first action; callers must not hold
    /// it. Wakes every advertised peer at precommit-wait and commit (new
    /// votes or parts are available) and rebroadcasts our round state on
    /// entering propose or commit.
    pub fn on_engine_step_change(&self) {
        let rebroadcast = {
            let inner = self.shared.inner.lock();
            if !inner.running {
                return;
            }
            let step = inner.engine.step();
            if step == Step::PrecommitWait || step == Step::Commit {
                for peer in &inner.peers {
                    if peer.state.is_some() {
                        peer.wake();
                    }
                }
            }
            step == Step::Propose || step == Step::Commit
        };
        if rebroadcast {
            broadcast_round_state(&self.shared, None);
        }
    }

    /// Run `f` against the engine under the shared mutex.
    ///
    /// This is the documented way for the engine's driver to share the
    /// synchronizer's lock. Call [`on_engine_step_change`] after the guard
    /// is released if the closure advanced the engine's step.
    ///
    /// [`on_engine_step_change`]: GossipSynchronizer::on_engine_step_change
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut dyn Engine) -> T) -> T {
        let mut inner = self.shared.inner.lock();
        f(inner.engine.as_mut())
    }

    /// Borrow the engine under the shared mutex.
    pub fn engine(&self) -> MappedMutexGuard<'_, dyn Engine> {
        MutexGuard::map(self.shared.inner.lock(), |inner| {
            inner.engine.as_mut() as &mut dyn Engine
        })
    }

    /// Snapshot the synchronizer's state.
    pub fn status(&self) -> SyncerStatus {
        let inner = self.shared.inner.lock();
        SyncerStatus {
            running: inner.running,
            peer_count: inner.peers.len(),
            fetch_outstanding: inner.fetch.is_some(),
            last_broadcast_age_ms: inner
                .last_broadcast
                .map(|at| at.elapsed().as_millis() as u64),
        }
    }
}

impl Reactor for GossipSynchronizer {
    fn on_receive(
        &self,
        protocol: Protocol,
        bytes: &[u8],
        from: PeerId,
    ) -> Result<bool, ReceiveError> {
        let mut inner = self.shared.inner.lock();
        if !inner.running {
            return Ok(false);
        }

        let message = match decode_message(protocol, bytes) {
            Ok(message) => message,
            Err(err) => {
                warn!(peer = %from, error = %err, "undecodable message");
                return Err(err.into());
            }
        };
        if let Err(err) = message.verify() {
            warn!(peer = %from, error = %err, "malformed message");
            return Err(err.into());
        }
        debug!(peer = %from, protocol = %message.protocol(), "received");

        match message {
            Message::BlockPart(msg) => {
                if let Err(err) = inner.engine.receive_block_part(&msg, true) {
                    debug!(peer = %from, error = %err, "engine rejected block part");
                    return Err(ReceiveError::Rejected(err.to_string()));
                }
                // The new part may be exactly what a neighbor inside the
                // same commit is missing.
                let height = inner.engine.height();
                for peer in &inner.peers {
                    if let Some(state) = &peer.state {
                        if state.height == msg.height
                            && state.height == height
                            && state.block_parts_mask.is_some()
                        {
                            peer.wake();
                        }
                    }
                }
            }
            Message::RoundState(msg) => {
                let state = msg.into_state();
                if let Some(peer) = inner.peers.iter_mut().find(|peer| peer.id == from) {
                    peer.set_round_state(state);
                }
            }
            Message::VoteList(msg) => {
                for vote in &msg.votes {
                    if let Err(err) = inner.engine.receive_vote(vote, true) {
                        trace!(peer = %from, error = %err, "engine rejected vote");
                    }
                }
                let state = inner.engine.round_state();
                trace!(height = %state.height, round = state.round, "round state after votes");
            }
        }
        Ok(true)
    }

    fn on_failure(&self, err: NetworkError, protocol: Protocol, _bytes: &[u8]) {
        let inner = self.shared.inner.lock();
        if !inner.running {
            return;
        }
        debug!(error = %err, %protocol, "send failed");
    }

    fn on_join(&self, id: PeerId) {
        let greeting = {
            let mut inner = self.shared.inner.lock();
            if !inner.running {
                return;
            }
            if inner.peers.iter().any(|peer| peer.id == id) {
                debug!(peer = %id, "join for known peer");
                return;
            }
            debug!(peer = %id, "peer joined");
            let record = PeerRecord::spawn(Arc::downgrade(&self.shared), id);
            inner.peers.push(record);
            (inner.engine.round_state(), inner.handler.clone())
        };

        // Greet the newcomer with our round state, outside the lock.
        let (state, handler) = greeting;
        let Some(handler) = handler else { return };
        match encode_message(&RoundStateMessage::new(state)) {
            Ok(bytes) => {
                if let Err(err) = handler.unicast(Protocol::RoundState, &bytes, id) {
                    warn!(peer = %id, error = %err, "round-state unicast failed");
                }
            }
            Err(err) => error!(error = %err, "failed to encode round state"),
        }
    }

    fn on_leave(&self, id: PeerId) {
        let done_rx = {
            let mut inner = self.shared.inner.lock();
            if !inner.running {
                return;
            }
            let Some(index) = inner.peers.iter().position(|peer| peer.id == id) else {
                return;
            };
            debug!(peer = %id, "peer left");
            // Internal order is not observable; swap-remove is fine.
            let mut record = inner.peers.swap_remove(index);
            record.running = false;
            record.wake();
            record.done_rx.clone()
        };
        let _ = done_rx.recv();
    }
}

/// Broadcast our round state to all neighbors and re-arm the one-shot
/// rebroadcast timer.
///
/// `expected_gen` carries a fired timer's identity: if another broadcast
/// replaced that timer in the meantime, the call is a no-op.
pub(crate) fn broadcast_round_state(shared: &Arc<Shared>, expected_gen: Option<u64>) {
    let (state, handler, have_peers, gen, interval) = {
        let mut inner = shared.inner.lock();
        if !inner.running {
            return;
        }
        if let Some(expected) = expected_gen {
            if inner.timer_gen != expected {
                trace!("replaced timer fired; ignoring");
                return;
            }
        }
        inner.last_broadcast = Some(Instant::now());
        inner.timer_gen = inner.timer_gen.wrapping_add(1);
        (
            inner.engine.round_state(),
            inner.handler.clone(),
            !inner.peers.is_empty(),
            inner.timer_gen,
            inner.config.round_state_interval,
        )
    };

    // Marshal and send with the lock released.
    if have_peers {
        if let Some(handler) = &handler {
            match encode_message(&RoundStateMessage::new(state)) {
                Ok(bytes) => {
                    debug!(bytes = bytes.len(), "broadcasting round state");
                    if let Err(err) =
                        handler.broadcast(Protocol::RoundState, &bytes, BroadcastScope::Neighbors)
                    {
                        warn!(error = %err, "round-state broadcast failed");
                    }
                }
                Err(err) => error!(error = %err, "failed to encode round state"),
            }
        }
    }

    let weak = Arc::downgrade(shared);
    thread::Builder::new()
        .name("sync-rebroadcast".into())
        .spawn(move || {
            thread::sleep(interval);
            if let Some(shared) = weak.upgrade() {
                broadcast_round_state(&shared, Some(gen));
            }
        })
        .expect("failed to spawn rebroadcast timer");
}
