//! Per-peer gossip task.
//!
//! Each connected peer gets one long-lived task. The task blocks on a
//! single-slot wakeup channel; when woken it takes the shared consensus
//! mutex, picks at most one message to send, releases the mutex, and
//! unicasts. With a bandwidth cap configured it then parks until the next
//! permissible send time instead of re-waking immediately.
//!
//! The single-slot channel coalesces any number of wakeups into one pending
//! token.

use crate::fastsync::{decode_commit_votes, FetchRelay};
use crate::syncer::{Inner, Shared};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rand::Rng;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use syncline_messages::{BlockPartMessage, VoteListMessage};
use syncline_network::{encode_message, CodecError};
use syncline_types::{BitArray, PeerId, PeerRoundState, Protocol, Step};
use tracing::{debug, error, trace, warn};

/// A message chosen for one peer, not yet marshaled.
///
/// Marshaling and the unicast itself happen outside the mutex, after
/// selection.
pub(crate) enum Outbound {
    BlockPart(BlockPartMessage),
    VoteList(VoteListMessage),
}

impl Outbound {
    pub(crate) fn protocol(&self) -> Protocol {
        match self {
            Outbound::BlockPart(_) => Protocol::BlockPart,
            Outbound::VoteList(_) => Protocol::VoteList,
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Outbound::BlockPart(msg) => encode_message(msg),
            Outbound::VoteList(msg) => encode_message(msg),
        }
    }
}

/// Book-keeping for one connected peer, owned by the synchronizer under its
/// mutex. The task thread itself holds only a weak back-reference.
pub(crate) struct PeerRecord {
    pub(crate) id: PeerId,
    /// The peer's last advertisement. Cleared after sending aggregated
    /// votes so the peer must re-advertise before it gets more.
    pub(crate) state: Option<PeerRoundState>,
    pub(crate) running: bool,
    wake_tx: Sender<()>,
    pub(crate) done_rx: Receiver<()>,
}

impl PeerRecord {
    /// Create the record and spawn its task.
    pub(crate) fn spawn(shared: Weak<Shared>, id: PeerId) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        thread::Builder::new()
            .name(format!("sync-peer-{}", id.0))
            .spawn(move || run(shared, id, wake_rx, done_tx))
            .expect("failed to spawn peer task");
        Self {
            id,
            state: None,
            running: true,
            wake_tx,
            done_rx,
        }
    }

    /// Wake the task. Coalesces: a wakeup while one is already pending is
    /// dropped.
    pub(crate) fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Replace the peer's advertisement and wake the task.
    pub(crate) fn set_round_state(&mut self, state: PeerRoundState) {
        self.state = Some(state);
        self.wake();
    }
}

/// The task body: idle on the wakeup channel, select under the mutex, send
/// unlocked, then pace.
fn run(shared: Weak<Shared>, id: PeerId, wake_rx: Receiver<()>, done_tx: Sender<()>) {
    let mut rng = rand::thread_rng();
    // Next permissible send time; armed only when a bandwidth cap is set.
    let mut next_send_time: Option<Instant> = None;
    // Set after an uncapped (or burst) send to re-run without blocking.
    let mut immediate = false;

    debug!(peer = %id, "peer task started");
    loop {
        if !immediate {
            let woke = match next_send_time {
                Some(deadline) => !matches!(
                    wake_rx.recv_deadline(deadline),
                    Err(RecvTimeoutError::Disconnected)
                ),
                None => wake_rx.recv().is_ok(),
            };
            if !woke {
                break;
            }
        }
        immediate = false;

        let Some(shared) = shared.upgrade() else {
            break;
        };

        let (message, send_bps, handler) = {
            let mut inner = shared.inner.lock();
            if !inner.peer_running(id) {
                drop(inner);
                let _ = done_tx.send(());
                debug!(peer = %id, "peer task stopped");
                return;
            }
            let now = Instant::now();
            if let Some(deadline) = next_send_time {
                if now < deadline {
                    trace!(peer = %id, "woken while throttled");
                    continue;
                }
            }
            let message = inner.select_message(id, &mut rng);
            (message, inner.config.send_bps, inner.handler.clone())
        };

        let Some(message) = message else {
            next_send_time = None;
            continue;
        };

        let bytes = match message.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(peer = %id, error = %err, "failed to encode outbound message");
                next_send_time = None;
                continue;
            }
        };
        debug!(peer = %id, protocol = %message.protocol(), bytes = bytes.len(), "unicast");
        if let Some(handler) = handler {
            if let Err(err) = handler.unicast(message.protocol(), &bytes, id) {
                warn!(peer = %id, error = %err, "unicast failed");
            }
        }

        if send_bps < 0 {
            immediate = true;
            continue;
        }

        // Advance the pacing deadline by size / cap. A deadline already in
        // the past (a burst window) resets to now first.
        let now = Instant::now();
        let base = match next_send_time {
            Some(deadline) if deadline > now => deadline,
            _ => now,
        };
        let deadline = base + Duration::from_secs_f64(bytes.len() as f64 / send_bps as f64);
        next_send_time = Some(deadline);
        if deadline <= now {
            immediate = true;
        } else {
            trace!(
                peer = %id,
                wait_ms = deadline.saturating_duration_since(now).as_millis() as u64,
                "throttled"
            );
        }
    }
    debug!(peer = %id, "peer task exited");
}

impl Inner {
    /// Pick the single most useful message for `id`, or nothing.
    ///
    /// Runs under the shared mutex. The advertisement is taken out of the
    /// record up front; branches that send aggregated votes deliberately do
    /// not put it back, forcing the peer to re-advertise before it gets
    /// more ("clear after send").
    pub(crate) fn select_message(
        &mut self,
        id: PeerId,
        rng: &mut (impl Rng + ?Sized),
    ) -> Option<Outbound> {
        let peer_index = self.peers.iter().position(|p| p.id == id)?;
        let mut state = match self.peers[peer_index].state.take() {
            Some(state) => state,
            None => {
                trace!(peer = %id, "no peer round state");
                return None;
            }
        };
        if !state.sync {
            trace!(peer = %id, "peer opted out of gossip");
            self.peers[peer_index].state = Some(state);
            return None;
        }

        let height = self.engine.height();
        let round = self.engine.round();
        let step = self.engine.step();

        // Peer is behind, or at our height while we are already committing.
        // Closing the gap on the oldest height comes before everything else
        // so commits propagate.
        if state.height < height || (state.height == height && step >= Step::Commit) {
            match &state.block_parts_mask {
                None => {
                    // First convince the peer the block committed, then
                    // start tracking which parts it has.
                    let votes = self.engine.commit_precommits(state.height);
                    let parts = self.engine.commit_block_parts(state.height);
                    state.block_parts_mask = Some(BitArray::new(parts.count() as usize));
                    trace!(peer = %id, height = %state.height, "sending commit precommits");
                    self.peers[peer_index].state = Some(state);
                    Some(Outbound::VoteList(VoteListMessage::new(votes)))
                }
                Some(known) => {
                    let part_set = self.engine.commit_block_parts(state.height);
                    let mut candidates = known.clone();
                    candidates.flip();
                    candidates.and(part_set.mask());
                    let Some(index) = candidates.pick_random(rng) else {
                        trace!(peer = %id, height = %state.height, "no block part to send");
                        self.peers[peer_index].state = Some(state);
                        return None;
                    };
                    let Some(part) = part_set.part(index) else {
                        // Availability bit without a stored part; nothing
                        // sane to send.
                        self.peers[peer_index].state = Some(state);
                        return None;
                    };
                    let message =
                        BlockPartMessage::new(state.height, index as u16, part.payload.clone());
                    if let Some(mask) = state.block_parts_mask.as_mut() {
                        mask.set(index);
                    }
                    trace!(peer = %id, height = %state.height, index, "sending block part");
                    self.peers[peer_index].state = Some(state);
                    Some(Outbound::BlockPart(message))
                }
            }
        } else if state.height > height {
            trace!(peer = %id, peer_height = %state.height, our_height = %height, "peer ahead");
            if state.height.0 > height.0 + self.config.fast_sync_threshold && self.fetch.is_none()
            {
                match self.store.block_at(height.prev()) {
                    Ok(anchor) => {
                        let listener = Arc::new(FetchRelay::new(self.weak.clone()));
                        match self.fast_sync.fetch_blocks(
                            height,
                            None,
                            anchor,
                            decode_commit_votes,
                            listener,
                        ) {
                            Ok(handle) => {
                                debug!(from = %height, "fast-sync fetch started");
                                self.fetch = Some(handle);
                            }
                            Err(err) => warn!(error = %err, "failed to start fast-sync fetch"),
                        }
                    }
                    Err(err) => debug!(error = %err, "anchor block unavailable"),
                }
            }
            self.peers[peer_index].state = Some(state);
            None
        } else if state.round < round && step >= Step::PrecommitWait {
            let votes = self.engine.precommits(round);
            trace!(peer = %id, round, "sending current-round precommits");
            Some(Outbound::VoteList(VoteListMessage::new(votes)))
        } else if state.round < round {
            // TODO: consult the peer's step once advertisements carry it
            let votes = self.engine.precommits(round - 1);
            trace!(peer = %id, round = round - 1, "sending previous-round precommits");
            Some(Outbound::VoteList(VoteListMessage::new(votes)))
        } else if state.round == round {
            let mut missing_prevotes = state.prevotes_mask.clone();
            missing_prevotes.flip();
            let mut missing_precommits = state.precommits_mask.clone();
            missing_precommits.flip();
            let votes = self
                .engine
                .votes(round, &missing_prevotes, &missing_precommits);
            if !votes.is_empty() {
                trace!(peer = %id, round, count = votes.len(), "sending missing votes");
                return Some(Outbound::VoteList(VoteListMessage::new(votes)));
            }
            trace!(peer = %id, "nothing to send");
            self.peers[peer_index].state = Some(state);
            None
        } else {
            trace!(peer = %id, "nothing to send");
            self.peers[peer_index].state = Some(state);
            None
        }
    }
}
