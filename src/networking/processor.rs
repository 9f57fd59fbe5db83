// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Message processor: applies inbound gossip to the ledger and drives the
//! reactions - republish on progress, gap cache plus bootstrap on missing
//! predecessors, elections on forks, votes on confirmation requests.

use crate::core::consensus::signing;
use crate::core::types::{Block, ProcessResult, WorkNonce, H256};
use crate::networking::wire::{normalize_endpoint, zero_endpoint, Message, PEERS_PER_KEEPALIVE};
use crate::node::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Publish hashes folded into the keepalive checksum.
const CHECKSUM_WINDOW: usize = 32;

impl Node {
    /// Apply one decoded gossip message from `from`.
    ///
    /// `enforce_work` gates proof-of-work validation; test harnesses may
    /// disable it.
    pub fn process_message(self: &Arc<Self>, message: Message, from: SocketAddr, enforce_work: bool) {
        let from = normalize_endpoint(from);
        match message {
            Message::KeepaliveReq { peers } => {
                self.peers.incoming_from_peer(&from);
                self.merge_peers(&peers);

                let mut sample = [zero_endpoint(); PEERS_PER_KEEPALIVE];
                self.peers.random_fill(&mut sample);
                let ack = Message::KeepaliveAck {
                    peers: sample,
                    checksum: self.keepalive_checksum(),
                };
                self.network.send(ack.serialize(self.cfg.network_id()), from);
                self.metrics.known_peers.set(self.peers.size() as i64);
            }
            Message::KeepaliveAck { peers, .. } => {
                self.merge_peers(&peers);
                self.peers.incoming_from_peer(&from);
                self.metrics.known_peers.set(self.peers.size() as i64);
            }
            Message::PublishReq { work, block } => {
                if enforce_work && !self.work.validate(&block.root(), &work) {
                    self.metrics.insufficient_work_total.inc();
                    return;
                }
                self.peers.incoming_from_peer(&from);
                self.process_receive_republish(block, work, Some(from));
            }
            Message::ConfirmReq { work, block } => {
                if enforce_work && !self.work.validate(&block.root(), &work) {
                    self.metrics.insufficient_work_total.inc();
                    return;
                }
                self.peers.incoming_from_peer(&from);
                self.process_receive_republish(block, work, Some(from));
                self.process_confirmation(&block, from);
            }
            Message::ConfirmAck { vote, work } => {
                if enforce_work && !self.work.validate(&vote.block.root(), &work) {
                    self.metrics.insufficient_work_total.inc();
                    return;
                }
                if signing::verify_vote(&vote).is_err() {
                    self.metrics.error_total.inc();
                    return;
                }
                self.peers.incoming_from_peer(&from);
                // A vote can name a block we have never seen; run it through
                // the publish pipeline so it seeds the ledger first.
                self.process_receive_republish(vote.block, work, Some(from));
                self.conflicts.update(&vote);
            }
            Message::ConfirmUnk { rep_hint } => {
                // Representative-hint feature; core policy ignores it.
                trace!(%from, rep_hint = %rep_hint, "confirm_unk");
                self.peers.incoming_from_peer(&from);
            }
            Message::BulkReq { .. } | Message::FrontierReq { .. } => {
                // Stream requests are invalid over UDP.
                self.metrics.unknown_total.inc();
            }
        }
    }

    /// Contact advertised peers we do not already know. Entries appear in
    /// the table on first directed contact; self, reserved and known
    /// endpoints are skipped.
    fn merge_peers(self: &Arc<Self>, peers: &[SocketAddr; PEERS_PER_KEEPALIVE]) {
        for endpoint in peers {
            let endpoint = normalize_endpoint(*endpoint);
            if endpoint == zero_endpoint() || self.peers.known_peer(&endpoint) {
                continue;
            }
            if self.peers.contacting_peer(&endpoint) {
                self.send_keepalive(endpoint);
            }
        }
    }

    /// Apply a block to the ledger and react to the outcome. On progress
    /// the block is republished to every peer except the source, and an
    /// orphan waiting on it re-enters processing.
    pub fn process_receive_republish(
        self: &Arc<Self>,
        block: Block,
        work: WorkNonce,
        from: Option<SocketAddr>,
    ) {
        let mut pending = vec![(block, work, from)];
        while let Some((block, work, source)) = pending.pop() {
            let result = match self.ledger.lock() {
                Ok(mut ledger) => ledger.process(&block),
                Err(_) => return,
            };
            let hash = block.hash();
            trace!(block = %hash, ?result, "process");
            match result {
                ProcessResult::Progress => {
                    self.record_publish(hash);
                    self.republish(&block, &work, source);
                    let orphan = match self.gap_cache.lock() {
                        Ok(mut gaps) => gaps.take(&hash),
                        Err(_) => None,
                    };
                    if let Some(orphan) = orphan {
                        // The orphan's original nonce was not retained; work
                        // binds to the root, so regenerate for the republish.
                        let work = self.work.generate(&orphan.root());
                        pending.push((orphan, work, None));
                    }
                }
                ProcessResult::GapPrevious | ProcessResult::GapSource => {
                    let missing = match result {
                        ProcessResult::GapPrevious => block.previous(),
                        _ => block.source(),
                    };
                    let Some(missing) = missing else { continue };
                    if let Ok(mut gaps) = self.gap_cache.lock() {
                        gaps.add(block, missing);
                    }
                    debug!(block = %hash, %missing, "gap; bootstrapping");
                    if let Some(source) = source {
                        self.start_bootstrap(source);
                    }
                }
                ProcessResult::ForkPrevious | ProcessResult::ForkSource => {
                    debug!(block = %hash, root = %block.root(), "fork; starting election");
                    self.conflicts.start(self, &block, true);
                }
                ProcessResult::Old
                | ProcessResult::BadSignature
                | ProcessResult::NegativeSpend
                | ProcessResult::Overspend
                | ProcessResult::NotReceiveFromSend => {
                    trace!(block = %hash, ?result, "dropped");
                }
            }
        }
    }

    /// Re-broadcast a publish to every known peer except the source.
    fn republish(&self, block: &Block, work: &WorkNonce, exclude: Option<SocketAddr>) {
        let bytes = Message::PublishReq {
            work: *work,
            block: *block,
        }
        .serialize(self.cfg.network_id());
        for endpoint in self.peers.list() {
            if Some(endpoint) == exclude {
                continue;
            }
            self.network.send(bytes.clone(), endpoint);
        }
    }

    /// Answer a confirm_req: representatives reply with a signed vote,
    /// everyone else reports it is not one.
    fn process_confirmation(self: &Arc<Self>, block: &Block, from: SocketAddr) {
        let representative = self.wallet.representative();
        let Some(kp) = self.wallet.fetch(&representative) else {
            let unk = Message::ConfirmUnk {
                rep_hint: representative,
            };
            self.network.send(unk.serialize(self.cfg.network_id()), from);
            return;
        };
        let vote = signing::make_vote(&kp, representative, self.next_vote_sequence(), *block);
        let ack = Message::ConfirmAck {
            vote,
            work: self.work.generate(&block.root()),
        };
        self.network.send(ack.serialize(self.cfg.network_id()), from);
        // Register our own vote with any local election on this root.
        self.conflicts.update(&vote);
    }

    /// Confirmation hook: commit the winner if it is not already in and
    /// notify application observers.
    pub fn process_confirmed(&self, block: &Block) {
        if let Ok(mut ledger) = self.ledger.lock() {
            let _ = ledger.process(block);
        }
        if let Ok(observers) = self.confirm_observers.lock() {
            for observer in observers.iter() {
                observer(block);
            }
        }
    }

    /// One gossip round: purge dead peers, keepalive a random sample, and
    /// reschedule. Holds only a weak node reference across the period.
    pub fn ongoing_keepalive(self: &Arc<Self>) {
        if let Some(before) = Instant::now().checked_sub(self.peers.cutoff()) {
            let removed = self.peers.purge(before);
            if !removed.is_empty() {
                debug!(count = removed.len(), "purged dead peers");
            }
        }
        self.metrics.known_peers.set(self.peers.size() as i64);

        for endpoint in self.peers.sample(PEERS_PER_KEEPALIVE) {
            if self.peers.contacting_peer(&endpoint) {
                self.send_keepalive(endpoint);
            }
        }

        let weak = Arc::downgrade(self);
        self.scheduler
            .add(Instant::now() + self.cfg.gossip_period(), move || {
                if let Some(node) = weak.upgrade() {
                    if node.network.on() {
                        node.ongoing_keepalive();
                    }
                }
            });
    }

    /// Send a keepalive_req carrying a random peer sample.
    pub fn send_keepalive(&self, to: SocketAddr) {
        let mut sample = [zero_endpoint(); PEERS_PER_KEEPALIVE];
        self.peers.random_fill(&mut sample);
        let msg = Message::KeepaliveReq { peers: sample };
        self.network.send(msg.serialize(self.cfg.network_id()), to);
    }

    /// XOR of the most recent publish hashes, echoed in keepalive_ack.
    pub fn keepalive_checksum(&self) -> H256 {
        let Ok(recent) = self.recent_publishes.lock() else {
            return H256::ZERO;
        };
        let mut out = [0u8; 32];
        for hash in recent.iter() {
            for (o, b) in out.iter_mut().zip(hash.as_bytes()) {
                *o ^= b;
            }
        }
        H256::from_bytes(out)
    }

    fn record_publish(&self, hash: H256) {
        if let Ok(mut recent) = self.recent_publishes.lock() {
            recent.push_back(hash);
            while recent.len() > CHECKSUM_WINDOW {
                recent.pop_front();
            }
        }
    }
}
