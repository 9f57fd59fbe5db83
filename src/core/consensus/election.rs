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

//! A single election: the voting process for one block root.
//!
//! The election solicits confirmation from peers in up to four announcement
//! rounds spaced by the gossip period. Confirmation thresholds are measured
//! against the circulating supply: an uncontested candidate needs more than
//! half, a contested one more than seven eighths. Scheduled rounds hold a
//! weak reference and no-op once the election is stopped.

use crate::core::consensus::signing;
use crate::core::types::{Address, Amount, Block, Vote, H256};
use crate::networking::wire::Message;
use crate::node::Node;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;
use tracing::debug;

/// Announcement rounds before an election is dropped.
const ROUND_BUDGET: u32 = 4;

struct ElectionState {
    candidates: BTreeMap<H256, Block>,
    votes: BTreeMap<Address, Vote>,
    last_vote: Instant,
    confirmed: bool,
    rounds: u32,
}

/// The voting process for a single root.
pub struct Election {
    node: Weak<Node>,
    root: H256,
    state: Mutex<ElectionState>,
}

impl Election {
    /// Create an election for `block.root()` with `block` as first candidate.
    pub fn new(node: &Arc<Node>, block: Block) -> Arc<Election> {
        let mut candidates = BTreeMap::new();
        candidates.insert(block.hash(), block);
        Arc::new(Election {
            node: Arc::downgrade(node),
            root: block.root(),
            state: Mutex::new(ElectionState {
                candidates,
                votes: BTreeMap::new(),
                last_vote: Instant::now(),
                confirmed: false,
                rounds: 0,
            }),
        })
    }

    /// The root this election decides.
    pub fn root(&self) -> H256 {
        self.root
    }

    /// Begin the lifecycle: self-vote if this node is a representative,
    /// optionally announce immediately, and schedule the first round.
    pub fn start(self: &Arc<Self>, request_confirmation: bool) {
        let Some(node) = self.node.upgrade() else {
            return;
        };
        if node.wallet.is_representative() {
            self.inject_self_vote(&node);
        }
        if self.try_confirm(&node) {
            return;
        }
        if request_confirmation {
            self.announce_request(&node);
        }
        self.schedule_round(&node);
    }

    /// Tally a verified vote. Only a strictly newer sequence replaces the
    /// stored vote for that representative.
    pub fn vote(self: &Arc<Self>, vote: Vote) {
        let Some(node) = self.node.upgrade() else {
            return;
        };
        {
            let Ok(mut st) = self.state.lock() else {
                return;
            };
            if st.confirmed {
                return;
            }
            if let Some(existing) = st.votes.get(&vote.representative) {
                if vote.sequence <= existing.sequence {
                    return;
                }
            }
            st.candidates.insert(vote.block_hash(), vote.block);
            st.votes.insert(vote.representative, vote);
            st.last_vote = Instant::now();
        }
        self.try_confirm(&node);
    }

    /// Register an additional candidate for this root.
    pub fn add_candidate(&self, block: Block) {
        if block.root() != self.root {
            return;
        }
        if let Ok(mut st) = self.state.lock() {
            st.candidates.insert(block.hash(), block);
        }
    }

    /// The stored vote sequence for a representative, if any.
    pub fn vote_sequence(&self, representative: &Address) -> Option<u64> {
        let st = self.state.lock().ok()?;
        st.votes.get(representative).map(|v| v.sequence)
    }

    /// Whether the election reached confirmation.
    pub fn confirmed(&self) -> bool {
        self.state.lock().map(|st| st.confirmed).unwrap_or(false)
    }

    /// When the last vote (or announcement) was recorded.
    pub fn last_vote(&self) -> Option<Instant> {
        self.state.lock().ok().map(|st| st.last_vote)
    }

    fn inject_self_vote(self: &Arc<Self>, node: &Arc<Node>) {
        let representative = node.wallet.representative();
        let Some(kp) = node.wallet.fetch(&representative) else {
            return;
        };
        let candidate = {
            let Ok(st) = self.state.lock() else {
                return;
            };
            match st.candidates.values().next() {
                Some(block) => *block,
                None => return,
            }
        };
        let vote = signing::make_vote(&kp, representative, node.next_vote_sequence(), candidate);
        self.vote(vote);
    }

    /// Leading candidate, its tallied weight, and the candidate count.
    /// Ties break toward the numerically smaller block hash.
    fn tally(&self, node: &Node) -> Option<(Block, Amount, usize)> {
        let Ok(st) = self.state.lock() else {
            return None;
        };
        let Ok(ledger) = node.ledger.lock() else {
            return None;
        };
        let mut weights: BTreeMap<H256, Amount> = BTreeMap::new();
        for vote in st.votes.values() {
            *weights.entry(vote.block_hash()).or_insert(0) += ledger.weight(&vote.representative);
        }
        let candidate_count = st.candidates.len();
        let mut winner: Option<(H256, Amount)> = None;
        for hash in st.candidates.keys() {
            let weight = weights.get(hash).copied().unwrap_or(0);
            let better = match winner {
                None => true,
                // Iteration is hash-ascending, so a strict win is required
                // to displace an earlier (smaller-hash) candidate.
                Some((_, best)) => weight > best,
            };
            if better {
                winner = Some((*hash, weight));
            }
        }
        let (hash, weight) = winner?;
        let block = st.candidates.get(&hash).copied()?;
        Some((block, weight, candidate_count))
    }

    /// Check thresholds; on success commit, notify and stop the election.
    fn try_confirm(self: &Arc<Self>, node: &Arc<Node>) -> bool {
        let Some((winner, weight, candidates)) = self.tally(node) else {
            return false;
        };
        let supply = match node.ledger.lock() {
            Ok(ledger) => ledger.supply_minus_burn(),
            Err(_) => return false,
        };
        let uncontested = candidates == 1 && weight > supply / 2;
        let contested = weight > supply - supply / 8;
        if !uncontested && !contested {
            return false;
        }
        {
            let Ok(mut st) = self.state.lock() else {
                return false;
            };
            if st.confirmed {
                return true;
            }
            st.confirmed = true;
        }
        debug!(root = %self.root, winner = %winner.hash(), "election confirmed");
        node.process_confirmed(&winner);
        node.conflicts.stop(&self.root);
        true
    }

    /// Send confirm_req for the leading candidate to an announcement sample
    /// of the peer list.
    fn announce_request(self: &Arc<Self>, node: &Arc<Node>) {
        let candidate = match self.tally(node) {
            Some((block, _, _)) => block,
            None => return,
        };
        if let Ok(mut st) = self.state.lock() {
            st.last_vote = Instant::now();
        }
        let work = node.work.generate(&candidate.root());
        let bytes = Message::ConfirmReq {
            work,
            block: candidate,
        }
        .serialize(node.cfg.network_id());
        for endpoint in node.peers.announcement_targets() {
            node.network.send(bytes.clone(), endpoint);
        }
    }

    fn schedule_round(self: &Arc<Self>, node: &Arc<Node>) {
        let weak = Arc::downgrade(self);
        node.scheduler
            .add(Instant::now() + node.cfg.gossip_period(), move || {
                if let Some(election) = weak.upgrade() {
                    election.timeout_action();
                }
            });
    }

    /// One announcement round: recompute the tally, confirm or re-announce,
    /// and drop the election once the round budget is exhausted.
    fn timeout_action(self: &Arc<Self>) {
        let Some(node) = self.node.upgrade() else {
            return;
        };
        if !node.conflicts.active(&self.root) {
            return;
        }
        let rounds = {
            let Ok(mut st) = self.state.lock() else {
                return;
            };
            if st.confirmed {
                return;
            }
            st.rounds += 1;
            st.rounds
        };
        if self.try_confirm(&node) {
            return;
        }
        if rounds < ROUND_BUDGET {
            self.announce_request(&node);
            self.schedule_round(&node);
        } else {
            debug!(root = %self.root, "election expired without confirmation");
            node.conflicts.stop(&self.root);
        }
    }
}
