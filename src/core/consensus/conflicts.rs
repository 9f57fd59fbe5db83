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

//! Registry of active elections, keyed by block root.

use crate::core::consensus::election::Election;
use crate::core::types::{Block, Vote, H256};
use crate::monitoring::metrics::Metrics;
use crate::node::Node;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Active elections. Owns each [`Election`]; scheduled rounds hold weak
/// references into this map.
pub struct Conflicts {
    metrics: Arc<Metrics>,
    roots: Mutex<HashMap<H256, Arc<Election>>>,
}

impl Conflicts {
    /// Empty registry.
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            roots: Mutex::new(HashMap::new()),
        }
    }

    /// Start an election for `block.root()` if none is active. If one is,
    /// the block joins it as an additional candidate. Returns whether a new
    /// election was created.
    pub fn start(&self, node: &Arc<Node>, block: &Block, request_confirmation: bool) -> bool {
        let root = block.root();
        let election = {
            let Ok(mut roots) = self.roots.lock() else {
                return false;
            };
            if let Some(existing) = roots.get(&root) {
                existing.add_candidate(*block);
                return false;
            }
            let election = Election::new(node, *block);
            roots.insert(root, Arc::clone(&election));
            self.metrics.active_elections.set(roots.len() as i64);
            election
        };
        election.start(request_confirmation);
        true
    }

    /// Route a verified vote to the election for its root, if active.
    pub fn update(&self, vote: &Vote) {
        let election = {
            let Ok(roots) = self.roots.lock() else {
                return;
            };
            roots.get(&vote.block.root()).cloned()
        };
        if let Some(election) = election {
            election.vote(*vote);
        }
    }

    /// Remove the election keyed by `root`. Returns whether one existed.
    pub fn stop(&self, root: &H256) -> bool {
        let Ok(mut roots) = self.roots.lock() else {
            return false;
        };
        let removed = roots.remove(root).is_some();
        self.metrics.active_elections.set(roots.len() as i64);
        removed
    }

    /// Whether an election for `root` is active.
    pub fn active(&self, root: &H256) -> bool {
        self.roots
            .lock()
            .map(|roots| roots.contains_key(root))
            .unwrap_or(false)
    }

    /// The election for `root`, if active.
    pub fn get(&self, root: &H256) -> Option<Arc<Election>> {
        self.roots.lock().ok()?.get(root).cloned()
    }

    /// Number of active elections.
    pub fn len(&self) -> usize {
        self.roots.lock().map(|roots| roots.len()).unwrap_or(0)
    }

    /// True when no election is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
