// Copyright (c) 2026 Emberchain
// Licensed under the Apache License, Version 2.0

//! Bounded store of orphan blocks awaiting their predecessors.

#![forbid(unsafe_code)]

use crate::core::types::{Block, H256};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Default capacity.
pub const GAP_CACHE_MAX: usize = 256;

struct GapEntry {
    arrival: Instant,
    block: Block,
}

/// Orphan blocks keyed by the hash they are waiting for. When full, the
/// oldest arrival is evicted first.
pub struct GapCache {
    entries: HashMap<H256, GapEntry>,
    arrivals: VecDeque<H256>,
    max: usize,
}

impl Default for GapCache {
    fn default() -> Self {
        Self::new(GAP_CACHE_MAX)
    }
}

impl GapCache {
    /// Create a cache holding at most `max` orphans.
    pub fn new(max: usize) -> Self {
        Self {
            entries: HashMap::new(),
            arrivals: VecDeque::new(),
            max,
        }
    }

    /// Remember `block` until `missing` arrives. Re-adding under the same
    /// key refreshes the block but keeps the original arrival slot.
    pub fn add(&mut self, block: Block, missing: H256) {
        match self.entries.get_mut(&missing) {
            Some(entry) => entry.block = block,
            None => {
                self.entries.insert(
                    missing,
                    GapEntry {
                        arrival: Instant::now(),
                        block,
                    },
                );
                self.arrivals.push_back(missing);
                while self.entries.len() > self.max {
                    self.evict_oldest();
                }
            }
        }
    }

    /// Take the orphan waiting on `hash`, removing its entry.
    pub fn take(&mut self, hash: &H256) -> Option<Block> {
        self.entries.remove(hash).map(|e| e.block)
    }

    /// Arrival time of the orphan waiting on `hash`.
    pub fn arrival(&self, hash: &H256) -> Option<Instant> {
        self.entries.get(hash).map(|e| e.arrival)
    }

    /// Number of orphans held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no orphans are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&mut self) {
        // The arrival queue may lead with keys already taken; skip those.
        // Keys are never re-queued, so the first live one is the oldest.
        while let Some(key) = self.arrivals.pop_front() {
            if self.entries.remove(&key).is_some() {
                return;
            }
        }
    }
}
