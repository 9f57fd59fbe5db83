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
#![deny(missing_docs)]

//! Proof-of-work attached to gossip messages.
//!
//! A nonce is valid for a block root when the leading 64 bits of
//! SHA-256(domain || root || nonce) do not exceed the difficulty target.
//! The target binds work to the root, not the block, so a re-publish of a
//! fork sibling needs no new work.

use crate::core::types::{WorkNonce, H256};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};

/// Difficulty for the live network: 16 leading zero bits.
pub const LIVE_TARGET: u64 = 0x0000_ffff_ffff_ffff;
/// Lenient difficulty for the test network: 4 leading zero bits.
pub const TEST_TARGET: u64 = 0x0fff_ffff_ffff_ffff;

/// Difficulty policy for validating and generating nonces.
#[derive(Clone, Copy, Debug)]
pub struct WorkPolicy {
    target: u64,
}

impl WorkPolicy {
    /// Policy with an explicit target.
    pub fn new(target: u64) -> Self {
        Self { target }
    }

    fn value(root: &H256, nonce: &WorkNonce) -> u64 {
        let mut msg = Vec::with_capacity(16 + 64);
        msg.extend_from_slice(b"emberchain-work-v1");
        msg.extend_from_slice(root.as_bytes());
        msg.extend_from_slice(nonce);
        let d = digest(&SHA256, &msg);
        let mut head = [0u8; 8];
        head.copy_from_slice(&d.as_ref()[..8]);
        u64::from_be_bytes(head)
    }

    /// Check a nonce against the target for `root`.
    pub fn validate(&self, root: &H256, nonce: &WorkNonce) -> bool {
        Self::value(root, nonce) <= self.target
    }

    /// Rejection-sample a valid nonce for `root`.
    pub fn generate(&self, root: &H256) -> WorkNonce {
        let rng = SystemRandom::new();
        let mut nonce = [0u8; 32];
        loop {
            if rng.fill(&mut nonce).is_err() {
                continue;
            }
            if self.validate(root, &nonce) {
                return nonce;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_nonce_validates() {
        let policy = WorkPolicy::new(TEST_TARGET);
        let root = H256::from_bytes([5; 32]);
        let nonce = policy.generate(&root);
        assert!(policy.validate(&root, &nonce));
    }

    #[test]
    fn zero_target_rejects() {
        // A zero target only admits a value of exactly zero.
        let policy = WorkPolicy::new(0);
        assert!(!policy.validate(&H256::from_bytes([1; 32]), &[7u8; 32]));
    }
}
