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

//! Domain-separated signing bytes for votes.

use crate::core::security::wallet::{self, WalletError};
use crate::core::types::{Address, Block, Vote, H256};
use ring::signature::Ed25519KeyPair;

/// Vote signing payload: domain || block_hash || sequence.
///
/// Votes are attributed to the key that signed them; a representative key
/// rotation therefore starts a fresh sequence namespace.
pub fn vote_signing_bytes(block_hash: H256, sequence: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + 32 + 8);
    out.extend_from_slice(b"emberchain-vote-v1");
    out.extend_from_slice(block_hash.as_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}

/// Construct a signed vote selecting `block` for its root.
pub fn make_vote(kp: &Ed25519KeyPair, representative: Address, sequence: u64, block: Block) -> Vote {
    let msg = vote_signing_bytes(block.hash(), sequence);
    Vote {
        representative,
        sequence,
        block,
        signature: wallet::sign_bytes(kp, &msg),
    }
}

/// Verify a vote signature against its representative key.
pub fn verify_vote(vote: &Vote) -> Result<(), WalletError> {
    let msg = vote_signing_bytes(vote.block_hash(), vote.sequence);
    wallet::verify_bytes(&vote.representative, &msg, &vote.signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SendBlock, Signature};
    use ring::rand::SystemRandom;
    use ring::signature::KeyPair;

    #[test]
    fn vote_roundtrip_and_tamper() {
        let rng = SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let kp = Ed25519KeyPair::from_pkcs8(doc.as_ref()).unwrap();
        let mut pk = [0u8; 32];
        pk.copy_from_slice(kp.public_key().as_ref());
        let rep = Address::from_bytes(pk);

        let block = Block::Send(SendBlock {
            previous: H256::from_bytes([1; 32]),
            destination: Address::from_bytes([2; 32]),
            balance: 3,
            signature: Signature::zero(),
        });
        let mut vote = make_vote(&kp, rep, 7, block);
        assert!(verify_vote(&vote).is_ok());

        vote.sequence = 8;
        assert!(verify_vote(&vote).is_err());
    }
}
