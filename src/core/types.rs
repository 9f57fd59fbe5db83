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

//! Deterministic core types: hashes, addresses, blocks and votes.
//!
//! Block hashes are SHA-256 over domain-separated content bytes; the
//! signature is never part of the hashed content.

use ring::digest::{digest, SHA256};

/// 256-bit hash (32 bytes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct H256([u8; 32]);

impl H256 {
    /// The all-zero hash, used as a terminator and "no predecessor" marker.
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Construct from raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Return bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl std::fmt::Display for H256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Account identity (Ed25519 public key, 32 bytes).
///
/// The account address *is* the verification key for the account's blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

impl Address {
    /// The burn address. Balance delegated here never votes.
    pub const BURN: Address = Address([0u8; 32]);

    /// Construct from raw public key bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Return bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse from 64 hex characters.
    pub fn from_hex(s: &str) -> Option<Address> {
        let bytes = hex::decode(s.trim()).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Address(arr))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Ledger amount. The full supply fits in 128 bits.
pub type Amount = u128;

/// Proof-of-work nonce attached to gossip messages carrying a block.
pub type WorkNonce = [u8; 32];

/// Ed25519 signature bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// The all-zero signature, used as a placeholder before signing.
    pub fn zero() -> Self {
        Signature([0u8; 64])
    }
}

/// Block category, also its wire discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockKind {
    /// Terminator in bulk streams; not a real block.
    NotABlock = 1,
    /// Debit from an account chain.
    Send = 2,
    /// Credit of a pending send.
    Receive = 3,
    /// First block of an account chain.
    Open = 4,
    /// Representative change.
    Change = 5,
}

impl BlockKind {
    /// Parse a wire discriminant.
    pub fn from_byte(b: u8) -> Option<BlockKind> {
        match b {
            1 => Some(BlockKind::NotABlock),
            2 => Some(BlockKind::Send),
            3 => Some(BlockKind::Receive),
            4 => Some(BlockKind::Open),
            5 => Some(BlockKind::Change),
            _ => None,
        }
    }
}

/// Debit block: moves funds out of an account.
///
/// `balance` is the balance *remaining* on the account after the send; the
/// transferred amount is the difference from the previous balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendBlock {
    /// Hash of the account's previous block.
    pub previous: H256,
    /// Receiving account.
    pub destination: Address,
    /// Balance remaining after the send.
    pub balance: Amount,
    /// Signature by the sending account over the block hash.
    pub signature: Signature,
}

/// Credit block: claims a pending send addressed to this account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiveBlock {
    /// Hash of the account's previous block.
    pub previous: H256,
    /// Hash of the send block being received.
    pub source: H256,
    /// Signature by the receiving account over the block hash.
    pub signature: Signature,
}

/// First block of an account chain. Also names the voting representative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenBlock {
    /// Hash of the send block that funds the account.
    pub source: H256,
    /// Representative to which this account's weight is delegated.
    pub representative: Address,
    /// The account being opened.
    pub account: Address,
    /// Signature by the opened account over the block hash.
    pub signature: Signature,
}

/// Representative rotation for an existing account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeBlock {
    /// Hash of the account's previous block.
    pub previous: H256,
    /// New representative.
    pub representative: Address,
    /// Signature by the account over the block hash.
    pub signature: Signature,
}

/// A signed ledger record forming the chain of one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    /// Debit.
    Send(SendBlock),
    /// Credit.
    Receive(ReceiveBlock),
    /// Account creation.
    Open(OpenBlock),
    /// Representative change.
    Change(ChangeBlock),
}

impl Block {
    /// Wire discriminant for this block.
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Send(_) => BlockKind::Send,
            Block::Receive(_) => BlockKind::Receive,
            Block::Open(_) => BlockKind::Open,
            Block::Change(_) => BlockKind::Change,
        }
    }

    /// Domain-separated content bytes. The signature is excluded.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 96);
        match self {
            Block::Send(b) => {
                out.extend_from_slice(b"emberchain-send-v1");
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.destination.as_bytes());
                out.extend_from_slice(&b.balance.to_be_bytes());
            }
            Block::Receive(b) => {
                out.extend_from_slice(b"emberchain-receive-v1");
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.source.as_bytes());
            }
            Block::Open(b) => {
                out.extend_from_slice(b"emberchain-open-v1");
                out.extend_from_slice(b.source.as_bytes());
                out.extend_from_slice(b.representative.as_bytes());
                out.extend_from_slice(b.account.as_bytes());
            }
            Block::Change(b) => {
                out.extend_from_slice(b"emberchain-change-v1");
                out.extend_from_slice(b.previous.as_bytes());
                out.extend_from_slice(b.representative.as_bytes());
            }
        }
        out
    }

    /// Block identity: SHA-256 over the content bytes.
    pub fn hash(&self) -> H256 {
        let d = digest(&SHA256, &self.content_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(d.as_ref());
        H256(out)
    }

    /// The identifier this block extends: its predecessor hash, or the
    /// account address for an open block.
    pub fn root(&self) -> H256 {
        match self {
            Block::Send(b) => b.previous,
            Block::Receive(b) => b.previous,
            Block::Open(b) => H256(b.account.0),
            Block::Change(b) => b.previous,
        }
    }

    /// Predecessor hash, if the block has one.
    pub fn previous(&self) -> Option<H256> {
        match self {
            Block::Send(b) => Some(b.previous),
            Block::Receive(b) => Some(b.previous),
            Block::Open(_) => None,
            Block::Change(b) => Some(b.previous),
        }
    }

    /// Source send hash for blocks that claim one.
    pub fn source(&self) -> Option<H256> {
        match self {
            Block::Receive(b) => Some(b.source),
            Block::Open(b) => Some(b.source),
            _ => None,
        }
    }

    /// Signature bytes.
    pub fn signature(&self) -> &Signature {
        match self {
            Block::Send(b) => &b.signature,
            Block::Receive(b) => &b.signature,
            Block::Open(b) => &b.signature,
            Block::Change(b) => &b.signature,
        }
    }

    /// Replace the signature (used after signing the hash).
    pub fn set_signature(&mut self, signature: Signature) {
        match self {
            Block::Send(b) => b.signature = signature,
            Block::Receive(b) => b.signature = signature,
            Block::Open(b) => b.signature = signature,
            Block::Change(b) => b.signature = signature,
        }
    }
}

/// A signed statement by a representative selecting one block for a root.
///
/// The vote carries the candidate block itself so that votes on blocks a
/// node has not yet seen can still seed its ledger. A newer sequence
/// supersedes older votes by the same representative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vote {
    /// Voting representative; also the verification key for `signature`.
    pub representative: Address,
    /// Monotonic per-representative sequence number.
    pub sequence: u64,
    /// Candidate block.
    pub block: Block,
    /// Signature over the vote signing bytes.
    pub signature: Signature,
}

impl Vote {
    /// Hash of the candidate block this vote selects.
    pub fn block_hash(&self) -> H256 {
        self.block.hash()
    }
}

/// Outcome of applying a block to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Block accepted; the account frontier advanced.
    Progress,
    /// Block already present.
    Old,
    /// Predecessor unknown; orphan until it arrives.
    GapPrevious,
    /// Source send unknown; orphan until it arrives.
    GapSource,
    /// Signature does not verify against the owning account.
    BadSignature,
    /// Send balance exceeds the account balance.
    NegativeSpend,
    /// Source send already claimed.
    Overspend,
    /// Source block exists but is not a send to this account.
    NotReceiveFromSend,
    /// Predecessor exists but is not the account frontier.
    ForkPrevious,
    /// Source already opened this account through a different block.
    ForkSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_signature() {
        let mut a = Block::Send(SendBlock {
            previous: H256::from_bytes([1; 32]),
            destination: Address::from_bytes([2; 32]),
            balance: 500,
            signature: Signature::zero(),
        });
        let h = a.hash();
        a.set_signature(Signature([7; 64]));
        assert_eq!(a.hash(), h);
    }

    #[test]
    fn distinct_kinds_distinct_hashes() {
        let send = Block::Send(SendBlock {
            previous: H256::from_bytes([1; 32]),
            destination: Address::from_bytes([2; 32]),
            balance: 0,
            signature: Signature::zero(),
        });
        let change = Block::Change(ChangeBlock {
            previous: H256::from_bytes([1; 32]),
            representative: Address::from_bytes([2; 32]),
            signature: Signature::zero(),
        });
        assert_ne!(send.hash(), change.hash());
    }

    #[test]
    fn open_root_is_account() {
        let open = Block::Open(OpenBlock {
            source: H256::from_bytes([9; 32]),
            representative: Address::from_bytes([3; 32]),
            account: Address::from_bytes([4; 32]),
            signature: Signature::zero(),
        });
        assert_eq!(open.root(), H256::from_bytes([4; 32]));
        assert_eq!(open.previous(), None);
    }
}
