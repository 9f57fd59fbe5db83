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

//! In-memory account-chain ledger.
//!
//! Every account forms its own chain; a send parks the transferred amount
//! as pending until the destination claims it with a receive (or open).
//! Voting weight follows delegated balances and is recomputed incrementally
//! on every accepted block.

use crate::core::security::wallet;
use crate::core::types::{Address, Amount, Block, ProcessResult, H256};
use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Per-account chain state.
#[derive(Clone, Copy, Debug)]
struct AccountState {
    head: H256,
    balance: Amount,
    representative: Address,
    modified_secs: u64,
}

#[derive(Clone, Copy, Debug)]
struct PendingSend {
    destination: Address,
    amount: Amount,
}

/// The genesis record: a signed open block granting the full supply.
#[derive(Clone, Copy, Debug)]
pub struct Genesis {
    /// The genesis account.
    pub account: Address,
    /// Its open block (source is the zero hash).
    pub open: Block,
    /// Total supply granted to the genesis account.
    pub supply: Amount,
}

impl Genesis {
    /// Build a genesis record from a signing key; used by test networks.
    pub fn new(kp: &ring::signature::Ed25519KeyPair, supply: Amount) -> Genesis {
        use ring::signature::KeyPair;
        let mut pk = [0u8; 32];
        pk.copy_from_slice(kp.public_key().as_ref());
        let account = Address::from_bytes(pk);
        let mut open = Block::Open(crate::core::types::OpenBlock {
            source: H256::ZERO,
            representative: account,
            account,
            signature: crate::core::types::Signature::zero(),
        });
        wallet::sign_block(kp, &mut open);
        Genesis { account, open, supply }
    }

    /// Hash of the genesis open block.
    pub fn hash(&self) -> H256 {
        self.open.hash()
    }
}

/// Live-network supply granted to the genesis account.
pub const LIVE_SUPPLY: Amount = 1 << 120;

const LIVE_GENESIS_ACCOUNT: [u8; 32] = [
    0x8f, 0x1e, 0x4a, 0xd2, 0x7c, 0x03, 0xb5, 0x69, 0x91, 0xee, 0x2d, 0x58, 0x0b, 0xc4, 0x77,
    0xa6, 0x35, 0xf0, 0x1b, 0x8e, 0x52, 0xd9, 0x46, 0x6f, 0xa8, 0x13, 0xcb, 0x20, 0x74, 0x5d,
    0xe9, 0x3a,
];
const LIVE_GENESIS_SIGNATURE: [u8; 64] = [
    0x21, 0xb6, 0x5c, 0x08, 0xd3, 0x7f, 0x49, 0xe2, 0x9a, 0x14, 0xc7, 0x60, 0xbd, 0x3b, 0x85,
    0xf2, 0x4e, 0x99, 0x07, 0x6c, 0xd1, 0x28, 0xaf, 0x53, 0xe6, 0x0d, 0x72, 0xc8, 0x3f, 0x94,
    0x1a, 0xb0, 0x66, 0xdf, 0x25, 0x81, 0x4c, 0xf3, 0x0a, 0x97, 0x58, 0xe1, 0x36, 0xbc, 0x79,
    0x02, 0xcd, 0x44, 0xab, 0x10, 0x6e, 0xd5, 0x2f, 0x83, 0x5a, 0xc1, 0x38, 0xe7, 0x92, 0x0b,
    0x64, 0xfd, 0x17, 0x4e,
];

/// The hardcoded live-network genesis.
///
/// The open block is seeded directly into the ledger and never re-verified,
/// matching how every peer treats it.
pub fn live_genesis() -> Genesis {
    let account = Address::from_bytes(LIVE_GENESIS_ACCOUNT);
    let open = Block::Open(crate::core::types::OpenBlock {
        source: H256::ZERO,
        representative: account,
        account,
        signature: crate::core::types::Signature(LIVE_GENESIS_SIGNATURE),
    });
    Genesis {
        account,
        open,
        supply: LIVE_SUPPLY,
    }
}

/// Account-chain ledger. External callers serialize access through a mutex.
pub struct Ledger {
    blocks: HashMap<H256, Block>,
    accounts: BTreeMap<Address, AccountState>,
    block_owner: HashMap<H256, Address>,
    pending: HashMap<H256, PendingSend>,
    weights: HashMap<Address, Amount>,
    supply: Amount,
}

impl Ledger {
    /// Initialize from genesis: the genesis account holds the full supply,
    /// delegated to itself.
    pub fn new(genesis: &Genesis) -> Ledger {
        let hash = genesis.hash();
        let mut ledger = Ledger {
            blocks: HashMap::new(),
            accounts: BTreeMap::new(),
            block_owner: HashMap::new(),
            pending: HashMap::new(),
            weights: HashMap::new(),
            supply: genesis.supply,
        };
        ledger.blocks.insert(hash, genesis.open);
        ledger.block_owner.insert(hash, genesis.account);
        ledger.accounts.insert(
            genesis.account,
            AccountState {
                head: hash,
                balance: genesis.supply,
                representative: genesis.account,
                modified_secs: now_secs(),
            },
        );
        ledger.weights.insert(genesis.account, genesis.supply);
        ledger
    }

    /// Apply a block. Never partially mutates: a non-`Progress` result
    /// leaves the ledger untouched.
    pub fn process(&mut self, block: &Block) -> ProcessResult {
        let hash = block.hash();
        if self.blocks.contains_key(&hash) {
            return ProcessResult::Old;
        }
        match block {
            Block::Send(b) => self.process_send(hash, block, b.previous, b.destination, b.balance),
            Block::Receive(b) => self.process_receive(hash, block, b.previous, b.source),
            Block::Open(b) => self.process_open(hash, block, b.source, b.representative, b.account),
            Block::Change(b) => self.process_change(hash, block, b.previous, b.representative),
        }
    }

    fn process_send(
        &mut self,
        hash: H256,
        block: &Block,
        previous: H256,
        destination: Address,
        balance: Amount,
    ) -> ProcessResult {
        let Some(owner) = self.block_owner.get(&previous).copied() else {
            return ProcessResult::GapPrevious;
        };
        if wallet::verify_block(&owner, block).is_err() {
            return ProcessResult::BadSignature;
        }
        let Some(st) = self.accounts.get(&owner).copied() else {
            return ProcessResult::GapPrevious;
        };
        if st.head != previous {
            return ProcessResult::ForkPrevious;
        }
        if balance > st.balance {
            return ProcessResult::NegativeSpend;
        }
        let amount = st.balance - balance;
        self.sub_weight(st.representative, amount);
        self.pending.insert(hash, PendingSend { destination, amount });
        self.advance(owner, hash, |st| st.balance = balance);
        self.blocks.insert(hash, *block);
        self.block_owner.insert(hash, owner);
        ProcessResult::Progress
    }

    fn process_receive(
        &mut self,
        hash: H256,
        block: &Block,
        previous: H256,
        source: H256,
    ) -> ProcessResult {
        let Some(owner) = self.block_owner.get(&previous).copied() else {
            return ProcessResult::GapPrevious;
        };
        if wallet::verify_block(&owner, block).is_err() {
            return ProcessResult::BadSignature;
        }
        let Some(st) = self.accounts.get(&owner).copied() else {
            return ProcessResult::GapPrevious;
        };
        if st.head != previous {
            return ProcessResult::ForkPrevious;
        }
        let Some(p) = self.pending.get(&source).copied() else {
            return self.classify_missing_source(source, owner);
        };
        if p.destination != owner {
            return ProcessResult::NotReceiveFromSend;
        }
        self.pending.remove(&source);
        self.add_weight(st.representative, p.amount);
        self.advance(owner, hash, |st| st.balance += p.amount);
        self.blocks.insert(hash, *block);
        self.block_owner.insert(hash, owner);
        ProcessResult::Progress
    }

    fn process_open(
        &mut self,
        hash: H256,
        block: &Block,
        source: H256,
        representative: Address,
        account: Address,
    ) -> ProcessResult {
        if wallet::verify_block(&account, block).is_err() {
            return ProcessResult::BadSignature;
        }
        if self.accounts.contains_key(&account) {
            return ProcessResult::ForkSource;
        }
        let Some(p) = self.pending.get(&source).copied() else {
            return self.classify_missing_source(source, account);
        };
        if p.destination != account {
            return ProcessResult::NotReceiveFromSend;
        }
        self.pending.remove(&source);
        self.add_weight(representative, p.amount);
        self.accounts.insert(
            account,
            AccountState {
                head: hash,
                balance: p.amount,
                representative,
                modified_secs: now_secs(),
            },
        );
        self.blocks.insert(hash, *block);
        self.block_owner.insert(hash, account);
        ProcessResult::Progress
    }

    fn process_change(
        &mut self,
        hash: H256,
        block: &Block,
        previous: H256,
        representative: Address,
    ) -> ProcessResult {
        let Some(owner) = self.block_owner.get(&previous).copied() else {
            return ProcessResult::GapPrevious;
        };
        if wallet::verify_block(&owner, block).is_err() {
            return ProcessResult::BadSignature;
        }
        let Some(st) = self.accounts.get(&owner).copied() else {
            return ProcessResult::GapPrevious;
        };
        if st.head != previous {
            return ProcessResult::ForkPrevious;
        }
        self.sub_weight(st.representative, st.balance);
        self.add_weight(representative, st.balance);
        self.advance(owner, hash, |st| st.representative = representative);
        self.blocks.insert(hash, *block);
        self.block_owner.insert(hash, owner);
        ProcessResult::Progress
    }

    /// Distinguish a genuinely unknown source from one that exists but
    /// cannot be received: already claimed, or not a send to this account.
    fn classify_missing_source(&self, source: H256, account: Address) -> ProcessResult {
        match self.blocks.get(&source) {
            None => ProcessResult::GapSource,
            Some(Block::Send(s)) if s.destination == account => ProcessResult::Overspend,
            Some(_) => ProcessResult::NotReceiveFromSend,
        }
    }

    fn advance(&mut self, account: Address, head: H256, apply: impl FnOnce(&mut AccountState)) {
        if let Some(st) = self.accounts.get_mut(&account) {
            apply(st);
            st.head = head;
            st.modified_secs = now_secs();
        }
    }

    fn add_weight(&mut self, representative: Address, amount: Amount) {
        *self.weights.entry(representative).or_insert(0) += amount;
    }

    fn sub_weight(&mut self, representative: Address, amount: Amount) {
        if let Some(w) = self.weights.get_mut(&representative) {
            *w = w.saturating_sub(amount);
        }
    }

    /// Frontier (latest block hash) of an account.
    pub fn latest(&self, account: &Address) -> Option<H256> {
        self.accounts.get(account).map(|st| st.head)
    }

    /// Current balance of an account.
    pub fn account_balance(&self, account: &Address) -> Amount {
        self.accounts.get(account).map(|st| st.balance).unwrap_or(0)
    }

    /// Voting weight delegated to a representative.
    pub fn weight(&self, representative: &Address) -> Amount {
        self.weights.get(representative).copied().unwrap_or(0)
    }

    /// Total supply minus whatever has been burned.
    pub fn supply_minus_burn(&self) -> Amount {
        self.supply - self.account_balance(&Address::BURN)
    }

    /// Whether a block is present.
    pub fn block_exists(&self, hash: &H256) -> bool {
        self.blocks.contains_key(hash)
    }

    /// Fetch a block by hash.
    pub fn block(&self, hash: &H256) -> Option<Block> {
        self.blocks.get(hash).copied()
    }

    /// Account that chains a block.
    pub fn block_account(&self, hash: &H256) -> Option<Address> {
        self.block_owner.get(hash).copied()
    }

    /// Seconds since the account's frontier last moved.
    pub fn account_age_secs(&self, account: &Address) -> Option<u64> {
        let st = self.accounts.get(account)?;
        Some(now_secs().saturating_sub(st.modified_secs))
    }

    /// `(account, frontier)` pairs in address order, starting at `start`.
    pub fn frontiers_from(&self, start: Address) -> impl Iterator<Item = (Address, H256)> + '_ {
        self.accounts.range(start..).map(|(a, st)| (*a, st.head))
    }

    /// Number of blocks in the ledger.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
