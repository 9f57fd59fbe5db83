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

//! Bootstrap initiator: pulls missing chains from a peer.
//!
//! The session first walks the responder's frontiers, queueing a bulk pull
//! for every chain whose tip is unknown locally (bounded queue). Each pull
//! validates the hash chain as it streams in - the first block whose hash
//! does not match `expecting` tears the session down - and applies the
//! segment oldest-first once complete.

use crate::core::types::{Address, Block, BlockKind, ProcessResult, H256};
use crate::networking::wire::{self, Message};
use crate::node::Node;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Outstanding stream requests per session.
const MAX_QUEUE: usize = 10;

/// Bootstrap session errors. Either one terminates the session; the
/// initiator is free to retry against another peer after the gossip period.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Socket failure.
    #[error("bootstrap io")]
    Io,
    /// Malformed or inconsistent response stream.
    #[error("bootstrap protocol")]
    Protocol,
}

impl From<std::io::Error> for BootstrapError {
    fn from(_: std::io::Error) -> Self {
        BootstrapError::Io
    }
}

/// Run one bootstrap session against `peer`.
pub async fn run(node: Arc<Node>, peer: SocketAddr) -> Result<(), BootstrapError> {
    debug!(%peer, "bootstrap session starting");
    let mut stream = TcpStream::connect(peer).await?;
    let pulls = walk_frontiers(&node, &mut stream).await?;
    let count = pulls.len();
    for (start, end) in pulls {
        pull_chain(&node, &mut stream, start, end).await?;
    }
    debug!(%peer, chains = count, "bootstrap session complete");
    Ok(())
}

/// Request the full frontier set and collect pulls for chains whose tip we
/// do not hold. The request queue is bounded; anything beyond it waits for
/// a later session.
async fn walk_frontiers(
    node: &Arc<Node>,
    stream: &mut TcpStream,
) -> Result<VecDeque<(H256, H256)>, BootstrapError> {
    let request = Message::FrontierReq {
        start: Address::BURN,
        age: u32::MAX,
        count: u32::MAX,
    };
    stream
        .write_all(&request.serialize(node.cfg.network_id()))
        .await?;

    let mut pulls: VecDeque<(H256, H256)> = VecDeque::new();
    loop {
        let mut record = [0u8; 64];
        stream.read_exact(&mut record).await?;
        if record == [0u8; 64] {
            break;
        }
        let mut account = [0u8; 32];
        account.copy_from_slice(&record[..32]);
        let account = Address::from_bytes(account);
        let mut latest = [0u8; 32];
        latest.copy_from_slice(&record[32..]);
        let latest = H256::from_bytes(latest);

        let (ours, have_theirs) = match node.ledger.lock() {
            Ok(ledger) => (ledger.latest(&account), ledger.block_exists(&latest)),
            Err(_) => return Err(BootstrapError::Protocol),
        };
        if have_theirs {
            continue;
        }
        if pulls.len() < MAX_QUEUE {
            pulls.push_back((latest, ours.unwrap_or(H256::ZERO)));
        } else {
            debug!(%account, "request queue full; chain deferred");
        }
    }
    Ok(pulls)
}

/// Pull one chain from `start` (newest) back toward `end` (exclusive),
/// verifying the hash chain, then apply it oldest-first.
async fn pull_chain(
    node: &Arc<Node>,
    stream: &mut TcpStream,
    start: H256,
    end: H256,
) -> Result<(), BootstrapError> {
    let request = Message::BulkReq {
        start,
        end,
        count: u32::MAX,
    };
    stream
        .write_all(&request.serialize(node.cfg.network_id()))
        .await?;

    let mut expecting = start;
    let mut segment: Vec<Block> = Vec::new();
    loop {
        let mut kind = [0u8; 1];
        stream.read_exact(&mut kind).await?;
        let Some(kind) = BlockKind::from_byte(kind[0]) else {
            return Err(BootstrapError::Protocol);
        };
        if kind == BlockKind::NotABlock {
            break;
        }
        let Some(len) = wire::block_payload_len(kind) else {
            return Err(BootstrapError::Protocol);
        };
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;
        let block = wire::parse_block(kind, &payload).map_err(|_| BootstrapError::Protocol)?;
        if block.hash() != expecting {
            debug!(expected = %expecting, got = %block.hash(), "chain mismatch");
            return Err(BootstrapError::Protocol);
        }
        expecting = block.previous().unwrap_or(H256::ZERO);
        segment.push(block);
    }

    for block in segment.into_iter().rev() {
        apply(node, block);
    }
    Ok(())
}

/// Insert a bootstrapped block quietly; a progress result may unlock an
/// orphan, which re-enters the normal publish pipeline.
fn apply(node: &Arc<Node>, block: Block) {
    let result = match node.ledger.lock() {
        Ok(mut ledger) => ledger.process(&block),
        Err(_) => return,
    };
    if result != ProcessResult::Progress {
        return;
    }
    let orphan = match node.gap_cache.lock() {
        Ok(mut gaps) => gaps.take(&block.hash()),
        Err(_) => None,
    };
    if let Some(orphan) = orphan {
        let work = node.work.generate(&orphan.root());
        node.process_receive_republish(orphan, work, None);
    }
}
