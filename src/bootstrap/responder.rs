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

//! Bootstrap responder: serves frontier walks and bulk chain pulls.
//!
//! A connection carries framed requests (the same header as the gossip
//! codec). Frontier responses are `(address, latest)` pairs ending in a
//! zero pair; bulk responses are `kind byte || block` records ending in a
//! `not_a_block` byte.

use crate::core::types::{Address, Block, BlockKind, H256};
use crate::networking::wire::{self, Message, MessageKind, MAGIC};
use crate::node::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, warn};

const BULK_REQ_PAYLOAD: usize = 32 + 32 + 4;
const FRONTIER_REQ_PAYLOAD: usize = 32 + 4 + 4;

/// Accept bootstrap connections until shutdown.
pub(crate) async fn accept_loop(
    node: Arc<Node>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.changed() => return,
        };
        if !node.network.on() {
            return;
        }
        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(serve(Arc::clone(&node), stream, peer));
            }
            Err(e) => {
                node.metrics.error_total.inc();
                warn!(err = %e, "bootstrap accept failed");
            }
        }
    }
}

/// Serve framed requests until the peer disconnects or misbehaves.
async fn serve(node: Arc<Node>, mut stream: TcpStream, peer: SocketAddr) {
    debug!(%peer, "bootstrap connection accepted");
    loop {
        let mut header = [0u8; 4];
        if stream.read_exact(&mut header).await.is_err() {
            return; // disconnect ends the session
        }
        if header[0] != MAGIC {
            return;
        }
        let payload_len = match MessageKind::from_byte(header[2]) {
            Some(MessageKind::BulkReq) => BULK_REQ_PAYLOAD,
            Some(MessageKind::FrontierReq) => FRONTIER_REQ_PAYLOAD,
            _ => return,
        };
        let mut frame = header.to_vec();
        frame.resize(4 + payload_len, 0);
        if stream.read_exact(&mut frame[4..]).await.is_err() {
            return;
        }
        let request = match Message::deserialize(&frame, node.cfg.network_id()) {
            Ok(request) => request,
            Err(_) => return,
        };
        let served = match request {
            Message::BulkReq { start, end, count } => {
                send_chain(&node, &mut stream, start, end, count).await
            }
            Message::FrontierReq { start, age, count } => {
                send_frontiers(&node, &mut stream, start, age, count).await
            }
            _ => return,
        };
        if served.is_err() {
            return;
        }
    }
}

/// Stream the chain from `start` (newest) back toward `end` (exclusive),
/// at most `count` blocks, then the `not_a_block` sentinel. An unknown
/// `start` yields just the sentinel.
async fn send_chain(
    node: &Arc<Node>,
    stream: &mut TcpStream,
    start: H256,
    end: H256,
    count: u32,
) -> std::io::Result<()> {
    let blocks: Vec<Block> = {
        let Ok(ledger) = node.ledger.lock() else {
            return Ok(());
        };
        let mut out = Vec::new();
        let mut current = start;
        while !current.is_zero() && current != end && (out.len() as u32) < count {
            let Some(block) = ledger.block(&current) else {
                break;
            };
            out.push(block);
            current = block.previous().unwrap_or(H256::ZERO);
        }
        out
    };
    for block in &blocks {
        let mut record = vec![block.kind() as u8];
        wire::write_block(&mut record, block);
        stream.write_all(&record).await?;
    }
    stream.write_all(&[BlockKind::NotABlock as u8]).await?;
    Ok(())
}

/// Stream `(address, latest)` pairs in address order from `start`,
/// skipping accounts untouched for more than `age` seconds, then a zero
/// pair.
async fn send_frontiers(
    node: &Arc<Node>,
    stream: &mut TcpStream,
    start: Address,
    age: u32,
    count: u32,
) -> std::io::Result<()> {
    let pairs: Vec<(Address, H256)> = {
        let Ok(ledger) = node.ledger.lock() else {
            return Ok(());
        };
        ledger
            .frontiers_from(start)
            .filter(|(account, _)| {
                age == u32::MAX
                    || ledger
                        .account_age_secs(account)
                        .map(|secs| secs <= age as u64)
                        .unwrap_or(false)
            })
            .take(count as usize)
            .collect()
    };
    for (account, latest) in &pairs {
        let mut record = Vec::with_capacity(64);
        record.extend_from_slice(account.as_bytes());
        record.extend_from_slice(latest.as_bytes());
        stream.write_all(&record).await?;
    }
    stream.write_all(&[0u8; 64]).await?;
    Ok(())
}
