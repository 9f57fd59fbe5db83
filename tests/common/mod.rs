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
#![allow(dead_code)]

//! Shared helpers for multi-node tests: loopback test-overlay nodes with
//! trivial work targets and short gossip periods.

use emberchain::core::ledger::Genesis;
use emberchain::core::security::wallet;
use emberchain::core::types::{
    Address, Amount, Block, ChangeBlock, OpenBlock, SendBlock, Signature, H256,
};
use emberchain::node::{ConsensusConfig, NetworkConfig, Node, NodeConfig, NodeSettings};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A started node plus its temp data dir.
pub struct TestNode {
    pub node: Arc<Node>,
    _dir: TempDir,
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.node.stop();
    }
}

/// Fresh Ed25519 keypair with its PKCS#8 document and address.
pub fn keypair() -> (Ed25519KeyPair, Vec<u8>, Address) {
    let rng = SystemRandom::new();
    let doc = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
    let kp = Ed25519KeyPair::from_pkcs8(doc.as_ref()).unwrap();
    let mut pk = [0u8; 32];
    pk.copy_from_slice(kp.public_key().as_ref());
    (kp, doc.as_ref().to_vec(), Address::from_bytes(pk))
}

fn test_config(data_dir: String, representative: String, gossip_ms: u64) -> NodeConfig {
    NodeConfig {
        node: NodeSettings {
            name: "test-node".to_string(),
            data_dir,
        },
        network: NetworkConfig {
            listen_addr: "127.0.0.1".to_string(),
            port: 0,
            network: "test".to_string(),
            bootstrap: Vec::new(),
            gossip_period_ms: gossip_ms,
            allow_local_peers: true,
            enforce_work: true,
        },
        consensus: ConsensusConfig {
            representative,
            // Any nonce clears this target; tests exercise the policy
            // plumbing without burning time on real work.
            work_target: Some(u64::MAX),
        },
    }
}

/// Spawn a started test node. `representative` supplies the voting
/// identity and its key material when this node should vote.
pub async fn spawn_node(
    genesis: &Genesis,
    gossip_ms: u64,
    representative: Option<(Address, &[u8])>,
) -> TestNode {
    let dir = tempfile::tempdir().unwrap();
    let rep_hex = representative
        .as_ref()
        .map(|(address, _)| address.to_string())
        .unwrap_or_default();
    let cfg = test_config(dir.path().to_string_lossy().into_owned(), rep_hex, gossip_ms);
    let node = Node::new(cfg, *genesis).await.unwrap();
    if let Some((_, pkcs8)) = representative {
        node.wallet.insert_pkcs8(pkcs8).unwrap();
    }
    node.start();
    TestNode { node, _dir: dir }
}

/// Make every pair of nodes known to each other.
pub fn peer_up(nodes: &[&TestNode]) {
    for a in nodes {
        for b in nodes {
            if a.node.endpoint() != b.node.endpoint() {
                a.node.peers.incoming_from_peer(&b.node.endpoint());
            }
        }
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub fn send_block(kp: &Ed25519KeyPair, previous: H256, destination: Address, balance: Amount) -> Block {
    let mut block = Block::Send(SendBlock {
        previous,
        destination,
        balance,
        signature: Signature::zero(),
    });
    wallet::sign_block(kp, &mut block);
    block
}

pub fn open_block(kp: &Ed25519KeyPair, source: H256, representative: Address, account: Address) -> Block {
    let mut block = Block::Open(OpenBlock {
        source,
        representative,
        account,
        signature: Signature::zero(),
    });
    wallet::sign_block(kp, &mut block);
    block
}

pub fn change_block(kp: &Ed25519KeyPair, previous: H256, representative: Address) -> Block {
    let mut block = Block::Change(ChangeBlock {
        previous,
        representative,
        signature: Signature::zero(),
    });
    wallet::sign_block(kp, &mut block);
    block
}
