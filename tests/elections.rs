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

//! Election lifecycle: thresholds, vote ordering, expiry.

mod common;

use common::*;
use emberchain::core::consensus::signing;
use emberchain::core::ledger::Genesis;
use emberchain::core::types::{Address, Block, ProcessResult, Signature, H256};
use emberchain::networking::wire::Message;
use ring::signature::Ed25519KeyPair;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Genesis 1000 units; delegate 1000-`minority` to `rep1` and `minority`
/// to `rep2` via a change and an opened second account. Returns the
/// frontier of the genesis chain.
fn delegate_weights(
    node: &TestNode,
    kp: &Ed25519KeyPair,
    genesis: &Genesis,
    rep1: Address,
    rep2: Address,
    minority: u128,
    minority_kp: &Ed25519KeyPair,
    minority_account: Address,
) -> H256 {
    let change = change_block(kp, genesis.hash(), rep1);
    let send = send_block(kp, change.hash(), minority_account, 1000 - minority);
    let open = open_block(minority_kp, send.hash(), rep2, minority_account);
    let mut ledger = node.node.ledger.lock().unwrap();
    assert_eq!(ledger.process(&change), ProcessResult::Progress);
    assert_eq!(ledger.process(&send), ProcessResult::Progress);
    assert_eq!(ledger.process(&open), ProcessResult::Progress);
    assert_eq!(ledger.weight(&rep1), 1000 - minority);
    assert_eq!(ledger.weight(&rep2), minority);
    send.hash()
}

fn fork_pair(kp: &Ed25519KeyPair, previous: H256) -> (Block, Block) {
    let x = send_block(kp, previous, Address::from_bytes([0xaa; 32]), 100);
    let y = send_block(kp, previous, Address::from_bytes([0xbb; 32]), 150);
    (x, y)
}

#[tokio::test]
async fn split_vote_expires_without_confirmation() {
    let (kp, _, _) = keypair();
    let genesis = Genesis::new(&kp, 1_000);
    let observer = spawn_node(&genesis, 50, None).await;

    let (rep1_kp, _, rep1) = keypair();
    let (rep2_kp, _, rep2) = keypair();
    let (minority_kp, _, minority_account) = keypair();
    let head = delegate_weights(
        &observer, &kp, &genesis, rep1, rep2, 400, &minority_kp, minority_account,
    );

    let confirmations = Arc::new(AtomicUsize::new(0));
    {
        let confirmations = Arc::clone(&confirmations);
        observer.node.on_confirmed(move |_| {
            confirmations.fetch_add(1, Ordering::SeqCst);
        });
    }

    let (x, y) = fork_pair(&kp, head);
    assert_eq!(
        observer.node.ledger.lock().unwrap().process(&x),
        ProcessResult::Progress
    );
    assert!(observer.node.conflicts.start(&observer.node, &x, false));
    assert!(!observer.node.conflicts.start(&observer.node, &y, false));

    // 60% for x, 40% for y: under the 87.5% contested threshold forever.
    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep1_kp, rep1, 1, x));
    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep2_kp, rep2, 1, y));

    // Four 50ms rounds elapse and the election is dropped, unconfirmed.
    assert!(
        wait_until(
            || observer.node.conflicts.is_empty(),
            Duration::from_secs(5)
        )
        .await,
        "election never expired"
    );
    assert_eq!(confirmations.load(Ordering::SeqCst), 0);
    assert_eq!(
        observer.node.ledger.lock().unwrap().latest(&genesis.account),
        Some(x.hash())
    );
}

#[tokio::test]
async fn supermajority_confirms_contested_fork() {
    let (kp, _, _) = keypair();
    let genesis = Genesis::new(&kp, 1_000);
    let observer = spawn_node(&genesis, 50, None).await;

    let (rep1_kp, _, rep1) = keypair();
    let (_rep2_kp, _, rep2) = keypair();
    let (minority_kp, _, minority_account) = keypair();
    let head = delegate_weights(
        &observer, &kp, &genesis, rep1, rep2, 100, &minority_kp, minority_account,
    );

    let confirmations = Arc::new(AtomicUsize::new(0));
    {
        let confirmations = Arc::clone(&confirmations);
        observer.node.on_confirmed(move |_| {
            confirmations.fetch_add(1, Ordering::SeqCst);
        });
    }

    let (x, y) = fork_pair(&kp, head);
    assert_eq!(
        observer.node.ledger.lock().unwrap().process(&x),
        ProcessResult::Progress
    );
    observer.node.conflicts.start(&observer.node, &x, false);
    observer.node.conflicts.start(&observer.node, &y, false);

    // 90% on x clears the contested threshold on vote arrival.
    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep1_kp, rep1, 1, x));

    assert!(
        wait_until(
            || observer.node.conflicts.is_empty(),
            Duration::from_secs(5)
        )
        .await,
        "election did not confirm"
    );
    assert_eq!(confirmations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn majority_confirms_uncontested_candidate() {
    let (kp, _, _) = keypair();
    let genesis = Genesis::new(&kp, 1_000);
    let observer = spawn_node(&genesis, 50, None).await;

    let (rep1_kp, _, rep1) = keypair();
    let (_rep2_kp, _, rep2) = keypair();
    let (minority_kp, _, minority_account) = keypair();
    let head = delegate_weights(
        &observer, &kp, &genesis, rep1, rep2, 400, &minority_kp, minority_account,
    );

    let confirmations = Arc::new(AtomicUsize::new(0));
    {
        let confirmations = Arc::clone(&confirmations);
        observer.node.on_confirmed(move |_| {
            confirmations.fetch_add(1, Ordering::SeqCst);
        });
    }

    // A single candidate: 60% beats the one-half uncontested threshold.
    let x = send_block(&kp, head, Address::from_bytes([0xaa; 32]), 100);
    assert_eq!(
        observer.node.ledger.lock().unwrap().process(&x),
        ProcessResult::Progress
    );
    observer.node.conflicts.start(&observer.node, &x, false);
    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep1_kp, rep1, 1, x));

    assert!(
        wait_until(
            || observer.node.conflicts.is_empty(),
            Duration::from_secs(5)
        )
        .await,
        "election did not confirm"
    );
    assert_eq!(confirmations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn newest_sequence_wins_per_representative() {
    let (kp, _, _) = keypair();
    let genesis = Genesis::new(&kp, 1_000);
    let observer = spawn_node(&genesis, 60_000, None).await;

    // A representative with no delegated weight cannot confirm anything,
    // so the election stays alive while we probe its vote table.
    let (rep_kp, _, rep) = keypair();
    let (x, y) = fork_pair(&kp, genesis.hash());

    observer.node.conflicts.start(&observer.node, &x, false);
    let election = observer.node.conflicts.get(&x.root()).unwrap();

    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep_kp, rep, 5, y));
    assert_eq!(election.vote_sequence(&rep), Some(5));

    // An older sequence never replaces a newer one.
    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep_kp, rep, 3, x));
    assert_eq!(election.vote_sequence(&rep), Some(5));

    observer
        .node
        .conflicts
        .update(&signing::make_vote(&rep_kp, rep, 7, x));
    assert_eq!(election.vote_sequence(&rep), Some(7));
}

#[tokio::test]
async fn forged_vote_is_not_counted() {
    let (kp, _, _) = keypair();
    let genesis = Genesis::new(&kp, 1_000);
    let observer = spawn_node(&genesis, 60_000, None).await;

    let (rep_kp, _, rep) = keypair();
    let x = send_block(&kp, genesis.hash(), Address::from_bytes([0xaa; 32]), 100);
    observer.node.conflicts.start(&observer.node, &x, false);
    let election = observer.node.conflicts.get(&x.root()).unwrap();

    let mut vote = signing::make_vote(&rep_kp, rep, 1, x);
    vote.signature = Signature([0x5c; 64]);
    let work = observer.node.work.generate(&x.root());
    observer.node.process_message(
        Message::ConfirmAck { vote, work },
        "127.0.0.1:1".parse().unwrap(),
        true,
    );

    assert_eq!(election.vote_sequence(&rep), None);
    assert_eq!(observer.node.metrics.error_total.get(), 1);
}
