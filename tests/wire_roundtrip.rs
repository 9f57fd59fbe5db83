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

//! Property tests: the codec round-trips every message kind and rejects
//! every truncation.

use emberchain::core::types::{
    Address, Block, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, Signature, Vote, H256,
};
use emberchain::networking::wire::{
    zero_endpoint, Message, NetworkId, WireError, MAX_DATAGRAM, PEERS_PER_KEEPALIVE,
};
use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

fn arb_h256() -> impl Strategy<Value = H256> {
    any::<[u8; 32]>().prop_map(H256::from_bytes)
}

fn arb_address() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>().prop_map(Address::from_bytes)
}

fn arb_signature() -> impl Strategy<Value = Signature> {
    any::<[u8; 64]>().prop_map(Signature)
}

fn arb_block() -> impl Strategy<Value = Block> {
    prop_oneof![
        (arb_h256(), arb_address(), any::<u128>(), arb_signature()).prop_map(
            |(previous, destination, balance, signature)| Block::Send(SendBlock {
                previous,
                destination,
                balance,
                signature,
            })
        ),
        (arb_h256(), arb_h256(), arb_signature()).prop_map(|(previous, source, signature)| {
            Block::Receive(ReceiveBlock {
                previous,
                source,
                signature,
            })
        }),
        (arb_h256(), arb_address(), arb_address(), arb_signature()).prop_map(
            |(source, representative, account, signature)| Block::Open(OpenBlock {
                source,
                representative,
                account,
                signature,
            })
        ),
        (arb_h256(), arb_address(), arb_signature()).prop_map(
            |(previous, representative, signature)| Block::Change(ChangeBlock {
                previous,
                representative,
                signature,
            })
        ),
    ]
}

/// Endpoints in the canonical forms the codec preserves: IPv4, or global
/// unicast IPv6 (never IPv4-mapped).
fn arb_endpoint() -> impl Strategy<Value = SocketAddr> {
    prop_oneof![
        (any::<[u8; 4]>(), any::<u16>()).prop_map(|(octets, port)| {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port)
        }),
        (any::<[u8; 14]>(), any::<u16>()).prop_map(|(tail, port)| {
            let mut octets = [0u8; 16];
            octets[0] = 0x20;
            octets[1] = 0x01;
            octets[2..].copy_from_slice(&tail);
            SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port)
        }),
        Just(zero_endpoint()),
    ]
}

fn arb_peers() -> impl Strategy<Value = [SocketAddr; PEERS_PER_KEEPALIVE]> {
    proptest::collection::vec(arb_endpoint(), PEERS_PER_KEEPALIVE).prop_map(|v| {
        let mut out = [zero_endpoint(); PEERS_PER_KEEPALIVE];
        for (slot, value) in out.iter_mut().zip(v) {
            *slot = value;
        }
        out
    })
}

fn arb_vote() -> impl Strategy<Value = Vote> {
    (arb_address(), any::<u64>(), arb_block(), arb_signature()).prop_map(
        |(representative, sequence, block, signature)| Vote {
            representative,
            sequence,
            block,
            signature,
        },
    )
}

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        arb_peers().prop_map(|peers| Message::KeepaliveReq { peers }),
        (arb_peers(), arb_h256())
            .prop_map(|(peers, checksum)| Message::KeepaliveAck { peers, checksum }),
        (any::<[u8; 32]>(), arb_block()).prop_map(|(work, block)| Message::PublishReq {
            work,
            block
        }),
        (any::<[u8; 32]>(), arb_block()).prop_map(|(work, block)| Message::ConfirmReq {
            work,
            block
        }),
        (arb_vote(), any::<[u8; 32]>()).prop_map(|(vote, work)| Message::ConfirmAck {
            vote,
            work
        }),
        arb_address().prop_map(|rep_hint| Message::ConfirmUnk { rep_hint }),
        (arb_h256(), arb_h256(), any::<u32>()).prop_map(|(start, end, count)| {
            Message::BulkReq { start, end, count }
        }),
        (arb_address(), any::<u32>(), any::<u32>()).prop_map(|(start, age, count)| {
            Message::FrontierReq { start, age, count }
        }),
    ]
}

proptest! {
    #[test]
    fn prop_roundtrip_every_kind(msg in arb_message()) {
        for network in [NetworkId::Test, NetworkId::Live] {
            let bytes = msg.serialize(network);
            prop_assert!(bytes.len() <= MAX_DATAGRAM);
            prop_assert_eq!(Message::deserialize(&bytes, network), Ok(msg.clone()));
        }
    }

    #[test]
    fn prop_every_truncation_is_malformed(msg in arb_message(), cut in 0usize..512) {
        let bytes = msg.serialize(NetworkId::Test);
        prop_assume!(cut < bytes.len());
        let result = Message::deserialize(&bytes[..cut], NetworkId::Test);
        prop_assert!(result.is_err());
    }

    #[test]
    fn prop_foreign_network_is_bad_sender(msg in arb_message()) {
        let bytes = msg.serialize(NetworkId::Live);
        prop_assert_eq!(
            Message::deserialize(&bytes, NetworkId::Test),
            Err(WireError::BadNetwork)
        );
    }
}
