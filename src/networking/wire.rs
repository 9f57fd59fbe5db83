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

//! Wire codec for the gossip protocol and the bootstrap stream requests.
//!
//! Every message starts with a fixed four-byte header: magic, network id,
//! message kind, and a kind-specific flags byte (the block kind for
//! block-bearing messages, zero otherwise). Endpoints travel as 16-byte
//! IPv6 octets (IPv4 mapped) plus a big-endian port. Integers are
//! big-endian. Trailing bytes are rejected.

use crate::core::types::{
    Address, Block, BlockKind, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, Signature, Vote,
    WorkNonce, H256,
};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use thiserror::Error;

/// First byte of every message.
pub const MAGIC: u8 = b'E';
/// Endpoints carried per keepalive.
pub const PEERS_PER_KEEPALIVE: usize = 24;
/// Upper bound on a gossip datagram.
pub const MAX_DATAGRAM: usize = 512;

/// Codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// Truncated or inconsistent framing.
    #[error("malformed message")]
    MalformedMessage,
    /// Unrecognized message kind byte.
    #[error("unknown message kind")]
    UnknownKind,
    /// Magic byte mismatch.
    #[error("bad magic")]
    BadMagic,
    /// Network id mismatch (test vs live).
    #[error("network mismatch")]
    BadNetwork,
}

/// Which overlay a message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum NetworkId {
    /// Test overlay.
    Test = b'T',
    /// Live overlay.
    Live = b'L',
}

impl NetworkId {
    fn from_byte(b: u8) -> Option<NetworkId> {
        match b {
            b'T' => Some(NetworkId::Test),
            b'L' => Some(NetworkId::Live),
            _ => None,
        }
    }
}

/// Message kind discriminants. Kept stable on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Peer dissemination request.
    KeepaliveReq = 2,
    /// Peer dissemination response with ledger checksum.
    KeepaliveAck = 3,
    /// Block broadcast.
    PublishReq = 4,
    /// Block broadcast soliciting a vote.
    ConfirmReq = 5,
    /// A representative's vote.
    ConfirmAck = 6,
    /// Not-a-representative hint.
    ConfirmUnk = 7,
    /// Bootstrap: pull a chain range (stream only).
    BulkReq = 8,
    /// Bootstrap: walk account frontiers (stream only).
    FrontierReq = 9,
}

impl MessageKind {
    /// Parse a wire discriminant.
    pub fn from_byte(b: u8) -> Option<MessageKind> {
        match b {
            2 => Some(MessageKind::KeepaliveReq),
            3 => Some(MessageKind::KeepaliveAck),
            4 => Some(MessageKind::PublishReq),
            5 => Some(MessageKind::ConfirmReq),
            6 => Some(MessageKind::ConfirmAck),
            7 => Some(MessageKind::ConfirmUnk),
            8 => Some(MessageKind::BulkReq),
            9 => Some(MessageKind::FrontierReq),
            _ => None,
        }
    }
}

/// The zero endpoint used to pad keepalive peer arrays.
pub fn zero_endpoint() -> SocketAddr {
    SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
}

/// Collapse IPv4-mapped IPv6 addresses back to IPv4 so endpoint equality
/// survives a wire round-trip.
pub fn normalize_endpoint(endpoint: SocketAddr) -> SocketAddr {
    match endpoint.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => SocketAddr::new(IpAddr::V4(v4), endpoint.port()),
            None => endpoint,
        },
        IpAddr::V4(_) => endpoint,
    }
}

/// A parsed message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// 24 endpoints for the peer table.
    KeepaliveReq {
        /// Advertised peers, zero-padded.
        peers: [SocketAddr; PEERS_PER_KEEPALIVE],
    },
    /// 24 endpoints plus a running checksum of recent publishes.
    KeepaliveAck {
        /// Advertised peers, zero-padded.
        peers: [SocketAddr; PEERS_PER_KEEPALIVE],
        /// XOR of the 32 most recent publish hashes.
        checksum: H256,
    },
    /// Block broadcast.
    PublishReq {
        /// Proof-of-work nonce for the block root.
        work: WorkNonce,
        /// The block.
        block: Block,
    },
    /// Block broadcast soliciting a vote.
    ConfirmReq {
        /// Proof-of-work nonce for the block root.
        work: WorkNonce,
        /// The block.
        block: Block,
    },
    /// A representative's vote, carrying the candidate block.
    ConfirmAck {
        /// The vote.
        vote: Vote,
        /// Proof-of-work nonce for the block root.
        work: WorkNonce,
    },
    /// Sender signals it is not a representative.
    ConfirmUnk {
        /// Representative hint.
        rep_hint: Address,
    },
    /// Bootstrap chain pull: `start` (newest) back toward `end` (exclusive).
    BulkReq {
        /// Newest hash to pull.
        start: H256,
        /// Exclusive lower bound; zero walks to the open block.
        end: H256,
        /// Maximum blocks to return.
        count: u32,
    },
    /// Bootstrap frontier walk from `start` in address order.
    FrontierReq {
        /// First address to report.
        start: Address,
        /// Skip accounts whose frontier is older than this many seconds.
        age: u32,
        /// Maximum pairs to return.
        count: u32,
    },
}

impl Message {
    /// Wire kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::KeepaliveReq { .. } => MessageKind::KeepaliveReq,
            Message::KeepaliveAck { .. } => MessageKind::KeepaliveAck,
            Message::PublishReq { .. } => MessageKind::PublishReq,
            Message::ConfirmReq { .. } => MessageKind::ConfirmReq,
            Message::ConfirmAck { .. } => MessageKind::ConfirmAck,
            Message::ConfirmUnk { .. } => MessageKind::ConfirmUnk,
            Message::BulkReq { .. } => MessageKind::BulkReq,
            Message::FrontierReq { .. } => MessageKind::FrontierReq,
        }
    }

    /// Serialize with header for `network`.
    pub fn serialize(&self, network: NetworkId) -> Vec<u8> {
        let flags = match self {
            Message::PublishReq { block, .. } | Message::ConfirmReq { block, .. } => {
                block.kind() as u8
            }
            Message::ConfirmAck { vote, .. } => vote.block.kind() as u8,
            _ => 0,
        };
        let mut out = Vec::with_capacity(MAX_DATAGRAM);
        out.push(MAGIC);
        out.push(network as u8);
        out.push(self.kind() as u8);
        out.push(flags);
        match self {
            Message::KeepaliveReq { peers } => {
                for peer in peers {
                    write_endpoint(&mut out, peer);
                }
            }
            Message::KeepaliveAck { peers, checksum } => {
                for peer in peers {
                    write_endpoint(&mut out, peer);
                }
                out.extend_from_slice(checksum.as_bytes());
            }
            Message::PublishReq { work, block } | Message::ConfirmReq { work, block } => {
                out.extend_from_slice(work);
                write_block(&mut out, block);
            }
            Message::ConfirmAck { vote, work } => {
                out.extend_from_slice(vote.representative.as_bytes());
                out.extend_from_slice(&vote.sequence.to_be_bytes());
                out.extend_from_slice(&vote.signature.0);
                write_block(&mut out, &vote.block);
                out.extend_from_slice(work);
            }
            Message::ConfirmUnk { rep_hint } => {
                out.extend_from_slice(rep_hint.as_bytes());
            }
            Message::BulkReq { start, end, count } => {
                out.extend_from_slice(start.as_bytes());
                out.extend_from_slice(end.as_bytes());
                out.extend_from_slice(&count.to_be_bytes());
            }
            Message::FrontierReq { start, age, count } => {
                out.extend_from_slice(start.as_bytes());
                out.extend_from_slice(&age.to_be_bytes());
                out.extend_from_slice(&count.to_be_bytes());
            }
        }
        out
    }

    /// Parse a whole datagram for `network`. Rejects trailing bytes.
    pub fn deserialize(data: &[u8], network: NetworkId) -> Result<Message, WireError> {
        let mut reader = Reader::new(data);
        let magic = reader.u8()?;
        if magic != MAGIC {
            return Err(WireError::BadMagic);
        }
        let net = reader.u8()?;
        if NetworkId::from_byte(net) != Some(network) {
            return Err(WireError::BadNetwork);
        }
        let kind = MessageKind::from_byte(reader.u8()?).ok_or(WireError::UnknownKind)?;
        let flags = reader.u8()?;

        let message = match kind {
            MessageKind::KeepaliveReq => Message::KeepaliveReq {
                peers: read_peers(&mut reader)?,
            },
            MessageKind::KeepaliveAck => Message::KeepaliveAck {
                peers: read_peers(&mut reader)?,
                checksum: reader.h256()?,
            },
            MessageKind::PublishReq => {
                let work = reader.work()?;
                let block = read_block(&mut reader, flags)?;
                Message::PublishReq { work, block }
            }
            MessageKind::ConfirmReq => {
                let work = reader.work()?;
                let block = read_block(&mut reader, flags)?;
                Message::ConfirmReq { work, block }
            }
            MessageKind::ConfirmAck => {
                let representative = reader.address()?;
                let sequence = reader.u64_be()?;
                let signature = reader.signature()?;
                let block = read_block(&mut reader, flags)?;
                let work = reader.work()?;
                Message::ConfirmAck {
                    vote: Vote {
                        representative,
                        sequence,
                        block,
                        signature,
                    },
                    work,
                }
            }
            MessageKind::ConfirmUnk => Message::ConfirmUnk {
                rep_hint: reader.address()?,
            },
            MessageKind::BulkReq => Message::BulkReq {
                start: reader.h256()?,
                end: reader.h256()?,
                count: reader.u32_be()?,
            },
            MessageKind::FrontierReq => Message::FrontierReq {
                start: reader.address()?,
                age: reader.u32_be()?,
                count: reader.u32_be()?,
            },
        };
        // Block-bearing kinds consume flags as the block kind; for the rest
        // a nonzero flags byte is inconsistent framing.
        if !matches!(
            message,
            Message::PublishReq { .. } | Message::ConfirmReq { .. } | Message::ConfirmAck { .. }
        ) && flags != 0
        {
            return Err(WireError::MalformedMessage);
        }
        reader.finish()?;
        Ok(message)
    }
}

/// Serialized size of a block payload for a given kind.
pub fn block_payload_len(kind: BlockKind) -> Option<usize> {
    match kind {
        BlockKind::NotABlock => None,
        BlockKind::Send => Some(32 + 32 + 16 + 64),
        BlockKind::Receive => Some(32 + 32 + 64),
        BlockKind::Open => Some(32 + 32 + 32 + 64),
        BlockKind::Change => Some(32 + 32 + 64),
    }
}

/// Append a block payload (no kind byte).
pub fn write_block(out: &mut Vec<u8>, block: &Block) {
    match block {
        Block::Send(b) => {
            out.extend_from_slice(b.previous.as_bytes());
            out.extend_from_slice(b.destination.as_bytes());
            out.extend_from_slice(&b.balance.to_be_bytes());
            out.extend_from_slice(&b.signature.0);
        }
        Block::Receive(b) => {
            out.extend_from_slice(b.previous.as_bytes());
            out.extend_from_slice(b.source.as_bytes());
            out.extend_from_slice(&b.signature.0);
        }
        Block::Open(b) => {
            out.extend_from_slice(b.source.as_bytes());
            out.extend_from_slice(b.representative.as_bytes());
            out.extend_from_slice(b.account.as_bytes());
            out.extend_from_slice(&b.signature.0);
        }
        Block::Change(b) => {
            out.extend_from_slice(b.previous.as_bytes());
            out.extend_from_slice(b.representative.as_bytes());
            out.extend_from_slice(&b.signature.0);
        }
    }
}

/// Parse a block payload whose kind came from the header flags (or a
/// stream kind byte).
pub fn parse_block(kind: BlockKind, payload: &[u8]) -> Result<Block, WireError> {
    let mut reader = Reader::new(payload);
    let block = read_block_body(&mut reader, kind)?;
    reader.finish()?;
    Ok(block)
}

fn read_block(reader: &mut Reader<'_>, flags: u8) -> Result<Block, WireError> {
    let kind = BlockKind::from_byte(flags).ok_or(WireError::MalformedMessage)?;
    read_block_body(reader, kind)
}

fn read_block_body(reader: &mut Reader<'_>, kind: BlockKind) -> Result<Block, WireError> {
    match kind {
        BlockKind::NotABlock => Err(WireError::MalformedMessage),
        BlockKind::Send => Ok(Block::Send(SendBlock {
            previous: reader.h256()?,
            destination: reader.address()?,
            balance: reader.u128_be()?,
            signature: reader.signature()?,
        })),
        BlockKind::Receive => Ok(Block::Receive(ReceiveBlock {
            previous: reader.h256()?,
            source: reader.h256()?,
            signature: reader.signature()?,
        })),
        BlockKind::Open => Ok(Block::Open(OpenBlock {
            source: reader.h256()?,
            representative: reader.address()?,
            account: reader.address()?,
            signature: reader.signature()?,
        })),
        BlockKind::Change => Ok(Block::Change(ChangeBlock {
            previous: reader.h256()?,
            representative: reader.address()?,
            signature: reader.signature()?,
        })),
    }
}

fn write_endpoint(out: &mut Vec<u8>, endpoint: &SocketAddr) {
    let octets = match endpoint.ip() {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    };
    out.extend_from_slice(&octets);
    out.extend_from_slice(&endpoint.port().to_be_bytes());
}

fn read_peers(reader: &mut Reader<'_>) -> Result<[SocketAddr; PEERS_PER_KEEPALIVE], WireError> {
    let mut peers = [zero_endpoint(); PEERS_PER_KEEPALIVE];
    for slot in peers.iter_mut() {
        *slot = reader.endpoint()?;
    }
    Ok(peers)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::MalformedMessage)?;
        if end > self.data.len() {
            return Err(WireError::MalformedMessage);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn u32_be(&mut self) -> Result<u32, WireError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(b))
    }

    fn u64_be(&mut self) -> Result<u64, WireError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(b))
    }

    fn u128_be(&mut self) -> Result<u128, WireError> {
        let mut b = [0u8; 16];
        b.copy_from_slice(self.take(16)?);
        Ok(u128::from_be_bytes(b))
    }

    fn h256(&mut self) -> Result<H256, WireError> {
        let mut b = [0u8; 32];
        b.copy_from_slice(self.take(32)?);
        Ok(H256::from_bytes(b))
    }

    fn address(&mut self) -> Result<Address, WireError> {
        let mut b = [0u8; 32];
        b.copy_from_slice(self.take(32)?);
        Ok(Address::from_bytes(b))
    }

    fn work(&mut self) -> Result<WorkNonce, WireError> {
        let mut b = [0u8; 32];
        b.copy_from_slice(self.take(32)?);
        Ok(b)
    }

    fn signature(&mut self) -> Result<Signature, WireError> {
        let mut b = [0u8; 64];
        b.copy_from_slice(self.take(64)?);
        Ok(Signature(b))
    }

    fn endpoint(&mut self) -> Result<SocketAddr, WireError> {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(self.take(16)?);
        let mut port = [0u8; 2];
        port.copy_from_slice(self.take(2)?);
        let addr = SocketAddr::new(
            IpAddr::V6(Ipv6Addr::from(octets)),
            u16::from_be_bytes(port),
        );
        Ok(normalize_endpoint(addr))
    }

    fn finish(&self) -> Result<(), WireError> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(WireError::MalformedMessage)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_peers() -> [SocketAddr; PEERS_PER_KEEPALIVE] {
        let mut peers = [zero_endpoint(); PEERS_PER_KEEPALIVE];
        peers[0] = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 7075);
        peers[1] = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 7076);
        peers
    }

    fn sample_block() -> Block {
        Block::Send(SendBlock {
            previous: H256::from_bytes([3; 32]),
            destination: Address::from_bytes([4; 32]),
            balance: 12_345,
            signature: Signature([9; 64]),
        })
    }

    #[test]
    fn keepalive_req_roundtrip() {
        let msg = Message::KeepaliveReq {
            peers: sample_peers(),
        };
        let bytes = msg.serialize(NetworkId::Test);
        assert!(bytes.len() <= MAX_DATAGRAM);
        assert_eq!(Message::deserialize(&bytes, NetworkId::Test), Ok(msg));
    }

    #[test]
    fn confirm_ack_roundtrip() {
        let msg = Message::ConfirmAck {
            vote: Vote {
                representative: Address::from_bytes([1; 32]),
                sequence: 42,
                block: sample_block(),
                signature: Signature([8; 64]),
            },
            work: [5; 32],
        };
        let bytes = msg.serialize(NetworkId::Live);
        assert_eq!(Message::deserialize(&bytes, NetworkId::Live), Ok(msg));
    }

    #[test]
    fn network_mismatch_rejected() {
        let msg = Message::ConfirmUnk {
            rep_hint: Address::from_bytes([2; 32]),
        };
        let bytes = msg.serialize(NetworkId::Test);
        assert_eq!(
            Message::deserialize(&bytes, NetworkId::Live),
            Err(WireError::BadNetwork)
        );
    }

    #[test]
    fn truncation_and_trailing_rejected() {
        let msg = Message::BulkReq {
            start: H256::from_bytes([1; 32]),
            end: H256::ZERO,
            count: 100,
        };
        let mut bytes = msg.serialize(NetworkId::Test);
        let last = bytes.pop().unwrap();
        assert_eq!(
            Message::deserialize(&bytes, NetworkId::Test),
            Err(WireError::MalformedMessage)
        );
        bytes.push(last);
        bytes.push(0);
        assert_eq!(
            Message::deserialize(&bytes, NetworkId::Test),
            Err(WireError::MalformedMessage)
        );
    }

    #[test]
    fn unknown_kind_rejected() {
        let bytes = [MAGIC, b'T', 0x63, 0];
        assert_eq!(
            Message::deserialize(&bytes, NetworkId::Test),
            Err(WireError::UnknownKind)
        );
    }

    #[test]
    fn v4_endpoint_survives_mapping() {
        let endpoint = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 9)), 1234);
        let mut out = Vec::new();
        write_endpoint(&mut out, &endpoint);
        let mut reader = Reader::new(&out);
        assert_eq!(reader.endpoint().unwrap(), endpoint);
    }
}
