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

//! UDP transport for the gossip overlay.
//!
//! One receive loop decodes datagrams and hands them to the message
//! processor. Outgoing buffers are serialized through an in-memory queue
//! drained by a single writer task, so at most one socket send is
//! outstanding. Everything short-circuits once `stop` flips the transport
//! off.

use crate::monitoring::metrics::Metrics;
use crate::networking::wire::{Message, WireError, MAX_DATAGRAM};
use crate::node::Node;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

/// Depth of the outbound send queue.
const SEND_QUEUE_DEPTH: usize = 1024;

type SendItem = (Vec<u8>, SocketAddr);

/// Bound UDP socket plus its outbound queue.
pub struct UdpNetwork {
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    tx: mpsc::Sender<SendItem>,
    queue_rx: Mutex<Option<mpsc::Receiver<SendItem>>>,
    on: AtomicBool,
    metrics: Arc<Metrics>,
}

impl UdpNetwork {
    /// Bind on `addr` (port 0 picks an ephemeral port).
    pub async fn bind(addr: SocketAddr, metrics: Arc<Metrics>) -> std::io::Result<UdpNetwork> {
        let socket = UdpSocket::bind(addr).await?;
        let local = socket.local_addr()?;
        let (tx, rx) = mpsc::channel(SEND_QUEUE_DEPTH);
        Ok(UdpNetwork {
            socket: Arc::new(socket),
            local,
            tx,
            queue_rx: Mutex::new(Some(rx)),
            on: AtomicBool::new(true),
            metrics,
        })
    }

    /// The bound local endpoint.
    pub fn local_endpoint(&self) -> SocketAddr {
        self.local
    }

    /// Queue a datagram. Drops (and counts an error) when the transport is
    /// stopped or the queue is full; callers never block.
    pub fn send(&self, bytes: Vec<u8>, destination: SocketAddr) {
        if !self.on() {
            return;
        }
        if self.tx.try_send((bytes, destination)).is_err() {
            self.metrics.error_total.inc();
            debug!(%destination, "send queue full; datagram dropped");
        }
    }

    /// Whether the transport is running.
    pub fn on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// Flip the transport off. In-flight completions short-circuit.
    pub fn stop(&self) {
        self.on.store(false, Ordering::SeqCst);
    }

    pub(crate) fn take_queue(&self) -> Option<mpsc::Receiver<SendItem>> {
        self.queue_rx.lock().ok()?.take()
    }

    pub(crate) fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

/// Drain the send queue, one outstanding socket write at a time.
pub(crate) async fn writer_loop(
    node: Arc<Node>,
    mut queue: mpsc::Receiver<SendItem>,
    mut shutdown: watch::Receiver<bool>,
) {
    let socket = node.network.socket();
    loop {
        let item = tokio::select! {
            item = queue.recv() => item,
            _ = shutdown.changed() => None,
        };
        let Some((bytes, destination)) = item else {
            return;
        };
        if !node.network.on() {
            return;
        }
        if let Err(e) = socket.send_to(&bytes, destination).await {
            node.metrics.error_total.inc();
            debug!(%destination, err = %e, "udp send failed");
        }
    }
}

/// Receive datagrams, decode and dispatch to the message processor.
pub(crate) async fn receive_loop(node: Arc<Node>, mut shutdown: watch::Receiver<bool>) {
    let socket = node.network.socket();
    let network_id = node.cfg.network_id();
    let mut buffer = [0u8; MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            received = socket.recv_from(&mut buffer) => received,
            _ = shutdown.changed() => return,
        };
        if !node.network.on() {
            return;
        }
        let (len, from) = match received {
            Ok(v) => v,
            Err(e) => {
                node.metrics.error_total.inc();
                warn!(err = %e, "udp receive failed");
                continue;
            }
        };
        match Message::deserialize(&buffer[..len], network_id) {
            Ok(message) => {
                node.metrics.count_received(message.kind());
                trace!(%from, kind = ?message.kind(), "datagram");
                node.process_message(message, from, node.cfg.enforce_work());
            }
            Err(WireError::BadMagic) | Err(WireError::BadNetwork) => {
                node.metrics.bad_sender_total.inc();
            }
            Err(WireError::UnknownKind) => {
                node.metrics.unknown_total.inc();
            }
            Err(WireError::MalformedMessage) => {
                node.metrics.error_total.inc();
            }
        }
    }
}
