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

//! Node facade: owns every subsystem and the process-wide configuration.
//!
//! Teardown stops I/O first, then the scheduler; subsystem back-references
//! are weak and tolerate the node disappearing between an enqueue and the
//! scheduled op firing.

use crate::bootstrap;
use crate::core::consensus::Conflicts;
use crate::core::gap_cache::GapCache;
use crate::core::ledger::{Genesis, Ledger};
use crate::core::scheduler::Scheduler;
use crate::core::security::wallet::Wallet;
use crate::core::types::{Address, Block, H256};
use crate::core::work::{WorkPolicy, LIVE_TARGET, TEST_TARGET};
use crate::monitoring::metrics::Metrics;
use crate::networking::peers::PeerTable;
use crate::networking::udp::{self, UdpNetwork};
use crate::networking::wire::{normalize_endpoint, NetworkId};
use serde::Deserialize;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// An I/O operation failed.
    #[error("io")]
    Io,
    /// Configuration loading or parsing failed.
    #[error("config")]
    Config,
    /// Metrics setup failed.
    #[error("metrics")]
    Metrics,
    /// Wallet setup failed.
    #[error("wallet")]
    Wallet,
}

fn default_name() -> String {
    "emberchain".to_string()
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7075
}
fn default_network() -> String {
    "live".to_string()
}
fn default_gossip_period_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

/// Node settings.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Data directory (wallet keys).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
        }
    }
}

/// Overlay settings.
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    /// Bind address for UDP and the bootstrap TCP listener.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Bind port; 0 picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overlay id: "live" or "test".
    #[serde(default = "default_network")]
    pub network: String,
    /// Peers ("ip:port") contacted at startup.
    #[serde(default)]
    pub bootstrap: Vec<String>,
    /// Gossip period in milliseconds.
    #[serde(default = "default_gossip_period_ms")]
    pub gossip_period_ms: u64,
    /// Admit loopback peers (test clusters on one host).
    #[serde(default)]
    pub allow_local_peers: bool,
    /// Validate proof-of-work on inbound messages.
    #[serde(default = "default_true")]
    pub enforce_work: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            network: default_network(),
            bootstrap: Vec::new(),
            gossip_period_ms: default_gossip_period_ms(),
            allow_local_peers: false,
            enforce_work: true,
        }
    }
}

/// Consensus settings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ConsensusConfig {
    /// Representative identity (hex public key) this node votes as.
    #[serde(default)]
    pub representative: String,
    /// Override the proof-of-work difficulty target.
    #[serde(default)]
    pub work_target: Option<u64>,
}

/// Node configuration root (TOML).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodeConfig {
    /// Node settings.
    #[serde(default)]
    pub node: NodeSettings,
    /// Overlay settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Consensus settings.
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

impl NodeConfig {
    /// Parse from a TOML document.
    pub fn from_toml(raw: &str) -> Result<NodeConfig, NodeError> {
        toml::from_str(raw).map_err(|_| NodeError::Config)
    }

    /// Overlay id byte.
    pub fn network_id(&self) -> NetworkId {
        if self.network.network == "test" {
            NetworkId::Test
        } else {
            NetworkId::Live
        }
    }

    /// Gossip period.
    pub fn gossip_period(&self) -> Duration {
        Duration::from_millis(self.network.gossip_period_ms)
    }

    /// Whether inbound messages must carry valid proof-of-work.
    pub fn enforce_work(&self) -> bool {
        self.network.enforce_work
    }

    /// Difficulty policy: explicit target, else per overlay.
    pub fn work_policy(&self) -> WorkPolicy {
        let target = self.consensus.work_target.unwrap_or(match self.network_id() {
            NetworkId::Test => TEST_TARGET,
            NetworkId::Live => LIVE_TARGET,
        });
        WorkPolicy::new(target)
    }

    /// Configured representative, if any.
    pub fn representative(&self) -> Option<Address> {
        if self.consensus.representative.is_empty() {
            None
        } else {
            Address::from_hex(&self.consensus.representative)
        }
    }
}

/// The node: owns all subsystems.
pub struct Node {
    /// Process-wide configuration.
    pub cfg: NodeConfig,
    /// Metrics registry.
    pub metrics: Arc<Metrics>,
    /// Account-chain ledger.
    pub ledger: Mutex<Ledger>,
    /// Key store for signing blocks and votes.
    pub wallet: Wallet,
    /// Proof-of-work policy.
    pub work: WorkPolicy,
    /// Known peers.
    pub peers: PeerTable,
    /// Orphans awaiting predecessors.
    pub gap_cache: Mutex<GapCache>,
    /// Active elections.
    pub conflicts: Conflicts,
    /// Timed-operation engine.
    pub scheduler: Arc<Scheduler>,
    /// UDP transport.
    pub network: UdpNetwork,

    pub(crate) recent_publishes: Mutex<VecDeque<H256>>,
    pub(crate) confirm_observers: Mutex<Vec<Box<dyn Fn(&Block) + Send + Sync>>>,
    bootstrap_in_progress: AtomicBool,
    vote_sequence: AtomicU64,
    tcp: Mutex<Option<TcpListener>>,
    shutdown: watch::Sender<bool>,
    scheduler_worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Node {
    /// Bind sockets and assemble the subsystems. Call [`Node::start`] to
    /// arm the I/O loops.
    pub async fn new(cfg: NodeConfig, genesis: Genesis) -> Result<Arc<Node>, NodeError> {
        let metrics = Arc::new(Metrics::new().map_err(|_| NodeError::Metrics)?);

        let bind_ip: IpAddr = cfg
            .network
            .listen_addr
            .parse()
            .map_err(|_| NodeError::Config)?;
        let network = UdpNetwork::bind(SocketAddr::new(bind_ip, cfg.network.port), Arc::clone(&metrics))
            .await
            .map_err(|_| NodeError::Io)?;
        let local = network.local_endpoint();
        // The bootstrap listener shares the UDP port.
        let tcp = TcpListener::bind(local).await.map_err(|_| NodeError::Io)?;

        let representative = cfg.representative().unwrap_or(Address::BURN);
        let wallet = Wallet::open(Path::new(&cfg.node.data_dir), representative)
            .map_err(|_| NodeError::Wallet)?;

        let peers = PeerTable::new(
            normalize_endpoint(local),
            cfg.gossip_period(),
            cfg.network.allow_local_peers,
        );
        let work = cfg.work_policy();
        let (shutdown, _) = watch::channel(false);

        Ok(Arc::new(Node {
            ledger: Mutex::new(Ledger::new(&genesis)),
            wallet,
            work,
            peers,
            gap_cache: Mutex::new(GapCache::default()),
            conflicts: Conflicts::new(Arc::clone(&metrics)),
            scheduler: Arc::new(Scheduler::new()),
            network,
            metrics,
            recent_publishes: Mutex::new(VecDeque::new()),
            confirm_observers: Mutex::new(Vec::new()),
            bootstrap_in_progress: AtomicBool::new(false),
            vote_sequence: AtomicU64::new(0),
            tcp: Mutex::new(Some(tcp)),
            shutdown,
            scheduler_worker: Mutex::new(None),
            cfg,
        }))
    }

    /// The bound UDP endpoint (the TCP bootstrap listener shares it).
    pub fn endpoint(&self) -> SocketAddr {
        self.network.local_endpoint()
    }

    /// Arm the receive loop, send queue, bootstrap acceptor, scheduler
    /// worker and the ongoing keepalive cycle.
    pub fn start(self: &Arc<Self>) {
        info!(name = %self.cfg.node.name, endpoint = %self.endpoint(), "node starting");

        let scheduler = Arc::clone(&self.scheduler);
        if let Ok(mut worker) = self.scheduler_worker.lock() {
            *worker = Some(std::thread::spawn(move || scheduler.run()));
        }

        if let Some(queue) = self.network.take_queue() {
            tokio::spawn(udp::writer_loop(
                Arc::clone(self),
                queue,
                self.shutdown.subscribe(),
            ));
        }
        tokio::spawn(udp::receive_loop(Arc::clone(self), self.shutdown.subscribe()));

        let listener = self.tcp.lock().ok().and_then(|mut l| l.take());
        if let Some(listener) = listener {
            tokio::spawn(bootstrap::responder::accept_loop(
                Arc::clone(self),
                listener,
                self.shutdown.subscribe(),
            ));
        }

        for entry in &self.cfg.network.bootstrap {
            match entry.parse::<SocketAddr>() {
                Ok(endpoint) => {
                    if self.peers.contacting_peer(&endpoint) {
                        self.send_keepalive(endpoint);
                    }
                }
                Err(_) => warn!(peer = %entry, "bad bootstrap endpoint; skipping"),
            }
        }

        self.ongoing_keepalive();
    }

    /// Tear down: stop I/O first, then the scheduler; join the worker.
    pub fn stop(&self) {
        debug!("node stopping");
        self.network.stop();
        let _ = self.shutdown.send(true);
        self.scheduler.stop();
        if let Ok(mut worker) = self.scheduler_worker.lock() {
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }
    }

    /// Monotonic sequence for votes signed by this node.
    pub fn next_vote_sequence(&self) -> u64 {
        self.vote_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register an observer invoked for every confirmed block.
    pub fn on_confirmed(&self, observer: impl Fn(&Block) + Send + Sync + 'static) {
        if let Ok(mut observers) = self.confirm_observers.lock() {
            observers.push(Box::new(observer));
        }
    }

    /// Launch a bootstrap session against `peer` (TCP on the gossip port)
    /// unless one is already in progress.
    pub fn start_bootstrap(self: &Arc<Self>, peer: SocketAddr) {
        if self.bootstrap_in_progress.swap(true, Ordering::SeqCst) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime (synchronous harness); retry on the next gap.
            self.bootstrap_in_progress.store(false, Ordering::SeqCst);
            return;
        };
        let node = Arc::clone(self);
        handle.spawn(async move {
            if let Err(e) = bootstrap::initiator::run(Arc::clone(&node), peer).await {
                debug!(%peer, err = %e, "bootstrap failed");
            }
            node.bootstrap_in_progress.store(false, Ordering::SeqCst);
        });
    }

    /// Whether a bootstrap session is running.
    pub fn bootstrapping(&self) -> bool {
        self.bootstrap_in_progress.load(Ordering::SeqCst)
    }
}
