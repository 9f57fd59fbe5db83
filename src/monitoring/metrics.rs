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

//! Prometheus metrics for the gossip overlay.

use crate::networking::wire::MessageKind;
use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A Prometheus operation failed.
    #[error("prometheus")]
    Prom,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let c = IntCounter::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(c.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(c)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    let g = IntGauge::new(name, help).map_err(|_| MetricsError::Prom)?;
    registry
        .register(Box::new(g.clone()))
        .map_err(|_| MetricsError::Prom)?;
    Ok(g)
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Received keepalive_req messages.
    pub keepalive_req_total: IntCounter,
    /// Received keepalive_ack messages.
    pub keepalive_ack_total: IntCounter,
    /// Received publish_req messages.
    pub publish_req_total: IntCounter,
    /// Received confirm_req messages.
    pub confirm_req_total: IntCounter,
    /// Received confirm_ack messages.
    pub confirm_ack_total: IntCounter,
    /// Received confirm_unk messages.
    pub confirm_unk_total: IntCounter,

    /// Datagrams with a foreign magic or network id.
    pub bad_sender_total: IntCounter,
    /// Datagrams of unknown kind, or stream kinds arriving over UDP.
    pub unknown_total: IntCounter,
    /// Malformed datagrams and socket/queue errors.
    pub error_total: IntCounter,
    /// Datagrams dropped for insufficient proof-of-work.
    pub insufficient_work_total: IntCounter,

    /// Known peers gauge.
    pub known_peers: IntGauge,
    /// Active elections gauge.
    pub active_elections: IntGauge,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        Ok(Self {
            keepalive_req_total: counter(
                &registry,
                "emberchain_keepalive_req_total",
                "Received keepalive_req messages",
            )?,
            keepalive_ack_total: counter(
                &registry,
                "emberchain_keepalive_ack_total",
                "Received keepalive_ack messages",
            )?,
            publish_req_total: counter(
                &registry,
                "emberchain_publish_req_total",
                "Received publish_req messages",
            )?,
            confirm_req_total: counter(
                &registry,
                "emberchain_confirm_req_total",
                "Received confirm_req messages",
            )?,
            confirm_ack_total: counter(
                &registry,
                "emberchain_confirm_ack_total",
                "Received confirm_ack messages",
            )?,
            confirm_unk_total: counter(
                &registry,
                "emberchain_confirm_unk_total",
                "Received confirm_unk messages",
            )?,
            bad_sender_total: counter(
                &registry,
                "emberchain_bad_sender_total",
                "Datagrams with a foreign magic or network id",
            )?,
            unknown_total: counter(
                &registry,
                "emberchain_unknown_total",
                "Unknown-kind datagrams",
            )?,
            error_total: counter(
                &registry,
                "emberchain_error_total",
                "Malformed datagrams and socket errors",
            )?,
            insufficient_work_total: counter(
                &registry,
                "emberchain_insufficient_work_total",
                "Datagrams dropped for insufficient proof-of-work",
            )?,
            known_peers: gauge(&registry, "emberchain_known_peers", "Known peers")?,
            active_elections: gauge(
                &registry,
                "emberchain_active_elections",
                "Active elections",
            )?,
            registry,
        })
    }

    /// Bump the receive counter for a gossip message kind. Stream kinds
    /// are counted by the processor when they arrive over UDP.
    pub fn count_received(&self, kind: MessageKind) {
        match kind {
            MessageKind::KeepaliveReq => self.keepalive_req_total.inc(),
            MessageKind::KeepaliveAck => self.keepalive_ack_total.inc(),
            MessageKind::PublishReq => self.publish_req_total.inc(),
            MessageKind::ConfirmReq => self.confirm_req_total.inc(),
            MessageKind::ConfirmAck => self.confirm_ack_total.inc(),
            MessageKind::ConfirmUnk => self.confirm_unk_total.inc(),
            MessageKind::BulkReq | MessageKind::FrontierReq => {}
        }
    }
}
