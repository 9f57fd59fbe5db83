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

//! Emberchain - peer-to-peer cryptocurrency node core.
//!
//! This repository provides:
//! - An account-chain ledger of signed blocks with fork detection
//! - A UDP gossip overlay (keepalive, publish and confirmation messages)
//! - Conflict resolution by delegated representative voting
//! - Ledger bootstrap over TCP streams (frontier walk + bulk pull)
//! - A timed-operation scheduler driving gossip and election rounds
//! - Monitoring via Prometheus metrics and structured logging

/// Ledger bootstrap over TCP streams (initiator and responder).
pub mod bootstrap;
/// Core protocol primitives (types, ledger, consensus, scheduler, security).
pub mod core;
/// Observability (metrics registry).
pub mod monitoring;
/// P2P networking stack (wire codec, UDP transport, peer table, processor).
pub mod networking;
/// Node facade owning all subsystems.
pub mod node;
