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

//! Known-peer table with contact timestamps.
//!
//! Entries are keyed by endpoint; liveness purging orders by last_contact
//! and send throttling by last_attempt. Self and reserved addresses are
//! rejected at ingress. The table never persists.

use crate::networking::wire::{zero_endpoint, PEERS_PER_KEEPALIVE};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Peer lists larger than this announce to a √n random subset instead of
/// the whole table.
const ANNOUNCE_FANOUT_FLOOR: usize = 16;

/// Contact bookkeeping for one peer.
#[derive(Clone, Copy, Debug)]
pub struct PeerInfo {
    /// The peer's UDP endpoint.
    pub endpoint: SocketAddr,
    /// Last time a valid message arrived from this peer.
    pub last_contact: Instant,
    /// Last time we initiated contact.
    pub last_attempt: Instant,
}

/// Whether an address may never appear in the peer table.
///
/// Loopback is only reserved on the live overlay; test overlays run whole
/// clusters on one host.
pub fn reserved_address(endpoint: &SocketAddr, allow_local: bool) -> bool {
    match endpoint.ip() {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_multicast()
                || (v4.is_loopback() && !allow_local)
                // RFC 5737 documentation ranges.
                || (o[0] == 192 && o[1] == 0 && o[2] == 2)
                || (o[0] == 198 && o[1] == 51 && o[2] == 100)
                || (o[0] == 203 && o[1] == 0 && o[2] == 113)
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments();
            v6.is_unspecified()
                || v6.is_multicast()
                || (v6.is_loopback() && !allow_local)
                // RFC 3849 documentation prefix 2001:db8::/32.
                || (seg[0] == 0x2001 && seg[1] == 0x0db8)
        }
    }
}

/// Table of known peers.
pub struct PeerTable {
    self_endpoint: SocketAddr,
    period: Duration,
    cutoff: Duration,
    allow_local: bool,
    inner: Mutex<BTreeMap<SocketAddr, PeerInfo>>,
}

impl PeerTable {
    /// Create a table for a node listening on `self_endpoint`. `period` is
    /// the gossip period; entries go stale after five periods.
    pub fn new(self_endpoint: SocketAddr, period: Duration, allow_local: bool) -> Self {
        Self {
            self_endpoint,
            period,
            cutoff: period * 5,
            allow_local,
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Liveness cutoff (five gossip periods).
    pub fn cutoff(&self) -> Duration {
        self.cutoff
    }

    fn acceptable(&self, endpoint: &SocketAddr) -> bool {
        *endpoint != self.self_endpoint && !reserved_address(endpoint, self.allow_local)
    }

    /// Present and contacted within the liveness cutoff.
    pub fn known_peer(&self, endpoint: &SocketAddr) -> bool {
        let Ok(inner) = self.inner.lock() else {
            return false;
        };
        inner
            .get(endpoint)
            .map(|p| p.last_contact.elapsed() < self.cutoff)
            .unwrap_or(false)
    }

    /// Record a valid inbound message from `endpoint`, creating the entry
    /// on first contact. Returns false for self or reserved addresses.
    pub fn incoming_from_peer(&self, endpoint: &SocketAddr) -> bool {
        if !self.acceptable(endpoint) {
            return false;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let now = Instant::now();
        inner
            .entry(*endpoint)
            .and_modify(|p| p.last_contact = now)
            .or_insert(PeerInfo {
                endpoint: *endpoint,
                last_contact: now,
                last_attempt: now,
            });
        true
    }

    /// Whether sending to `endpoint` is permissible now. At most one
    /// attempt per gossip period per endpoint; the entry is created on a
    /// first directed contact.
    pub fn contacting_peer(&self, endpoint: &SocketAddr) -> bool {
        if !self.acceptable(endpoint) {
            return false;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let now = Instant::now();
        match inner.get_mut(endpoint) {
            Some(p) => {
                if now.duration_since(p.last_attempt) < self.period {
                    return false;
                }
                p.last_attempt = now;
                true
            }
            None => {
                inner.insert(
                    *endpoint,
                    PeerInfo {
                        endpoint: *endpoint,
                        last_contact: now,
                        last_attempt: now,
                    },
                );
                true
            }
        }
    }

    /// Fill the keepalive array by sampling without replacement, padding
    /// with the zero endpoint when fewer peers are known.
    pub fn random_fill(&self, out: &mut [SocketAddr; PEERS_PER_KEEPALIVE]) {
        let sample = self.sample(PEERS_PER_KEEPALIVE);
        for (slot, value) in out.iter_mut().zip(
            sample
                .into_iter()
                .chain(std::iter::repeat(zero_endpoint())),
        ) {
            *slot = value;
        }
    }

    /// Up to `count` distinct endpoints, uniformly chosen.
    pub fn sample(&self, count: usize) -> Vec<SocketAddr> {
        let mut endpoints: Vec<SocketAddr> = match self.inner.lock() {
            Ok(inner) => inner.keys().copied().collect(),
            Err(_) => return Vec::new(),
        };
        let rng = SystemRandom::new();
        let take = count.min(endpoints.len());
        // Partial Fisher-Yates: the first `take` slots end up uniform.
        for i in 0..take {
            let j = i + random_below(&rng, endpoints.len() - i);
            endpoints.swap(i, j);
        }
        endpoints.truncate(take);
        endpoints
    }

    /// Election announcement targets: everyone while the table is small,
    /// a √n random subset once it grows.
    pub fn announcement_targets(&self) -> Vec<SocketAddr> {
        let size = self.size();
        if size <= ANNOUNCE_FANOUT_FLOOR {
            return self.list();
        }
        let fanout = (size as f64).sqrt().ceil() as usize;
        self.sample(fanout)
    }

    /// Every known endpoint.
    pub fn list(&self) -> Vec<SocketAddr> {
        self.inner
            .lock()
            .map(|inner| inner.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Remove entries whose last_contact predates `before`; returns them.
    pub fn purge(&self, before: Instant) -> Vec<PeerInfo> {
        let Ok(mut inner) = self.inner.lock() else {
            return Vec::new();
        };
        let stale: Vec<SocketAddr> = inner
            .values()
            .filter(|p| p.last_contact < before)
            .map(|p| p.endpoint)
            .collect();
        stale
            .into_iter()
            .filter_map(|endpoint| inner.remove(&endpoint))
            .collect()
    }

    /// Number of known peers.
    pub fn size(&self) -> usize {
        self.inner.lock().map(|inner| inner.len()).unwrap_or(0)
    }

    /// True when no peers are known.
    pub fn empty(&self) -> bool {
        self.size() == 0
    }
}

fn random_below(rng: &SystemRandom, bound: usize) -> usize {
    if bound <= 1 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    if rng.fill(&mut bytes).is_err() {
        return 0;
    }
    (u64::from_be_bytes(bytes) % bound as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn endpoint(tag: u8) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, tag)), 7000 + tag as u16)
    }

    fn table() -> PeerTable {
        PeerTable::new(endpoint(99), Duration::from_millis(50), false)
    }

    #[test]
    fn self_and_reserved_rejected() {
        let peers = table();
        assert!(!peers.incoming_from_peer(&endpoint(99)));
        assert!(!peers.incoming_from_peer(&SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)),
            7000
        )));
        assert!(!peers.incoming_from_peer(&SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            7000
        )));
        assert!(peers.empty());
    }

    #[test]
    fn loopback_allowed_on_test_overlay() {
        let peers = PeerTable::new(endpoint(99), Duration::from_millis(50), true);
        assert!(peers.incoming_from_peer(&SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            7000
        )));
    }

    #[test]
    fn contact_rate_limited_per_period() {
        let peers = table();
        assert!(peers.contacting_peer(&endpoint(1)));
        assert!(!peers.contacting_peer(&endpoint(1)));
        std::thread::sleep(Duration::from_millis(60));
        assert!(peers.contacting_peer(&endpoint(1)));
    }

    #[test]
    fn random_fill_pads_with_zero() {
        let peers = table();
        peers.incoming_from_peer(&endpoint(1));
        peers.incoming_from_peer(&endpoint(2));

        let mut out = [zero_endpoint(); PEERS_PER_KEEPALIVE];
        peers.random_fill(&mut out);
        let real: Vec<_> = out.iter().filter(|e| **e != zero_endpoint()).collect();
        assert_eq!(real.len(), 2);
        assert_ne!(real[0], real[1]);
    }

    #[test]
    fn purge_removes_stale() {
        let peers = table();
        peers.incoming_from_peer(&endpoint(1));
        std::thread::sleep(Duration::from_millis(20));
        peers.incoming_from_peer(&endpoint(2));

        let removed = peers.purge(Instant::now() - Duration::from_millis(10));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].endpoint, endpoint(1));
        assert!(peers.known_peer(&endpoint(2)));
        assert!(!peers.known_peer(&endpoint(1)));
    }
}
