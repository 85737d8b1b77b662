// EgpSim: inter-domain routing fabric simulator written in Rust
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Bidirectional half-duplex link between two router interfaces
//! (`spec.md` §2, §3, §4.2).

use std::collections::HashMap;

use crate::packet::{Packet, PacketKind};
use crate::types::{IfaceName, LinkId, RouterId};

/// Parsed `revenues` link property (`spec.md` §4.2,
/// `LinkUtils.getRevenues`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revenues {
    /// Revenue credited to the forward direction (end 0 -> end 1).
    pub forward: i64,
    /// Revenue credited to the backward direction (end 1 -> end 0).
    pub backward: i64,
    /// True if the link has an asymmetric "advanced-peer" revenue split.
    pub advanced_peer: bool,
}

/// Parse the `revenues` link property per `spec.md` §4.2: absent -> `(0, 0,
/// false)`; a plain value `v` -> `(v, v, false)`; `"a;b"` -> `(a, b, true)`.
pub fn get_revenues(props: &HashMap<String, String>) -> Revenues {
    match props.get("revenues") {
        None => Revenues { forward: 0, backward: 0, advanced_peer: false },
        Some(v) if v.contains(';') => {
            let mut parts = v.splitn(2, ';');
            let fwd = parts.next().unwrap_or("0").trim().parse().unwrap_or(0);
            let back = parts.next().unwrap_or("0").trim().parse().unwrap_or(0);
            Revenues { forward: fwd, backward: back, advanced_peer: true }
        }
        Some(v) => {
            let val = v.trim().parse().unwrap_or(0);
            Revenues { forward: val, backward: val, advanced_peer: false }
        }
    }
}

/// A bidirectional half-duplex link between two router interfaces.
#[derive(Debug, Clone)]
pub struct Link {
    id: LinkId,
    routers: [RouterId; 2],
    ifaces: [IfaceName; 2],
    properties: HashMap<String, String>,
    up: bool,
    inbound: [Vec<Packet>; 2],
    outbound: [Vec<Packet>; 2],
    sent: [u64; 2],
    received: [u64; 2],
}

impl Link {
    /// Build a new link between `(r0, i0)` and `(r1, i1)`.
    pub fn new(
        id: LinkId,
        r0: RouterId,
        i0: IfaceName,
        r1: RouterId,
        i1: IfaceName,
        properties: HashMap<String, String>,
        up: bool,
    ) -> Self {
        Link {
            id,
            routers: [r0, r1],
            ifaces: [i0, i1],
            properties,
            up,
            inbound: [Vec::new(), Vec::new()],
            outbound: [Vec::new(), Vec::new()],
            sent: [0, 0],
            received: [0, 0],
        }
    }

    /// The link's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The router at end `end` (0 or 1).
    pub fn router(&self, end: usize) -> &str {
        &self.routers[end]
    }

    /// The interface name at end `end` (0 or 1).
    pub fn iface(&self, end: usize) -> &str {
        &self.ifaces[end]
    }

    /// True if the link is currently up.
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Toggle liveness.
    pub fn set_state(&mut self, up: bool) {
        self.up = up;
    }

    /// Merge `delta` into the link's properties, overwriting existing keys.
    pub fn update_properties(&mut self, delta: HashMap<String, String>) {
        self.properties.extend(delta);
    }

    /// Current property map.
    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Parsed revenue economics for this link.
    pub fn revenues(&self) -> Revenues {
        get_revenues(&self.properties)
    }

    /// Which end (0 or 1) `router_id` sits at, if any.
    pub fn end_of(&self, router_id: &str) -> Option<usize> {
        if self.routers[0] == router_id {
            Some(0)
        } else if self.routers[1] == router_id {
            Some(1)
        } else {
            None
        }
    }

    /// Append `pkt` to `router_id`'s outbound queue, incrementing that
    /// end's sent counter (`spec.md` §4.2).
    pub fn enqueue(&mut self, router_id: &str, pkt: Packet) {
        if let Some(end) = self.end_of(router_id) {
            self.outbound[end].push(pkt);
            self.sent[end] += 1;
        }
    }

    /// Pop the oldest packet from `router_id`'s inbound queue, incrementing
    /// that end's received counter.
    pub fn dequeue(&mut self, router_id: &str) -> Option<Packet> {
        let end = self.end_of(router_id)?;
        if self.inbound[end].is_empty() {
            None
        } else {
            self.received[end] += 1;
            Some(self.inbound[end].remove(0))
        }
    }

    /// Move every queued outbound packet to the opposite end's inbound
    /// queue, in FIFO order, only if the link is currently up. Data packets
    /// gain a `"<srcRouter>-><dstRouter>"` trace entry before the move
    /// (`spec.md` §4.2).
    pub fn move_packets(&mut self) {
        if !self.up {
            return;
        }
        for (from, to) in [(0usize, 1usize), (1, 0)] {
            let mut moved: Vec<Packet> = self.outbound[from].drain(..).collect();
            for pkt in moved.iter_mut() {
                if pkt.kind() == PacketKind::Data {
                    pkt.payload_mut()
                        .add_entry(format!("{}->{}", self.routers[from], self.routers[to]));
                }
            }
            self.inbound[to].extend(moved);
        }
    }

    /// Queue length for `end` (0/1), `inbound` selects which queue.
    pub fn queue_length(&self, end: usize, inbound: bool) -> usize {
        if inbound {
            self.inbound[end].len()
        } else {
            self.outbound[end].len()
        }
    }

    /// Total packets sent from end `end`.
    pub fn sent(&self, end: usize) -> u64 {
        self.sent[end]
    }

    /// Total packets received at end `end`.
    pub fn received(&self, end: usize) -> u64 {
        self.received[end]
    }

    /// Human-readable `(r0.i0 <--> r1.i1)` description used by `dumpstats`.
    pub fn description(&self) -> String {
        format!(
            "({}.{} <--> {}.{})",
            self.routers[0], self.ifaces[0], self.routers[1], self.ifaces[1]
        )
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
