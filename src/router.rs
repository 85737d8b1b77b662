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

//! Per-node orchestrator: drains link queues, dispatches packets to the
//! routing daemon or the data plane, and forwards with TTL/ICMP handling
//! (`spec.md` §4.3).

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::daemon::{InterfaceState, RoutingDaemon};
use crate::error::DaemonError;
use crate::forwarding_table::ForwardingTable;
use crate::link::Link;
use crate::packet::{Packet, PacketKind, BROADCAST_DST};
use crate::types::{parse_ip, IfaceName, LinkId, RouterId, LOOPBACK};

/// A simulated router: owns a forwarding table, an interface-to-link map,
/// traffic counters, and exactly one routing daemon.
#[derive(Debug)]
pub struct Router {
    id: RouterId,
    ip: String,
    fib: ForwardingTable,
    interfaces: HashMap<IfaceName, LinkId>,
    daemon: RoutingDaemon,
    update_interval: u64,
    no_icmp_ifaces: HashSet<IfaceName>,
    updates_buffer: Vec<(IfaceName, Packet)>,
    sent: u64,
    received: u64,
    forwarded: u64,
    dropped: u64,
    control_sent: u64,
}

impl Router {
    /// Construct a new router. `update_interval` defaults to 1 if the
    /// configuration omits it.
    pub fn new(
        id: impl Into<String>,
        ip: impl Into<String>,
        daemon: RoutingDaemon,
        interfaces: HashMap<IfaceName, LinkId>,
        update_interval: u64,
    ) -> Self {
        Router {
            id: id.into(),
            ip: ip.into(),
            fib: ForwardingTable::new(),
            interfaces,
            daemon,
            update_interval: update_interval.max(1),
            no_icmp_ifaces: HashSet::new(),
            updates_buffer: Vec::new(),
            sent: 0,
            received: 0,
            forwarded: 0,
            dropped: 0,
            control_sent: 0,
        }
    }

    /// Stable router id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Primary IP address.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// Shared reference to the forwarding table.
    pub fn fib(&self) -> &ForwardingTable {
        &self.fib
    }

    /// Mutable reference to the forwarding table, e.g. for tests that
    /// install entries without running a routing daemon.
    pub fn fib_mut(&mut self) -> &mut ForwardingTable {
        &mut self.fib
    }

    /// The routing daemon this router runs.
    pub fn daemon(&self) -> &RoutingDaemon {
        &self.daemon
    }

    /// The routing daemon, mutably.
    pub fn daemon_mut(&mut self) -> &mut RoutingDaemon {
        &mut self.daemon
    }

    /// Split mutable borrow of the forwarding table and the routing daemon,
    /// for event handlers (e.g. `advert`/`addprivatepath`) that must update
    /// both at once.
    pub fn fib_and_daemon_mut(&mut self) -> (&mut ForwardingTable, &mut RoutingDaemon) {
        (&mut self.fib, &mut self.daemon)
    }

    /// Interface name -> backing link id.
    pub fn interfaces(&self) -> &HashMap<IfaceName, LinkId> {
        &self.interfaces
    }

    /// Interface name -> backing link id, mutably (populated by the
    /// configuration loader as links are attached).
    pub fn interfaces_mut(&mut self) -> &mut HashMap<IfaceName, LinkId> {
        &mut self.interfaces
    }

    /// Traffic counters `(sent, received, forwarded, dropped, control_sent)`.
    pub fn counters(&self) -> (u64, u64, u64, u64, u64) {
        (self.sent, self.received, self.forwarded, self.dropped, self.control_sent)
    }

    /// Mark `iface` as suppressing ICMP generation for expired packets
    /// received on it.
    pub fn suppress_icmp_on(&mut self, iface: impl Into<String>) {
        self.no_icmp_ifaces.insert(iface.into());
    }

    fn interface_states(&self, links: &HashMap<LinkId, Link>) -> Vec<InterfaceState> {
        let mut ifaces: Vec<_> = self.interfaces.keys().cloned().collect();
        ifaces.sort();
        ifaces
            .into_iter()
            .map(|iface| {
                let up = self
                    .interfaces
                    .get(&iface)
                    .and_then(|lid| links.get(lid))
                    .map(|l| l.is_up())
                    .unwrap_or(false);
                InterfaceState { iface, up }
            })
            .collect()
    }

    /// Run one tick: `update`, drain inbound, generate+send control
    /// packets (`spec.md` §4.3 "go()"). Returns the combined data-plane
    /// and routing-plane log lines produced by the daemon this tick.
    pub fn go(&mut self, now: u64, links: &mut HashMap<LinkId, Link>) -> Result<Vec<String>, DaemonError> {
        let states = self.interface_states(links);
        self.daemon.update(&mut self.fib, &states, now)?;

        let mut ifaces: Vec<_> = self.interfaces.keys().cloned().collect();
        ifaces.sort();

        // Drain every inbound queue into owned buffers first: data packets
        // must wait to be forwarded until the routing buffer below has been
        // applied, and `link` must not stay borrowed while we later reborrow
        // `links` to forward (`spec.md` §5 phase order).
        let mut to_forward: Vec<(IfaceName, Packet)> = Vec::new();
        for iface in &ifaces {
            let link_id = self.interfaces[iface].clone();
            let Some(link) = links.get_mut(&link_id) else { continue };
            let drained: Vec<Packet> = std::iter::from_fn(|| link.dequeue(&self.id)).collect();
            for pkt in drained {
                if pkt.destination() == BROADCAST_DST {
                    self.updates_buffer.push((iface.clone(), pkt));
                } else {
                    to_forward.push((iface.clone(), pkt));
                }
            }
        }

        if now % self.update_interval == 0 && !self.updates_buffer.is_empty() {
            let buffered = std::mem::take(&mut self.updates_buffer);
            for (iface, pkt) in buffered {
                self.daemon.process_routing_packet(&mut self.fib, &iface, pkt.payload())?;
            }
        }

        for (iface, pkt) in to_forward {
            self.send(pkt, None, Some(iface.as_str()), links);
        }

        for iface in &ifaces {
            if let Some(pkt) = self.daemon.generate_routing_packet(iface) {
                self.control_sent += 1;
                self.send(pkt, Some(iface.as_str()), None, links);
            }
        }

        Ok(self.daemon.get_outlog())
    }

    /// Deterministic ECMP tie-break: SHA-256 of
    /// `(routerId, srcPort, dstPort, src, dst)`, taken mod the candidate
    /// count (`spec.md` §4.3).
    fn ecmp_index(&self, pkt: &Packet, n: usize) -> usize {
        let key = format!(
            "{}{}{}{}{}",
            self.id,
            pkt.source_port(),
            pkt.destination_port(),
            pkt.source(),
            pkt.destination()
        );
        let digest = Sha256::digest(key.as_bytes());
        let mut rem: u64 = 0;
        for byte in digest.iter() {
            rem = (rem * 256 + *byte as u64) % n as u64;
        }
        rem as usize
    }

    /// Forward, consume, or drop `pkt` (`spec.md` §4.3 "send()").
    pub fn send(&mut self, mut pkt: Packet, out_iface: Option<&str>, in_iface: Option<&str>, links: &mut HashMap<LinkId, Link>) {
        let chosen = match out_iface {
            Some(i) => i.to_string(),
            None => {
                let Some(ip) = parse_ip(pkt.destination()) else {
                    self.dropped += 1;
                    return;
                };
                let candidates = self.fib.get_next_hops(ip);
                if candidates.is_empty() {
                    self.dropped += 1;
                    return;
                }
                if candidates.len() == 1 {
                    candidates[0].clone()
                } else {
                    let idx = self.ecmp_index(&pkt, candidates.len());
                    candidates[idx].clone()
                }
            }
        };

        if chosen == LOOPBACK {
            self.received += 1;
            return;
        }

        let Some(link_id) = self.interfaces.get(&chosen).cloned() else {
            self.dropped += 1;
            return;
        };
        let is_up = links.get(&link_id).map(|l| l.is_up()).unwrap_or(false);
        if !is_up {
            self.dropped += 1;
            return;
        }

        if pkt.ttl() < 1 {
            self.dropped += 1;
            let suppressed = match in_iface {
                Some(i) => self.no_icmp_ifaces.contains(i),
                None => true,
            };
            if !suppressed {
                let mut icmp = Packet::new_icmp(self.id.clone(), pkt.source());
                icmp.set_destination_port(pkt.source_port());
                icmp.set_sequence_number(pkt.sequence_number());
                self.send(icmp, None, None, links);
            }
            return;
        }

        pkt.decrement_ttl();
        match pkt.kind() {
            PacketKind::Data => {
                if pkt.payload().is_empty() {
                    self.sent += 1;
                } else {
                    self.forwarded += 1;
                }
            }
            PacketKind::Icmp | PacketKind::Routing => {}
        }
        if let Some(link) = links.get_mut(&link_id) {
            link.enqueue(&self.id, pkt);
        }
    }
}
