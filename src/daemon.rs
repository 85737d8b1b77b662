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

//! Shared routing-daemon abstraction (`spec.md` §4.4, §4.5, §9).
//!
//! `EGP` and `EXT` share a capability set (`setParameters`, `bindToRouter`,
//! `update`, `processRoutingPacket`, `generateRoutingPacket`,
//! `getCurrentRoutes`, `getOutlog`, `finalizeIteration`). Rather than an
//! inheritance hierarchy we represent the contract as a sum type over the
//! two concrete variants, plus a third no-op variant for routers whose
//! `routingProtocol` is `IGP` (`SPEC_FULL.md` §4.8 / §10.1: the reference
//! configuration loader never attaches a daemon to an `IGP` router at all).

use std::collections::BTreeMap;

use ipnet::Ipv4Net;

use crate::error::DaemonError;
use crate::ext::ExtDaemon;
use crate::forwarding_table::ForwardingTable;
use crate::packet::Packet;
use crate::types::AsPath;

/// Observed liveness of one router interface, passed to
/// [`RoutingDaemon::update`] once per `go()` cycle.
#[derive(Debug, Clone)]
pub struct InterfaceState {
    /// Interface name.
    pub iface: String,
    /// Current liveness of the link bound to this interface.
    pub up: bool,
}

/// Sum type over the routing-daemon variants a router may run.
#[derive(Debug)]
pub enum RoutingDaemon {
    /// Policy-based path-vector protocol (`spec.md` §4.4).
    Egp(crate::egp::EgpDaemon),
    /// Neighbouring-AS stub (`spec.md` §4.5).
    Ext(ExtDaemon),
    /// No-op placeholder for `IGP`-tagged routers, which never run a
    /// daemon of their own.
    Igp,
}

impl RoutingDaemon {
    /// React to the current per-interface liveness (`spec.md` §4.4/§4.5
    /// "link-state reaction").
    pub fn update(
        &mut self,
        fib: &mut ForwardingTable,
        states: &[InterfaceState],
        now: u64,
    ) -> Result<(), DaemonError> {
        match self {
            RoutingDaemon::Egp(d) => d.update(fib, states, now),
            RoutingDaemon::Ext(d) => d.update(fib, states, now),
            RoutingDaemon::Igp => Ok(()),
        }
    }

    /// Handle a received control-plane packet payload on `iface`.
    pub fn process_routing_packet(
        &mut self,
        fib: &mut ForwardingTable,
        iface: &str,
        payload: &crate::packet::Payload,
    ) -> Result<(), DaemonError> {
        match self {
            RoutingDaemon::Egp(d) => d.process_routing_packet(fib, iface, payload),
            RoutingDaemon::Ext(d) => d.process_routing_packet(fib, iface, payload),
            RoutingDaemon::Igp => Ok(()),
        }
    }

    /// Produce the control-plane packet to emit on `iface` this tick, if
    /// any.
    pub fn generate_routing_packet(&mut self, iface: &str) -> Option<Packet> {
        match self {
            RoutingDaemon::Egp(d) => d.generate_routing_packet(iface),
            RoutingDaemon::Ext(d) => d.generate_routing_packet(iface),
            RoutingDaemon::Igp => None,
        }
    }

    /// Snapshot of the routes currently in effect, keyed by destination
    /// prefix. Used by the checker (`spec.md` §4.7 step 2).
    pub fn get_current_routes(&self) -> BTreeMap<Ipv4Net, AsPath> {
        match self {
            RoutingDaemon::Egp(d) => d.get_current_routes(),
            RoutingDaemon::Ext(d) => d.get_current_routes(),
            RoutingDaemon::Igp => BTreeMap::new(),
        }
    }

    /// Drain and return accumulated verbose log lines.
    pub fn get_outlog(&mut self) -> Vec<String> {
        match self {
            RoutingDaemon::Egp(d) => d.get_outlog(),
            RoutingDaemon::Ext(d) => d.get_outlog(),
            RoutingDaemon::Igp => Vec::new(),
        }
    }

    /// End-of-tick hook. Concrete default is a no-op for every variant.
    pub fn finalize_iteration(&mut self) {
        match self {
            RoutingDaemon::Egp(d) => d.finalize_iteration(),
            RoutingDaemon::Ext(d) => d.finalize_iteration(),
            RoutingDaemon::Igp => {}
        }
    }

    /// True if this is the `IGP` no-op variant.
    pub fn is_igp(&self) -> bool {
        matches!(self, RoutingDaemon::Igp)
    }

    /// The EGP daemon, if this is the `Egp` variant.
    pub fn as_egp(&self) -> Option<&crate::egp::EgpDaemon> {
        match self {
            RoutingDaemon::Egp(d) => Some(d),
            _ => None,
        }
    }

    /// The EXT daemon, if this is the `Ext` variant.
    pub fn as_ext(&self) -> Option<&ExtDaemon> {
        match self {
            RoutingDaemon::Ext(d) => Some(d),
            _ => None,
        }
    }

    /// The EXT daemon, mutably, if this is the `Ext` variant.
    pub fn as_ext_mut(&mut self) -> Option<&mut ExtDaemon> {
        match self {
            RoutingDaemon::Ext(d) => Some(d),
            _ => None,
        }
    }
}
