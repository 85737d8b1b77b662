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

//! The EGP daemon: a policy-based path-vector routing protocol
//! (`spec.md` §4.4).

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;

use crate::daemon::InterfaceState;
use crate::error::DaemonError;
use crate::forwarding_table::ForwardingTable;
use crate::packet::{Packet, Payload};
use crate::types::{parse_cidr, AsPath, Asn, IfaceName};

/// Business relation of a neighbour reached over one interface, which
/// governs both import preference and export eligibility (`spec.md` §4.4,
/// GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Routes learned here may be exported to anyone.
    Customer,
    /// Routes learned here may only be exported to customers.
    Peer,
    /// Routes learned here may only be exported to customers.
    Provider,
}

impl Relation {
    /// `customer=3 > peer=2 > provider=1` (`spec.md` §4.4).
    fn priority(self) -> u8 {
        match self {
            Relation::Customer => 3,
            Relation::Peer => 2,
            Relation::Provider => 1,
        }
    }

    /// True if a route learned over this relation may be exported to a
    /// neighbour of relation `to`.
    fn exportable_to(self, to: Relation) -> bool {
        match self {
            Relation::Customer => true,
            Relation::Peer | Relation::Provider => matches!(to, Relation::Customer),
        }
    }

    /// Parse the `relations` configuration value (`customer`, `peer`,
    /// `provider`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Relation::Customer),
            "peer" => Some(Relation::Peer),
            "provider" => Some(Relation::Provider),
            _ => None,
        }
    }
}

/// Policy-based path-vector routing daemon run by `EGP` routers.
#[derive(Debug, Clone)]
pub struct EgpDaemon {
    router_id: String,
    asn: Asn,
    own_ip: String,
    neighbours: HashMap<IfaceName, String>,
    relations: HashMap<IfaceName, Relation>,
    iface_up: HashMap<IfaceName, bool>,
    /// `received[prefix][iface]` = as-path as received and prepended.
    received: BTreeMap<ipnet::Ipv4Net, HashMap<IfaceName, AsPath>>,
    /// `best[prefix]` = selected `(iface, path)`.
    best: BTreeMap<ipnet::Ipv4Net, (IfaceName, AsPath)>,
    /// `advertised[iface][prefix]` = last as-path told to that neighbour.
    advertised: HashMap<IfaceName, BTreeMap<ipnet::Ipv4Net, AsPath>>,
    verbose: bool,
    log: Vec<String>,
}

impl EgpDaemon {
    /// Construct a new EGP daemon bound to `router_id`, per `spec.md`
    /// §4.4's per-router parameters: AS-ID, neighbours (iface -> IP),
    /// relations (iface -> relation).
    pub fn new(
        router_id: impl Into<String>,
        asn: Asn,
        own_ip: impl Into<String>,
        neighbours: HashMap<IfaceName, String>,
        relations: HashMap<IfaceName, Relation>,
        verbose: bool,
    ) -> Self {
        EgpDaemon {
            router_id: router_id.into(),
            asn,
            own_ip: own_ip.into(),
            neighbours,
            relations,
            iface_up: HashMap::new(),
            received: BTreeMap::new(),
            best: BTreeMap::new(),
            advertised: HashMap::new(),
            verbose,
            log: Vec::new(),
        }
    }

    fn log_if_verbose(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.verbose {
            debug!("{}: {}", self.router_id, line);
        }
        self.log.push(line);
    }

    /// React to per-interface liveness (`spec.md` §4.4 "Link-state
    /// reaction").
    pub fn update(
        &mut self,
        fib: &mut ForwardingTable,
        states: &[InterfaceState],
        _now: u64,
    ) -> Result<(), DaemonError> {
        for state in states {
            let was_up = self.iface_up.get(&state.iface).copied().unwrap_or(true);
            if was_up && !state.up {
                // Down transition: forget every route learned over this
                // interface and re-select every affected destination.
                let affected: Vec<_> = self
                    .received
                    .iter()
                    .filter(|(_, by_iface)| by_iface.contains_key(&state.iface))
                    .map(|(p, _)| *p)
                    .collect();
                for p in affected {
                    if let Some(by_iface) = self.received.get_mut(&p) {
                        by_iface.remove(&state.iface);
                    }
                    self.reselect(fib, &p);
                }
            } else if !was_up && state.up {
                // Up transition: force re-announcement to the revived
                // neighbour by forgetting what we last told it.
                self.advertised.remove(&state.iface);
            }
            self.iface_up.insert(state.iface.clone(), state.up);
        }
        Ok(())
    }

    /// Parse and apply a received control-plane payload (`spec.md` §4.4
    /// "Receive").
    pub fn process_routing_packet(
        &mut self,
        fib: &mut ForwardingTable,
        iface: &str,
        payload: &Payload,
    ) -> Result<(), DaemonError> {
        let mut handled: HashSet<ipnet::Ipv4Net> = HashSet::new();
        let mut touched: Vec<ipnet::Ipv4Net> = Vec::new();
        for line in payload.entries() {
            if let Some(rest) = line.strip_prefix("speaker:") {
                self.log_if_verbose(format!("received speaker announcement {}", rest.trim()));
                continue;
            }
            if let Some(rest) = line.strip_prefix("EGP-update prefix:") {
                let (prefix_str, path_str) = match rest.split_once("AS-path:") {
                    Some(parts) => parts,
                    None => continue,
                };
                let prefix = match parse_cidr(prefix_str) {
                    Some(p) => p,
                    None => continue,
                };
                if handled.contains(&prefix) {
                    // EGP silently ignores duplicates within one packet
                    // (`spec.md` §9: "the EGP daemon silently ignores
                    // them").
                    continue;
                }
                handled.insert(prefix);
                let path = AsPath::parse(path_str).unwrap_or_default().prepend(self.asn);
                self.received.entry(prefix).or_default().insert(iface.to_string(), path);
                touched.push(prefix);
            } else if let Some(rest) = line.strip_prefix("EGP-withdrawal prefix:") {
                let prefix = match parse_cidr(rest) {
                    Some(p) => p,
                    None => continue,
                };
                if handled.contains(&prefix) {
                    continue;
                }
                handled.insert(prefix);
                if let Some(by_iface) = self.received.get_mut(&prefix) {
                    by_iface.remove(iface);
                }
                touched.push(prefix);
            }
        }
        for p in touched {
            self.reselect(fib, &p);
        }
        Ok(())
    }

    /// Re-run best-path selection for `prefix` and install/remove the FIB
    /// entry accordingly (`spec.md` §4.4 "Best-route selection").
    fn reselect(&mut self, fib: &mut ForwardingTable, prefix: &ipnet::Ipv4Net) {
        let candidates: Vec<(IfaceName, AsPath)> = match self.received.get(prefix) {
            Some(by_iface) => by_iface
                .iter()
                .filter(|(iface, path)| {
                    !path.contains_beyond_head(self.asn)
                        && self.iface_up.get(*iface).copied().unwrap_or(true)
                })
                .map(|(iface, path)| (iface.clone(), path.clone()))
                .collect(),
            None => Vec::new(),
        };

        if candidates.is_empty() {
            self.best.remove(prefix);
            fib.remove_entry(prefix);
            return;
        }

        let priority_of = |iface: &str| {
            self.relations.get(iface).map(|r| r.priority()).unwrap_or(0)
        };

        let mut sorted = candidates;
        sorted.sort_by(|(ia, _), (ib, _)| {
            priority_of(ib).cmp(&priority_of(ia)).then_with(|| ia.cmp(ib))
        });

        let (head_iface, head_path) = sorted[0].clone();
        let head_priority = priority_of(&head_iface);
        let mut chosen = (head_iface, head_path);
        for (iface, path) in sorted.iter().skip(1) {
            if priority_of(iface) != head_priority {
                break;
            }
            if chosen.1.len() as i64 - path.len() as i64 >= 3 {
                chosen = (iface.clone(), path.clone());
                break;
            }
        }

        fib.set_entry(*prefix, vec![chosen.0.clone()]);
        self.best.insert(*prefix, chosen);
    }

    /// Compute and emit the control-plane packet for `iface`, if the
    /// advertised set changed (`spec.md` §4.4 "Export").
    pub fn generate_routing_packet(&mut self, iface: &str) -> Option<Packet> {
        if !self.iface_up.get(iface).copied().unwrap_or(false) || !self.neighbours.contains_key(iface) {
            return None;
        }
        let to_relation = self.relations.get(iface).copied();

        let mut should_advertise: BTreeMap<ipnet::Ipv4Net, AsPath> = BTreeMap::new();
        for (prefix, (learned_iface, path)) in self.best.iter() {
            if learned_iface == iface {
                continue; // split horizon
            }
            let from_relation = self.relations.get(learned_iface).copied();
            let allowed = match (from_relation, to_relation) {
                (Some(from), Some(to)) => from.exportable_to(to),
                (Some(from), None) => matches!(from, Relation::Customer),
                _ => true,
            };
            if allowed {
                should_advertise.insert(*prefix, path.clone());
            }
        }

        let previously = self.advertised.entry(iface.to_string()).or_default().clone();
        let mut payload = Payload::new();

        for (prefix, path) in &should_advertise {
            if previously.get(prefix) != Some(path) {
                payload.add_entry(format!("EGP-update prefix: {} AS-path: {}", prefix, path.render()));
            }
        }
        for prefix in previously.keys() {
            if !should_advertise.contains_key(prefix) {
                payload.add_entry(format!("EGP-withdrawal prefix: {}", prefix));
            }
        }

        self.advertised.insert(iface.to_string(), should_advertise);

        if payload.is_empty() {
            return None;
        }
        let mut pkt = Packet::new_routing(self.router_id.clone());
        let mut full = Payload::new();
        full.add_entry(format!("speaker: {}", self.own_ip));
        for entry in payload.entries() {
            full.add_entry(entry.clone());
        }
        pkt.set_payload(full);
        Some(pkt)
    }

    /// Snapshot of the currently selected best routes.
    pub fn get_current_routes(&self) -> BTreeMap<ipnet::Ipv4Net, AsPath> {
        self.best.iter().map(|(p, (_, path))| (*p, path.clone())).collect()
    }

    /// Drain accumulated log lines.
    pub fn get_outlog(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }

    /// No-op end-of-tick hook.
    pub fn finalize_iteration(&mut self) {}

    /// This daemon's AS number.
    pub fn asn(&self) -> Asn {
        self.asn
    }
}
