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

//! The EXT daemon: a passive stub representing a neighbouring autonomous
//! system (`spec.md` §4.5).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use crate::daemon::InterfaceState;
use crate::error::DaemonError;
use crate::forwarding_table::ForwardingTable;
use crate::packet::{Packet, Payload};
use crate::types::{parse_cidr, AsPath, Asn, IfaceName};

/// Whether a default path may be re-announced to neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Eligible for announcement.
    Public,
    /// Installed locally, never announced.
    Private,
}

/// Neighbouring-AS stub daemon run by `ext` routers.
#[derive(Debug, Clone)]
pub struct ExtDaemon {
    router_id: String,
    asn: Asn,
    own_ip: String,
    iface: Option<IfaceName>,
    last_up: Option<bool>,
    defaults: BTreeMap<ipnet::Ipv4Net, (AsPath, Visibility)>,
    current: BTreeMap<ipnet::Ipv4Net, AsPath>,
    received: HashMap<String, BTreeMap<ipnet::Ipv4Net, AsPath>>,
    dests_offered: BTreeSet<ipnet::Ipv4Net>,
    dests_with_new_route: BTreeSet<ipnet::Ipv4Net>,
    verbose: bool,
    log: Vec<String>,
}

impl ExtDaemon {
    /// Construct a new EXT daemon bound to `router_id`.
    pub fn new(router_id: impl Into<String>, asn: Asn, own_ip: impl Into<String>, verbose: bool) -> Self {
        ExtDaemon {
            router_id: router_id.into(),
            asn,
            own_ip: own_ip.into(),
            iface: None,
            last_up: None,
            defaults: BTreeMap::new(),
            current: BTreeMap::new(),
            received: HashMap::new(),
            dests_offered: BTreeSet::new(),
            dests_with_new_route: BTreeSet::new(),
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

    /// Seed a public default path, as injected by an `advert` event
    /// (`spec.md` §4.6). Unconditionally overwrites any prior default,
    /// current route, and FIB entry for this prefix, matching the reference
    /// `setDefaultPath` (`examples/original_source/simulator/lib/ext.py`).
    pub fn add_remote_destination(&mut self, fib: &mut ForwardingTable, prefix: ipnet::Ipv4Net, path: AsPath) {
        self.defaults.insert(prefix, (path.clone(), Visibility::Public));
        self.current.insert(prefix, path);
        fib.set_entry_local(prefix);
        self.dests_with_new_route.insert(prefix);
    }

    /// Seed a private default path, as injected by an `addprivatepath`
    /// event.
    pub fn add_private_destination(&mut self, fib: &mut ForwardingTable, prefix: ipnet::Ipv4Net, path: AsPath) {
        self.defaults.insert(prefix, (path.clone(), Visibility::Private));
        self.current.insert(prefix, path);
        fib.set_entry_local(prefix);
        self.dests_with_new_route.insert(prefix);
    }

    fn is_local(&self, prefix: &ipnet::Ipv4Net) -> bool {
        self.defaults.get(prefix).map(|(p, _)| p.is_single_as()).unwrap_or(false)
    }

    fn shadowed_by_private(&self, prefix: &ipnet::Ipv4Net) -> bool {
        self.defaults.get(prefix).map(|(_, v)| *v == Visibility::Private).unwrap_or(false)
    }

    /// React to interface liveness. Enforces the single-interface
    /// constraint and handles down/up transitions (`spec.md` §4.5
    /// "Update handling").
    pub fn update(
        &mut self,
        fib: &mut ForwardingTable,
        states: &[InterfaceState],
        _now: u64,
    ) -> Result<(), DaemonError> {
        if states.len() > 1 {
            return Err(DaemonError::MultiInterfaceExt(self.router_id.clone()));
        }
        let Some(state) = states.first() else { return Ok(()) };
        if self.iface.is_none() {
            self.iface = Some(state.iface.clone());
        } else if self.iface.as_deref() != Some(state.iface.as_str()) {
            return Err(DaemonError::MultiInterfaceExt(self.router_id.clone()));
        }

        // Only react on an actual liveness transition, matching the
        // reference `update` (`examples/original_source/simulator/lib/ext.py`):
        // the first call (no prior state) is not itself a transition.
        let transitioned = self.last_up.is_some_and(|prev| prev != state.up);
        if transitioned {
            if !state.up {
                // Interface down: flush everything we installed, then
                // restore each default locally.
                for prefix in self.current.keys().cloned().collect::<Vec<_>>() {
                    fib.remove_entry(&prefix);
                }
                self.received.clear();
                self.current.clear();
                for (prefix, (path, _)) in self.defaults.clone() {
                    self.current.insert(prefix, path);
                    fib.set_entry_local(prefix);
                }
            } else {
                for (prefix, (_, visibility)) in self.defaults.iter() {
                    if *visibility == Visibility::Public {
                        self.dests_with_new_route.insert(*prefix);
                    }
                }
            }
        }
        self.last_up = Some(state.up);
        Ok(())
    }

    /// Parse and apply a received control-plane payload (`spec.md` §4.5
    /// "Receive"/"Withdraw").
    pub fn process_routing_packet(
        &mut self,
        fib: &mut ForwardingTable,
        iface: &str,
        payload: &Payload,
    ) -> Result<(), DaemonError> {
        if self.iface.as_deref() != Some(iface) {
            return Ok(());
        }
        let mut speaker: Option<String> = None;
        let mut handled: BTreeSet<ipnet::Ipv4Net> = BTreeSet::new();

        for line in payload.entries() {
            if let Some(rest) = line.strip_prefix("speaker:") {
                speaker = Some(rest.trim().to_string());
                continue;
            }
            if let Some(rest) = line.strip_prefix("EGP-update prefix:") {
                let (prefix_str, path_str) = rest.split_once("AS-path:").ok_or_else(|| {
                    DaemonError::MalformedPayload {
                        router_id: self.router_id.clone(),
                        line: line.clone(),
                    }
                })?;
                let prefix = parse_cidr(prefix_str).ok_or_else(|| DaemonError::MalformedPayload {
                    router_id: self.router_id.clone(),
                    line: line.clone(),
                })?;
                if handled.contains(&prefix) {
                    return Err(DaemonError::DuplicatePrefixInPacket {
                        router_id: self.router_id.clone(),
                        prefix: prefix.to_string(),
                    });
                }
                handled.insert(prefix);
                let speaker_ip = speaker.clone().unwrap_or_default();
                let path = AsPath::parse(path_str).unwrap_or_default().prepend(self.asn);
                self.received.entry(speaker_ip).or_default().insert(prefix, path.clone());
                self.apply_received(fib, prefix, path);
            } else if let Some(rest) = line.strip_prefix("EGP-withdrawal prefix:") {
                let prefix = parse_cidr(rest).ok_or_else(|| DaemonError::MalformedPayload {
                    router_id: self.router_id.clone(),
                    line: line.clone(),
                })?;
                if handled.contains(&prefix) {
                    return Err(DaemonError::DuplicatePrefixInPacket {
                        router_id: self.router_id.clone(),
                        prefix: prefix.to_string(),
                    });
                }
                handled.insert(prefix);
                let speaker_ip = speaker.clone().unwrap_or_default();
                self.apply_withdrawal(fib, &speaker_ip, prefix);
            } else {
                return Err(DaemonError::MalformedPayload {
                    router_id: self.router_id.clone(),
                    line: line.clone(),
                });
            }
        }
        Ok(())
    }

    fn apply_received(&mut self, fib: &mut ForwardingTable, prefix: ipnet::Ipv4Net, path: AsPath) {
        let iface = match &self.iface {
            Some(i) => i.clone(),
            None => return,
        };
        if !self.is_local(&prefix) && !self.shadowed_by_private(&prefix) {
            let was_default = self
                .defaults
                .get(&prefix)
                .map(|(dp, _)| self.current.get(&prefix) == Some(dp))
                .unwrap_or(false);
            fib.set_entry(prefix, vec![iface]);
            self.current.insert(prefix, path);
            if was_default {
                self.dests_with_new_route.insert(prefix);
            }
        } else if let Some((default_path, _)) = self.defaults.get(&prefix).cloned() {
            self.current.insert(prefix, default_path);
            fib.set_entry_local(prefix);
        }
    }

    fn apply_withdrawal(&mut self, fib: &mut ForwardingTable, speaker: &str, prefix: ipnet::Ipv4Net) {
        let Some(by_prefix) = self.received.get_mut(speaker) else { return };
        let Some(withdrawn) = by_prefix.remove(&prefix) else { return };
        if self.current.get(&prefix) != Some(&withdrawn) {
            return;
        }
        if let Some((default_path, _)) = self.defaults.get(&prefix).cloned() {
            self.current.insert(prefix, default_path);
            fib.set_entry_local(prefix);
            self.dests_with_new_route.insert(prefix);
        } else {
            self.current.remove(&prefix);
            fib.remove_entry(&prefix);
        }
    }

    /// Compute and emit the control-plane packet for `iface`, if any
    /// announcements or withdrawals are due (`spec.md` §4.5 "Generate").
    pub fn generate_routing_packet(&mut self, iface: &str) -> Option<Packet> {
        if self.iface.as_deref() != Some(iface) {
            return None;
        }
        let mut payload = Payload::new();
        let dests: Vec<_> = self.dests_with_new_route.iter().copied().collect();
        for prefix in dests {
            let Some((default_path, visibility)) = self.defaults.get(&prefix).cloned() else {
                continue;
            };
            let current = self.current.get(&prefix).cloned().unwrap_or_default();
            if current == default_path {
                match visibility {
                    Visibility::Public => {
                        payload.add_entry(format!(
                            "EGP-update prefix: {} AS-path: {}",
                            prefix,
                            default_path.render()
                        ));
                        self.dests_offered.insert(prefix);
                    }
                    Visibility::Private => {
                        if self.dests_offered.remove(&prefix) {
                            payload.add_entry(format!("EGP-withdrawal prefix: {}", prefix));
                        }
                    }
                }
            } else if self.dests_offered.remove(&prefix) {
                payload.add_entry(format!("EGP-withdrawal prefix: {}", prefix));
            }
        }
        self.dests_with_new_route.clear();

        if payload.is_empty() {
            return None;
        }
        self.log_if_verbose(format!("announcing on {}", iface));
        let mut pkt = Packet::new_routing(self.router_id.clone());
        let mut full = Payload::new();
        full.add_entry(format!("speaker: {}", self.own_ip));
        for entry in payload.entries() {
            full.add_entry(entry.clone());
        }
        pkt.set_payload(full);
        Some(pkt)
    }

    /// Snapshot of the currently active route per destination, used by the
    /// checker to validate advertised AS paths (`spec.md` §4.7 step 2).
    pub fn get_current_routes(&self) -> BTreeMap<ipnet::Ipv4Net, AsPath> {
        self.current.clone()
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
