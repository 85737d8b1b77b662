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

//! Per-router forwarding table: longest-prefix lookup over CIDR keys to an
//! ordered list of egress interface names (`spec.md` §4.1).

use std::collections::HashMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::types::{IfaceName, LOOPBACK};

/// Maps destination CIDRs to an ordered sequence of egress interfaces.
///
/// Lookup is longest-prefix match; when several entries match the most
/// specific (longest prefix length) wins, and an empty result (no match)
/// means the packet is dropped, never an error (`spec.md` §3, §4.1).
#[derive(Debug, Clone, Default)]
pub struct ForwardingTable {
    table: HashMap<Ipv4Net, Vec<IfaceName>>,
    writes: u64,
}

impl ForwardingTable {
    /// An empty forwarding table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (overwriting) the egress interfaces for `cidr`.
    pub fn set_entry(&mut self, cidr: Ipv4Net, ifaces: Vec<IfaceName>) {
        self.table.insert(cidr, ifaces);
        self.writes += 1;
    }

    /// Shorthand for `set_entry(cidr, [LOOPBACK])`.
    pub fn set_entry_local(&mut self, cidr: Ipv4Net) {
        self.set_entry(cidr, vec![LOOPBACK.to_string()]);
    }

    /// Remove the entry for `cidr`, if any. Counts as a write: `spec.md`
    /// §8 requires `setEntry` followed by `removeEntry` on the same CIDR to
    /// increment [`Self::get_total_writes`] by exactly two.
    pub fn remove_entry(&mut self, cidr: &Ipv4Net) {
        self.table.remove(cidr);
        self.writes += 1;
    }

    /// Exact-CIDR lookup, lexicographically sorted.
    pub fn get_entry(&self, cidr: &Ipv4Net) -> Vec<IfaceName> {
        let mut ifaces = self.table.get(cidr).cloned().unwrap_or_default();
        ifaces.sort();
        ifaces
    }

    /// Longest-prefix-match lookup for a destination IP address, sorted.
    /// Returns an empty vector if nothing matches.
    pub fn get_next_hops(&self, ip: Ipv4Addr) -> Vec<IfaceName> {
        let mut best: Option<&Ipv4Net> = None;
        for cidr in self.table.keys() {
            if !cidr.contains(&ip) {
                continue;
            }
            match best {
                Some(b) if cidr.prefix_len() <= b.prefix_len() => {}
                _ => best = Some(cidr),
            }
        }
        let mut ifaces = best.and_then(|c| self.table.get(c)).cloned().unwrap_or_default();
        ifaces.sort();
        ifaces
    }

    /// Number of writes performed via [`Self::set_entry`] /
    /// [`Self::set_entry_local`] so far.
    pub fn get_total_writes(&self) -> u64 {
        self.writes
    }
}

impl std::fmt::Display for ForwardingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.table.is_empty() {
            return writeln!(f, "<empty>");
        }
        let mut dests: Vec<_> = self.table.keys().collect();
        dests.sort_by_key(|n| (n.addr(), n.prefix_len()));
        for d in dests {
            let ifaces = &self.table[d];
            if ifaces.len() == 1 && ifaces[0] == LOOPBACK {
                writeln!(f, "{} directly connected", d)?;
            } else {
                writeln!(f, "{} via {}", d, ifaces.join(", "))?;
            }
        }
        Ok(())
    }
}
