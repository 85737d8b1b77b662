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

//! Shared identifier and route types used across the simulator.

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use itertools::Itertools;

/// Stable string identifier of a router (`rId` in `spec.md` §3).
pub type RouterId = String;

/// Stable string identifier of a link (`linkId` in `spec.md` §3).
pub type LinkId = String;

/// Name of a router-local network interface.
pub type IfaceName = String;

/// The sentinel forwarding-table entry meaning "deliver locally"
/// (`spec.md` §3, §4.1).
pub const LOOPBACK: &str = "LOOPBACK";

/// An autonomous-system number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asn(pub u32);

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Asn {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Asn(s.parse()?))
    }
}

impl From<u32> for Asn {
    fn from(v: u32) -> Self {
        Asn(v)
    }
}

/// A whitespace-separated AS path, leftmost ASN being the most recently
/// prepending AS (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct AsPath(pub Vec<Asn>);

impl AsPath {
    /// Parse a path from its wire representation: whitespace-separated
    /// decimal ASNs.
    pub fn parse(s: &str) -> Option<Self> {
        s.split_whitespace()
            .map(|tok| tok.parse::<u32>().ok().map(Asn))
            .collect::<Option<Vec<_>>>()
            .map(AsPath)
    }

    /// Render the path back to its wire representation.
    pub fn render(&self) -> String {
        self.0.iter().map(|a| a.0.to_string()).collect::<Vec<_>>().join(" ")
    }

    /// Return a new path with `asn` prepended (`spec.md` §4.4/§4.5: routing
    /// daemons prepend their own ASN to every path they pass on).
    pub fn prepend(&self, asn: Asn) -> Self {
        let mut v = Vec::with_capacity(self.0.len() + 1);
        v.push(asn);
        v.extend_from_slice(&self.0);
        AsPath(v)
    }

    /// Collapse runs of consecutive duplicate ASNs (`spec.md` §3: "a route
    /// has a loop if any ASN occurs more than once after collapsing runs of
    /// consecutive duplicates"). Operates at the ASN-token level; see
    /// `SPEC_FULL.md` §10.1 for why this must not be implemented as
    /// character-level deduplication.
    pub fn collapse_consecutive_duplicates(&self) -> Vec<Asn> {
        self.0.iter().copied().dedup().collect()
    }

    /// True if, after collapsing consecutive duplicates, any ASN appears
    /// more than once.
    pub fn has_loop(&self) -> bool {
        let collapsed = self.collapse_consecutive_duplicates();
        let unique: std::collections::HashSet<_> = collapsed.iter().collect();
        unique.len() < collapsed.len()
    }

    /// True if our own ASN appears anywhere in the path beyond position 0
    /// (the EGP loop filter in `spec.md` §4.4: "our ASN does not appear in
    /// `path` beyond position 0").
    pub fn contains_beyond_head(&self, asn: Asn) -> bool {
        self.0.iter().skip(1).any(|&a| a == asn)
    }

    /// Number of unique ASNs after collapsing consecutive duplicates
    /// (`spec.md` §4.7 step 7: `aspath_factor = 10 / unique_ASes_in_path`).
    pub fn unique_as_count(&self) -> usize {
        self.collapse_consecutive_duplicates()
            .into_iter()
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// True if this path, after collapsing consecutive duplicates, names a
    /// single unique AS (`spec.md` §4.5: a default whose as-path contains a
    /// single unique ASN after collapsing is "local").
    pub fn is_single_as(&self) -> bool {
        self.unique_as_count() == 1
    }

    /// Number of hops (raw token count, before collapsing).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the path has no hops.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Parse a CIDR destination exactly as the configuration and wire format
/// spell it (e.g. `"10.0.0.0/24"`).
pub fn parse_cidr(s: &str) -> Option<Ipv4Net> {
    s.trim().parse().ok()
}

/// Parse a bare IPv4 address (used for destination-IP lookups in
/// `ForwardingTable::get_next_hops`).
pub fn parse_ip(s: &str) -> Option<Ipv4Addr> {
    s.trim().parse().ok()
}
