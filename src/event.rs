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

//! Scheduled simulation events (`spec.md` §3, §4.6).

use std::collections::HashMap;

use ipnet::Ipv4Net;

use crate::types::{AsPath, LinkId, RouterId};

/// The target of a `dumpfib`/`dumpstats` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    /// A single router.
    Router(RouterId),
    /// Every router.
    All,
}

impl DumpTarget {
    /// Parse the `args`/`router` field of a `dumpfib`/`dumpstats` event.
    pub fn parse(s: &str) -> Self {
        if s == "all" {
            DumpTarget::All
        } else {
            DumpTarget::Router(s.to_string())
        }
    }
}

/// The operation a scheduled [`Event`] performs (`spec.md` §4.6).
#[derive(Debug, Clone)]
pub enum EventOp {
    /// `send src dst [ttl]`.
    Send {
        /// Originating router.
        src: RouterId,
        /// Destination address (IP or CIDR network address as a string).
        dst: String,
        /// Optional explicit TTL override.
        ttl: Option<i32>,
    },
    /// `uplink i0 i1` / `downlink i0 i1`.
    SetLinkState {
        /// First endpoint's full `"<router>-<iface>"` identifier.
        iface0: String,
        /// Second endpoint's full `"<router>-<iface>"` identifier.
        iface1: String,
        /// Target liveness.
        up: bool,
    },
    /// `newlinkproperties linkid props`.
    NewLinkProperties {
        /// Target link id.
        link_id: LinkId,
        /// Properties to merge in.
        properties: HashMap<String, String>,
    },
    /// `advert router prefix aspath` (public default).
    Advert {
        /// Target EXT router.
        router: RouterId,
        /// One or more whitespace-separated destination prefixes.
        prefixes: Vec<Ipv4Net>,
        /// The AS path to seed.
        as_path: AsPath,
    },
    /// `addprivatepath router prefix aspath` (private default).
    AddPrivatePath {
        /// Target EXT router.
        router: RouterId,
        /// One or more whitespace-separated destination prefixes.
        prefixes: Vec<Ipv4Net>,
        /// The AS path to seed.
        as_path: AsPath,
    },
    /// `dumpfib router|all`.
    DumpFib(DumpTarget),
    /// `dumpstats router|all`.
    DumpStats(DumpTarget),
}

/// A scheduled event: `(operation, time, args, done-flag)` (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Event {
    time: u64,
    op: EventOp,
    done: bool,
}

impl Event {
    /// Construct a new, not-yet-fired event.
    pub fn new(time: u64, op: EventOp) -> Self {
        Event { time, op, done: false }
    }

    /// Scheduled time.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// The operation to perform.
    pub fn op(&self) -> &EventOp {
        &self.op
    }

    /// True once this event has fired.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Mark this event as fired.
    pub fn set_done(&mut self) {
        self.done = true;
    }

    /// True if this event is due at `now` and has not yet fired.
    pub fn is_due(&self, now: u64) -> bool {
        !self.done && self.time <= now
    }
}
