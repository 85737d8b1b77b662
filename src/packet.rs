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

//! In-memory representation of data and control-plane packets
//! (`spec.md` §2, §3, §6).

use std::fmt;

/// Destination address used by control-plane packets: every router with a
/// live interface receives a broadcast routing packet (`spec.md` §4.3 step
/// 3). Not a routable unicast address.
pub const BROADCAST_DST: &str = "BCAST";

/// Discriminates the three kinds of packet the simulator moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// A user-injected or forwarded data packet.
    Data,
    /// A control-plane packet produced by a routing daemon.
    Routing,
    /// A TTL-expiry error packet sent back towards a data packet's source.
    Icmp,
}

/// The ordered sequence of text entries a packet carries. Data packets
/// accumulate a hop trace (`spec.md` §4.2, §6); routing packets carry the
/// `speaker:`/`EGP-update`/`EGP-withdrawal` lines described in `spec.md` §6.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<String>);

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Payload(Vec::new())
    }

    /// Append one text entry.
    pub fn add_entry(&mut self, entry: impl Into<String>) {
        self.0.push(entry.into());
    }

    /// The ordered entries.
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// True if no entries have been recorded yet — used by `Router::send`
    /// to distinguish a freshly-originated data packet (empty trace) from
    /// one that has already traversed at least one hop (`spec.md` §4.3).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// A network packet moving through the simulated fabric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    src: String,
    dst: String,
    src_port: u32,
    dst_port: u32,
    kind: PacketKind,
    payload: Payload,
    seq: u64,
    ttl: i32,
}

impl Packet {
    /// Build a new data packet with the reference implementation's default
    /// ports and TTL (`examples/original_source/simulator/lib/packet.py`).
    pub fn new_data(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Packet {
            src: src.into(),
            dst: dst.into(),
            src_port: 50000,
            dst_port: 8080,
            kind: PacketKind::Data,
            payload: Payload::new(),
            seq: 0,
            ttl: 255,
        }
    }

    /// Build a routing (control-plane) packet addressed to the broadcast
    /// destination, as `RoutingPacket` does in the reference implementation.
    pub fn new_routing(src: impl Into<String>) -> Self {
        Packet {
            src: src.into(),
            dst: BROADCAST_DST.to_string(),
            src_port: 2300,
            dst_port: 2300,
            kind: PacketKind::Routing,
            payload: Payload::new(),
            seq: 0,
            ttl: 255,
        }
    }

    /// Build an ICMP packet sent back towards `dst` in response to a
    /// TTL-expired packet.
    pub fn new_icmp(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Packet {
            src: src.into(),
            dst: dst.into(),
            src_port: 50000,
            dst_port: 8080,
            kind: PacketKind::Icmp,
            payload: Payload::new(),
            seq: 0,
            ttl: 255,
        }
    }

    /// Source address.
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Destination address (may be [`BROADCAST_DST`]).
    pub fn destination(&self) -> &str {
        &self.dst
    }

    /// Source port.
    pub fn source_port(&self) -> u32 {
        self.src_port
    }

    /// Destination port.
    pub fn destination_port(&self) -> u32 {
        self.dst_port
    }

    /// Set the source port.
    pub fn set_source_port(&mut self, port: u32) {
        self.src_port = port;
    }

    /// Set the destination port.
    pub fn set_destination_port(&mut self, port: u32) {
        self.dst_port = port;
    }

    /// The packet kind.
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Sequence number (assigned by the simulator when a data packet is
    /// originated from a `send` event, `spec.md` §4.6).
    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    /// Set the sequence number.
    pub fn set_sequence_number(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Remaining time-to-live.
    pub fn ttl(&self) -> i32 {
        self.ttl
    }

    /// Set the time-to-live, e.g. from a `send` event's optional `ttl` arg.
    pub fn set_ttl(&mut self, ttl: i32) {
        self.ttl = ttl;
    }

    /// Decrement the time-to-live by one (`spec.md` §4.3).
    pub fn decrement_ttl(&mut self) {
        self.ttl -= 1;
    }

    /// Shared reference to the payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable reference to the payload.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Replace the payload wholesale.
    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<type {:?} src {}:{} dst {}:{} ttl {} seq {}>",
            self.kind, self.src, self.src_port, self.dst, self.dst_port, self.ttl, self.seq
        )
    }
}
