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

//! Error types for configuration loading and routing-daemon bookkeeping.
//!
//! All errors here are fatal in the sense of `spec.md` §7: they abort the
//! simulation run rather than being absorbed as data (that's what
//! [`crate::checker::Fine`] is for).

use thiserror::Error;

/// Errors that can occur while loading and lowering a JSON configuration
/// file, or while dispatching a scheduled event.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read from disk.
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON, or does not match the
    /// expected schema.
    #[error("cannot parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A link's `interfaces` field did not contain exactly two
    /// `"<router>-<iface>"` entries.
    #[error("link {link_id} must have exactly two interfaces of the form \"router-iface\"")]
    MalformedLinkInterface {
        /// The offending link id.
        link_id: String,
    },
    /// An event referenced a router id that does not exist.
    #[error("event at time {time} references unknown router {router_id}")]
    UnknownRouter {
        /// Event time.
        time: u64,
        /// The missing router id.
        router_id: String,
    },
    /// An event referenced a link that does not exist, or no link matched
    /// the given pair of interfaces.
    #[error("event at time {time} references unknown link {link}")]
    UnknownLink {
        /// Event time.
        time: u64,
        /// The link id or interface pair that could not be resolved.
        link: String,
    },
    /// `events` contained an object whose `type` is not one of the event
    /// operations defined in `spec.md` §4.6.
    #[error("unrecognized event type {0:?} at time {1}")]
    UnknownEventType(String, u64),
    /// A router's `routingProtocol` was not one of `IGP`, `ext`, `EGP`.
    #[error("router {router_id} has unknown routing protocol {protocol:?}")]
    UnknownProtocol {
        /// The router this protocol was configured for.
        router_id: String,
        /// The unrecognized protocol tag.
        protocol: String,
    },
    /// A router's configuration parameters were missing a required field
    /// (e.g. `AS-ID` for an `EGP`/`ext` router).
    #[error("router {router_id} is missing required routing-protocol parameter {field:?}")]
    MissingParameter {
        /// The router this parameter was expected for.
        router_id: String,
        /// The missing field name.
        field: String,
    },
}

/// Errors raised by a routing daemon while handling a control-plane packet.
///
/// Per `spec.md` §7 these are always fatal: the EXT daemon raises on a
/// multi-interface configuration, a duplicate update/withdraw for the same
/// prefix within one packet, or a malformed payload line. The EGP daemon
/// deliberately does *not* raise on the duplicate case (`spec.md` §9,
/// "preserve this divergence deliberately") so only EXT ever returns the
/// `Duplicate*`/`Malformed` variants in practice.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DaemonError {
    /// An EXT daemon was bound to a router with more than one interface.
    #[error("EXT daemon on router {0} cannot be configured with more than one interface")]
    MultiInterfaceExt(String),
    /// The same destination prefix was updated or withdrawn twice within a
    /// single routing packet.
    #[error("router {router_id} received multiple updates/withdrawals for {prefix} in one packet")]
    DuplicatePrefixInPacket {
        /// Router that received the packet.
        router_id: String,
        /// The offending prefix.
        prefix: String,
    },
    /// A payload line did not start with `speaker`, `EGP-update`, or
    /// `EGP-withdrawal`.
    #[error("router {router_id} received a malformed routing-packet payload line: {line:?}")]
    MalformedPayload {
        /// Router that received the packet.
        router_id: String,
        /// The unparseable line.
        line: String,
    },
}
