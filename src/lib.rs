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

#![deny(missing_docs, missing_debug_implementations)]

//! # EgpSim
//!
//! A discrete-time simulator for an inter-domain, policy-based path-vector
//! routing fabric. Routers run one of three routing daemons (`EGP`, `ext`,
//! or the implicit `IGP` loopback attachment) over half-duplex links, and a
//! checker reconstructs the network-wide forwarding graph each tick to
//! validate and score convergence.
//!
//! ## Main concepts
//!
//! [`config::load`] parses a JSON topology/event file into a [`config::Config`],
//! which [`simulator::Simulator::from_config`] consumes to drive the
//! per-tick loop: scheduled [`event::Event`]s fire, every [`router::Router`]
//! runs one [`router::Router::go`] cycle, queued packets move across
//! [`link::Link`]s, and the [`checker::EgpChecker`] scores the resulting
//! forwarding state.

pub mod checker;
pub mod config;
pub mod daemon;
pub mod egp;
pub mod error;
pub mod event;
pub mod ext;
pub mod forwarding_table;
pub mod link;
pub mod packet;
pub mod router;
pub mod simulator;
pub mod types;

#[cfg(test)]
mod test;
