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

//! The simulation kernel: drives the per-tick event/router/link/checker
//! loop (`spec.md` §5, §4.6).

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::checker::EgpChecker;
use crate::config::Config;
use crate::error::DaemonError;
use crate::event::{DumpTarget, Event, EventOp};
use crate::link::Link;
use crate::packet::Packet;
use crate::router::Router;
use crate::types::{LinkId, RouterId};

/// Owns every router and link, the scheduled events, and the checker, and
/// drives the synchronous per-tick loop (`spec.md` §5).
pub struct Simulator {
    routers: HashMap<RouterId, Router>,
    links: HashMap<LinkId, Link>,
    events: Vec<Event>,
    stop_time: u64,
    checker: EgpChecker,
    packet_counter: u64,
    egp_router_ids: HashSet<RouterId>,
}

impl Simulator {
    /// Build a simulator from a loaded configuration.
    pub fn from_config(cfg: Config) -> Self {
        let egp_router_ids: HashSet<RouterId> = cfg.egp_routers.keys().cloned().collect();
        let checker = EgpChecker::new(cfg.routing_graph, cfg.destinations, cfg.ext_routers, cfg.egp_routers, false);
        Simulator {
            routers: cfg.routers,
            links: cfg.links,
            events: cfg.events,
            stop_time: cfg.stop_time,
            checker,
            packet_counter: 0,
            egp_router_ids,
        }
    }

    /// Total control-plane packets sent by EGP routers only, matching the
    /// reference churn count (`examples/original_source/simulator/lib/checkers.py`,
    /// which sums `getNumberSentRoutingPackets()` over `self.egps2ases`
    /// rather than every router).
    fn total_egp_control_packets(&self) -> u64 {
        self.routers
            .iter()
            .filter(|(id, _)| self.egp_router_ids.contains(*id))
            .map(|(_, r)| r.counters().4)
            .sum()
    }

    /// Toggle checker verbosity.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.checker.set_verbose(verbose);
    }

    /// Run the full simulation: ticks `1..stop_time`, then reports
    /// (`spec.md` §5 "main loop").
    pub fn run(&mut self) -> Result<(), DaemonError> {
        for now in 1..self.stop_time {
            self.step(now)?;
        }
        self.warn_unprocessed_events();
        self.print_report();
        Ok(())
    }

    /// Run a single tick's four-phase sequence: events, router cycles,
    /// packet movement, then the checker (`spec.md` §5). Exposed
    /// separately from [`Self::run`] so callers (and tests) can inspect
    /// router/link state at a specific tick rather than only the final
    /// report.
    pub fn step(&mut self, now: u64) -> Result<(), DaemonError> {
        self.process_events(now);
        self.process_routers(now)?;
        self.process_packets();
        self.check_iteration(now);
        Ok(())
    }

    /// The routers in this simulation, keyed by id.
    pub fn routers(&self) -> &HashMap<RouterId, Router> {
        &self.routers
    }

    /// The links in this simulation, keyed by id.
    pub fn links(&self) -> &HashMap<LinkId, Link> {
        &self.links
    }

    /// Revenue recorded for a specific tick, if the checker has run for it.
    pub fn revenue_at(&self, tick: u64) -> Option<i64> {
        self.checker.time2checks().get(&tick).copied()
    }

    /// Total revenue across all ticks run so far, minus twice the total
    /// number of control packets emitted (`spec.md` §4.7 "Report").
    pub fn total_revenue(&self) -> i64 {
        self.checker.total_revenue(self.total_egp_control_packets())
    }

    fn process_events(&mut self, now: u64) {
        let due: Vec<usize> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_due(now))
            .map(|(i, _)| i)
            .collect();
        for i in due {
            let op = self.events[i].op().clone();
            self.dispatch_event(&op);
            self.events[i].set_done();
        }
    }

    fn dispatch_event(&mut self, op: &EventOp) {
        match op {
            EventOp::Send { src, dst, ttl } => {
                self.packet_counter += 1;
                if let Some(router) = self.routers.get_mut(src) {
                    let mut pkt = Packet::new_data(router.ip().to_string(), dst.clone());
                    pkt.set_sequence_number(self.packet_counter);
                    pkt.set_source_port(5000 + self.packet_counter as u32);
                    if let Some(t) = ttl {
                        pkt.set_ttl(*t);
                    }
                    router.send(pkt, None, None, &mut self.links);
                }
            }
            EventOp::SetLinkState { iface0, iface1, up } => {
                if let Some(link) = self.links.values_mut().find(|l| {
                    (l.iface(0) == iface0 && l.iface(1) == iface1) || (l.iface(0) == iface1 && l.iface(1) == iface0)
                }) {
                    link.set_state(*up);
                }
            }
            EventOp::NewLinkProperties { link_id, properties } => {
                if let Some(link) = self.links.get_mut(link_id) {
                    link.update_properties(properties.clone());
                }
            }
            EventOp::Advert { router, prefixes, as_path } => {
                if let Some(r) = self.routers.get_mut(router) {
                    let (fib, daemon) = r.fib_and_daemon_mut();
                    if let Some(ext) = daemon.as_ext_mut() {
                        for p in prefixes {
                            ext.add_remote_destination(fib, *p, as_path.clone());
                        }
                    }
                }
            }
            EventOp::AddPrivatePath { router, prefixes, as_path } => {
                if let Some(r) = self.routers.get_mut(router) {
                    let (fib, daemon) = r.fib_and_daemon_mut();
                    if let Some(ext) = daemon.as_ext_mut() {
                        for p in prefixes {
                            ext.add_private_destination(fib, *p, as_path.clone());
                        }
                    }
                }
            }
            EventOp::DumpFib(target) => self.dump_fib(target),
            EventOp::DumpStats(target) => self.dump_stats(target),
        }
    }

    fn process_routers(&mut self, now: u64) -> Result<(), DaemonError> {
        let mut ids: Vec<RouterId> = self.routers.keys().cloned().collect();
        ids.sort();
        for id in ids {
            let logs = {
                let Some(router) = self.routers.get_mut(&id) else { continue };
                router.go(now, &mut self.links)?
            };
            for line in logs {
                debug!("{}: {}", id, line);
            }
        }
        Ok(())
    }

    fn process_packets(&mut self) {
        for link in self.links.values_mut() {
            link.move_packets();
        }
    }

    fn check_iteration(&mut self, now: u64) {
        let revenue = self.checker.check(now, &self.routers, &self.links);
        debug!("tick {}: revenue {}", now, revenue);
    }

    fn dump_fib(&self, target: &DumpTarget) {
        match target {
            DumpTarget::All => {
                let mut ids: Vec<_> = self.routers.keys().collect();
                ids.sort();
                for id in ids {
                    info!("FIB for {}:\n{}", id, self.routers[id].fib());
                }
            }
            DumpTarget::Router(id) => {
                if let Some(r) = self.routers.get(id) {
                    info!("FIB for {}:\n{}", id, r.fib());
                }
            }
        }
    }

    fn dump_stats(&self, target: &DumpTarget) {
        match target {
            DumpTarget::All => {
                let mut ids: Vec<_> = self.routers.keys().cloned().collect();
                ids.sort();
                for id in &ids {
                    self.dump_stats_for(id);
                }
            }
            DumpTarget::Router(id) => self.dump_stats_for(id),
        }
    }

    fn dump_stats_for(&self, id: &str) {
        if let Some(r) = self.routers.get(id) {
            let (sent, received, forwarded, dropped, control_sent) = r.counters();
            info!(
                "{}: sent={} received={} forwarded={} dropped={} control_sent={}",
                id, sent, received, forwarded, dropped, control_sent
            );
        }
    }

    fn warn_unprocessed_events(&self) {
        for e in &self.events {
            if !e.is_done() {
                warn!("event scheduled at tick {} never fired before stop_time {}", e.time(), self.stop_time);
            }
        }
    }

    fn print_report(&self) {
        let total = self.checker.total_revenue(self.total_egp_control_packets());
        info!("total revenue: {}", total);
        for (tick, revenue) in self.checker.time2checks() {
            debug!("  tick {}: {}", tick, revenue);
        }
    }
}
