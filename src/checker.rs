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

//! The EGP checker: reconstructs the network-wide forwarding graph each
//! tick, validates it against advertised AS paths, and scores the result
//! (`spec.md` §4.7).

use std::collections::{BTreeMap, HashMap};

use ipnet::Ipv4Net;
use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::{GraphEdge, RoutingGraph};
use crate::link::Link;
use crate::router::Router;
use crate::types::{Asn, AsPath, RouterId, LOOPBACK};

const COST_FORWARDING: i64 = -2;
const PEN_BLACKHOLE: i64 = -8;
const PEN_LIES: i64 = -16;

/// A forwarding or routing anomaly the checker detected for `(router,
/// dest)` this tick, and the monetary penalty it carries.
#[derive(Debug, Clone)]
pub struct Fine {
    /// The router whose view was penalized.
    pub router: RouterId,
    /// The destination in question.
    pub dest: Ipv4Net,
    /// Human-readable reason, used for logs and reports.
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
struct FwdEdge {
    revenue: i64,
    failed: bool,
}

struct ForwardingGraph {
    graph: DiGraph<String, FwdEdge>,
    index: HashMap<String, NodeIndex>,
    customer_dest: HashMap<String, RouterId>,
}

impl ForwardingGraph {
    fn new() -> Self {
        ForwardingGraph { graph: DiGraph::new(), index: HashMap::new(), customer_dest: HashMap::new() }
    }

    fn node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }
}

/// Reconstructs the forwarding graph each tick and scores it
/// (`spec.md` §4.7).
pub struct EgpChecker {
    routing_graph: RoutingGraph,
    destinations: Vec<Ipv4Net>,
    ext_asns: HashMap<RouterId, Asn>,
    ext_relations: HashMap<RouterId, String>,
    egp_asns: HashMap<RouterId, Asn>,
    node_sourced: HashMap<String, i64>,
    node_attracted: HashMap<String, i64>,
    time2checks: BTreeMap<u64, i64>,
    verbose: bool,
}

impl EgpChecker {
    /// Build a checker from the static routing graph and the derived
    /// per-router checker inputs the configuration loader produces.
    pub fn new(
        routing_graph: RoutingGraph,
        destinations: Vec<Ipv4Net>,
        ext_routers: HashMap<RouterId, (Asn, Option<String>)>,
        egp_asns: HashMap<RouterId, Asn>,
        verbose: bool,
    ) -> Self {
        let ext_asns: HashMap<RouterId, Asn> = ext_routers.iter().map(|(k, (a, _))| (k.clone(), *a)).collect();
        let ext_relations: HashMap<RouterId, String> =
            ext_routers.into_iter().filter_map(|(k, (_, r))| r.map(|r| (k, r))).collect();

        let dest_labels: std::collections::HashSet<String> = destinations.iter().map(|d| d.to_string()).collect();
        let (node_sourced, node_attracted) = compute_traffic_model(routing_graph.graph(), &dest_labels, &egp_asns);

        EgpChecker {
            routing_graph,
            destinations,
            ext_asns,
            ext_relations,
            egp_asns,
            node_sourced,
            node_attracted,
            time2checks: BTreeMap::new(),
            verbose,
        }
    }

    /// Toggle verbose per-tick logging.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn log(&self, line: impl AsRef<str>) {
        if self.verbose {
            debug!("{}", line.as_ref());
        }
    }

    /// Run the checker for tick `now`, returning this tick's revenue
    /// (0 during the convergence grace period).
    pub fn check(&mut self, now: u64, routers: &HashMap<RouterId, Router>, links: &HashMap<String, Link>) -> i64 {
        if now < self.routing_graph.diameter() {
            self.log(format!("skipping checks until estimated convergence at tick {}", self.routing_graph.diameter()));
            self.time2checks.insert(now, 0);
            return 0;
        }

        let current_graph = self.refresh_graph(links);

        let mut route_table: BTreeMap<RouterId, BTreeMap<Ipv4Net, AsPath>> = BTreeMap::new();
        for r in self.ext_asns.keys() {
            if let Some(router) = routers.get(r) {
                route_table.insert(r.clone(), router.daemon().get_current_routes());
            }
        }

        let mut fined: HashMap<(RouterId, Ipv4Net), String> = HashMap::new();

        for (r, routes) in &route_table {
            for (dest, path) in routes {
                if path.has_loop() {
                    fined.insert((r.clone(), *dest), format!("route {} received at {} for {} has an AS loop", path, r, dest));
                }
            }
        }

        let mut paths_revenues: HashMap<(RouterId, Ipv4Net), Vec<(i64, Vec<String>)>> = HashMap::new();
        let all_router_ids: Vec<RouterId> = routers.keys().cloned().collect();

        for dest in self.destinations.clone() {
            for (r, edges) in check_routing_graph(&dest, &route_table) {
                fined.entry((r.clone(), dest)).or_insert_with(|| {
                    format!("routes from {} have multiple AS next-hops ({}) for {}", r, edges.join(","), dest)
                });
            }

            let fwd = self.build_forwarding_graph(&dest, routers, &current_graph);
            self.compute_per_dest_revenues(
                &dest,
                &current_graph,
                &fwd,
                &route_table,
                &all_router_ids,
                &mut paths_revenues,
                &mut fined,
            );
        }

        let revenues = self.compute_revenues_per_source_destination(&current_graph, &route_table, &paths_revenues, &fined);
        self.time2checks.insert(now, revenues);
        revenues
    }

    fn refresh_graph(&self, links: &HashMap<String, Link>) -> DiGraph<String, GraphEdge> {
        let mut g = self.routing_graph.graph().clone();
        let edge_ids: Vec<_> = g.edge_indices().collect();
        for eid in edge_ids {
            let (u, _v) = g.edge_endpoints(eid).unwrap();
            let link_id = g[eid].link_id.clone();
            let Some(link_id) = link_id else { continue };
            let Some(link) = links.get(&link_id) else { continue };
            let up = link.is_up();
            let has_revenues = link.properties().contains_key("revenues");
            let revenues = has_revenues.then(|| crate::link::get_revenues(link.properties()));
            let u_label = g[u].clone();
            let edge = &mut g[eid];
            edge.failed = !up;
            if let Some(rev) = revenues {
                edge.revenue = if self.egp_asns.contains_key(&u_label) {
                    rev.forward
                } else if self.ext_asns.contains_key(&u_label) {
                    rev.backward
                } else {
                    rev.forward
                };
                edge.advanced_peer = rev.advanced_peer;
            }
        }
        g
    }

    fn is_customer(&self, router: &str) -> bool {
        self.ext_relations.get(router).map(|r| r == "customer").unwrap_or(false)
    }

    fn asn_of(&self, node: &str) -> Option<Asn> {
        self.ext_asns.get(node).or_else(|| self.egp_asns.get(node)).copied()
    }

    fn build_forwarding_graph(
        &self,
        dest: &Ipv4Net,
        routers: &HashMap<RouterId, Router>,
        current_graph: &DiGraph<String, GraphEdge>,
    ) -> ForwardingGraph {
        let mut fwd = ForwardingGraph::new();
        let dest_label = dest.to_string();
        for (rid, router) in routers {
            for iface in router.fib().get_entry(dest) {
                let nh = if iface == LOOPBACK {
                    dest_label.clone()
                } else {
                    match self.routing_graph.next_hop(rid, &iface) {
                        Some(nh) => nh.to_string(),
                        None => continue,
                    }
                };
                let (money, failed) = if iface == LOOPBACK {
                    (0, false)
                } else {
                    find_edge(current_graph, rid, &nh, &iface).map(|e| (e.revenue, e.failed)).unwrap_or((0, false))
                };
                fwd.node(rid);
                fwd.node(&nh);
                let u = fwd.index[rid];
                let v = fwd.index[&nh];
                fwd.graph.add_edge(u, v, FwdEdge { revenue: money, failed });
                if nh == dest_label && self.is_customer(rid) {
                    fwd.customer_dest.insert(dest_label.clone(), rid.clone());
                }
            }
        }
        fwd
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_per_dest_revenues(
        &self,
        dest: &Ipv4Net,
        physical_graph: &DiGraph<String, GraphEdge>,
        fwd: &ForwardingGraph,
        route_table: &BTreeMap<RouterId, BTreeMap<Ipv4Net, AsPath>>,
        all_router_ids: &[RouterId],
        paths_revenues: &mut HashMap<(RouterId, Ipv4Net), Vec<(i64, Vec<String>)>>,
        fined: &mut HashMap<(RouterId, Ipv4Net), String>,
    ) {
        let dest_label = dest.to_string();
        for r in all_router_ids {
            let entry = paths_revenues.entry((r.clone(), *dest)).or_default();
            let Some(&r_idx) = fwd.index.get(r) else {
                // No forwarding entry at all for this destination.
                if self.is_customer(r) {
                    entry.push((PEN_BLACKHOLE, vec![r.clone()]));
                    fined.insert((r.clone(), *dest), format!("no forwarding path from customer {} to {}", r, dest));
                } else if let Some(origin) = fwd.customer_dest.get(&dest_label) {
                    let mut failed_customer = true;
                    for egp in self.egp_asns.keys() {
                        if let Some(e) = find_edge(physical_graph, egp, origin, "") {
                            if !e.failed {
                                failed_customer = false;
                            }
                        } else if let Some(_e) = find_edge_any_iface(physical_graph, egp, origin) {
                            failed_customer = false;
                        }
                    }
                    if !failed_customer {
                        let unique = route_table.get(origin).and_then(|m| m.get(dest)).map(|p| p.unique_as_count()).unwrap_or(0);
                        if unique > 1 {
                            entry.push((PEN_BLACKHOLE, vec![r.clone()]));
                            fined.insert((r.clone(), *dest), format!("no forwarding path from {} to customer destination {}", r, dest));
                        }
                    }
                }
                continue;
            };

            let Some(&dest_idx) = fwd.index.get(&dest_label) else {
                entry.push((PEN_BLACKHOLE, vec![r.clone()]));
                fined.insert((r.clone(), *dest), format!("no forwarding path from {} to {}", r, dest));
                continue;
            };

            let paths: Vec<Vec<NodeIndex>> = petgraph::algo::all_simple_paths(&fwd.graph, r_idx, dest_idx, 0, None).collect();
            if paths.is_empty() {
                entry.push((PEN_BLACKHOLE, vec![r.clone()]));
                fined.insert((r.clone(), *dest), format!("no forwarding path from {} to {}", r, dest));
                continue;
            }
            for path in paths {
                let labels: Vec<String> = path.iter().map(|n| fwd.graph[*n].clone()).collect();
                if !labels.iter().any(|n| self.egp_asns.contains_key(n)) {
                    continue;
                }
                let revenue = self.compute_revenue_for_path(r, dest, &labels, fwd, route_table, fined);
                entry.push((revenue, labels));
            }
        }
    }

    fn compute_revenue_for_path(
        &self,
        start_router: &str,
        dest: &Ipv4Net,
        path: &[String],
        fwd: &ForwardingGraph,
        route_table: &BTreeMap<RouterId, BTreeMap<Ipv4Net, AsPath>>,
        fined: &mut HashMap<(RouterId, Ipv4Net), String>,
    ) -> i64 {
        if self.egp_asns.contains_key(&path[0]) {
            return 0;
        }
        if fined.contains_key(&(start_router.to_string(), *dest)) {
            return PEN_LIES;
        }
        let mut revenue = 0i64;
        let mut curr_aspath: Option<Vec<Asn>> =
            route_table.get(start_router).and_then(|m| m.get(dest)).map(|p| p.0.clone());

        for pair in path.windows(2) {
            let (u, v) = (&pair[0], &pair[1]);
            let (Some(uidx), Some(vidx)) = (fwd.index.get(u), fwd.index.get(v)) else { break };
            let Some(eidx) = fwd.graph.find_edge(*uidx, *vidx) else { break };
            let edge = &fwd.graph[eidx];
            revenue += edge.revenue;
            if edge.failed {
                fined.insert(
                    (start_router.to_string(), *dest),
                    format!("forwarding path from {} crosses failed link ({},{})", start_router, u, v),
                );
                revenue = PEN_LIES;
                break;
            } else if self.egp_asns.contains_key(u) {
                // EGP hops are trusted; no per-hop consistency check.
            } else {
                let u_aspath = route_table.get(u).and_then(|m| m.get(dest)).map(|p| p.0.clone());
                let consistent = match (&curr_aspath, &u_aspath) {
                    (Some(cp), Some(up)) => cp.len() >= up.len() && cp[..up.len()] == up[..],
                    (None, None) => true,
                    _ => false,
                };
                if !consistent {
                    fined.insert(
                        (start_router.to_string(), *dest),
                        format!("AS path from {} is not consistent with the actual path advertised by {}", start_router, u),
                    );
                    revenue = PEN_LIES;
                    break;
                }
            }
            if self.asn_of(u) != self.asn_of(v) {
                if let Some(cp) = curr_aspath.as_mut() {
                    if !cp.is_empty() {
                        cp.remove(0);
                    }
                }
            }
        }
        revenue
    }

    fn compute_revenues_per_source_destination(
        &self,
        current_graph: &DiGraph<String, GraphEdge>,
        route_table: &BTreeMap<RouterId, BTreeMap<Ipv4Net, AsPath>>,
        paths_revenues: &HashMap<(RouterId, Ipv4Net), Vec<(i64, Vec<String>)>>,
        fined: &HashMap<(RouterId, Ipv4Net), String>,
    ) -> i64 {
        let mut router_dest_advpeer: HashMap<(RouterId, Ipv4Net), (String, String)> = HashMap::new();
        let mut advpeer_traffic: HashMap<(String, String), (i64, i64)> = HashMap::new();
        let mut revenues_data: HashMap<(RouterId, Ipv4Net), (i64, i64, i64)> = HashMap::new();

        let mut keys: Vec<_> = paths_revenues.keys().cloned().collect();
        keys.sort();
        for (r, d) in keys {
            let Some(&sourced) = self.node_sourced.get(&r) else { continue };
            if sourced == 0 {
                continue;
            }
            let paths = &paths_revenues[&(r.clone(), d)];
            if paths.is_empty() {
                continue;
            }
            let mut sorted = paths.clone();
            sorted.sort_by_key(|(rev, _)| *rev);
            let (mut worst_rev, worst_path) = sorted[0].clone();
            if !fined.contains_key(&(r.clone(), d)) {
                worst_rev += COST_FORWARDING;
            }
            let attracted = self.node_attracted.get(&d.to_string()).copied().unwrap_or(0);
            let generated_traffic = sourced.min(attracted);

            for pair in worst_path.windows(2) {
                let (u, v) = (pair[0].clone(), pair[1].clone());
                if let Some(e) = find_edge(current_graph, &u, &v, "") {
                    if e.advanced_peer {
                        router_dest_advpeer.insert((r.clone(), d), (u.clone(), v.clone()));
                        let fwd_entry = advpeer_traffic.entry((u.clone(), v.clone())).or_insert((0, 0));
                        fwd_entry.0 += generated_traffic;
                        fwd_entry.1 += 1;
                        let back_entry = advpeer_traffic.entry((v, u)).or_insert((0, 0));
                        back_entry.0 -= generated_traffic;
                    }
                }
            }

            // `aspath_factor = 10 / unique_ASes` (`spec.md` §4.7 step 7),
            // kept as an exact `numer/denom` pair rather than pre-rounding it
            // to a fixed-point scalar, so the final contribution is a single
            // floored division instead of two truncations toward zero.
            let mut numer = 1i64;
            let mut denom = 1i64;
            if !fined.contains_key(&(r.clone(), d)) {
                if let Some(path) = route_table.get(&r).and_then(|m| m.get(&d)) {
                    let n = path.unique_as_count().max(1) as i64;
                    numer = 10;
                    denom = n;
                }
            }
            revenues_data.insert((r, d), (worst_rev, generated_traffic, numer, denom));
        }

        let mut total = 0i64;
        for ((r, d), (worst_rev, traffic, numer, denom)) in revenues_data {
            let contribution = if let Some((u, v)) = router_dest_advpeer.get(&(r.clone(), d)) {
                let (balance, count) = advpeer_traffic.get(&(u.clone(), v.clone())).copied().unwrap_or((0, 0));
                if balance <= 0 {
                    0
                } else {
                    (worst_rev * balance * numer).div_euclid(count.max(1) * denom)
                }
            } else {
                (worst_rev * traffic * numer).div_euclid(denom)
            };
            total += contribution;
        }
        total
    }

    /// Total revenue across all ticks minus twice the total number of
    /// control packets emitted (`spec.md` §4.7 "Report").
    pub fn total_revenue(&self, total_control_packets: u64) -> i64 {
        let checks: i64 = self.time2checks.values().sum();
        checks - 2 * total_control_packets as i64
    }

    /// Revenue recorded per tick, for reporting.
    pub fn time2checks(&self) -> &BTreeMap<u64, i64> {
        &self.time2checks
    }
}

fn find_edge<'a>(graph: &'a DiGraph<String, GraphEdge>, u: &str, v: &str, iface: &str) -> Option<&'a GraphEdge> {
    let u_idx = graph.node_indices().find(|&n| graph[n] == u)?;
    let v_idx = graph.node_indices().find(|&n| graph[n] == v)?;
    graph
        .edges_connecting(u_idx, v_idx)
        .map(|e| e.weight())
        .find(|e| iface.is_empty() || e.iface == iface)
        .or_else(|| graph.edges_connecting(u_idx, v_idx).map(|e| e.weight()).next())
}

fn find_edge_any_iface<'a>(graph: &'a DiGraph<String, GraphEdge>, u: &str, v: &str) -> Option<&'a GraphEdge> {
    find_edge(graph, u, v, "")
}

fn check_routing_graph(
    dest: &Ipv4Net,
    route_table: &BTreeMap<RouterId, BTreeMap<Ipv4Net, AsPath>>,
) -> BTreeMap<RouterId, Vec<String>> {
    let mut successors: BTreeMap<Asn, std::collections::BTreeSet<Asn>> = BTreeMap::new();
    let mut multi: Vec<(RouterId, Asn)> = Vec::new();
    for (r, routes) in route_table {
        let Some(path) = routes.get(dest) else { continue };
        for w in path.0.windows(2) {
            let (a, b) = (w[0], w[1]);
            let succs = successors.entry(a).or_default();
            succs.insert(b);
            if succs.len() > 1 {
                multi.push((r.clone(), a));
            }
        }
    }
    let mut result = BTreeMap::new();
    for (r, a) in multi {
        if let Some(succs) = successors.get(&a) {
            let edges: Vec<String> = succs.iter().map(|b| format!("{}->{}", a, b)).collect();
            result.insert(r, edges);
        }
    }
    result
}

fn compute_traffic_model(
    graph: &DiGraph<String, GraphEdge>,
    destinations: &std::collections::HashSet<String>,
    egp_asns: &HashMap<RouterId, Asn>,
) -> (HashMap<String, i64>, HashMap<String, i64>) {
    let mut sourced: HashMap<String, i64> = HashMap::new();
    let mut attracted: HashMap<String, i64> = HashMap::new();
    for eid in graph.edge_indices() {
        let (u, v) = graph.edge_endpoints(eid).unwrap();
        let u_label = graph[u].clone();
        let v_label = graph[v].clone();
        if !destinations.contains(&u_label) && !sourced.contains_key(&u_label) {
            let base = if egp_asns.contains_key(&u_label) { 0 } else { -COST_FORWARDING };
            sourced.insert(u_label.clone(), base);
        }
        if destinations.contains(&v_label) {
            if let Ok(net) = v_label.parse::<Ipv4Net>() {
                let traffic = 100 / (net.prefix_len() as i64 + 1);
                let cur = sourced.entry(u_label.clone()).or_insert(0);
                *cur = (*cur + traffic).min(100);
                attracted.insert(v_label.clone(), traffic);
            }
        }
    }
    (sourced, attracted)
}
