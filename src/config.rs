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

//! JSON configuration loader: lowers the `routers`/`links`/`events` schema
//! of `spec.md` §6 into the core data structures, plus the static routing
//! graph the EGP checker needs (`spec.md` §4.7, §6).

use std::collections::{HashMap, VecDeque};

use ipnet::Ipv4Net;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Deserialize;
use serde_json::Value;

use crate::daemon::RoutingDaemon;
use crate::egp::{EgpDaemon, Relation};
use crate::error::ConfigError;
use crate::event::{DumpTarget, Event, EventOp};
use crate::ext::ExtDaemon;
use crate::link::Link;
use crate::router::Router;
use crate::types::{parse_cidr, AsPath, Asn, LinkId, RouterId};

#[derive(Debug, Deserialize)]
struct RawConfig {
    routers: Vec<RawRouter>,
    #[serde(rename = "routingProtocols", default)]
    routing_protocols: Value,
    links: Vec<RawLink>,
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawRouter {
    #[serde(rename = "rId")]
    r_id: String,
    #[serde(rename = "ipAddress")]
    ip_address: String,
    #[serde(rename = "routingProtocol")]
    routing_protocol: String,
    #[serde(rename = "updateInterval", default)]
    update_interval: Option<u64>,
    #[serde(default)]
    verbose: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    id: String,
    interfaces: [String; 2],
    status: String,
    #[serde(default)]
    properties: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    time: Value,
    #[serde(flatten)]
    rest: HashMap<String, Value>,
}

/// Per-edge metadata on the static routing graph (`spec.md` §4.7 step 1).
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Backing link id, if this edge represents a physical link rather
    /// than a local/destination attachment.
    pub link_id: Option<LinkId>,
    /// The full `"<router>-<iface>"` egress-interface identifier used to
    /// reach `v` from `u`, or [`crate::types::LOOPBACK`] for local
    /// attachments.
    pub iface: String,
    /// Graph weight (currently always 1; reserved for future IGP-style
    /// path cost weighting).
    pub weight: u32,
    /// Forward-direction revenue credited to `u` for carrying traffic to
    /// `v` over this edge.
    pub revenue: i64,
    /// True if this edge belongs to an asymmetric "advanced-peer" link.
    pub advanced_peer: bool,
    /// True if the backing link is currently down. Refreshed per tick by
    /// the checker, never by the loader.
    pub failed: bool,
}

/// Static (non-link-state) attributes the checker needs per graph node:
/// how much traffic it sources, and (if it's a destination) how much it
/// attracts.
#[derive(Debug, Clone, Default)]
pub struct NodeTraffic {
    /// Units of traffic this node originates towards destinations, or
    /// `None` if this node is not a traffic source (e.g. an EGP router).
    pub sourced: Option<i64>,
    /// Units of traffic attracted to this node, if it is a destination.
    pub attracted: Option<i64>,
}

/// The static routing graph plus derived checker inputs (`spec.md` §4.7,
/// §6 "routing graph").
#[derive(Debug, Clone)]
pub struct RoutingGraph {
    graph: DiGraph<String, GraphEdge>,
    index: HashMap<String, NodeIndex>,
    /// `(router, iface) -> next-hop node` for forwarding-graph
    /// reconstruction.
    iface_to_next_hop: HashMap<(String, String), String>,
    diameter: u64,
}

impl RoutingGraph {
    fn new() -> Self {
        RoutingGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
            iface_to_next_hop: HashMap::new(),
            diameter: 0,
        }
    }

    fn node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, from: &str, to: &str, edge: GraphEdge) {
        let u = self.node(from);
        let v = self.node(to);
        self.iface_to_next_hop.insert((from.to_string(), edge.iface.clone()), to.to_string());
        self.graph.add_edge(u, v, edge);
    }

    fn finalize_diameter(&mut self) {
        self.diameter = graph_diameter(&self.graph);
    }

    /// The convergence-grace diameter computed once at load time.
    pub fn diameter(&self) -> u64 {
        self.diameter
    }

    /// The underlying directed multigraph.
    pub fn graph(&self) -> &DiGraph<String, GraphEdge> {
        &self.graph
    }

    /// Node index lookup by id/IP/prefix string.
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Next hop reachable from `router` over `iface`.
    pub fn next_hop(&self, router: &str, iface: &str) -> Option<&str> {
        self.iface_to_next_hop.get(&(router.to_string(), iface.to_string())).map(|s| s.as_str())
    }
}

fn graph_diameter(graph: &DiGraph<String, GraphEdge>) -> u64 {
    let mut diameter = 0u64;
    for start in graph.node_indices() {
        let mut dist: HashMap<NodeIndex, u64> = HashMap::new();
        dist.insert(start, 0);
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(n) = queue.pop_front() {
            let d = dist[&n];
            for nb in graph.neighbors_undirected(n) {
                if let std::collections::hash_map::Entry::Vacant(e) = dist.entry(nb) {
                    e.insert(d + 1);
                    queue.push_back(nb);
                }
            }
        }
        if let Some(&mx) = dist.values().max() {
            diameter = diameter.max(mx);
        }
    }
    diameter
}

/// Everything the configuration loader produces (`spec.md` §6).
#[derive(Debug)]
pub struct Config {
    /// Loaded routers, keyed by id.
    pub routers: HashMap<RouterId, Router>,
    /// Loaded links, keyed by id.
    pub links: HashMap<LinkId, Link>,
    /// Scheduled events, in file order.
    pub events: Vec<Event>,
    /// Stop time set by the `stop` event, if any (defaults to 1, matching
    /// a configuration with no `stop` event running zero ticks).
    pub stop_time: u64,
    /// The static routing graph for the checker.
    pub routing_graph: RoutingGraph,
    /// External destination prefixes named by `advert`/`addprivatepath`
    /// events, sorted.
    pub destinations: Vec<Ipv4Net>,
    /// `ext` router id -> (ASN, raw relation string).
    pub ext_routers: HashMap<RouterId, (Asn, Option<String>)>,
    /// `EGP` router id -> ASN.
    pub egp_routers: HashMap<RouterId, Asn>,
}

fn obj_get<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.as_object().and_then(|m| m.get(key))
}

fn merged_params(routing_protocols: &Value, proto: &str, router_id: &str) -> serde_json::Map<String, Value> {
    let mut merged = serde_json::Map::new();
    if let Some(proto_params) = obj_get(routing_protocols, proto) {
        if let Some(all) = obj_get(proto_params, "all-routers").and_then(|v| v.as_object()) {
            merged.extend(all.clone());
        }
        if let Some(specific) = obj_get(proto_params, router_id).and_then(|v| v.as_object()) {
            merged.extend(specific.clone());
        }
    }
    merged
}

fn parse_as_path(s: &str) -> AsPath {
    AsPath::parse(s).unwrap_or_default()
}

/// Parse and lower a JSON configuration file (`spec.md` §6).
pub fn load(path: &str) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?;
    let raw: RawConfig = serde_json::from_str(&text)?;

    let mut routers = HashMap::new();
    let mut ext_routers = HashMap::new();
    let mut egp_routers = HashMap::new();
    let mut graph = RoutingGraph::new();

    for r in &raw.routers {
        let verbose = matches!(&r.verbose, Some(Value::String(s)) if s == "True");
        let update_interval = r.update_interval.filter(|&v| v > 1).unwrap_or(1);
        let params = merged_params(&raw.routing_protocols, &r.routing_protocol, &r.r_id);

        let daemon = match r.routing_protocol.as_str() {
            "IGP" => {
                graph.add_edge(
                    &r.r_id,
                    &r.ip_address,
                    GraphEdge {
                        link_id: None,
                        iface: crate::types::LOOPBACK.to_string(),
                        weight: 1,
                        revenue: 0,
                        advanced_peer: false,
                        failed: false,
                    },
                );
                RoutingDaemon::Igp
            }
            "ext" => {
                let asn = params
                    .get("AS-ID")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ConfigError::MissingParameter { router_id: r.r_id.clone(), field: "AS-ID".to_string() })?;
                let relation = params.get("relation").and_then(|v| v.as_str()).map(|s| s.to_string());
                ext_routers.insert(r.r_id.clone(), (Asn(asn as u32), relation));
                RoutingDaemon::Ext(ExtDaemon::new(r.r_id.clone(), Asn(asn as u32), r.ip_address.clone(), verbose))
            }
            "EGP" => {
                let asn = params
                    .get("AS-ID")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ConfigError::MissingParameter { router_id: r.r_id.clone(), field: "AS-ID".to_string() })?;
                egp_routers.insert(r.r_id.clone(), Asn(asn as u32));
                let neighbours: HashMap<String, String> = params
                    .get("neighbours")
                    .and_then(|v| v.as_object())
                    .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
                    .unwrap_or_default();
                let relations: HashMap<String, Relation> = params
                    .get("relations")
                    .and_then(|v| v.as_object())
                    .map(|m| {
                        m.iter()
                            .filter_map(|(k, v)| v.as_str().and_then(Relation::parse).map(|rel| (k.clone(), rel)))
                            .collect()
                    })
                    .unwrap_or_default();
                RoutingDaemon::Egp(EgpDaemon::new(r.r_id.clone(), Asn(asn as u32), r.ip_address.clone(), neighbours, relations, verbose))
            }
            other => {
                return Err(ConfigError::UnknownProtocol { router_id: r.r_id.clone(), protocol: other.to_string() });
            }
        };

        let router = Router::new(r.r_id.clone(), r.ip_address.clone(), daemon, HashMap::new(), update_interval);
        routers.insert(r.r_id.clone(), router);
    }

    let mut links = HashMap::new();
    for l in &raw.links {
        let (r0, _i0) = l.interfaces[0]
            .split_once('-')
            .ok_or_else(|| ConfigError::MalformedLinkInterface { link_id: l.id.clone() })?;
        let (r1, _i1) = l.interfaces[1]
            .split_once('-')
            .ok_or_else(|| ConfigError::MalformedLinkInterface { link_id: l.id.clone() })?;

        let up = match l.status.as_str() {
            "up" => true,
            "down" => false,
            _ => return Err(ConfigError::MalformedLinkInterface { link_id: l.id.clone() }),
        };

        let link = Link::new(
            l.id.clone(),
            r0.to_string(),
            l.interfaces[0].clone(),
            r1.to_string(),
            l.interfaces[1].clone(),
            l.properties.clone(),
            up,
        );
        links.insert(l.id.clone(), link);

        if let Some(router) = routers.get_mut(r0) {
            router.interfaces_mut().insert(l.interfaces[0].clone(), l.id.clone());
        }
        if let Some(router) = routers.get_mut(r1) {
            router.interfaces_mut().insert(l.interfaces[1].clone(), l.id.clone());
        }

        let revenues = crate::link::get_revenues(&l.properties);
        graph.add_edge(
            r0,
            r1,
            GraphEdge {
                link_id: Some(l.id.clone()),
                iface: l.interfaces[0].clone(),
                weight: 1,
                revenue: revenues.forward,
                advanced_peer: revenues.advanced_peer,
                failed: false,
            },
        );
        graph.add_edge(
            r1,
            r0,
            GraphEdge {
                link_id: Some(l.id.clone()),
                iface: l.interfaces[1].clone(),
                weight: 1,
                revenue: revenues.backward,
                advanced_peer: revenues.advanced_peer,
                failed: false,
            },
        );
    }

    let mut events = Vec::new();
    let mut stop_time = 1u64;
    let mut destinations: std::collections::BTreeSet<Ipv4Net> = std::collections::BTreeSet::new();

    for (idx, e) in raw.events.iter().enumerate() {
        let time = e.time.as_u64().unwrap_or(0);
        match e.kind.as_str() {
            "send" => {
                let src = e.rest.get("src").and_then(|v| v.as_str()).ok_or_else(|| ConfigError::UnknownRouter { time, router_id: "<missing src>".to_string() })?;
                let dst = e.rest.get("dest").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let ttl = e.rest.get("ttl").and_then(|v| v.as_i64()).map(|v| v as i32);
                events.push(Event::new(time, EventOp::Send { src: src.to_string(), dst, ttl }));
            }
            "uplink" | "downlink" => {
                let link = e.rest.get("link").and_then(|v| v.as_array()).ok_or_else(|| ConfigError::UnknownLink { time, link: format!("event #{idx}") })?;
                let iface0 = link.first().and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let iface1 = link.get(1).and_then(|v| v.as_str()).unwrap_or_default().to_string();
                events.push(Event::new(time, EventOp::SetLinkState { iface0, iface1, up: e.kind == "uplink" }));
            }
            "newlinkproperties" => {
                let link_id = e.rest.get("link").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let properties: HashMap<String, String> = e
                    .rest
                    .get("properties")
                    .and_then(|v| v.as_object())
                    .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
                    .unwrap_or_default();
                events.push(Event::new(time, EventOp::NewLinkProperties { link_id, properties }));
            }
            "stop" => {
                stop_time = time;
            }
            "dumpfib" => {
                let target = e.rest.get("args").and_then(|v| v.as_str()).unwrap_or("all");
                events.push(Event::new(time, EventOp::DumpFib(DumpTarget::parse(target))));
            }
            "dumpstats" => {
                let target = e.rest.get("args").and_then(|v| v.as_str()).unwrap_or("all");
                events.push(Event::new(time, EventOp::DumpStats(DumpTarget::parse(target))));
            }
            "advert" | "addprivatepath" => {
                let router = e.rest.get("router").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let prefix_field = e.rest.get("prefix").and_then(|v| v.as_str()).unwrap_or_default();
                let as_path_str = e.rest.get("AS-path").and_then(|v| v.as_str()).unwrap_or_default();
                let prefixes: Vec<Ipv4Net> = prefix_field.split_whitespace().filter_map(parse_cidr).collect();
                for p in &prefixes {
                    destinations.insert(*p);
                    graph.add_edge(
                        &router,
                        &p.to_string(),
                        GraphEdge {
                            link_id: None,
                            iface: crate::types::LOOPBACK.to_string(),
                            weight: 1,
                            revenue: 0,
                            advanced_peer: false,
                            failed: false,
                        },
                    );
                }
                let as_path = parse_as_path(as_path_str);
                let op = if e.kind == "advert" {
                    EventOp::Advert { router, prefixes, as_path }
                } else {
                    EventOp::AddPrivatePath { router, prefixes, as_path }
                };
                events.push(Event::new(time, op));
            }
            other => return Err(ConfigError::UnknownEventType(other.to_string(), time)),
        }
    }

    graph.finalize_diameter();

    Ok(Config {
        routers,
        links,
        events,
        stop_time,
        routing_graph: graph,
        destinations: destinations.into_iter().collect(),
        ext_routers,
        egp_routers,
    })
}
