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

use pretty_assertions::assert_eq;

use crate::config;
use crate::error::ConfigError;
use crate::event::EventOp;

fn write_fixture(name: &str, contents: &str) -> String {
    let path = std::env::temp_dir().join(format!("egpsim-test-{}.json", name));
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn loads_igp_ext_and_egp_daemons_by_protocol() {
    let path = write_fixture(
        "protocol-dispatch",
        r#"{
            "routers": [
                {"rId": "I", "ipAddress": "10.0.0.1", "routingProtocol": "IGP"},
                {"rId": "E", "ipAddress": "10.0.0.2", "routingProtocol": "ext"},
                {"rId": "G", "ipAddress": "10.0.0.3", "routingProtocol": "EGP"}
            ],
            "routingProtocols": {
                "ext": {"all-routers": {"AS-ID": 500, "relation": "customer"}},
                "EGP": {"all-routers": {"AS-ID": 1, "neighbours": {}, "relations": {}}}
            },
            "links": [],
            "events": []
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    assert!(cfg.routers["I"].daemon().is_igp());
    assert!(cfg.routers["E"].daemon().as_ext().is_some());
    assert!(cfg.routers["G"].daemon().as_egp().is_some());
    assert_eq!(cfg.ext_routers["E"], (crate::types::Asn(500), Some("customer".to_string())));
    assert_eq!(cfg.egp_routers["G"], crate::types::Asn(1));
}

#[test]
fn unknown_protocol_is_rejected() {
    let path = write_fixture(
        "unknown-protocol",
        r#"{
            "routers": [{"rId": "X", "ipAddress": "10.0.0.1", "routingProtocol": "OSPF"}],
            "links": [],
            "events": []
        }"#,
    );

    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownProtocol { .. }));
}

#[test]
fn missing_as_id_parameter_is_rejected() {
    let path = write_fixture(
        "missing-as-id",
        r#"{
            "routers": [{"rId": "G", "ipAddress": "10.0.0.1", "routingProtocol": "EGP"}],
            "links": [],
            "events": []
        }"#,
    );

    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::MissingParameter { .. }));
}

#[test]
fn per_router_override_wins_over_all_routers_default() {
    let path = write_fixture(
        "per-router-override",
        r#"{
            "routers": [
                {"rId": "E1", "ipAddress": "10.0.0.1", "routingProtocol": "ext"},
                {"rId": "E2", "ipAddress": "10.0.0.2", "routingProtocol": "ext"}
            ],
            "routingProtocols": {
                "ext": {
                    "all-routers": {"AS-ID": 500, "relation": "customer"},
                    "E2": {"AS-ID": 600}
                }
            },
            "links": [],
            "events": []
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    assert_eq!(cfg.ext_routers["E1"].0, crate::types::Asn(500));
    assert_eq!(cfg.ext_routers["E2"].0, crate::types::Asn(600));
    // The override only replaces AS-ID; "relation" still comes from all-routers.
    assert_eq!(cfg.ext_routers["E2"].1, Some("customer".to_string()));
}

#[test]
fn links_wire_up_interfaces_and_the_routing_graph() {
    let path = write_fixture(
        "links-wire-up",
        r#"{
            "routers": [
                {"rId": "A", "ipAddress": "10.0.0.1", "routingProtocol": "IGP"},
                {"rId": "B", "ipAddress": "10.0.0.2", "routingProtocol": "IGP"}
            ],
            "links": [
                {"id": "l0", "interfaces": ["A-eth0", "B-eth0"], "status": "up",
                 "properties": {"revenues": "3;7"}}
            ],
            "events": []
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    assert_eq!(cfg.routers["A"].interfaces()["A-eth0"], "l0".to_string());
    assert_eq!(cfg.routers["B"].interfaces()["B-eth0"], "l0".to_string());

    let a_idx = cfg.routing_graph.index_of("A").unwrap();
    let b_idx = cfg.routing_graph.index_of("B").unwrap();
    let forward = cfg.routing_graph.graph().edges_connecting(a_idx, b_idx).next().unwrap();
    assert_eq!(forward.weight().revenue, 3);
    assert!(forward.weight().advanced_peer);
    let backward = cfg.routing_graph.graph().edges_connecting(b_idx, a_idx).next().unwrap();
    assert_eq!(backward.weight().revenue, 7);
}

#[test]
fn malformed_link_interface_is_rejected() {
    let path = write_fixture(
        "malformed-link",
        r#"{
            "routers": [],
            "links": [{"id": "l0", "interfaces": ["noiface", "alsonoiface"], "status": "up"}],
            "events": []
        }"#,
    );

    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::MalformedLinkInterface { .. }));
}

#[test]
fn diameter_reflects_path_graph_length() {
    let path = write_fixture(
        "diameter",
        r#"{
            "routers": [
                {"rId": "A", "ipAddress": "10.0.0.1", "routingProtocol": "IGP"},
                {"rId": "B", "ipAddress": "10.0.0.2", "routingProtocol": "IGP"},
                {"rId": "C", "ipAddress": "10.0.0.3", "routingProtocol": "IGP"}
            ],
            "links": [
                {"id": "l0", "interfaces": ["A-eth0", "B-eth0"], "status": "up"},
                {"id": "l1", "interfaces": ["B-eth1", "C-eth0"], "status": "up"}
            ],
            "events": []
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    // Each router also hangs a pendant edge to its own IP address, so the
    // longest shortest path runs IP(A)-A-B-C-IP(C): 4 hops.
    assert_eq!(cfg.routing_graph.diameter(), 4);
}

#[test]
fn advert_event_registers_destination_and_graph_attachment() {
    let path = write_fixture(
        "advert-event",
        r#"{
            "routers": [{"rId": "E", "ipAddress": "10.0.0.1", "routingProtocol": "ext"}],
            "routingProtocols": {"ext": {"all-routers": {"AS-ID": 500}}},
            "links": [],
            "events": [
                {"type": "advert", "time": 0, "router": "E", "prefix": "8.8.8.0/24", "AS-path": "500 6"}
            ]
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    assert_eq!(cfg.destinations, vec!["8.8.8.0/24".parse().unwrap()]);
    match &cfg.events[0].op() {
        EventOp::Advert { router, prefixes, as_path } => {
            assert_eq!(router, "E");
            assert_eq!(prefixes, &vec!["8.8.8.0/24".parse().unwrap()]);
            assert_eq!(as_path.render(), "500 6");
        }
        other => panic!("expected an Advert event, got {other:?}"),
    }
    assert!(cfg.routing_graph.index_of("8.8.8.0/24").is_some());
}

#[test]
fn unknown_event_type_is_rejected() {
    let path = write_fixture(
        "unknown-event",
        r#"{
            "routers": [],
            "links": [],
            "events": [{"type": "not-a-real-event", "time": 0}]
        }"#,
    );

    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownEventType(..)));
}

#[test]
fn stop_event_sets_stop_time_without_scheduling_an_event() {
    let path = write_fixture(
        "stop-event",
        r#"{
            "routers": [],
            "links": [],
            "events": [{"type": "stop", "time": 42}]
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    assert_eq!(cfg.stop_time, 42);
    assert!(cfg.events.is_empty());
}
