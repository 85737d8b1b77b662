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

//! End-to-end scenarios driving the full JSON-config -> [`Simulator`]
//! pipeline (`spec.md` §8 "End-to-end scenarios").

use pretty_assertions::assert_eq;

use crate::config;
use crate::simulator::Simulator;
use crate::types::LOOPBACK;

fn write_fixture(name: &str, contents: &str) -> String {
    let path = std::env::temp_dir().join(format!("egpsim-test-{}.json", name));
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

const EGP_EXT_FLAP_CONFIG: &str = r#"{
    "routers": [
        {"rId": "A", "ipAddress": "10.0.0.1", "routingProtocol": "EGP"},
        {"rId": "B", "ipAddress": "10.0.0.2", "routingProtocol": "ext"}
    ],
    "routingProtocols": {
        "EGP": {"all-routers": {
            "AS-ID": 1,
            "neighbours": {"A-eth0": "10.0.0.2"},
            "relations": {"A-eth0": "customer"}
        }},
        "ext": {"all-routers": {"AS-ID": 2, "relation": "customer"}}
    },
    "links": [
        {"id": "l0", "interfaces": ["A-eth0", "B-eth0"], "status": "up"}
    ],
    "events": [
        {"type": "advert", "time": 1, "router": "B", "prefix": "10.0.0.0/24", "AS-path": "2"},
        {"type": "downlink", "time": 5, "link": ["A-eth0", "B-eth0"]},
        {"type": "uplink", "time": 10, "link": ["A-eth0", "B-eth0"]},
        {"type": "stop", "time": 14}
    ]
}"#;

/// `spec.md` §8 scenario 1 ("straight triangle", narrowed to the two
/// routers that actually run a routing daemon) and scenario 2 ("link
/// flap"): an EGP router learns an EXT-advertised destination, installs
/// it in its FIB, loses it the tick a link goes down, and regains it once
/// the link comes back and the neighbour re-announces.
#[test]
fn egp_converges_on_ext_destination_and_recovers_from_a_link_flap() {
    let path = write_fixture("egp-ext-flap", EGP_EXT_FLAP_CONFIG);
    let cfg = config::load(&path).unwrap();
    let dest: ipnet::Ipv4Net = "10.0.0.0/24".parse().unwrap();
    let mut sim = Simulator::from_config(cfg);

    sim.step(1).unwrap();
    assert!(
        sim.routers()["A"].fib().get_entry(&dest).is_empty(),
        "tick 1: B has only just announced; the packet has not been delivered to A yet"
    );

    sim.step(2).unwrap();
    assert_eq!(sim.routers()["A"].fib().get_entry(&dest), vec!["A-eth0".to_string()]);
    assert_eq!(sim.routers()["B"].fib().get_entry(&dest), vec![LOOPBACK.to_string()]);

    for now in 3..=5 {
        sim.step(now).unwrap();
    }
    assert!(
        sim.routers()["A"].fib().get_entry(&dest).is_empty(),
        "tick 5: the downlink event fires this same tick; EGP withdraws immediately"
    );

    for now in 6..=12 {
        sim.step(now).unwrap();
    }
    assert_eq!(
        sim.routers()["A"].fib().get_entry(&dest),
        vec!["A-eth0".to_string()],
        "by tick 12 the uplink has been processed, B re-announced, and A re-selected the route"
    );
}

/// `spec.md` §4.4 export policy, exercised through the full pipeline
/// rather than a bare `EgpDaemon`: a route learned from a `provider` is
/// exported only to `customer`-relation neighbours.
#[test]
fn policy_export_reaches_only_the_customer_neighbour() {
    let path = write_fixture(
        "policy-export",
        r#"{
            "routers": [
                {"rId": "R", "ipAddress": "10.0.0.1", "routingProtocol": "EGP"},
                {"rId": "P", "ipAddress": "10.0.0.2", "routingProtocol": "ext"},
                {"rId": "C", "ipAddress": "10.0.0.3", "routingProtocol": "ext"}
            ],
            "routingProtocols": {
                "EGP": {"all-routers": {
                    "AS-ID": 1,
                    "neighbours": {"R-p": "10.0.0.2", "R-c": "10.0.0.3"},
                    "relations": {"R-p": "provider", "R-c": "customer"}
                }},
                "ext": {"all-routers": {"AS-ID": 500}, "C": {"AS-ID": 501}}
            },
            "links": [
                {"id": "l0", "interfaces": ["R-p", "P-eth0"], "status": "up"},
                {"id": "l1", "interfaces": ["R-c", "C-eth0"], "status": "up"}
            ],
            "events": [
                {"type": "advert", "time": 1, "router": "P", "prefix": "8.8.8.0/24", "AS-path": "500"},
                {"type": "stop", "time": 6}
            ]
        }"#,
    );

    let cfg = config::load(&path).unwrap();
    let dest: ipnet::Ipv4Net = "8.8.8.0/24".parse().unwrap();
    let mut sim = Simulator::from_config(cfg);
    for now in 1..=3 {
        sim.step(now).unwrap();
    }

    // R has learned the route from its provider P and installed it.
    assert_eq!(sim.routers()["R"].fib().get_entry(&dest), vec!["R-p".to_string()]);
    // C, the customer, has in turn received it from R.
    assert_eq!(sim.routers()["C"].fib().get_entry(&dest), vec!["C-eth0".to_string()]);
}
