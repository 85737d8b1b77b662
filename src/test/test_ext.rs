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

use crate::daemon::InterfaceState;
use crate::error::DaemonError;
use crate::ext::ExtDaemon;
use crate::forwarding_table::ForwardingTable;
use crate::packet::Payload;
use crate::types::{AsPath, Asn, LOOPBACK};

fn up(iface: &str) -> InterfaceState {
    InterfaceState { iface: iface.to_string(), up: true }
}

fn down(iface: &str) -> InterfaceState {
    InterfaceState { iface: iface.to_string(), up: false }
}

fn path(s: &str) -> AsPath {
    AsPath::parse(s).unwrap()
}

fn update_payload(speaker: &str, prefix: &str, as_path: &str) -> Payload {
    let mut p = Payload::new();
    p.add_entry(format!("speaker: {}", speaker));
    p.add_entry(format!("EGP-update prefix: {} AS-path: {}", prefix, as_path));
    p
}

fn withdrawal_payload(speaker: &str, prefix: &str) -> Payload {
    let mut p = Payload::new();
    p.add_entry(format!("speaker: {}", speaker));
    p.add_entry(format!("EGP-withdrawal prefix: {}", prefix));
    p
}

#[test]
fn newly_seeded_public_default_is_announced_on_the_interface() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    d.add_remote_destination(&mut fib, "10.0.0.0/24".parse().unwrap(), path("900 5 5"));

    let pkt = d.generate_routing_packet("E-eth0").expect("must announce the freshly seeded default");
    assert!(pkt
        .payload()
        .entries()
        .iter()
        .any(|l| l == "EGP-update prefix: 10.0.0.0/24 AS-path: 900 5 5"));
}

#[test]
fn local_destination_ignores_neighbour_learned_route() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    // A single-ASN default marks this prefix as a local destination.
    d.add_remote_destination(&mut fib, "10.0.0.0/24".parse().unwrap(), path("900"));

    d.process_routing_packet(&mut fib, "E-eth0", &update_payload("10.1.1.1", "10.0.0.0/24", "7 8")).unwrap();

    assert_eq!(d.get_current_routes()[&"10.0.0.0/24".parse().unwrap()], path("900"));
}

#[test]
fn private_destination_shadows_neighbour_learned_route() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    d.add_private_destination(&mut fib, "10.0.0.0/24".parse().unwrap(), path("900 3 3"));

    d.process_routing_packet(&mut fib, "E-eth0", &update_payload("10.1.1.1", "10.0.0.0/24", "7 8")).unwrap();

    assert_eq!(d.get_current_routes()[&"10.0.0.0/24".parse().unwrap()], path("900 3 3"));
    assert_eq!(fib.get_entry(&"10.0.0.0/24".parse().unwrap()), vec![LOOPBACK.to_string()]);
}

#[test]
fn private_default_is_never_announced() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    d.add_private_destination(&mut fib, "10.0.0.0/24".parse().unwrap(), path("900 3 3"));

    assert!(d.generate_routing_packet("E-eth0").is_none());
}

#[test]
fn genuine_neighbour_route_is_installed_and_announced() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    // No default seeded: the prefix is neither local nor private-shadowed,
    // so the neighbour's own path is installed as-is.
    d.process_routing_packet(&mut fib, "E-eth0", &update_payload("10.1.1.1", "10.0.0.0/24", "7 8")).unwrap();

    assert_eq!(fib.get_entry(&"10.0.0.0/24".parse().unwrap()), vec!["E-eth0".to_string()]);
}

#[test]
fn withdrawal_of_the_active_route_falls_back_to_the_default() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    d.add_remote_destination(&mut fib, "10.0.0.0/24".parse().unwrap(), path("900 5 5"));
    d.generate_routing_packet("E-eth0"); // drain the initial announcement

    // A different, non-default route from a transit speaker takes over...
    d.process_routing_packet(&mut fib, "E-eth0", &update_payload("10.1.1.1", "10.0.0.0/24", "7 8")).unwrap();
    assert_eq!(fib.get_entry(&"10.0.0.0/24".parse().unwrap()), vec!["E-eth0".to_string()]);

    // ...and withdrawing it falls back to the seeded default.
    d.process_routing_packet(&mut fib, "E-eth0", &withdrawal_payload("10.1.1.1", "10.0.0.0/24")).unwrap();
    assert_eq!(d.get_current_routes()[&"10.0.0.0/24".parse().unwrap()], path("900 5 5"));
    assert_eq!(fib.get_entry(&"10.0.0.0/24".parse().unwrap()), vec![LOOPBACK.to_string()]);
}

#[test]
fn link_down_flushes_state_and_restores_every_default_locally() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();
    d.add_remote_destination(&mut fib, "10.0.0.0/24".parse().unwrap(), path("900 5 5"));
    d.process_routing_packet(&mut fib, "E-eth0", &update_payload("10.1.1.1", "10.0.0.0/24", "7 8")).unwrap();

    d.update(&mut fib, &[down("E-eth0")], 2).unwrap();

    assert_eq!(d.get_current_routes()[&"10.0.0.0/24".parse().unwrap()], path("900 5 5"));
    assert_eq!(fib.get_entry(&"10.0.0.0/24".parse().unwrap()), vec![LOOPBACK.to_string()]);
}

#[test]
fn second_interface_is_rejected() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();

    let err = d.update(&mut fib, &[up("E-eth1")], 2).unwrap_err();
    assert!(matches!(err, DaemonError::MultiInterfaceExt(_)));
}

#[test]
fn simultaneous_interfaces_in_one_call_are_rejected() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();

    let err = d.update(&mut fib, &[up("E-eth0"), up("E-eth1")], 1).unwrap_err();
    assert!(matches!(err, DaemonError::MultiInterfaceExt(_)));
}

#[test]
fn duplicate_prefix_in_one_packet_is_a_fatal_error() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();

    let mut payload = update_payload("10.1.1.1", "10.0.0.0/24", "7");
    payload.add_entry("EGP-update prefix: 10.0.0.0/24 AS-path: 8");
    let err = d.process_routing_packet(&mut fib, "E-eth0", &payload).unwrap_err();
    assert!(matches!(err, DaemonError::DuplicatePrefixInPacket { .. }));
}

#[test]
fn unrecognized_payload_line_is_malformed() {
    let mut d = ExtDaemon::new("E", Asn(900), "10.0.0.1", false);
    let mut fib = ForwardingTable::new();
    d.update(&mut fib, &[up("E-eth0")], 1).unwrap();

    let mut payload = Payload::new();
    payload.add_entry("speaker: 10.1.1.1");
    payload.add_entry("not-a-real-directive");
    let err = d.process_routing_packet(&mut fib, "E-eth0", &payload).unwrap_err();
    assert!(matches!(err, DaemonError::MalformedPayload { .. }));
}
