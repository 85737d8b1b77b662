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

use std::collections::HashMap;

use pretty_assertions::assert_eq;

use crate::daemon::RoutingDaemon;
use crate::link::Link;
use crate::packet::{Packet, PacketKind};
use crate::router::Router;
use crate::types::LOOPBACK;

fn router_with_link(id: &str, iface: &str, link_id: &str) -> (Router, HashMap<String, Link>) {
    let mut ifaces = HashMap::new();
    ifaces.insert(iface.to_string(), link_id.to_string());
    let router = Router::new(id, "10.0.0.1", RoutingDaemon::Igp, ifaces, 1);
    let mut links = HashMap::new();
    links.insert(
        link_id.to_string(),
        Link::new(link_id.to_string(), id.to_string(), iface.to_string(), "B".to_string(), "B-eth0".to_string(), HashMap::new(), true),
    );
    (router, links)
}

#[test]
fn loopback_destination_is_consumed_not_forwarded() {
    let (mut router, mut links) = router_with_link("A", "A-eth0", "l0");
    router.fib_mut().set_entry_local("10.0.0.1/32".parse().unwrap());
    let pkt = Packet::new_data("x", "10.0.0.1");
    router.send(pkt, None, None, &mut links);
    assert_eq!(router.counters().1, 1); // received
    assert_eq!(links["l0"].queue_length(0, false), 0);
}

#[test]
fn down_link_drops_the_packet() {
    let (mut router, mut links) = router_with_link("A", "A-eth0", "l0");
    links.get_mut("l0").unwrap().set_state(false);
    router.send(Packet::new_data("x", "y"), Some("A-eth0"), None, &mut links);
    assert_eq!(router.counters().3, 1); // dropped
}

#[test]
fn expired_ttl_drops_and_emits_icmp_back_to_source() {
    let (mut router, mut links) = router_with_link("A", "A-eth0", "l0");
    let mut pkt = Packet::new_data("10.0.0.9", "10.0.0.1");
    pkt.set_ttl(0);
    pkt.set_source_port(12345);
    pkt.set_sequence_number(7);
    // Arrives on some other (unsuppressed) interface; forwarding out A-eth0.
    router.send(pkt, Some("A-eth0"), Some("A-eth1"), &mut links);
    assert_eq!(router.counters().3, 1); // dropped

    let icmp = links.get_mut("l0").unwrap();
    icmp.move_packets();
    let reply = icmp.dequeue("B");
    // The link moved the ICMP out A-eth0 toward the source; but since the
    // only neighbour on this link is B, it ends up in B's inbound queue
    // (there is no router object for "10.0.0.9" in this unit test, so we
    // only assert on the packet shape).
    let reply = reply.unwrap();
    assert_eq!(reply.kind(), PacketKind::Icmp);
    assert_eq!(reply.destination(), "10.0.0.9");
    assert_eq!(reply.destination_port(), 12345);
    assert_eq!(reply.sequence_number(), 7);
}

#[test]
fn icmp_is_suppressed_on_configured_interfaces() {
    let (mut router, mut links) = router_with_link("A", "A-eth0", "l0");
    router.suppress_icmp_on("A-eth1");
    let mut pkt = Packet::new_data("10.0.0.9", "10.0.0.1");
    pkt.set_ttl(0);
    router.send(pkt, Some("A-eth0"), Some("A-eth1"), &mut links);
    links.get_mut("l0").unwrap().move_packets();
    assert!(links.get_mut("l0").unwrap().dequeue("B").is_none());
}

#[test]
fn ecmp_choice_is_deterministic_across_calls() {
    let mut ifaces = HashMap::new();
    ifaces.insert("A-eth0".to_string(), "l0".to_string());
    ifaces.insert("A-eth1".to_string(), "l1".to_string());
    let mut router = Router::new("A", "10.0.0.1", RoutingDaemon::Igp, ifaces, 1);
    router
        .fib_mut()
        .set_entry("8.8.8.0/24".parse().unwrap(), vec!["A-eth0".to_string(), "A-eth1".to_string()]);

    let mut links = HashMap::new();
    links.insert("l0".to_string(), Link::new("l0".to_string(), "A".to_string(), "A-eth0".to_string(), "B".to_string(), "B-eth0".to_string(), HashMap::new(), true));
    links.insert("l1".to_string(), Link::new("l1".to_string(), "A".to_string(), "A-eth1".to_string(), "C".to_string(), "C-eth0".to_string(), HashMap::new(), true));

    let mut pkt = Packet::new_data("1.2.3.4", "8.8.8.8");
    pkt.set_source_port(50000);
    pkt.set_destination_port(8080);
    router.send(pkt.clone(), None, None, &mut links);
    let first_choice =
        if links["l0"].queue_length(0, false) == 1 { "A-eth0" } else { "A-eth1" };

    // Reset and resend the identical packet: same five-tuple must pick the
    // same interface every time (spec.md's deterministic ECMP tie-break).
    links.get_mut("l0").unwrap().move_packets();
    links.get_mut("l0").unwrap().dequeue("B");
    links.get_mut("l1").unwrap().move_packets();
    links.get_mut("l1").unwrap().dequeue("C");

    router.send(pkt, None, None, &mut links);
    let second_choice =
        if links["l0"].queue_length(0, false) == 1 { "A-eth0" } else { "A-eth1" };

    assert_eq!(first_choice, second_choice);
}

#[test]
fn loopback_constant_is_not_a_real_interface() {
    assert_eq!(LOOPBACK, "LOOPBACK");
}
