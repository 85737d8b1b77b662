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

use crate::forwarding_table::ForwardingTable;
use crate::types::LOOPBACK;

#[test]
fn longest_prefix_match_wins() {
    let mut fib = ForwardingTable::new();
    fib.set_entry("10.0.0.0/8".parse().unwrap(), vec!["r-eth0".to_string()]);
    fib.set_entry("10.0.1.0/24".parse().unwrap(), vec!["r-eth1".to_string()]);

    assert_eq!(fib.get_next_hops("10.0.1.5".parse().unwrap()), vec!["r-eth1".to_string()]);
    assert_eq!(fib.get_next_hops("10.0.2.5".parse().unwrap()), vec!["r-eth0".to_string()]);
}

#[test]
fn no_match_is_empty_not_an_error() {
    let fib = ForwardingTable::new();
    assert!(fib.get_next_hops("192.168.0.1".parse().unwrap()).is_empty());
}

#[test]
fn set_then_remove_counts_as_two_writes() {
    let mut fib = ForwardingTable::new();
    let cidr = "10.0.0.0/24".parse().unwrap();
    fib.set_entry(cidr, vec!["r-eth0".to_string()]);
    fib.remove_entry(&cidr);
    assert_eq!(fib.get_total_writes(), 2);
    assert!(fib.get_entry(&cidr).is_empty());
}

#[test]
fn set_entry_local_installs_loopback() {
    let mut fib = ForwardingTable::new();
    let cidr = "10.0.0.1/32".parse().unwrap();
    fib.set_entry_local(cidr);
    assert_eq!(fib.get_entry(&cidr), vec![LOOPBACK.to_string()]);
}
