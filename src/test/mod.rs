// Probesim: Static firewall probe simulator written in Rust
// Copyright (C) 2023 The Probesim Authors
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

use ipnet::IpNet;

use crate::{
    equipment::Equipment,
    formatter::ProbePath,
    network::Network,
    tracker::ProbesTracker,
    types::{EquipmentId, IpNetExt, ProbeId},
};

/// Address family used by generic tests.
pub(crate) trait Family {
    /// Interface address `host` on network number `net`, with the prefix length of the network.
    fn iface(net: u8, host: u8) -> IpNet;

    /// Address outside of every network built with [`Family::iface`].
    fn external(net: u8, host: u8) -> IpNet;

    /// Aggregate containing all networks built with [`Family::iface`].
    fn aggregate() -> IpNet;

    /// Host address `host` on network number `net`.
    fn host(net: u8, host: u8) -> IpNet {
        Self::iface(net, host).host()
    }

    /// Network number `net`.
    fn net(net: u8) -> IpNet {
        Self::iface(net, 1).trunc()
    }
}

pub(crate) struct V4;
pub(crate) struct V6;

impl Family for V4 {
    fn iface(net: u8, host: u8) -> IpNet {
        format!("10.0.{}.{}/24", net, host).parse().unwrap()
    }

    fn external(net: u8, host: u8) -> IpNet {
        format!("172.16.{}.{}/24", net, host).parse().unwrap()
    }

    fn aggregate() -> IpNet {
        "10.0.0.0/16".parse().unwrap()
    }
}

impl Family for V6 {
    fn iface(net: u8, host: u8) -> IpNet {
        format!("2001:db8:0:{:x}::{:x}/64", net, host).parse().unwrap()
    }

    fn external(net: u8, host: u8) -> IpNet {
        format!("2001:db8:ff:{:x}::{:x}/64", net, host).parse().unwrap()
    }

    fn aggregate() -> IpNet {
        "2001:db8::/48".parse().unwrap()
    }
}

macro_rules! ip {
    ($s:expr) => {
        $s.parse::<ipnet::IpNet>().unwrap()
    };
}

/// Two routers in a row: `net 0 -- r1 -- net 1 -- r2 -- net 2`. Both routers know the network
/// on the far side.
pub(crate) fn line<F: Family>() -> (Network, EquipmentId, EquipmentId) {
    let mut net = Network::new();
    let r1 = net.add_equipment(Equipment::router("r1")).unwrap();
    let r2 = net.add_equipment(Equipment::router("r2")).unwrap();
    net.add_iface(r1, "eth0", F::iface(0, 1)).unwrap();
    net.add_iface(r1, "eth1", F::iface(1, 1)).unwrap();
    net.add_iface(r2, "eth0", F::iface(1, 2)).unwrap();
    net.add_iface(r2, "eth1", F::iface(2, 1)).unwrap();
    net.add_route(r1, F::net(2), Some(F::host(1, 2)), None, 1).unwrap();
    net.add_route(r2, F::net(0), Some(F::host(1, 1)), None, 1).unwrap();
    (net, r1, r2)
}

/// Two parallel paths from net 0 to net 2: `r1 -- net 1 -- r2` and `r1 -- net 3 -- r3`. Only the
/// connected routes are installed.
pub(crate) fn diamond<F: Family>() -> (Network, [EquipmentId; 3]) {
    let mut net = Network::new();
    let r1 = net.add_equipment(Equipment::router("r1")).unwrap();
    let r2 = net.add_equipment(Equipment::router("r2")).unwrap();
    let r3 = net.add_equipment(Equipment::router("r3")).unwrap();
    net.add_iface(r1, "eth0", F::iface(0, 1)).unwrap();
    net.add_iface(r1, "eth1", F::iface(1, 1)).unwrap();
    net.add_iface(r1, "eth2", F::iface(3, 1)).unwrap();
    net.add_iface(r2, "eth0", F::iface(1, 2)).unwrap();
    net.add_iface(r2, "eth1", F::iface(2, 1)).unwrap();
    net.add_iface(r3, "eth0", F::iface(3, 2)).unwrap();
    net.add_iface(r3, "eth1", F::iface(2, 2)).unwrap();
    (net, [r1, r2, r3])
}

/// Paths of a set of probes, sorted.
pub(crate) fn paths<'a>(
    net: &Network,
    tracker: &ProbesTracker,
    probes: impl IntoIterator<Item = &'a ProbeId>,
) -> Vec<String> {
    use crate::formatter::NetworkFormatter;
    let mut paths: Vec<String> = probes
        .into_iter()
        .map(|id| ProbePath::new(tracker, *id).fmt(net))
        .collect();
    paths.sort();
    paths
}

macro_rules! check_probe {
    ($net:expr, $tracker:expr, routing: $routing:expr, acl: $acl:expr) => {
        pretty_assertions::assert_eq!($tracker.routing_result(), $routing);
        pretty_assertions::assert_eq!($tracker.acl_result(), $acl);
    };
    ($net:expr, $tracker:expr, routing: $routing:expr, acl: $acl:expr, final: [$($f:expr),*]) => {
        check_probe!($net, $tracker, routing: $routing, acl: $acl);
        let exp: Vec<String> = vec![$($f.to_string()),*];
        pretty_assertions::assert_eq!(
            crate::test::paths(&$net, &$tracker, $tracker.final_probes()),
            exp
        );
    };
}

mod test_equipment;
mod test_fw_result;
mod test_simulator;
