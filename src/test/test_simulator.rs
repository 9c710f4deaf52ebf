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
use maplit::btreeset;

use crate::{
    acl::{AclRule, Action, Direction},
    equipment::Equipment,
    fw_result::FwResult,
    network::Network,
    probe::{ProbeOptions, ProbeRequest, RoutingResult},
    report::Report,
    routing::Route,
    simulator::{Options, Simulator},
    tracker::ProbesTracker,
    types::{IpNetExt, LinkId, ProbeError, ProbeId},
};

fn run(net: &Network, options: &Options, source: IpNet, destination: IpNet) -> ProbesTracker {
    let probing = Simulator::new(net, options)
        .probe(source, destination, ProbeRequest::any()).unwrap();
    assert_eq!(probing.len(), 1);
    probing.trackers()[0].clone()
}

fn events(tracker: &ProbesTracker, id: usize) -> Vec<String> {
    tracker.probe(ProbeId(id)).results().events().to_vec()
}

#[generic_tests::define]
mod t {
    use super::*;
    use crate::test::{diamond, line, Family, V4, V6};
    use pretty_assertions::assert_eq;

    #[test]
    fn routed<F: Family>() {
        let (net, _, _) = line::<F>();
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth1[{}]) r2(eth0-eth1[{}])", F::host(1, 2), F::net(2))
        ]);
        assert_eq!(t.len(), 3);
        assert_eq!(events(&t, 2), vec!["destination reached".to_string()]);
        assert!(t.killed_probes().is_empty());
        assert!(t.looping_probes().is_empty());
        assert_eq!(t.probe(ProbeId(0)).ttl(), 63);
        assert_eq!(t.probe(ProbeId(2)).ttl(), 62);
    }

    #[test]
    fn routed_backwards<F: Family>() {
        let (net, _, _) = line::<F>();
        let t = run(&net, &Options::default(), F::host(2, 5), F::host(0, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r2(eth1-eth0[{}]) r1(eth1-eth0[{}])", F::host(1, 1), F::net(0))
        ]);
    }

    #[test]
    fn subnet_probe<F: Family>() {
        let (net, _, _) = line::<F>();
        let t = run(&net, &Options::default(), F::net(0), F::net(2));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth1[{}]) r2(eth0-eth1[{}])", F::host(1, 2), F::net(2))
        ]);
    }

    #[test]
    fn injected_on_equipment<F: Family>() {
        let (net, _, _) = line::<F>();
        let options = Options::default();
        let probing = Simulator::new(&net, &options)
            .probe_from("r2", F::host(1, 5), F::host(2, 5), ProbeRequest::any()).unwrap();
        let t = &probing.trackers()[0];
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r2(eth0-eth1[{}])", F::net(2))
        ]);
    }

    #[test]
    fn own_address<F: Family>() {
        let (net, _, _) = line::<F>();
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(1, 2));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth1[{}]) r2(eth0-)", F::net(1))
        ]);
        assert_eq!(t.final_probes(), &btreeset! {ProbeId(1)});

        // the address of the ingress interface itself
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(0, 1));
        assert_eq!(t.final_probes(), &btreeset! {ProbeId(0)});
        assert_eq!(t.routing_result(), RoutingResult::Routed);
    }

    #[test]
    fn no_route<F: Family>() {
        let (net, _, _) = line::<F>();
        let ext = F::external(0, 5).host();
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY, final: []);
        assert_eq!(t.killed_probes(), &btreeset! {ProbeId(0)});
        assert_eq!(events(&t, 0), vec![format!("No route to {}", ext)]);
        assert_eq!(
            t.probe(ProbeId(0)).results().routing_result(),
            RoutingResult::NotRouted
        );
    }

    #[test]
    fn null_route<F: Family>() {
        let (mut net, r1, _) = line::<F>();
        let ext = F::external(0, 5).host();
        net.add_route(r1, ext.trunc_to(8), None, None, 1).unwrap();
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY);
    }

    #[test]
    fn route_without_link<F: Family>() {
        let (mut net, r1, _) = line::<F>();
        let ext = F::external(0, 5).host();
        let dangling =
            Route::new(F::external(0, 1).trunc(), Some(F::host(1, 2)), 1, Some(LinkId::new(42)));
        net.get_equipment_mut(r1)
            .unwrap()
            .routing_table_mut()
            .add_route(dangling.unwrap());
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY, final: []);
        assert_eq!(t.killed_probes(), &btreeset! {ProbeId(0)});
        assert_eq!(t.leaves(), vec![ProbeId(0)]);
        assert_eq!(events(&t, 0), vec![format!("No route to {}", ext)]);
    }

    #[test]
    fn host_not_found<F: Family>() {
        let (mut net, r1, _) = line::<F>();
        let ext = F::external(0, 5).host();
        net.add_route(r1, F::external(0, 1).trunc(), Some(F::host(1, 9)), None, 1).unwrap();
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY);
        assert_eq!(events(&t, 1), vec![format!("host not found: {}", F::host(1, 9))]);

        // on a border segment, unknown next hops lead out of the network
        net.set_border(F::net(1), true);
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth1[{}])", F::host(1, 9))
        ]);
        assert_eq!(events(&t, 1), vec!["destination (border) reached".to_string()]);
    }

    #[test]
    fn indirect_route<F: Family>() {
        let (mut net, r1, r2) = line::<F>();
        let ext = F::external(0, 5).host();
        net.add_route(r1, F::external(0, 1).trunc(), Some(F::host(2, 1)), None, 1).unwrap();
        net.add_route(r2, F::external(0, 1).trunc(), None, Some("eth1"), 1).unwrap();

        // the destination is not on net 2
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY);
        assert_eq!(events(&t, 2), vec![format!("host not found: {}", ext)]);

        net.set_border(F::net(2), true);
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth1[{}]) r2(eth0-eth1[{}])", F::host(1, 2), F::net(2))
        ]);
        assert_eq!(events(&t, 2), vec!["destination (border) reached".to_string()]);
    }

    #[test]
    fn gateway_added_before_interface<F: Family>() {
        let mut net = Network::new();
        let r1 = net.add_equipment(Equipment::router("r1")).unwrap();
        let r2 = net.add_equipment(Equipment::router("r2")).unwrap();
        net.add_iface(r1, "eth0", F::iface(0, 1)).unwrap();
        // no interface of r1 covers the gateway yet
        net.add_route(r1, F::external(0, 1).trunc(), Some(F::host(1, 2)), None, 1).unwrap();
        net.add_iface(r1, "eth1", F::iface(1, 1)).unwrap();
        net.add_iface(r2, "eth0", F::iface(1, 2)).unwrap();
        net.add_iface(r2, "eth1", F::external(0, 1)).unwrap();

        let t = run(&net, &Options::default(), F::host(0, 5), F::external(0, 5).host());
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!(
                "r1(eth0-eth1[{}]) r2(eth0-eth1[{}])",
                F::host(1, 2),
                F::external(0, 1).trunc()
            )
        ]);
        assert_eq!(events(&t, 2), vec!["destination reached".to_string()]);
    }

    #[test]
    fn bounce_back<F: Family>() {
        let (mut net, r1, r2) = line::<F>();
        let ext = F::external(0, 5).host();
        net.add_route(r1, F::external(0, 1).trunc(), Some(F::host(1, 2)), None, 1).unwrap();
        net.add_route(r2, F::external(0, 1).trunc(), Some(F::host(1, 1)), None, 1).unwrap();
        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::Unknown, acl: FwResult::MAY, final: []);
        assert_eq!(t.looping_probes(), &btreeset! {ProbeId(2)});
        assert_eq!(
            events(&t, 2),
            vec!["same incoming and outgoing link".to_string()]
        );
    }

    #[test]
    fn forwarding_loop<F: Family>() {
        let mut net = Network::new();
        let r1 = net.add_equipment(Equipment::router("r1")).unwrap();
        let r2 = net.add_equipment(Equipment::router("r2")).unwrap();
        let r3 = net.add_equipment(Equipment::router("r3")).unwrap();
        net.add_iface(r1, "eth0", F::iface(0, 1)).unwrap();
        net.add_iface(r1, "eth1", F::iface(1, 1)).unwrap();
        net.add_iface(r1, "eth2", F::iface(4, 2)).unwrap();
        net.add_iface(r2, "eth0", F::iface(1, 2)).unwrap();
        net.add_iface(r2, "eth1", F::iface(3, 1)).unwrap();
        net.add_iface(r3, "eth0", F::iface(3, 2)).unwrap();
        net.add_iface(r3, "eth1", F::iface(4, 1)).unwrap();
        let ext = F::external(0, 5).host();
        for (r, nh) in [(r1, F::host(1, 2)), (r2, F::host(3, 2)), (r3, F::host(4, 2))] {
            net.add_route(r, F::external(0, 1).trunc(), Some(nh), None, 1).unwrap();
        }

        let t = run(&net, &Options::default(), F::host(0, 5), ext);
        check_probe!(net, t, routing: RoutingResult::Unknown, acl: FwResult::MAY, final: []);
        assert_eq!(t.looping_probes(), &btreeset! {ProbeId(4)});
        assert_eq!(
            events(&t, 4),
            vec!["loop detected, same state as probe #1".to_string()]
        );
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn time_to_live<F: Family>() {
        let (net, _, _) = line::<F>();
        let options = Options {
            time_to_live: 1,
            ..Default::default()
        };
        let t = run(&net, &options, F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY);
        assert_eq!(t.killed_probes(), &btreeset! {ProbeId(1)});
        assert_eq!(events(&t, 1), vec!["TimeToLive expiration".to_string()]);
        assert_eq!(
            t.probe(ProbeId(1)).results().routing_result(),
            RoutingResult::Killed
        );

        let options = Options {
            time_to_live: 2,
            ..Default::default()
        };
        let t = run(&net, &options, F::host(0, 5), F::host(2, 5));
        assert_eq!(t.routing_result(), RoutingResult::Routed);
    }

    #[test]
    fn max_hops<F: Family>() {
        let (net, _, _) = line::<F>();
        let options = Options {
            max_hops: Some(0),
            ..Default::default()
        };
        let t = run(&net, &options, F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::NotRouted, acl: FwResult::MAY);
        assert_eq!(events(&t, 1), vec!["max hop count reached".to_string()]);

        let options = Options {
            max_hops: Some(1),
            ..Default::default()
        };
        let t = run(&net, &options, F::host(0, 5), F::host(2, 5));
        assert_eq!(t.routing_result(), RoutingResult::Routed);
    }

    #[test]
    fn ecmp<F: Family>() {
        let (mut net, [r1, _, r3]) = diamond::<F>();
        net.add_route(r1, F::net(2), Some(F::host(1, 2)), None, 1).unwrap();
        net.add_route(r1, F::net(2), Some(F::host(3, 2)), None, 1).unwrap();
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth1[{}]) r2(eth0-eth1[{}])", F::host(1, 2), F::net(2)),
            format!("r1(eth0-eth2[{}]) r3(eth0-eth1[{}])", F::host(3, 2), F::net(2))
        ]);

        // one branch is filtered
        net.get_equipment_mut(r3).unwrap().add_acl(
            AclRule::new(Action::Deny)
                .direction(Direction::Out)
                .iface("eth1"),
        );
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(2, 5));
        let result = t.acl_result();
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::MAY | FwResult::DENY);
        assert!(!result.is_certainly_accept() && !result.is_certainly_deny());
        assert_eq!(t.final_probes().len(), 2);
    }

    #[test]
    fn source_route<F: Family>() {
        let (mut net, [r1, _, _]) = diamond::<F>();
        net.add_route(r1, F::net(2), Some(F::host(1, 2)), None, 1).unwrap();
        net.add_source_route(r1, F::net(0), Some(F::host(3, 2)), None, 1).unwrap();
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::ACCEPT, final: [
            format!("r1(eth0-eth2[{}]) r3(eth0-eth1[{}])", F::host(3, 2), F::net(2))
        ]);
    }

    #[test]
    fn filtered<F: Family>() {
        let (mut net, _, r2) = line::<F>();
        net.get_equipment_mut(r2).unwrap().add_acl(
            AclRule::new(Action::Deny)
                .direction(Direction::In)
                .iface("eth0"),
        );
        let t = run(&net, &Options::default(), F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::DENY, final: [
            format!("r1(eth0-eth1[{}]) r2(eth0-eth1[{}])", F::host(1, 2), F::net(2))
        ]);
    }

    #[test]
    fn quick_deny<F: Family>() {
        let (mut net, _, r2) = line::<F>();
        net.get_equipment_mut(r2).unwrap().add_acl(
            AclRule::new(Action::Deny)
                .direction(Direction::In)
                .iface("eth0"),
        );
        let stopped = [format!("r1(eth0-eth1[{}]) r2(eth0-)", F::host(1, 2))];

        let options = Options {
            quick_deny: true,
            ..Default::default()
        };
        let t = run(&net, &options, F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::DENY, final: [
            stopped[0]
        ]);
        assert_eq!(events(&t, 1), vec!["quick denied".to_string()]);
        assert_eq!(
            t.probe(ProbeId(1)).results().routing_result(),
            RoutingResult::NotRouted
        );

        // on the request
        let request = ProbeRequest::any().options(ProbeOptions {
            quick_deny: true,
            ..Default::default()
        });
        let options = Options::default();
        let probing = Simulator::new(&net, &options)
            .probe(F::host(0, 5), F::host(2, 5), request).unwrap();
        let t = &probing.trackers()[0];
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::DENY, final: [
            stopped[0]
        ]);

        // on the equipment
        net.get_equipment_mut(r2).unwrap().set_quick_deny(true);
        let t = run(&net, &options, F::host(0, 5), F::host(2, 5));
        check_probe!(net, t, routing: RoutingResult::Routed, acl: FwResult::DENY, final: [
            stopped[0]
        ]);
    }

    #[test]
    fn injection_errors<F: Family>() {
        let (net, _, _) = line::<F>();
        let options = Options::default();
        let sim = Simulator::new(&net, &options);
        let ext = F::external(0, 5).host();
        assert_eq!(
            sim.probe(ext, F::host(2, 5), ProbeRequest::any()).unwrap_err(),
            ProbeError::NoNetworkMatches(ext)
        );
        assert_eq!(
            sim.probe(F::host(1, 5), F::host(2, 5), ProbeRequest::any())
                .unwrap_err(),
            ProbeError::TooManyLinks(F::host(1, 5))
        );
        assert_eq!(
            sim.probe_from("r9", F::host(0, 5), F::host(2, 5), ProbeRequest::any())
                .unwrap_err(),
            ProbeError::EquipmentNotFound("r9".to_string())
        );
        assert_eq!(
            sim.start_probe(LinkId::new(42), F::host(0, 5), F::host(2, 5), ProbeRequest::any())
                .unwrap_err(),
            ProbeError::LinkNotFound(LinkId::new(42))
        );
    }

    #[instantiate_tests(<V4>)]
    mod ipv4 {}

    #[instantiate_tests(<V6>)]
    mod ipv6 {}
}

#[test]
fn address_family_mismatch() {
    let (net, _, _) = crate::test::line::<crate::test::V4>();
    let options = Options::default();
    let err = Simulator::new(&net, &options)
        .start_probe(
            LinkId::new(0),
            ip!("10.0.0.5/32"),
            ip!("2001:db8::5/128"),
            ProbeRequest::any(),
        )
        .unwrap_err();
    pretty_assertions::assert_eq!(
        err,
        ProbeError::AddressFamilyMismatch(ip!("10.0.0.5/32"), ip!("2001:db8::5/128"))
    );
}

#[test]
fn report() {
    let (net, _, _) = crate::test::line::<crate::test::V4>();
    let options = Options::default();
    let probing = Simulator::new(&net, &options)
        .probe(ip!("10.0.0.5/32"), ip!("10.0.2.5/32"), ProbeRequest::any()).unwrap();
    let report = Report::new(&net, false).show_probing(&probing);
    assert!(report.contains("-------- Routed probes --------\n"));
    assert!(!report.contains("Killed probes"));
    assert!(report.contains("  r1(eth0-eth1[10.0.1.2/32])\n  r2(eth0-eth1[10.0.2.0/24])\n"));
    assert!(report.contains("r1 ()\n"));
    assert!(report.contains("Active ACL on input: eth0\n"));
    assert!(report.ends_with("Global ACL result is: ACCEPT\nGlobal routing result is: ROUTED\n"));

    let verbose = Report::new(&net, true).show_probing(&probing);
    assert!(verbose.contains("Routing Result: ROUTED destination reached\n"));
    assert!(verbose.contains("Matching ACL on output: eth1\n"));
}
