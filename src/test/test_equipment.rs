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

use pretty_assertions::assert_eq;
use test_log::test;

use crate::{
    acl::{AclRule, Action, Direction},
    equipment::{Equipment, EquipmentKind},
    fw_result::FwResult,
    match_result::MatchResult,
    probe::{PortSpec, Probe, ProbeOptions, ProbeRequest},
    tracker::ProbesTracker,
    types::LinkId,
};

fn probe(source: &str, destination: &str, request: ProbeRequest) -> Probe {
    let t = ProbesTracker::new(ip!(source), ip!(destination), request, 64, LinkId::new(0));
    t.probe(t.root()).clone()
}

fn ssh() -> ProbeRequest {
    ProbeRequest::any()
        .protocols([6])
        .dest_port(PortSpec::single(22))
}

fn deny_ssh() -> AclRule {
    AclRule::new(Action::Deny)
        .protocols([6])
        .dest_port(PortSpec::single(22))
}

#[test]
fn rule_display() {
    let rule = AclRule::new(Action::Accept)
        .direction(Direction::In)
        .iface("eth0")
        .protocols([6])
        .from(ip!("10.0.0.0/24"))
        .dest_port(PortSpec::single(80));
    assert_eq!(
        rule.to_string(),
        "accept in eth0 proto 6 from 10.0.0.0/24 to any dport 80"
    );
    assert_eq!(
        AclRule::new(Action::Deny).to(ip!("10.0.1.0/24")).to_string(),
        "deny on * from any to 10.0.1.0/24"
    );
}

#[test]
fn rule_matches() {
    let p = probe("10.0.0.0/24", "10.0.1.5/32", ProbeRequest::any());
    assert_eq!(AclRule::new(Action::Accept).matches(&p), MatchResult::All);
    assert_eq!(
        AclRule::new(Action::Accept).from(ip!("10.0.0.0/16")).matches(&p),
        MatchResult::All
    );
    assert_eq!(
        AclRule::new(Action::Accept).from(ip!("10.0.0.0/25")).matches(&p),
        MatchResult::Match
    );
    assert_eq!(
        AclRule::new(Action::Accept).to(ip!("10.0.2.0/24")).matches(&p),
        MatchResult::Not
    );
    assert_eq!(deny_ssh().matches(&p), MatchResult::Match);

    let p = probe("10.0.0.5/32", "10.0.1.5/32", ssh());
    assert_eq!(deny_ssh().matches(&p), MatchResult::All);
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any().protocols([17]));
    assert_eq!(deny_ssh().matches(&p), MatchResult::Not);
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any().protocols([6, 17]));
    assert_eq!(deny_ssh().verdict(&p), Some(FwResult::MAY | FwResult::DENY));
}

#[test]
fn rule_established() {
    let mut rule = AclRule::new(Action::Accept);
    rule.established = true;
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any());
    assert_eq!(rule.matches(&p), MatchResult::Not);
    assert_eq!(rule.verdict(&p), None);
    let state = ProbeOptions {
        state: true,
        ..Default::default()
    };
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any().options(state));
    assert_eq!(rule.matches(&p), MatchResult::All);
}

#[test]
fn rule_binding() {
    let rule = AclRule::new(Action::Deny)
        .direction(Direction::In)
        .iface("eth0");
    assert!(rule.applies_to(Direction::In, "eth0"));
    assert!(!rule.applies_to(Direction::Out, "eth0"));
    assert!(!rule.applies_to(Direction::In, "eth1"));
    assert!(AclRule::new(Action::Deny).applies_to(Direction::Out, "eth7"));

    let mut r = Equipment::router("r");
    r.add_acl(rule);
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any());
    assert_eq!(r.evaluate_ingress_acl("eth0", &p).result, FwResult::DENY);
    assert_eq!(r.evaluate_ingress_acl("eth1", &p).result, FwResult::ACCEPT);
    assert_eq!(r.evaluate_egress_acl("eth0", &p).result, FwResult::ACCEPT);
}

#[test]
fn router_last_match() {
    let mut r = Equipment::router("r");
    r.add_acl(AclRule::new(Action::Accept));
    r.add_acl(AclRule::new(Action::Deny).to(ip!("10.0.1.0/24")));

    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any());
    let eval = r.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::DENY);
    assert_eq!(eval.matching.len(), 2);
    assert_eq!(eval.active.len(), 1);
    assert_eq!(eval.active[0].text, "deny on * from any to 10.0.1.0/24");

    let p = probe("10.0.0.5/32", "10.0.2.5/32", ProbeRequest::any());
    let eval = r.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::ACCEPT);
    assert_eq!(eval.active[0].text, "accept on * from any to any");
}

#[test]
fn router_no_rule() {
    let mut r = Equipment::router("r");
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any());
    assert_eq!(r.evaluate_egress_acl("eth0", &p).result, FwResult::ACCEPT);

    // match rules are recorded but never decide
    r.add_acl(AclRule::new(Action::Match));
    let eval = r.evaluate_egress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::ACCEPT);
    assert_eq!(eval.matching.len(), 1);
    assert!(eval.active.is_empty());
}

#[test]
fn firewall_first_match() {
    let mut fw = Equipment::firewall("fw", Action::Deny);
    fw.add_acl(deny_ssh());
    fw.add_acl(AclRule::new(Action::Accept).protocols([6, 17]));

    let p = probe("10.0.0.5/32", "10.0.1.5/32", ssh());
    let eval = fw.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::DENY);
    assert_eq!(eval.active.len(), 1);

    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any().protocols([17]));
    let eval = fw.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::ACCEPT);
    assert_eq!(eval.matching.len(), 1);
}

#[test]
fn firewall_soft_match() {
    let mut fw = Equipment::firewall("fw", Action::Deny);
    fw.add_acl(deny_ssh());
    fw.add_acl(AclRule::new(Action::Accept));

    // any tcp port: the deny rule only partially matches
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any().protocols([6]));
    let eval = fw.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::MAY | FwResult::DENY);
    assert_eq!(eval.matching.len(), 2);
    assert_eq!(eval.active.len(), 2);
}

#[test]
fn firewall_default() {
    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any());

    let fw = Equipment::firewall("fw", Action::Deny);
    let eval = fw.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::DENY);
    assert_eq!(eval.active[0].text, "default deny");

    let fw = Equipment::firewall("fw", Action::Match);
    let eval = fw.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::ACCEPT);
    assert_eq!(eval.active[0].text, "default match");

    // a soft accept falls through to the default deny
    let mut fw = Equipment::firewall("fw", Action::Deny);
    fw.add_acl(AclRule::new(Action::Accept).protocols([6]));
    let eval = fw.evaluate_ingress_acl("eth0", &p);
    assert_eq!(eval.result, FwResult::MAY | FwResult::ACCEPT);
    assert_eq!(eval.active.len(), 2);
}

#[test]
fn firewall_match_rules() {
    let mut fw = Equipment::firewall("fw", Action::Accept);
    fw.add_acl(AclRule::new(Action::Match));
    fw.add_acl(AclRule::new(Action::Deny).to(ip!("10.0.1.0/24")));

    let p = probe("10.0.0.5/32", "10.0.1.5/32", ProbeRequest::any());
    let eval = fw.evaluate_egress_acl("eth1", &p);
    assert_eq!(eval.result, FwResult::DENY);
    assert_eq!(eval.matching.len(), 2);
    assert_eq!(eval.active.len(), 1);
}

#[test]
fn equipment_attributes() {
    let mut fw = Equipment::firewall("fw", Action::Deny);
    assert_eq!(fw.name(), "fw");
    assert!(!fw.quick_deny());
    fw.set_quick_deny(true);
    fw.set_comment("border firewall");
    assert!(fw.quick_deny());
    assert_eq!(fw.comment(), "border firewall");
    assert!(matches!(
        fw.kind(),
        EquipmentKind::Firewall {
            default: Action::Deny,
            ..
        }
    ));
    assert!(fw.routing_table().is_empty());
}
