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

//! Access control rules and how they match a probe.

use std::collections::BTreeSet;

use ipnet::IpNet;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::fw_result::FwResult;
use crate::match_result::MatchResult;
use crate::probe::{PortSpec, Probe, Protocol};
use crate::types::IpNetExt;

/// What a rule does with a matching probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Let the probe pass
    Accept,
    /// Drop the probe
    Deny,
    /// Record the match and continue with the next rule (e.g. logging rules)
    Match,
}

impl Action {
    /// Verdict of the action for a probe that is certainly matched.
    pub fn verdict(&self) -> FwResult {
        match self {
            Self::Accept => FwResult::ACCEPT,
            Self::Deny => FwResult::DENY,
            Self::Match => FwResult::MATCH,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Accept => "accept",
            Self::Deny => "deny",
            Self::Match => "match",
        })
    }
}

/// Direction of a leg through an equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ingress leg
    In,
    /// Egress leg
    Out,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Out => "out",
        })
    }
}

/// A filtering rule. Every missing field matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    /// Action taken on matching probes
    pub action: Action,
    /// Leg the rule applies to, both if `None`
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Interface the rule applies to, all if `None`
    #[serde(default)]
    pub iface: Option<String>,
    /// Source network
    #[serde(default)]
    pub source: Option<IpNet>,
    /// Destination network
    #[serde(default)]
    pub destination: Option<IpNet>,
    /// Protocols
    #[serde(default)]
    pub protocols: Option<BTreeSet<Protocol>>,
    /// Source ports
    #[serde(default)]
    pub source_port: Option<PortSpec>,
    /// Destination ports
    #[serde(default)]
    pub dest_port: Option<PortSpec>,
    /// Only match probes of established connections
    #[serde(default)]
    pub established: bool,
}

impl AclRule {
    /// Rule with the given action that matches everything.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            direction: None,
            iface: None,
            source: None,
            destination: None,
            protocols: None,
            source_port: None,
            dest_port: None,
            established: false,
        }
    }

    /// Restrict the rule to one leg.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Restrict the rule to one interface.
    pub fn iface(mut self, iface: impl Into<String>) -> Self {
        self.iface = Some(iface.into());
        self
    }

    /// Restrict the source network.
    pub fn from(mut self, source: IpNet) -> Self {
        self.source = Some(source);
        self
    }

    /// Restrict the destination network.
    pub fn to(mut self, destination: IpNet) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Restrict the protocols.
    pub fn protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.protocols = Some(protocols.into_iter().collect());
        self
    }

    /// Restrict the destination ports.
    pub fn dest_port(mut self, port: PortSpec) -> Self {
        self.dest_port = Some(port);
        self
    }

    /// Returns `true` if the rule is bound to this leg and interface.
    pub fn applies_to(&self, direction: Direction, iface: &str) -> bool {
        self.direction.map(|d| d == direction).unwrap_or(true)
            && self.iface.as_deref().map(|i| i == iface).unwrap_or(true)
    }

    /// Test the probe against the rule. The result is `All` if every field certainly matches,
    /// `Not` if one field certainly does not, and `Match` otherwise.
    pub fn matches(&self, probe: &Probe) -> MatchResult {
        let request = probe.request();
        let state = match (self.established, request.options.state) {
            (false, _) | (true, true) => MatchResult::All,
            (true, false) => MatchResult::Not,
        };
        intersect([
            match_net(self.source, probe.source()),
            match_net(self.destination, probe.destination()),
            match_protocols(self.protocols.as_ref(), request.protocols.as_ref()),
            match_ports(self.source_port, request.source_port),
            match_ports(self.dest_port, request.dest_port),
            state,
        ])
    }

    /// Verdict of this rule for a probe, `None` if it does not match. A partial match makes the
    /// verdict uncertain.
    pub fn verdict(&self, probe: &Probe) -> Option<FwResult> {
        match self.matches(probe) {
            MatchResult::Not => None,
            MatchResult::All => Some(self.action.verdict()),
            MatchResult::Match | MatchResult::Unknown => {
                Some(self.action.verdict() | FwResult::MAY)
            }
        }
    }
}

impl std::fmt::Display for AclRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let any = || "any".to_string();
        write!(
            f,
            "{} {} {}",
            self.action,
            self.direction.map(|d| d.to_string()).unwrap_or_else(|| "on".to_string()),
            self.iface.as_deref().unwrap_or("*"),
        )?;
        if let Some(p) = &self.protocols {
            write!(f, " proto {}", p.iter().join(","))?;
        }
        write!(
            f,
            " from {} to {}",
            self.source.map(|n| n.to_string()).unwrap_or_else(any),
            self.destination.map(|n| n.to_string()).unwrap_or_else(any),
        )?;
        if let Some(p) = self.source_port {
            write!(f, " sport {}", p)?;
        }
        if let Some(p) = self.dest_port {
            write!(f, " dport {}", p)?;
        }
        if self.established {
            f.write_str(" established")?;
        }
        Ok(())
    }
}

/// Combine the results of all fields of a rule.
fn intersect<I: IntoIterator<Item = MatchResult>>(results: I) -> MatchResult {
    results
        .into_iter()
        .fold(MatchResult::All, |acc, r| match (acc, r) {
            (MatchResult::Not, _) | (_, MatchResult::Not) => MatchResult::Not,
            (MatchResult::Unknown, _) | (_, MatchResult::Unknown) => MatchResult::Unknown,
            (MatchResult::All, MatchResult::All) => MatchResult::All,
            _ => MatchResult::Match,
        })
}

fn match_net(rule: Option<IpNet>, value: IpNet) -> MatchResult {
    match rule {
        None => MatchResult::All,
        Some(net) if net.same_version(&value) && net.contains(&value) => MatchResult::All,
        Some(net) if net.overlaps(&value) => MatchResult::Match,
        Some(_) => MatchResult::Not,
    }
}

fn match_protocols(
    rule: Option<&BTreeSet<Protocol>>,
    value: Option<&BTreeSet<Protocol>>,
) -> MatchResult {
    match (rule, value) {
        (None, _) => MatchResult::All,
        (Some(_), None) => MatchResult::Match,
        (Some(r), Some(v)) if v.is_subset(r) => MatchResult::All,
        (Some(r), Some(v)) if v.is_disjoint(r) => MatchResult::Not,
        _ => MatchResult::Match,
    }
}

fn match_ports(rule: Option<PortSpec>, value: Option<PortSpec>) -> MatchResult {
    match (rule, value) {
        (None, _) => MatchResult::All,
        (Some(_), None) => MatchResult::Match,
        (Some(r), Some(v)) if r.contains(&v) => MatchResult::All,
        (Some(r), Some(v)) if r.overlaps(&v) => MatchResult::Match,
        _ => MatchResult::Not,
    }
}
