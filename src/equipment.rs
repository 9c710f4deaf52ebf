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

//! # Equipments
//!
//! An [`Equipment`] is a node of the topology that filters and routes probes. The set of
//! equipment kinds is closed ([`EquipmentKind`]); each kind only differs in how it evaluates its
//! rules for a leg.

use serde::{Deserialize, Serialize};

use crate::acl::{AclRule, Action, Direction};
use crate::fw_result::{reduce_fw_results, FwResult};
use crate::probe::{AccessControlList, AclEvaluation, Probe};
use crate::routing::RoutingTable;

/// A router or firewall.
#[derive(Debug, Clone, PartialEq)]
pub struct Equipment {
    name: String,
    comment: String,
    routing: RoutingTable,
    quick_deny: bool,
    kind: EquipmentKind,
}

/// The filtering behavior of an equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EquipmentKind {
    /// Plain router with a "last rule wins" filter. Probes matching no rule are accepted.
    Router {
        /// Filter rules
        #[serde(default)]
        acls: Vec<AclRule>,
    },
    /// Firewall with a "first rule wins" policy, terminated by a default action.
    Firewall {
        /// Ordered policy
        #[serde(default)]
        rules: Vec<AclRule>,
        /// Action applied when no rule decides
        default: Action,
    },
}

impl Equipment {
    /// Create a new equipment
    pub fn new(name: impl Into<String>, kind: EquipmentKind) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            routing: RoutingTable::new(),
            quick_deny: false,
            kind,
        }
    }

    /// Create a router without any filter
    pub fn router(name: impl Into<String>) -> Self {
        Self::new(name, EquipmentKind::Router { acls: Vec::new() })
    }

    /// Create a firewall with an empty policy
    pub fn firewall(name: impl Into<String>, default: Action) -> Self {
        Self::new(
            name,
            EquipmentKind::Firewall {
                rules: Vec::new(),
                default,
            },
        )
    }

    /// Name of the equipment
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free text description
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Set the description
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Kind of the equipment
    pub fn kind(&self) -> &EquipmentKind {
        &self.kind
    }

    /// Routing table
    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing
    }

    pub(crate) fn routing_table_mut(&mut self) -> &mut RoutingTable {
        &mut self.routing
    }

    /// Whether the equipment stops probes as soon as they are certainly denied
    pub fn quick_deny(&self) -> bool {
        self.quick_deny
    }

    /// Enable or disable quick deny
    pub fn set_quick_deny(&mut self, quick_deny: bool) {
        self.quick_deny = quick_deny;
    }

    /// Append a rule to the filter.
    pub fn add_acl(&mut self, rule: AclRule) {
        match &mut self.kind {
            EquipmentKind::Router { acls } => acls.push(rule),
            EquipmentKind::Firewall { rules, .. } => rules.push(rule),
        }
    }

    /// Evaluate the ingress filter of `iface` for the probe.
    pub fn evaluate_ingress_acl(&self, iface: &str, probe: &Probe) -> AclEvaluation {
        self.evaluate(Direction::In, iface, probe)
    }

    /// Evaluate the egress filter of `iface` for the probe.
    pub fn evaluate_egress_acl(&self, iface: &str, probe: &Probe) -> AclEvaluation {
        self.evaluate(Direction::Out, iface, probe)
    }

    fn evaluate(&self, direction: Direction, iface: &str, probe: &Probe) -> AclEvaluation {
        match &self.kind {
            EquipmentKind::Router { acls } => last_match(acls, direction, iface, probe),
            EquipmentKind::Firewall { rules, default } => {
                first_match(rules, *default, direction, iface, probe)
            }
        }
    }
}

/// The last matching rule takes the decision.
fn last_match(acls: &[AclRule], direction: Direction, iface: &str, probe: &Probe) -> AclEvaluation {
    let mut eval = AclEvaluation::default();
    let mut last = None;
    for rule in acls.iter().filter(|r| r.applies_to(direction, iface)) {
        let Some(result) = rule.verdict(probe) else {
            continue;
        };
        let acl = AccessControlList::new(rule.to_string(), result);
        eval.matching.push(acl.clone());
        if !result.has_match() {
            last = Some(acl);
        }
    }
    if let Some(acl) = last {
        eval.result = acl.result;
        eval.active.push(acl);
    }
    eval
}

/// Rules are evaluated in order until one certainly decides; the verdicts collected on the way
/// are folded with [`reduce_fw_results`].
fn first_match(
    rules: &[AclRule],
    default: Action,
    direction: Direction,
    iface: &str,
    probe: &Probe,
) -> AclEvaluation {
    let mut eval = AclEvaluation::default();
    let mut results = Vec::new();
    let mut decided = false;
    for rule in rules.iter().filter(|r| r.applies_to(direction, iface)) {
        let Some(result) = rule.verdict(probe) else {
            continue;
        };
        let acl = AccessControlList::new(rule.to_string(), result);
        eval.matching.push(acl.clone());
        if !result.has_match() {
            eval.active.push(acl);
        }
        results.push(result);
        if !result.has_match() && !result.has_may() {
            decided = true;
            break;
        }
    }
    if !decided {
        // a default that does not decide accepts
        let result = match default {
            Action::Match => FwResult::ACCEPT,
            action => action.verdict(),
        };
        eval.active
            .push(AccessControlList::new(format!("default {}", default), result));
        results.push(result);
    }
    eval.result = reduce_fw_results(results);
    eval
}
