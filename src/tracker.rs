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

//! # Probes tracker
//!
//! The [`ProbesTracker`] owns the tree of probes spawned by one injected probe. Probes are stored
//! in an arena indexed by [`ProbeId`], and parent/child relations are ids. On top of the arena,
//! the tracker keeps four index sets: all tracked probes, and the three terminal classifications
//! (final, killed, looping). A probe is in at most one terminal set.

use std::collections::{BTreeSet, HashMap};

use ipnet::IpNet;
use log::*;

use crate::fw_result::{AclResult, FwResult};
use crate::probe::{Probe, ProbeLeg, ProbeRequest, RoutingResult};
use crate::types::{LinkId, ProbeId};

/// Tree of probes of one injection, with its classification sets.
#[derive(Debug, Clone)]
pub struct ProbesTracker {
    probes: Vec<Probe>,
    all: BTreeSet<ProbeId>,
    final_probes: BTreeSet<ProbeId>,
    killed: BTreeSet<ProbeId>,
    looping: BTreeSet<ProbeId>,
}

impl ProbesTracker {
    /// Create a tracker with the injected root probe, arriving through `incoming`.
    pub fn new(
        source: IpNet,
        destination: IpNet,
        request: ProbeRequest,
        ttl: u8,
        incoming: LinkId,
    ) -> Self {
        let root = Probe::new_root(ProbeId(0), source, destination, request, ttl, incoming);
        let mut tracker = Self {
            probes: vec![root],
            all: BTreeSet::new(),
            final_probes: BTreeSet::new(),
            killed: BTreeSet::new(),
            looping: BTreeSet::new(),
        };
        tracker.track_probe(ProbeId(0));
        tracker
    }

    /// The injected probe
    pub fn root(&self) -> ProbeId {
        ProbeId(0)
    }

    /// Get a probe.
    ///
    /// **Panics** if the id was not created by this tracker.
    pub fn probe(&self, id: ProbeId) -> &Probe {
        &self.probes[id.0]
    }

    pub(crate) fn probe_mut(&mut self, id: ProbeId) -> &mut Probe {
        &mut self.probes[id.0]
    }

    /// Number of probes in the tree
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// A tracker always holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Spawn a child of `parent` leaving through `leg`, and track it.
    pub fn add_child(&mut self, parent: ProbeId, leg: ProbeLeg) -> ProbeId {
        let id = ProbeId(self.probes.len());
        let child = self.probe(parent).new_child(id, leg);
        self.probes.push(child);
        self.probe_mut(parent).push_child(id);
        self.track_probe(id);
        id
    }

    /// Add the probe to the set of tracked probes.
    pub fn track_probe(&mut self, id: ProbeId) {
        self.all.insert(id);
    }

    /// Remove the probe from all index sets. The probe stays in the tree.
    pub fn untrack_probe(&mut self, id: ProbeId) {
        self.all.remove(&id);
        self.final_probes.remove(&id);
        self.killed.remove(&id);
        self.looping.remove(&id);
    }

    fn classify(&mut self, id: ProbeId, result: RoutingResult, message: String) {
        self.final_probes.remove(&id);
        self.killed.remove(&id);
        self.looping.remove(&id);
        match result {
            RoutingResult::Routed => self.final_probes.insert(id),
            RoutingResult::Loop => self.looping.insert(id),
            _ => self.killed.insert(id),
        };
        let results = self.probe_mut(id).results_mut();
        results.set_routing_result(result);
        results.add_event(message);
    }

    /// The probe reached its destination.
    pub fn probe_destination_reached(&mut self, id: ProbeId, message: impl Into<String>) {
        let message = message.into();
        debug!("probe {} reached its destination: {}", id, message);
        self.classify(id, RoutingResult::Routed, message);
    }

    /// The probe was dropped. `result` is either [`RoutingResult::NotRouted`] (no route) or
    /// [`RoutingResult::Killed`].
    pub fn probe_killed(&mut self, id: ProbeId, result: RoutingResult, message: impl Into<String>) {
        let message = message.into();
        debug!("probe {} killed ({}): {}", id, result, message);
        self.classify(id, result, message);
    }

    /// The probe was certainly denied and is not forwarded further. It counts as final so that
    /// the deny is part of the verdict, but its own routing result is `NotRouted`.
    pub fn probe_quick_denied(&mut self, id: ProbeId, message: impl Into<String>) {
        let message = message.into();
        debug!("probe {} stopped: {}", id, message);
        self.classify(id, RoutingResult::Routed, message);
        self.probe_mut(id)
            .results_mut()
            .set_routing_result(RoutingResult::NotRouted);
    }

    /// The probe would revisit the state of one of its ancestors.
    pub fn probe_looping(&mut self, id: ProbeId, message: impl Into<String>) {
        let message = message.into();
        debug!("probe {} is looping: {}", id, message);
        self.classify(id, RoutingResult::Loop, message);
    }

    /// All tracked probes
    pub fn all_probes(&self) -> &BTreeSet<ProbeId> {
        &self.all
    }

    /// Probes that reached their destination
    pub fn final_probes(&self) -> &BTreeSet<ProbeId> {
        &self.final_probes
    }

    /// Dropped probes
    pub fn killed_probes(&self) -> &BTreeSet<ProbeId> {
        &self.killed
    }

    /// Looping probes
    pub fn looping_probes(&self) -> &BTreeSet<ProbeId> {
        &self.looping
    }

    /// Tracked probes that were not forwarded further.
    pub fn leaves(&self) -> Vec<ProbeId> {
        self.all
            .iter()
            .copied()
            .filter(|id| !self.probe(*id).has_children())
            .collect()
    }

    /// Tracked probes arriving through, or leaving through, `link`.
    pub fn probes_by_link(&self, link: LinkId) -> Vec<ProbeId> {
        self.all
            .iter()
            .copied()
            .filter(|id| {
                let p = self.probe(*id);
                p.incoming() == Some(link) || p.egress().map(|l| l.link) == Some(link)
            })
            .collect()
    }

    /// The lineage of a probe: root first, the probe itself last.
    pub fn lineage(&self, id: ProbeId) -> Vec<ProbeId> {
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(parent) = self.probe(cur).parent() {
            chain.push(parent);
            cur = parent;
        }
        chain.reverse();
        chain
    }

    /// Canonical path of a probe: for each equipment visited, the incoming link followed by the
    /// outgoing link and next hop.
    pub fn probe_path(&self, id: ProbeId) -> String {
        let lineage = self.lineage(id);
        let mut parts = Vec::new();
        for (i, pid) in lineage.iter().enumerate() {
            let probe = self.probe(*pid);
            let Some(incoming) = probe.incoming() else {
                continue;
            };
            let out = lineage
                .get(i + 1)
                .and_then(|next| self.probe(*next).egress())
                .map(|leg| format!("#{}[{}]", leg.link.index(), leg.next_hop))
                .unwrap_or_default();
            parts.push(format!("(#{}-{})", incoming.index(), out));
        }
        parts.join(" ")
    }

    /// Check that no two final probes took the same path. A collision is logged as a warning.
    pub fn check_final_probe_path(&self) -> bool {
        let mut seen: HashMap<String, ProbeId> = HashMap::new();
        let mut unique = true;
        for id in self.final_probes.iter() {
            let path = self.probe_path(*id);
            if let Some(other) = seen.insert(path.clone(), *id) {
                warn!(
                    "Resulting paths should be unique: probes {} and {} both took {}",
                    other, id, path
                );
                unique = false;
            }
        }
        unique
    }

    /// Routing result of the whole tree. Looping probes are not considered.
    pub fn routing_result(&self) -> RoutingResult {
        match (self.final_probes.is_empty(), self.killed.is_empty()) {
            (false, true) => RoutingResult::Routed,
            (true, false) => RoutingResult::NotRouted,
            _ => RoutingResult::Unknown,
        }
    }

    /// Verdict of one path: the hops of the lineage concatenated.
    pub fn path_acl_result(&self, id: ProbeId) -> AclResult {
        self.lineage(id)
            .into_iter()
            .map(|pid| self.probe(pid).results().acl_result())
            .fold(FwResult::ACCEPT, FwResult::concat)
    }

    /// Verdict of the whole tree, tallied over every hop of every final path. Final paths that
    /// disagree with each other make the verdict uncertain.
    pub fn acl_result(&self) -> AclResult {
        let (mut accept, mut deny, mut may, mut matched) = (0, 0, 0, 0);
        for id in self.final_probes.iter() {
            for pid in self.lineage(*id) {
                let result = self.probe(pid).results().acl_result();
                if result.has_accept() {
                    accept += 1;
                }
                if result.has_deny() {
                    deny += 1;
                }
                if result.has_may() {
                    may += 1;
                }
                if result.has_match() {
                    matched += 1;
                }
            }
        }

        let disagree = matched == 0
            && self
                .final_probes
                .iter()
                .map(|id| self.path_acl_result(*id))
                .reduce(FwResult::sum_path)
                .map(|sum| sum.has_may())
                .unwrap_or(false);

        let mut result = FwResult::empty();
        if self.routing_result() != RoutingResult::Routed || may > 0 || disagree {
            result |= FwResult::MAY;
        }
        if matched == 0 && accept > 0 && deny == 0 {
            result |= FwResult::ACCEPT;
        }
        if matched == 0 && deny > 0 {
            result |= FwResult::DENY;
        }
        if matched > 0 {
            result |= FwResult::MATCH;
        }
        result
    }

    /// Report of the ACLs applied on every hop of the lineage of a probe.
    pub fn show_acl_results(&self, id: ProbeId, verbose: bool) -> String {
        self.lineage(id)
            .into_iter()
            .map(|pid| {
                let probe = self.probe(pid);
                format!(
                    "Probe {} {}\n{}",
                    probe.uid_to_string(),
                    probe.results().acl_result(),
                    probe.results().show_acl_results(verbose)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
