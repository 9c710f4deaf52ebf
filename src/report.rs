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

//! Text report of a probing session.

use std::collections::BTreeSet;

use crate::formatter::{NetworkFormatter, ProbePath};
use crate::network::Network;
use crate::probing::Probing;
use crate::tracker::ProbesTracker;
use crate::types::ProbeId;

/// Renders the outcome of probes on a network.
#[derive(Debug, Clone, Copy)]
pub struct Report<'n> {
    net: &'n Network,
    verbose: bool,
}

impl<'n> Report<'n> {
    /// Create a report. In verbose mode, every matching rule and the per-probe results are shown.
    pub fn new(net: &'n Network, verbose: bool) -> Self {
        Self { net, verbose }
    }

    /// Report of a whole session, followed by the global verdict.
    pub fn show_probing(&self, probing: &Probing) -> String {
        let mut s = String::new();
        for tracker in probing.trackers() {
            s.push_str(&self.show_results(tracker));
        }
        s.push_str(&format!("Global ACL result is: {}\n", probing.acl_result()));
        s.push_str(&format!(
            "Global routing result is: {}\n",
            probing.routing_result()
        ));
        s
    }

    /// Routed, killed and looping probes of a tracker.
    pub fn show_results(&self, tracker: &ProbesTracker) -> String {
        let mut s = String::new();
        for (title, set) in [
            ("-------- Routed probes --------", tracker.final_probes()),
            ("------- Killed probes  --------", tracker.killed_probes()),
            ("-------- Looping probes -------", tracker.looping_probes()),
        ] {
            if set.is_empty() {
                continue;
            }
            s.push_str("###############################\n");
            s.push_str(title);
            s.push('\n');
            s.push_str(&self.show_resulting_probes(tracker, set));
        }
        s
    }

    fn show_resulting_probes(&self, tracker: &ProbesTracker, probes: &BTreeSet<ProbeId>) -> String {
        let mut s = String::new();
        for id in probes.iter() {
            let path = ProbePath::new(tracker, *id);
            s.push_str("Path: \n");
            s.push_str(&path.show(self.net));
            for pid in tracker.lineage(*id) {
                s.push_str(&self.show_probe_result(tracker, pid));
            }
            s.push_str("-----------------\n");
        }
        s.push('\n');
        s
    }

    fn show_probe_result(&self, tracker: &ProbesTracker, id: ProbeId) -> String {
        let mut s = String::new();
        let probe = tracker.probe(id);
        let on = probe
            .incoming()
            .and_then(|l| self.net.get_link(l))
            .or_else(|| probe.egress().and_then(|leg| self.net.get_link(leg.link)))
            .and_then(|l| self.net.get_equipment(l.equipment()));
        s.push_str("------\n");
        if let Some(equipment) = on {
            s.push_str(&format!("{} ({})\n", equipment.name(), equipment.comment()));
        }
        if self.verbose {
            s.push_str(&format!(
                "Probe{} path: {}\n",
                probe.uid_to_string(),
                ProbePath::new(tracker, id).fmt(self.net)
            ));
            s.push_str(&format!(
                "Routing Result: {} {}\n",
                probe.results().routing_result(),
                probe.results().events().join(", ")
            ));
            s.push_str(&format!("ACL Result: {}\n", probe.results().acl_result()));
        }
        s.push_str(&probe.results().show_acl_results(self.verbose));
        s
    }
}
