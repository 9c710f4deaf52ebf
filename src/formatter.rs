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

//! Module that introduces a formatter to display all types containing link or node ids.

use itertools::Itertools;

use crate::network::{Network, NetworkNode};
use crate::probe::ProbeLeg;
use crate::routing::{Route, RoutingTable};
use crate::tracker::ProbesTracker;
use crate::types::{LinkId, NodeId, ProbeId};

/// Trait to format a type that contains ids of the network.
pub trait NetworkFormatter<'a, 'n> {
    /// Type that is returned, which implements `std::fmt::Display`.
    type Formatter;

    /// Return a struct that can be formatted and displayed.
    fn fmt(&'a self, net: &'n Network) -> Self::Formatter;
}

impl<'a, 'n> NetworkFormatter<'a, 'n> for NodeId {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        match net.get_node(*self) {
            NetworkNode::Equipment(e) => e.name().to_string(),
            NetworkNode::Segment(s) => s.network().to_string(),
            NetworkNode::None(_) => "?".to_string(),
        }
    }
}

impl<'a, 'n> NetworkFormatter<'a, 'n> for LinkId {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        net.link_name(*self)
    }
}

impl<'a, 'n> NetworkFormatter<'a, 'n> for ProbeLeg {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        format!("{}[{}]", self.link.fmt(net), self.next_hop)
    }
}

impl<'a, 'n> NetworkFormatter<'a, 'n> for Route {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        match (self.next_hop(), self.link()) {
            (None, None) => format!("{} -> null-route", self.prefix()),
            (nh, link) => format!(
                "{} -> {} ({}) link: {}",
                self.prefix(),
                nh.map(|nh| nh.to_string()).unwrap_or_else(|| "-".to_string()),
                self.metric(),
                link.map(|l| l.fmt(net)).unwrap_or_else(|| "-".to_string()),
            ),
        }
    }
}

impl<'a, 'n> NetworkFormatter<'a, 'n> for Vec<Route> {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        self.iter().map(|r| r.fmt(net)).join("\n")
    }
}

impl<'a, 'n> NetworkFormatter<'a, 'n> for RoutingTable {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        self.show_routes_with(|l| l.fmt(net))
    }
}

/// Path of one probe of a tracker, formatted as `Equipment(in-out[next_hop])` per hop.
#[derive(Debug, Clone, Copy)]
pub struct ProbePath<'t> {
    /// Tracker owning the probe
    pub tracker: &'t ProbesTracker,
    /// The last probe of the path
    pub probe: ProbeId,
}

impl<'a, 'n, 't> NetworkFormatter<'a, 'n> for ProbePath<'t> {
    type Formatter = String;

    fn fmt(&'a self, net: &'n Network) -> Self::Formatter {
        self.positions(net).join(" ")
    }
}

impl<'t> ProbePath<'t> {
    /// Create the path of a probe.
    pub fn new(tracker: &'t ProbesTracker, probe: ProbeId) -> Self {
        Self { tracker, probe }
    }

    /// One position per visited equipment.
    pub fn positions(&self, net: &Network) -> Vec<String> {
        let lineage = self.tracker.lineage(self.probe);
        let mut positions = Vec::new();
        for (i, id) in lineage.iter().enumerate() {
            let probe = self.tracker.probe(*id);
            let Some(incoming) = probe.incoming().and_then(|l| net.get_link(l)) else {
                continue;
            };
            let equipment = incoming.equipment().fmt(net);
            let out = lineage
                .get(i + 1)
                .and_then(|next| self.tracker.probe(*next).egress())
                .and_then(|leg| net.get_link(leg.link).map(|l| (l, leg.next_hop)))
                .map(|(l, nh)| format!("{}[{}]", l.iface(), nh))
                .unwrap_or_default();
            positions.push(format!("{}({}-{})", equipment, incoming.iface(), out));
        }
        positions
    }

    /// Multi-line form, one position per line.
    pub fn show(&self, net: &Network) -> String {
        self.positions(net)
            .into_iter()
            .map(|p| format!("  {}\n", p))
            .collect()
    }
}
