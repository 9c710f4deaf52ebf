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

//! # Probe simulation
//!
//! The [`Simulator`] forwards a probe hop by hop through a [`Network`]. At every equipment, the
//! ingress filter is evaluated, the routing table is consulted, and one child probe is spawned for
//! each route. Every probe that is not forwarded further is classified by the
//! [`ProbesTracker`] as final, killed or looping.
//!
//! Simulation never fails once the probe is injected: missing routes, unknown next hops and loops
//! are recorded on the probes, so that all sibling branches are still explored.

use ipnet::IpNet;
use log::*;
use serde::{Deserialize, Serialize};

use crate::equipment::Equipment;
use crate::network::{EgressResolution, Network};
use crate::probe::{ProbeLeg, ProbeRequest, RoutingResult, DEFAULT_TTL};
use crate::probing::Probing;
use crate::tracker::ProbesTracker;
use crate::types::{ConfigError, IpNetExt, LinkId, ProbeError, ProbeId};

/// Options of a probing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of forwarded probes per tracker, unlimited if `None`
    pub max_hops: Option<usize>,
    /// Initial time to live of injected probes
    pub time_to_live: u8,
    /// Stop probes as soon as they are certainly denied, on every equipment
    pub quick_deny: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_hops: None,
            time_to_live: DEFAULT_TTL,
            quick_deny: false,
        }
    }
}

impl Options {
    /// Set an option by its name (`maxhop`, `ttl` or `quickdeny`, case insensitive). A negative
    /// `maxhop` removes the limit.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidOptionValue(name.to_string(), value.to_string());
        match name.to_ascii_lowercase().as_str() {
            "maxhop" => {
                let hops: i64 = value.parse().map_err(|_| invalid())?;
                self.max_hops = usize::try_from(hops).ok();
            }
            "ttl" => self.time_to_live = value.parse().map_err(|_| invalid())?,
            "quickdeny" => self.quick_deny = value.parse().map_err(|_| invalid())?,
            _ => return Err(ConfigError::UnknownOption(name.to_string())),
        }
        Ok(())
    }
}

/// Drives probes through a network.
#[derive(Debug, Clone, Copy)]
pub struct Simulator<'n> {
    net: &'n Network,
    options: &'n Options,
}

impl<'n> Simulator<'n> {
    /// Create a simulator on a network.
    pub fn new(net: &'n Network, options: &'n Options) -> Self {
        Self { net, options }
    }

    /// Inject a probe through `link` and simulate it until every branch is classified.
    pub fn start_probe(
        &self,
        link: LinkId,
        source: IpNet,
        destination: IpNet,
        request: ProbeRequest,
    ) -> Result<ProbesTracker, ProbeError> {
        if self.net.get_link(link).is_none() {
            return Err(ProbeError::LinkNotFound(link));
        }
        if !source.same_version(&destination) {
            return Err(ProbeError::AddressFamilyMismatch(source, destination));
        }
        debug!(
            "start probe {} -> {} ({}) on {}",
            source,
            destination,
            request,
            self.net.link_name(link)
        );

        let mut tracker = ProbesTracker::new(
            source,
            destination,
            request,
            self.options.time_to_live,
            link,
        );
        let mut hops_left = self.options.max_hops;
        let mut stack = vec![tracker.root()];
        while let Some(id) = stack.pop() {
            let children = self.hop(&mut tracker, id, &mut hops_left);
            stack.extend(children.into_iter().rev());
        }

        if !tracker.check_final_probe_path() {
            warn!("Resulting paths should be unique");
        }
        Ok(tracker)
    }

    /// Inject a probe at the single interface link attached to the network of `source`.
    pub fn probe(
        &self,
        source: IpNet,
        destination: IpNet,
        request: ProbeRequest,
    ) -> Result<Probing, ProbeError> {
        let link = self.net.links_for_source(source)?;
        let mut probing = Probing::new();
        probing.push(self.start_probe(link, source, destination, request)?);
        Ok(probing)
    }

    /// Inject a probe on the named equipment.
    pub fn probe_from(
        &self,
        equipment: &str,
        source: IpNet,
        destination: IpNet,
        request: ProbeRequest,
    ) -> Result<Probing, ProbeError> {
        let link = self.net.links_on_equipment(equipment, source)?;
        let mut probing = Probing::new();
        probing.push(self.start_probe(link, source, destination, request)?);
        Ok(probing)
    }

    fn quick_deny(&self, equipment: &Equipment, request: &ProbeRequest) -> bool {
        self.options.quick_deny || equipment.quick_deny() || request.options.quick_deny
    }

    /// Process a probe that arrived at an equipment. Returns the children to process next.
    fn hop(
        &self,
        tracker: &mut ProbesTracker,
        id: ProbeId,
        hops_left: &mut Option<usize>,
    ) -> Vec<ProbeId> {
        let Some(incoming) = tracker.probe(id).incoming() else {
            return Vec::new();
        };
        let Some(link) = self.net.get_link(incoming) else {
            tracker.probe_killed(id, RoutingResult::Killed, "unknown incoming link");
            return Vec::new();
        };
        let Some(equipment) = self.net.get_equipment(link.equipment()) else {
            tracker.probe_killed(id, RoutingResult::Killed, "unknown equipment");
            return Vec::new();
        };
        debug!(
            "probe {} incoming on {}",
            tracker.probe(id).uid_to_string(),
            self.net.link_name(incoming)
        );

        if !tracker.probe_mut(id).decrement_ttl() {
            tracker.probe_killed(id, RoutingResult::Killed, "TimeToLive expiration");
            return Vec::new();
        }

        let ingress = equipment.evaluate_ingress_acl(link.iface(), tracker.probe(id));
        tracker
            .probe_mut(id)
            .results_mut()
            .set_ingress(link.iface(), ingress);

        let probe = tracker.probe(id);
        let (source, destination) = (probe.source(), probe.destination());
        let quick_deny = self.quick_deny(equipment, probe.request());
        if quick_deny && probe.results().acl_result().is_certainly_deny() {
            tracker.probe_quick_denied(id, "quick denied");
            return Vec::new();
        }

        if self
            .net
            .get_link_by_ip(link.equipment(), destination)
            .is_some()
        {
            tracker.probe_destination_reached(id, "destination reached");
            return Vec::new();
        }

        let routes = equipment
            .routing_table()
            .get_routes_for(source, destination);
        if routes.is_empty() {
            tracker.probe_killed(
                id,
                RoutingResult::NotRouted,
                format!("No route to {}", destination),
            );
            return Vec::new();
        }
        for route in routes.iter() {
            trace!("{}: route {}", equipment.name(), route);
        }

        let mut children = Vec::new();
        let mut spawned = false;
        for route in routes {
            let Some(out) = route.link().and_then(|l| self.net.get_link(l).map(|o| (l, o))) else {
                warn!("{}: route {} has no usable link", equipment.name(), route);
                continue;
            };
            spawned = true;
            let (out_id, out_link) = out;
            let next_hop = route.next_hop().unwrap_or_else(|| out_link.network());
            let leg = ProbeLeg {
                link: out_id,
                next_hop,
            };
            let child = tracker.add_child(id, leg);
            let egress = equipment.evaluate_egress_acl(out_link.iface(), tracker.probe(child));
            tracker
                .probe_mut(child)
                .results_mut()
                .set_egress(out_link.iface(), egress);

            if out_id == incoming {
                tracker.probe_looping(child, "same incoming and outgoing link");
                continue;
            }
            let result = tracker.probe(child).results().acl_result();
            if quick_deny && result.is_certainly_deny() {
                tracker.probe_quick_denied(child, "quick denied");
                continue;
            }

            match self.net.resolve_egress(leg, destination) {
                EgressResolution::Reached(msg) => tracker.probe_destination_reached(child, msg),
                EgressResolution::Unreachable(msg) => {
                    tracker.probe_killed(child, RoutingResult::NotRouted, msg)
                }
                EgressResolution::Forward(next) => {
                    if let Some(left) = hops_left {
                        if *left == 0 {
                            warn!("max hop count reached");
                            tracker.probe_killed(
                                child,
                                RoutingResult::Killed,
                                "max hop count reached",
                            );
                            continue;
                        }
                        *left -= 1;
                    }
                    tracker.probe_mut(child).set_incoming(next);
                    if let Some(seen) = self.find_loop(tracker, child) {
                        tracker.probe_looping(
                            child,
                            format!("loop detected, same state as probe {}", seen),
                        );
                        continue;
                    }
                    children.push(child);
                }
            }
        }
        if !spawned {
            tracker.probe_killed(
                id,
                RoutingResult::NotRouted,
                format!("No route to {}", destination),
            );
        }
        children
    }

    /// Find an ancestor that arrived through the same link with the same packet.
    fn find_loop(&self, tracker: &ProbesTracker, id: ProbeId) -> Option<ProbeId> {
        let probe = tracker.probe(id);
        let mut lineage = tracker.lineage(id);
        lineage.pop();
        lineage.into_iter().find(|a| {
            let ancestor = tracker.probe(*a);
            tracker.all_probes().contains(a)
                && ancestor.incoming() == probe.incoming()
                && ancestor.same_packet(probe)
        })
    }
}
