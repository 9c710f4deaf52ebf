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

//! # Routing table
//!
//! Each equipment owns a [`RoutingTable`]. It stores destination routes and source routes, both
//! separated by IP version and grouped by their exact prefix. Lookups use longest-prefix-match,
//! and indirect routes (routes without an outgoing link) are resolved recursively through their
//! next hop.

use std::collections::HashMap;

use ipnet::IpNet;
use itertools::Itertools;
use log::*;

use crate::types::{ConfigError, IpNetExt, IpVersion, LinkId};

/// A static route.
///
/// A route with a `link` sends the packet out of that interface link towards `next_hop`. A route
/// without a `link` is *indirect*: the real egress is found by looking up `next_hop`. A route with
/// neither is a null route, which is kept for display but never used for forwarding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    prefix: IpNet,
    next_hop: Option<IpNet>,
    metric: u32,
    link: Option<LinkId>,
}

impl Route {
    /// Create a new route. The prefix must be a network address, and the next hop must be of the
    /// same IP version.
    pub fn new(
        prefix: IpNet,
        next_hop: Option<IpNet>,
        metric: u32,
        link: Option<LinkId>,
    ) -> Result<Self, ConfigError> {
        if !prefix.is_network_address() {
            return Err(ConfigError::InvalidRoutePrefix(prefix));
        }
        if let Some(nh) = next_hop {
            if !prefix.same_version(&nh) {
                return Err(ConfigError::AddressFamilyMismatch(prefix, nh));
            }
        }
        Ok(Self {
            prefix,
            next_hop,
            metric,
            link,
        })
    }

    /// Route to a directly connected network. Its next hop is the network itself.
    pub fn connected(network: IpNet, link: LinkId) -> Self {
        let network = network.trunc();
        Self {
            prefix: network,
            next_hop: Some(network),
            metric: 0,
            link: Some(link),
        }
    }

    /// Route that drops everything towards `prefix`.
    pub fn null_route(prefix: IpNet) -> Result<Self, ConfigError> {
        Self::new(prefix, None, 0, None)
    }

    /// Destination (or source) prefix of the route
    pub fn prefix(&self) -> IpNet {
        self.prefix
    }

    /// Next hop of the route
    pub fn next_hop(&self) -> Option<IpNet> {
        self.next_hop
    }

    /// Metric of the route
    pub fn metric(&self) -> u32 {
        self.metric
    }

    /// Outgoing interface link
    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    /// Returns `true` if the route neither has a link nor a next hop.
    pub fn is_null_route(&self) -> bool {
        self.link.is_none() && self.next_hop.is_none()
    }

    /// Returns `true` if the route has to be resolved through its next hop.
    pub fn is_indirect(&self) -> bool {
        self.link.is_none() && self.next_hop.is_some()
    }

    /// Returns `true` for a route towards a directly connected network.
    pub fn is_connected(&self) -> bool {
        self.link.is_some() && self.next_hop == Some(self.prefix)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.next_hop, self.link) {
            (None, None) => write!(f, "{} -> null-route", self.prefix),
            (nh, link) => write!(
                f,
                "{} -> {} ({}) link: {}",
                self.prefix,
                nh.map(|nh| nh.to_string()).unwrap_or_else(|| "-".to_string()),
                self.metric,
                link.map(|l| format!("#{}", l.index()))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        }
    }
}

/// Sort routes by descending prefix length, then by ascending network address.
pub fn sort_by_prefix(routes: &mut [Route]) {
    routes.sort_by(|a, b| {
        b.prefix
            .prefix_len()
            .cmp(&a.prefix.prefix_len())
            .then_with(|| a.prefix.addr().cmp(&b.prefix.addr()))
    })
}

/// Sort routes by ascending metric.
pub fn sort_by_metric(routes: &mut [Route]) {
    routes.sort_by_key(|r| r.metric)
}

/// Routes of one IP version, grouped by their exact prefix. The prefix is the canonical key
/// (network address and prefix length).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RouteStore {
    entries: HashMap<IpNet, Vec<Route>>,
}

impl RouteStore {
    fn insert(&mut self, route: Route) {
        self.entries.entry(route.prefix).or_default().push(route);
    }

    fn get(&self, prefix: &IpNet) -> Option<&Vec<Route>> {
        self.entries.get(prefix)
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn routes(&self) -> Vec<Route> {
        let mut routes = self.entries.values().flatten().cloned().collect_vec();
        sort_by_prefix(&mut routes);
        routes
    }
}

/// Routing table of an equipment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    v4: RouteStore,
    v6: RouteStore,
    source_v4: RouteStore,
    source_v6: RouteStore,
}

impl RoutingTable {
    /// Create an empty routing table
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, version: IpVersion) -> &RouteStore {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        }
    }

    fn source_store(&self, version: IpVersion) -> &RouteStore {
        match version {
            IpVersion::V4 => &self.source_v4,
            IpVersion::V6 => &self.source_v6,
        }
    }

    /// Add a destination route. Several routes may share the same prefix.
    pub fn add_route(&mut self, route: Route) {
        match route.prefix.version() {
            IpVersion::V4 => self.v4.insert(route),
            IpVersion::V6 => self.v6.insert(route),
        }
    }

    /// Add a source route, selected by the source address of a probe.
    pub fn add_source_route(&mut self, route: Route) {
        match route.prefix.version() {
            IpVersion::V4 => self.source_v4.insert(route),
            IpVersion::V6 => self.source_v6.insert(route),
        }
    }

    /// Returns `true` if the table contains no route at all.
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty()
            && self.v6.is_empty()
            && self.source_v4.is_empty()
            && self.source_v6.is_empty()
    }

    /// All destination routes of an IP version, sorted by prefix.
    pub fn routes(&self, version: IpVersion) -> Vec<Route> {
        self.store(version).routes()
    }

    /// All source routes of an IP version, sorted by prefix.
    pub fn source_routes(&self, version: IpVersion) -> Vec<Route> {
        self.source_store(version).routes()
    }

    /// Longest-prefix-match lookup of `destination`. Indirect routes are replaced by the routes
    /// of their next hop, and at most one route is returned per next hop. An empty result means
    /// that the destination cannot be routed.
    pub fn get_routes(&self, destination: IpNet) -> Vec<Route> {
        self.lookup(self.store(destination.version()), destination, &mut Vec::new())
    }

    /// Longest-prefix-match lookup of `source` in the source routes.
    pub fn get_source_routes(&self, source: IpNet) -> Vec<Route> {
        self.lookup(self.source_store(source.version()), source, &mut Vec::new())
    }

    /// Routes for a packet: source routes take precedence over destination routes.
    pub fn get_routes_for(&self, source: IpNet, destination: IpNet) -> Vec<Route> {
        let routes = self.get_source_routes(source);
        if !routes.is_empty() {
            return routes;
        }
        self.get_routes(destination)
    }

    /// Lookup in `store`. `chain` holds the destination prefixes currently being resolved, which
    /// stops cycles between indirect routes.
    fn lookup(&self, store: &RouteStore, address: IpNet, chain: &mut Vec<IpNet>) -> Vec<Route> {
        let mut prefix = address.trunc();
        loop {
            if let Some(entry) = store.get(&prefix) {
                trace!("{} matches routing entry {}", address, prefix);
                return self.resolve_entry(entry, chain);
            }
            match prefix.supernet() {
                Some(p) => prefix = p,
                None => return Vec::new(),
            }
        }
    }

    fn resolve_entry(&self, entry: &[Route], chain: &mut Vec<IpNet>) -> Vec<Route> {
        let mut routes = Vec::new();
        for route in entry {
            match (route.link, route.next_hop) {
                (Some(_), _) => routes.push(route.clone()),
                (None, Some(nh)) => {
                    let key = route.prefix;
                    if chain.contains(&key) {
                        warn!(
                            "Recursive next hop {} of route {} loops back, route ignored",
                            nh, route
                        );
                        continue;
                    }
                    chain.push(key);
                    let resolved = self.lookup(self.store(nh.version()), nh, chain);
                    chain.pop();
                    // a connected route reached through a gateway forwards to that gateway
                    routes.extend(resolved.into_iter().map(|r| {
                        if r.is_connected() {
                            Route {
                                next_hop: Some(nh),
                                ..r
                            }
                        } else {
                            r
                        }
                    }));
                }
                // null route
                (None, None) => {}
            }
        }
        routes.into_iter().unique_by(|r| r.next_hop).collect()
    }

    /// Human readable dump of the whole table.
    pub fn show_routes(&self) -> String {
        self.show_routes_with(|link| format!("#{}", link.index()))
    }

    /// Dump of the whole table, with links rendered by `link_name`.
    pub fn show_routes_with<F>(&self, link_name: F) -> String
    where
        F: Fn(LinkId) -> String,
    {
        let mut s = String::new();
        for version in [IpVersion::V4, IpVersion::V6] {
            for (title, routes) in [
                ("source-routes", self.source_routes(version)),
                ("routes", self.routes(version)),
            ] {
                s.push_str(&format!("{} {}\n", version, title));
                if routes.is_empty() {
                    s.push_str("(none)\n");
                }
                for route in routes {
                    s.push_str(&match (route.next_hop, route.link) {
                        (None, None) => format!("{} null-route\n", route.prefix),
                        (nh, link) => format!(
                            "{} {} {} link = {}\n",
                            route.prefix,
                            nh.map(|nh| nh.to_string()).unwrap_or_else(|| "-".to_string()),
                            route.metric,
                            link.map(&link_name).unwrap_or_else(|| "-".to_string()),
                        ),
                    });
                }
                s.push('\n');
            }
        }
        s
    }
}
