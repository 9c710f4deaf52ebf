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

//! # Topology
//!
//! The [`Network`] is an undirected graph. Nodes are equipments and network segments; every edge
//! is an interface link connecting one interface of an equipment to the segment its address
//! belongs to. The graph only stores the structure: equipments and segments are kept in separate
//! maps indexed by their node id.

use std::collections::HashMap;

use ipnet::IpNet;
use log::*;
use petgraph::prelude::*;
use petgraph::visit::EdgeRef;

use crate::equipment::Equipment;
use crate::probe::ProbeLeg;
use crate::routing::Route;
use crate::types::{
    ConfigError, EquipmentId, IndexType, IpNetExt, LinkId, NodeId, ProbeError, SegmentId,
};

/// Graph holding the structure of the topology
pub type TopologyGraph = Graph<(), IfaceLink, Undirected, IndexType>;

/// Network segment (a broadcast domain of one IP network).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    network: IpNet,
    border: bool,
}

impl Segment {
    /// Network of the segment
    pub fn network(&self) -> IpNet {
        self.network
    }

    /// A border segment leads outside of the modeled network: unknown next hops are reachable.
    pub fn is_border(&self) -> bool {
        self.border
    }
}

/// An interface of an equipment, attached to a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfaceLink {
    iface: String,
    ip: IpNet,
    equipment: EquipmentId,
    segment: SegmentId,
}

impl IfaceLink {
    /// Name of the interface
    pub fn iface(&self) -> &str {
        &self.iface
    }

    /// Address of the interface, with the prefix length of its network
    pub fn ip(&self) -> IpNet {
        self.ip
    }

    /// Network of the interface
    pub fn network(&self) -> IpNet {
        self.ip.trunc()
    }

    /// Equipment owning the interface
    pub fn equipment(&self) -> EquipmentId {
        self.equipment
    }

    /// Segment the interface is attached to
    pub fn segment(&self) -> SegmentId {
        self.segment
    }
}

/// A node of the topology, similar to an `Option` with two different `Some` values.
#[derive(Debug)]
pub enum NetworkNode<'a> {
    /// Equipment
    Equipment(&'a Equipment),
    /// Network segment
    Segment(&'a Segment),
    /// Nothing was found
    None(NodeId),
}

/// Where a probe goes after leaving an equipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EgressResolution {
    /// The destination is on the segment, nothing more to forward
    Reached(String),
    /// The probe arrives at another equipment through this link
    Forward(LinkId),
    /// The next hop does not exist on the segment
    Unreachable(String),
}

/// The modeled network.
#[derive(Debug, Clone, Default)]
pub struct Network {
    graph: TopologyGraph,
    equipments: HashMap<EquipmentId, Equipment>,
    segments: HashMap<SegmentId, Segment>,
    segment_ids: HashMap<IpNet, SegmentId>,
}

impl Network {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Underlying graph
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    /// Add an equipment. Names must be unique.
    pub fn add_equipment(&mut self, equipment: Equipment) -> Result<EquipmentId, ConfigError> {
        if self.get_equipment_id(equipment.name()).is_ok() {
            return Err(ConfigError::EquipmentExists(equipment.name().to_string()));
        }
        let id = self.graph.add_node(());
        debug!("add equipment {} as {:?}", equipment.name(), id);
        self.equipments.insert(id, equipment);
        Ok(id)
    }

    /// Get the id of an equipment by its name.
    pub fn get_equipment_id(&self, name: impl AsRef<str>) -> Result<EquipmentId, ConfigError> {
        self.equipments
            .iter()
            .find(|(_, e)| e.name() == name.as_ref())
            .map(|(id, _)| *id)
            .ok_or_else(|| ConfigError::EquipmentNotFound(name.as_ref().to_string()))
    }

    /// Returns a reference to an equipment.
    pub fn get_equipment(&self, id: EquipmentId) -> Option<&Equipment> {
        self.equipments.get(&id)
    }

    /// Returns a mutable reference to an equipment.
    pub fn get_equipment_mut(&mut self, id: EquipmentId) -> Option<&mut Equipment> {
        self.equipments.get_mut(&id)
    }

    /// All equipment ids, sorted
    pub fn get_equipments(&self) -> Vec<EquipmentId> {
        let mut ids: Vec<_> = self.equipments.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns the node, either an equipment or a segment.
    pub fn get_node(&self, id: NodeId) -> NetworkNode<'_> {
        match self.equipments.get(&id) {
            Some(e) => NetworkNode::Equipment(e),
            None => match self.segments.get(&id) {
                Some(s) => NetworkNode::Segment(s),
                None => NetworkNode::None(id),
            },
        }
    }

    /// Returns the segment of a network, creating it if necessary.
    pub fn add_segment(&mut self, network: IpNet) -> SegmentId {
        let network = network.trunc();
        if let Some(id) = self.segment_ids.get(&network) {
            return *id;
        }
        let id = self.graph.add_node(());
        debug!("add segment {} as {:?}", network, id);
        self.segments.insert(
            id,
            Segment {
                network,
                border: false,
            },
        );
        self.segment_ids.insert(network, id);
        id
    }

    /// Returns a reference to a segment.
    pub fn get_segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    /// Returns the segment of a network.
    pub fn get_segment_id(&self, network: IpNet) -> Option<SegmentId> {
        self.segment_ids.get(&network.trunc()).copied()
    }

    /// Mark the segment of `network` as border (creating the segment if necessary).
    pub fn set_border(&mut self, network: IpNet, border: bool) -> SegmentId {
        let id = self.add_segment(network);
        if let Some(s) = self.segments.get_mut(&id) {
            s.border = border;
        }
        id
    }

    /// Attach an interface of `equipment` with address `ip` (including its prefix length) to the
    /// segment of its network, and install the directly connected route.
    pub fn add_iface(
        &mut self,
        equipment: EquipmentId,
        iface: impl Into<String>,
        ip: IpNet,
    ) -> Result<LinkId, ConfigError> {
        let iface = iface.into();
        let name = match self.equipments.get(&equipment) {
            Some(e) => e.name().to_string(),
            None => return Err(ConfigError::EquipmentNotFound(format!("{:?}", equipment))),
        };
        if let Some(other) = self.graph.edge_weights().find(|l| l.ip.addr() == ip.addr()) {
            return Err(ConfigError::DuplicateIfaceIp(ip.addr(), other.network()));
        }
        let segment = self.add_segment(ip);
        let link = self.graph.add_edge(
            equipment,
            segment,
            IfaceLink {
                iface: iface.clone(),
                ip,
                equipment,
                segment,
            },
        );
        debug!("{}: add interface {} with address {}", name, iface, ip);
        if let Some(e) = self.equipments.get_mut(&equipment) {
            e.routing_table_mut().add_route(Route::connected(ip, link));
        }
        Ok(link)
    }

    /// Add a destination route to an equipment. See [`Network::make_route`].
    pub fn add_route(
        &mut self,
        equipment: EquipmentId,
        prefix: IpNet,
        next_hop: Option<IpNet>,
        iface: Option<&str>,
        metric: u32,
    ) -> Result<(), ConfigError> {
        let route = self.make_route(equipment, prefix, next_hop, iface, metric)?;
        if let Some(e) = self.equipments.get_mut(&equipment) {
            debug!("{}: add route {}", e.name(), route);
            e.routing_table_mut().add_route(route);
        }
        Ok(())
    }

    /// Add a source route to an equipment. See [`Network::make_route`].
    pub fn add_source_route(
        &mut self,
        equipment: EquipmentId,
        prefix: IpNet,
        next_hop: Option<IpNet>,
        iface: Option<&str>,
        metric: u32,
    ) -> Result<(), ConfigError> {
        let route = self.make_route(equipment, prefix, next_hop, iface, metric)?;
        if let Some(e) = self.equipments.get_mut(&equipment) {
            debug!("{}: add source route {}", e.name(), route);
            e.routing_table_mut().add_source_route(route);
        }
        Ok(())
    }

    /// Build a route of an equipment.
    ///
    /// - Without next hop and without interface, the route is a null route.
    /// - With an interface, the next hop (if any) must be on the network of that interface.
    /// - With only a next hop, the route leaves through the interface whose network contains the
    ///   next hop. If there is none, the route is indirect and resolved at lookup time.
    pub fn make_route(
        &self,
        equipment: EquipmentId,
        prefix: IpNet,
        next_hop: Option<IpNet>,
        iface: Option<&str>,
        metric: u32,
    ) -> Result<Route, ConfigError> {
        let Some(e) = self.equipments.get(&equipment) else {
            return Err(ConfigError::EquipmentNotFound(format!("{:?}", equipment)));
        };
        let next_hop = next_hop.map(|nh| nh.host());
        let link = match (iface, next_hop) {
            (Some(name), nh) => {
                let link = self
                    .get_iface_link(equipment, name)
                    .ok_or_else(|| {
                        ConfigError::IfaceNotFound(e.name().to_string(), name.to_string())
                    })?;
                let network = self.graph[link].network();
                match nh {
                    Some(nh) if !network.contains(&nh) => {
                        return Err(ConfigError::NextHopNotOnLink(name.to_string(), nh))
                    }
                    // a route through an interface without gateway targets its network
                    None => return Route::new(prefix, Some(network), metric, Some(link)),
                    Some(_) => Some(link),
                }
            }
            (None, Some(nh)) => self
                .equipment_links(equipment)
                .into_iter()
                .find(|l| self.graph[*l].network().contains(&nh)),
            (None, None) => None,
        };
        Route::new(prefix, next_hop, metric, link)
    }

    /// Returns a reference to an interface link.
    pub fn get_link(&self, link: LinkId) -> Option<&IfaceLink> {
        self.graph.edge_weight(link)
    }

    /// All interface links of an equipment, sorted by their id.
    pub fn equipment_links(&self, equipment: EquipmentId) -> Vec<LinkId> {
        let mut links: Vec<LinkId> = self.graph.edges(equipment).map(|e| e.id()).collect();
        links.sort();
        links
    }

    /// All interface links attached to a segment, sorted by their id.
    pub fn segment_links(&self, segment: SegmentId) -> Vec<LinkId> {
        let mut links: Vec<LinkId> = self.graph.edges(segment).map(|e| e.id()).collect();
        links.sort();
        links
    }

    /// Interface link of an equipment by interface name.
    pub fn get_iface_link(&self, equipment: EquipmentId, iface: &str) -> Option<LinkId> {
        self.equipment_links(equipment)
            .into_iter()
            .find(|l| self.graph[*l].iface == iface)
    }

    /// Interface link of an equipment owning the given (host) address.
    pub fn get_link_by_ip(&self, equipment: EquipmentId, address: IpNet) -> Option<LinkId> {
        self.equipment_links(equipment)
            .into_iter()
            .find(|l| self.graph[*l].ip.host() == address)
    }

    /// Interface link on a segment owning the given (host) address.
    pub fn segment_link_by_ip(&self, segment: SegmentId, address: IpNet) -> Option<LinkId> {
        self.segment_links(segment)
            .into_iter()
            .find(|l| self.graph[*l].ip.host() == address)
    }

    /// Human readable name of a link: `equipment:iface`.
    pub fn link_name(&self, link: LinkId) -> String {
        match self.get_link(link) {
            Some(l) => format!(
                "{}:{}",
                self.get_equipment(l.equipment).map(|e| e.name()).unwrap_or("?"),
                l.iface
            ),
            None => "?".to_string(),
        }
    }

    /// Select the injection link of a probe from its source address: the source must be inside
    /// exactly one segment, and that segment must hold exactly one interface link.
    pub fn links_for_source(&self, source: IpNet) -> Result<LinkId, ProbeError> {
        let mut segments: Vec<SegmentId> = self
            .segments
            .iter()
            // the default network contains everything and never identifies a source
            .filter(|(_, s)| !s.network.is_default())
            .filter(|(_, s)| s.network.same_version(&source) && s.network.contains(&source))
            .map(|(id, _)| *id)
            .collect();
        segments.sort();
        let segment = match segments.as_slice() {
            [] => return Err(ProbeError::NoNetworkMatches(source)),
            [s] => *s,
            _ => return Err(ProbeError::TooManyNetworks(source)),
        };
        match self.segment_links(segment).as_slice() {
            [] => Err(ProbeError::NoLinkFound(source)),
            [l] => Ok(*l),
            _ => Err(ProbeError::TooManyLinks(source)),
        }
    }

    /// Select the injection link of a probe on a named equipment: the interface whose network
    /// contains the source. If no interface network contains it, the equipment must have a single
    /// interface.
    pub fn links_on_equipment(&self, name: &str, source: IpNet) -> Result<LinkId, ProbeError> {
        let equipment = self
            .get_equipment_id(name)
            .map_err(|_| ProbeError::EquipmentNotFound(name.to_string()))?;
        let all = self.equipment_links(equipment);
        let matching: Vec<LinkId> = all
            .iter()
            .copied()
            .filter(|l| self.graph[*l].network().same_version(&source))
            .filter(|l| self.graph[*l].network().contains(&source))
            .collect();
        let candidates = if matching.is_empty() { all } else { matching };
        match candidates.as_slice() {
            [] => Err(ProbeError::NoLinkFound(source)),
            [l] => Ok(*l),
            _ => Err(ProbeError::TooManyLinks(source)),
        }
    }

    /// Decide where a probe leaving through `leg` towards `destination` goes next.
    pub fn resolve_egress(&self, leg: ProbeLeg, destination: IpNet) -> EgressResolution {
        let Some(link) = self.get_link(leg.link) else {
            return EgressResolution::Unreachable(format!("link {:?} does not exist", leg.link));
        };
        let Some(segment) = self.segments.get(&link.segment) else {
            return EgressResolution::Unreachable(format!(
                "segment of {} does not exist",
                link.iface
            ));
        };
        // a connected route delivers to the destination itself
        let target = if leg.next_hop == segment.network {
            destination
        } else {
            leg.next_hop
        };
        if let Some(l) = self.segment_link_by_ip(link.segment, target) {
            return EgressResolution::Forward(l);
        }
        if target == destination
            && segment.network.same_version(&destination)
            && segment.network.contains(&destination)
        {
            return EgressResolution::Reached("destination reached".to_string());
        }
        if segment.network.is_default() {
            return EgressResolution::Reached("destination reached".to_string());
        }
        if segment.border {
            return EgressResolution::Reached("destination (border) reached".to_string());
        }
        EgressResolution::Unreachable(format!("host not found: {}", target))
    }
}
