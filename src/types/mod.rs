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

//! Module containing all type definitions

use std::net::IpAddr;

use ipnet::IpNet;
use petgraph::prelude::*;
use thiserror::Error;

mod prefix;
pub use prefix::{IpNetExt, IpVersion};

pub(crate) type IndexType = u32;
/// Node in the topology graph, either an equipment or a network segment.
pub type NodeId = NodeIndex<IndexType>;
/// Equipment identification (and index into the topology graph)
pub type EquipmentId = NodeId;
/// Network segment identification (and index into the topology graph)
pub type SegmentId = NodeId;
/// Interface link identification. An interface link is the edge between an equipment and the
/// segment its interface is attached to. It is the opaque egress handle stored in a route.
pub type LinkId = EdgeIndex<IndexType>;

/// Probe identification, unique inside one [`crate::tracker::ProbesTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProbeId(pub(crate) usize);

impl ProbeId {
    /// Position of the probe in the arena of its tracker.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ProbeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while building the model. Any of these aborts loading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An equipment with the same name was already added
    #[error("Equipment already exists: {0}")]
    EquipmentExists(String),
    /// The equipment name is not present in the topology
    #[error("Equipment not found: {0}")]
    EquipmentNotFound(String),
    /// The interface does not exist on the equipment
    #[error("Interface {1} not found on equipment {0}")]
    IfaceNotFound(String, String),
    /// The address is already assigned to an interface, on the given network
    #[error("Duplicate interface IP address {0} on network {1}")]
    DuplicateIfaceIp(IpAddr, IpNet),
    /// The prefix of a route has host bits set
    #[error("Invalid route prefix (not a network address): {0}")]
    InvalidRoutePrefix(IpNet),
    /// The next hop of a route is not inside the network of the outgoing interface
    #[error("Next hop {1} is not reachable through interface {0}")]
    NextHopNotOnLink(String, IpNet),
    /// Two addresses that must be of the same family are not
    #[error("Address family mismatch: {0} and {1}")]
    AddressFamilyMismatch(IpNet, IpNet),
    /// The option name is unknown
    #[error("Option unknown: {0}")]
    UnknownOption(String),
    /// The value cannot be assigned to the option
    #[error("Invalid value for option {0}: {1}")]
    InvalidOptionValue(String, String),
    /// An address could not be parsed
    #[error("Invalid address: {0}")]
    AddrParse(#[from] ipnet::AddrParseError),
    /// The network description is not valid json
    #[error("Cannot parse the network description: {0}")]
    Json(#[from] serde_json::Error),
    /// The network description cannot be read
    #[error("Cannot read the network description: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when a probe cannot be injected into the network. Once injected, a probe never
/// fails: every outcome is recorded on the probe tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// No segment contains the source address
    #[error("No network matches source IP address {0}")]
    NoNetworkMatches(IpNet),
    /// More than one segment contains the source address
    #[error("Too many networks match this source IP address {0}")]
    TooManyNetworks(IpNet),
    /// The segment of the source has no interface link to inject the probe into
    #[error("No link found for source IP address {0}")]
    NoLinkFound(IpNet),
    /// The segment of the source has more than one interface link
    #[error("Too many links for source IP address {0}")]
    TooManyLinks(IpNet),
    /// The equipment name is not present in the topology
    #[error("Equipment not found: {0}")]
    EquipmentNotFound(String),
    /// The injection link does not exist
    #[error("Link does not exist: {0:?}")]
    LinkNotFound(LinkId),
    /// Source and destination are not of the same address family
    #[error("Source {0} and destination {1} are not of the same address family")]
    AddressFamilyMismatch(IpNet, IpNet),
}
