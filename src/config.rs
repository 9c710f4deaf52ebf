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

//! # Network description
//!
//! A network is described in JSON: the equipments with their interfaces, routes and filters, the
//! border networks, and the probing options. [`NetworkConfig::build`] turns the description into a
//! [`Network`], reporting the first configuration error.
//!
//! ```json
//! {
//!   "borders": ["192.0.2.0/24"],
//!   "equipments": [
//!     {
//!       "name": "fw",
//!       "kind": { "type": "firewall", "default": "deny", "rules": [
//!         { "action": "accept", "direction": "in", "destination": "10.0.1.0/24" }
//!       ] },
//!       "ifaces": [
//!         { "name": "outside", "ip": "192.0.2.1/24" },
//!         { "name": "inside", "ip": "10.0.0.1/24" }
//!       ],
//!       "routes": [ { "prefix": "10.0.1.0/24", "next_hop": "10.0.0.2" } ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::equipment::{Equipment, EquipmentKind};
use crate::network::Network;
use crate::simulator::Options;
use crate::types::ConfigError;

/// Description of a whole network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Probing options
    #[serde(default)]
    pub options: Options,
    /// Networks leading outside of the model
    #[serde(default)]
    pub borders: Vec<IpNet>,
    /// Equipments
    #[serde(default)]
    pub equipments: Vec<EquipmentConfig>,
}

/// Description of an equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentConfig {
    /// Unique name
    pub name: String,
    /// Free text
    #[serde(default)]
    pub comment: String,
    /// Stop probes as soon as they are certainly denied
    #[serde(default)]
    pub quick_deny: bool,
    /// Filtering behavior
    pub kind: EquipmentKind,
    /// Interfaces
    #[serde(default)]
    pub ifaces: Vec<IfaceConfig>,
    /// Destination routes
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Source routes
    #[serde(default)]
    pub source_routes: Vec<RouteConfig>,
}

/// Description of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfaceConfig {
    /// Interface name
    pub name: String,
    /// Address with the prefix length of the network, e.g. `10.0.0.1/24`
    pub ip: IpNet,
}

/// Description of a static route. A route without next hop and interface is a null route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Prefix (must be a network address)
    pub prefix: IpNet,
    /// Gateway
    #[serde(default, with = "opt_host")]
    pub next_hop: Option<IpNet>,
    /// Outgoing interface
    #[serde(default)]
    pub iface: Option<String>,
    /// Metric
    #[serde(default = "default_metric")]
    pub metric: u32,
}

fn default_metric() -> u32 {
    1
}

/// Next hops are written as plain addresses or as networks.
mod opt_host {
    use std::net::IpAddr;

    use ipnet::IpNet;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AddrOrNet {
        Addr(IpAddr),
        Net(IpNet),
    }

    pub fn serialize<S: Serializer>(value: &Option<IpNet>, s: S) -> Result<S::Ok, S::Error> {
        value.map(|n| n.addr()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<IpNet>, D::Error> {
        Ok(
            Option::<AddrOrNet>::deserialize(d)?.map(|x| match x {
                AddrOrNet::Addr(a) => IpNet::from(a),
                AddrOrNet::Net(n) => n,
            }),
        )
    }
}

impl NetworkConfig {
    /// Parse a JSON description.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read and parse a JSON description from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Serialize the description as (pretty) JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the network. All interfaces are attached before any route is added, so routes may
    /// refer to the networks of other equipments.
    pub fn build(&self) -> Result<Network, ConfigError> {
        let mut net = Network::new();
        let mut ids = Vec::with_capacity(self.equipments.len());
        for e in self.equipments.iter() {
            let mut equipment = Equipment::new(e.name.clone(), e.kind.clone());
            equipment.set_comment(e.comment.clone());
            equipment.set_quick_deny(e.quick_deny);
            let id = net.add_equipment(equipment)?;
            for iface in e.ifaces.iter() {
                net.add_iface(id, iface.name.clone(), iface.ip)?;
            }
            ids.push(id);
        }
        for (id, e) in ids.into_iter().zip(self.equipments.iter()) {
            for r in e.routes.iter() {
                net.add_route(id, r.prefix, r.next_hop, r.iface.as_deref(), r.metric)?;
            }
            for r in e.source_routes.iter() {
                net.add_source_route(id, r.prefix, r.next_hop, r.iface.as_deref(), r.metric)?;
            }
        }
        for border in self.borders.iter() {
            net.set_border(*border, true);
        }
        Ok(net)
    }
}
