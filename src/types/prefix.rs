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

//! Helpers to reason about addresses and networks stored as [`IpNet`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

/// IP version of an address or a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl IpVersion {
    /// Length of an address of this version, in bits.
    pub fn max_prefix_len(&self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }

    /// The default network (`0.0.0.0/0` or `::/0`).
    pub fn default_net(&self) -> IpNet {
        match self {
            Self::V4 => IpNet::from(IpAddr::V4(Ipv4Addr::UNSPECIFIED)).trunc_to(0),
            Self::V6 => IpNet::from(IpAddr::V6(Ipv6Addr::UNSPECIFIED)).trunc_to(0),
        }
    }
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4 => f.write_str("IPv4"),
            Self::V6 => f.write_str("IPv6"),
        }
    }
}

/// Extension methods on [`IpNet`].
pub trait IpNetExt {
    /// The IP version of the network.
    fn version(&self) -> IpVersion;

    /// Shorten the prefix to `len` bits and clear the host bits. A `len` larger than the current
    /// prefix length keeps the current prefix length.
    fn trunc_to(&self, len: u8) -> IpNet;

    /// Whether the address equals its own network address (no host bit is set).
    fn is_network_address(&self) -> bool;

    /// Whether this is the default network of its IP version.
    fn is_default(&self) -> bool;

    /// Whether both networks belong to the same IP version.
    fn same_version(&self, other: &IpNet) -> bool {
        self.version() == other.version()
    }

    /// Whether the two networks share at least one address.
    fn overlaps(&self, other: &IpNet) -> bool;

    /// The host route (`/32` or `/128`) of the address of this network.
    fn host(&self) -> IpNet;
}

impl IpNetExt for IpNet {
    fn version(&self) -> IpVersion {
        match self {
            IpNet::V4(_) => IpVersion::V4,
            IpNet::V6(_) => IpVersion::V6,
        }
    }

    fn trunc_to(&self, len: u8) -> IpNet {
        let mut net = self.trunc();
        while net.prefix_len() > len {
            match net.supernet() {
                Some(s) => net = s,
                None => break,
            }
        }
        net
    }

    fn is_network_address(&self) -> bool {
        self.addr() == self.network()
    }

    fn is_default(&self) -> bool {
        self.prefix_len() == 0
    }

    fn overlaps(&self, other: &IpNet) -> bool {
        self.same_version(other) && (self.contains(other) || other.contains(self))
    }

    fn host(&self) -> IpNet {
        IpNet::from(self.addr())
    }
}
