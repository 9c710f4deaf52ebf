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

//! Convenience re-export of common members.

pub use crate::acl::{AclRule, Action, Direction};
pub use crate::config::NetworkConfig;
pub use crate::equipment::{Equipment, EquipmentKind};
pub use crate::formatter::{NetworkFormatter, ProbePath};
pub use crate::fw_result::{reduce_fw_results, AclResult, FwResult};
pub use crate::match_result::MatchResult;
pub use crate::network::{EgressResolution, Network};
pub use crate::probe::{PortSpec, Probe, ProbeOptions, ProbeRequest, RoutingResult, TcpFlags};
pub use crate::probing::Probing;
pub use crate::routing::{Route, RoutingTable};
pub use crate::simulator::{Options, Simulator};
pub use crate::tracker::ProbesTracker;
pub use crate::types::{ConfigError, EquipmentId, IpNetExt, LinkId, ProbeError, ProbeId};
