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

//! # Probesim: static firewall probe simulator
//!
//! This library answers one question about a modeled network of routers and firewalls: if a
//! packet with given source and destination addresses and protocol attributes were injected at
//! some point, would it reach its destination, and would the filters along every possible path
//! accept it, deny it, or both depending on the path?
//!
//! ## Structure
//! - The verdict algebra ([`fw_result`]) and the match algebra ([`match_result`]) combine the
//!   outcome of individual rules, legs, hops and paths.
//! - The [`routing`] module contains the longest-prefix-match [`RoutingTable`] with recursive
//!   next-hop resolution.
//! - A [`Network`] ([`network`]) holds the [`Equipment`]s, the network segments, and the
//!   interface links between them.
//! - The [`Simulator`] ([`simulator`]) forwards a [`Probe`] hop by hop, forking on multiple
//!   routes. The resulting tree is owned by a [`ProbesTracker`] ([`tracker`]), which classifies
//!   every leaf as final, killed or looping and aggregates the verdict. Several trackers form a
//!   [`Probing`] session.
//! - Networks are described in JSON ([`config`]).
//!
//! ## Example
//!
//! ```rust
//! use probesim::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut net = Network::new();
//!     let r1 = net.add_equipment(Equipment::router("r1"))?;
//!     net.add_iface(r1, "eth0", "10.0.0.1/24".parse()?)?;
//!     net.add_iface(r1, "eth1", "10.0.1.1/24".parse()?)?;
//!
//!     let options = Options::default();
//!     let sim = Simulator::new(&net, &options);
//!     let probing = sim.probe_from(
//!         "r1",
//!         "10.0.0.5/32".parse()?,
//!         "10.0.1.5/32".parse()?,
//!         ProbeRequest::any(),
//!     )?;
//!     assert_eq!(probing.routing_result(), RoutingResult::Routed);
//!     assert_eq!(probing.acl_result(), FwResult::ACCEPT);
//!     Ok(())
//! }
//! ```

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::result_large_err)]

pub mod acl;
pub mod config;
pub mod equipment;
pub mod formatter;
pub mod fw_result;
pub mod match_result;
pub mod network;
pub mod prelude;
pub mod probe;
pub mod probing;
pub mod report;
pub mod routing;
pub mod simulator;
#[cfg(test)]
mod test;
pub mod tracker;
pub mod types;

pub use equipment::Equipment;
pub use network::Network;
pub use probe::Probe;
pub use probing::Probing;
pub use routing::RoutingTable;
pub use simulator::Simulator;
pub use tracker::ProbesTracker;
