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

//! # Probes
//!
//! A [`Probe`] is a simulated packet. Probes form a tree owned by a
//! [`ProbesTracker`](crate::tracker::ProbesTracker): the root is the injected probe, and every
//! child is one way the parent was forwarded. One probe covers one link traversal. It carries the
//! egress leg on the equipment it leaves (absent for the root) and the ingress leg on the
//! equipment it arrives at (absent when it ends on a network segment).

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use bitflags::bitflags;
use ipnet::IpNet;
use itertools::Itertools;
use lazy_static::lazy_static;
use maplit::hashmap;
use serde::{Deserialize, Serialize};

use crate::fw_result::{AclResult, FwResult};
use crate::types::{ConfigError, LinkId, ProbeId};

/// IP protocol number
pub type Protocol = u8;

/// Default time to live of an injected probe.
pub const DEFAULT_TTL: u8 = 64;

lazy_static! {
    static ref PROTOCOL_NAMES: HashMap<&'static str, Protocol> = hashmap! {
        "icmp" => 1,
        "igmp" => 2,
        "tcp" => 6,
        "udp" => 17,
        "gre" => 47,
        "esp" => 50,
        "ah" => 51,
        "icmp6" => 58,
        "ipv6-icmp" => 58,
        "ospf" => 89,
        "sctp" => 132,
    };
}

/// Parse a protocol given by its number or by its name (e.g. `tcp`).
pub fn parse_protocol(s: &str) -> Result<Protocol, ConfigError> {
    if let Ok(p) = s.parse() {
        return Ok(p);
    }
    PROTOCOL_NAMES
        .get(s.to_ascii_lowercase().as_str())
        .copied()
        .ok_or_else(|| ConfigError::InvalidOptionValue("protocol".to_string(), s.to_string()))
}

/// Inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortSpec {
    first: u16,
    last: u16,
}

impl PortSpec {
    /// A single port
    pub fn single(port: u16) -> Self {
        Self {
            first: port,
            last: port,
        }
    }

    /// All ports between `a` and `b` (both included, in any order).
    pub fn range(a: u16, b: u16) -> Self {
        Self {
            first: a.min(b),
            last: a.max(b),
        }
    }

    /// First port of the range
    pub fn first(&self) -> u16 {
        self.first
    }

    /// Last port of the range
    pub fn last(&self) -> u16 {
        self.last
    }

    /// Returns `true` if every port of `other` is inside `self`.
    pub fn contains(&self, other: &Self) -> bool {
        self.first <= other.first && other.last <= self.last
    }

    /// Returns `true` if the ranges share at least one port.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.first <= other.last && other.first <= self.last
    }
}

impl std::fmt::Display for PortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

impl FromStr for PortSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidOptionValue("port".to_string(), s.to_string());
        let port = |p: &str| p.trim().parse::<u16>().map_err(|_| invalid());
        match s.split_once('-') {
            Some((a, b)) => Ok(Self::range(port(a)?, port(b)?)),
            None => Ok(Self::single(port(s)?)),
        }
    }
}

bitflags! {
    /// TCP flags of a probe.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TcpFlags: u8 {
        /// FIN
        const FIN = 1;
        /// SYN
        const SYN = 2;
        /// RST
        const RST = 4;
        /// PSH
        const PSH = 8;
        /// ACK
        const ACK = 16;
        /// URG
        const URG = 32;
    }
}

const TCP_FLAG_LETTERS: [(TcpFlags, char); 6] = [
    (TcpFlags::FIN, 'F'),
    (TcpFlags::SYN, 'S'),
    (TcpFlags::RST, 'R'),
    (TcpFlags::PSH, 'P'),
    (TcpFlags::ACK, 'A'),
    (TcpFlags::URG, 'U'),
];

impl std::fmt::Display for TcpFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (flag, c) in TCP_FLAG_LETTERS {
            if self.contains(flag) {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

impl FromStr for TcpFlags {
    type Err = ConfigError;

    /// Parse flags written as letters, e.g. `SA` for SYN and ACK.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars().try_fold(TcpFlags::empty(), |flags, c| {
            TCP_FLAG_LETTERS
                .iter()
                .find(|(_, l)| l.eq_ignore_ascii_case(&c))
                .map(|(flag, _)| flags | *flag)
                .ok_or_else(|| ConfigError::InvalidOptionValue("flags".to_string(), s.to_string()))
        })
    }
}

/// Options of a probe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// Only route the probe, do not report ACL decisions as meaningful
    #[serde(default)]
    pub no_action: bool,
    /// Stop forwarding as soon as a leg is certainly denied
    #[serde(default)]
    pub quick_deny: bool,
    /// The probe belongs to an established connection
    #[serde(default)]
    pub state: bool,
}

/// Protocol attributes of a probe. The request is copied into every child probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProbeRequest {
    /// Requested protocols, `None` means any protocol
    pub protocols: Option<BTreeSet<Protocol>>,
    /// ICMP type
    pub sub_type: Option<u8>,
    /// ICMP code
    pub code: Option<u8>,
    /// Source port
    pub source_port: Option<PortSpec>,
    /// Destination port
    pub dest_port: Option<PortSpec>,
    /// TCP flags
    pub tcp_flags: Option<TcpFlags>,
    /// Options
    pub options: ProbeOptions,
}

impl ProbeRequest {
    /// Request for any protocol and any port
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict the request to the given protocols.
    pub fn protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.protocols = Some(protocols.into_iter().collect());
        self
    }

    /// Restrict the request to a destination port range.
    pub fn dest_port(mut self, port: PortSpec) -> Self {
        self.dest_port = Some(port);
        self
    }

    /// Restrict the request to a source port range.
    pub fn source_port(mut self, port: PortSpec) -> Self {
        self.source_port = Some(port);
        self
    }

    /// Set the TCP flags of the request.
    pub fn tcp_flags(mut self, flags: TcpFlags) -> Self {
        self.tcp_flags = Some(flags);
        self
    }

    /// Set the options of the request.
    pub fn options(mut self, options: ProbeOptions) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.protocols {
            None => f.write_str("proto any")?,
            Some(p) => write!(f, "proto {}", p.iter().join(","))?,
        }
        if let Some(p) = self.source_port {
            write!(f, " sport {}", p)?;
        }
        if let Some(p) = self.dest_port {
            write!(f, " dport {}", p)?;
        }
        if let Some(t) = self.sub_type {
            write!(f, " type {}", t)?;
        }
        if let Some(c) = self.code {
            write!(f, " code {}", c)?;
        }
        if let Some(flags) = self.tcp_flags {
            write!(f, " flags {}", flags)?;
        }
        Ok(())
    }
}

/// Terminal classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoutingResult {
    /// Not classified (yet)
    Unknown,
    /// No route to the destination
    NotRouted,
    /// Dropped, e.g. the time to live expired
    Killed,
    /// The probe would revisit a state of one of its ancestors
    Loop,
    /// The destination was reached
    Routed,
}

impl std::fmt::Display for RoutingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unknown => "UNKNOWN",
            Self::NotRouted => "NOTROUTED",
            Self::Killed => "KILLED",
            Self::Loop => "LOOP",
            Self::Routed => "ROUTED",
        })
    }
}

/// An access control rule that matched a probe, with the verdict it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlList {
    /// Textual form of the rule
    pub text: String,
    /// Verdict of the rule for the probe
    pub result: FwResult,
}

impl AccessControlList {
    /// Create a new record
    pub fn new(text: impl Into<String>, result: FwResult) -> Self {
        Self {
            text: text.into(),
            result,
        }
    }
}

impl std::fmt::Display for AccessControlList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>6} {}", self.result.to_string(), self.text)
    }
}

/// Outcome of evaluating the filter of one leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEvaluation {
    /// Verdict of the leg
    pub result: FwResult,
    /// Every rule that matched, in evaluation order
    pub matching: Vec<AccessControlList>,
    /// The rules that made the decision
    pub active: Vec<AccessControlList>,
    /// Free text events
    pub events: Vec<String>,
}

impl Default for AclEvaluation {
    fn default() -> Self {
        Self {
            result: FwResult::ACCEPT,
            matching: Vec::new(),
            active: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Per-hop bookkeeping of a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResults {
    ingress: AclEvaluation,
    egress: AclEvaluation,
    routing_result: RoutingResult,
    events: Vec<String>,
    iface_in: Option<String>,
    iface_out: Option<String>,
}

impl Default for ProbeResults {
    fn default() -> Self {
        Self {
            ingress: AclEvaluation::default(),
            egress: AclEvaluation::default(),
            routing_result: RoutingResult::Unknown,
            events: Vec::new(),
            iface_in: None,
            iface_out: None,
        }
    }
}

impl ProbeResults {
    /// Record the evaluation of the ingress leg.
    pub fn set_ingress(&mut self, iface: impl Into<String>, evaluation: AclEvaluation) {
        self.iface_in = Some(iface.into());
        self.events.extend(evaluation.events.iter().cloned());
        self.ingress = evaluation;
    }

    /// Record the evaluation of the egress leg.
    pub fn set_egress(&mut self, iface: impl Into<String>, evaluation: AclEvaluation) {
        self.iface_out = Some(iface.into());
        self.events.extend(evaluation.events.iter().cloned());
        self.egress = evaluation;
    }

    /// Ingress leg
    pub fn ingress(&self) -> &AclEvaluation {
        &self.ingress
    }

    /// Egress leg
    pub fn egress(&self) -> &AclEvaluation {
        &self.egress
    }

    /// Verdict of the hop: both legs concatenated.
    pub fn acl_result(&self) -> AclResult {
        self.ingress.result.concat(self.egress.result)
    }

    /// Routing classification of the probe
    pub fn routing_result(&self) -> RoutingResult {
        self.routing_result
    }

    pub(crate) fn set_routing_result(&mut self, result: RoutingResult) {
        self.routing_result = result;
    }

    /// Append an event to the log.
    pub fn add_event(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    /// Event log
    pub fn events(&self) -> &[String] {
        &self.events
    }

    /// Name of the ingress interface
    pub fn iface_in(&self) -> Option<&str> {
        self.iface_in.as_deref()
    }

    /// Name of the egress interface
    pub fn iface_out(&self) -> Option<&str> {
        self.iface_out.as_deref()
    }

    /// Text report of the matching (only if `verbose`) and active rules of both legs.
    pub fn show_acl_results(&self, verbose: bool) -> String {
        let mut s = String::new();
        let legs = [
            ("input", self.iface_in(), &self.ingress),
            ("output", self.iface_out(), &self.egress),
        ];
        for (dir, iface, leg) in legs {
            let iface = iface.unwrap_or("");
            if verbose {
                s.push_str(&format!("Matching ACL on {}: {}\n", dir, iface));
                for acl in leg.matching.iter() {
                    s.push_str(&format!("  {}\n", acl));
                }
            }
            s.push_str(&format!("Active ACL on {}: {}\n", dir, iface));
            for acl in leg.active.iter() {
                s.push_str(&format!("  {}\n", acl));
            }
        }
        s
    }
}

/// Egress leg of a probe: the interface link it leaves through, and the next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeLeg {
    /// Outgoing interface link
    pub link: LinkId,
    /// Next hop (a host, or the destination network for a connected route)
    pub next_hop: IpNet,
}

/// A node of the probe tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    id: ProbeId,
    parent: Option<ProbeId>,
    children: Vec<ProbeId>,
    source: IpNet,
    destination: IpNet,
    request: ProbeRequest,
    ttl: u8,
    egress: Option<ProbeLeg>,
    incoming: Option<LinkId>,
    results: ProbeResults,
}

impl Probe {
    pub(crate) fn new_root(
        id: ProbeId,
        source: IpNet,
        destination: IpNet,
        request: ProbeRequest,
        ttl: u8,
        incoming: LinkId,
    ) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            source,
            destination,
            request,
            ttl,
            egress: None,
            incoming: Some(incoming),
            results: ProbeResults::default(),
        }
    }

    /// Create a child leaving through `leg`. The request is copied.
    pub(crate) fn new_child(&self, id: ProbeId, leg: ProbeLeg) -> Self {
        Self {
            id,
            parent: Some(self.id),
            children: Vec::new(),
            source: self.source,
            destination: self.destination,
            request: self.request.clone(),
            ttl: self.ttl,
            egress: Some(leg),
            incoming: None,
            results: ProbeResults::default(),
        }
    }

    /// Unique id in the tracker
    pub fn id(&self) -> ProbeId {
        self.id
    }

    /// Parent probe, `None` for the root
    pub fn parent(&self) -> Option<ProbeId> {
        self.parent
    }

    /// Children, in forwarding order
    pub fn children(&self) -> &[ProbeId] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: ProbeId) {
        self.children.push(child);
    }

    /// Returns `true` if the probe was forwarded further.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Source address range
    pub fn source(&self) -> IpNet {
        self.source
    }

    /// Destination address range
    pub fn destination(&self) -> IpNet {
        self.destination
    }

    /// Protocol attributes
    pub fn request(&self) -> &ProbeRequest {
        &self.request
    }

    /// Remaining time to live
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Count one more equipment. Returns `false` if the time to live is already exhausted.
    pub(crate) fn decrement_ttl(&mut self) -> bool {
        match self.ttl.checked_sub(1) {
            Some(ttl) => {
                self.ttl = ttl;
                true
            }
            None => false,
        }
    }

    /// Egress leg, `None` for the root
    pub fn egress(&self) -> Option<ProbeLeg> {
        self.egress
    }

    /// Link through which the probe arrived at an equipment
    pub fn incoming(&self) -> Option<LinkId> {
        self.incoming
    }

    pub(crate) fn set_incoming(&mut self, link: LinkId) {
        self.incoming = Some(link);
    }

    /// Per-hop results
    pub fn results(&self) -> &ProbeResults {
        &self.results
    }

    pub(crate) fn results_mut(&mut self) -> &mut ProbeResults {
        &mut self.results
    }

    /// Returns `true` if `other` carries the same packet: same addresses and same request.
    pub fn same_packet(&self, other: &Probe) -> bool {
        self.source == other.source
            && self.destination == other.destination
            && self.request == other.request
    }

    /// `<#uid, #parent>`
    pub fn uid_to_string(&self) -> String {
        match self.parent {
            Some(p) => format!("<{}, {}>", self.id, p),
            None => format!("<{}, -->", self.id),
        }
    }
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.uid_to_string(),
            self.source,
            self.destination,
            self.request
        )
    }
}
