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

//! Aggregate of all trackers started for one probing request.

use crate::fw_result::{AclResult, FwResult};
use crate::probe::RoutingResult;
use crate::tracker::ProbesTracker;

/// A probing session: one tracker per injection.
#[derive(Debug, Clone, Default)]
pub struct Probing {
    trackers: Vec<ProbesTracker>,
}

impl Probing {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tracker to the session.
    pub fn push(&mut self, tracker: ProbesTracker) {
        self.trackers.push(tracker);
    }

    /// Trackers of the session
    pub fn trackers(&self) -> &[ProbesTracker] {
        &self.trackers
    }

    /// Number of trackers
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Returns `true` if no probe was started.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Verdict over all trackers, see [`aggregate_acl_results`].
    pub fn acl_result(&self) -> AclResult {
        aggregate_acl_results(self.trackers.iter().map(|t| t.acl_result()))
    }

    /// Routing result over all trackers, see [`aggregate_routing_results`].
    pub fn routing_result(&self) -> RoutingResult {
        aggregate_routing_results(self.trackers.iter().map(|t| t.routing_result()))
    }
}

/// Combine the verdicts of several trackers. Trackers that disagree make the result uncertain,
/// and any `MATCH` turns the result into a bare `MATCH`.
pub fn aggregate_acl_results<I>(results: I) -> AclResult
where
    I: IntoIterator<Item = AclResult>,
{
    let (mut accepted, mut denied, mut may, mut matched) = (0, 0, 0, 0);
    for result in results {
        if result.has_accept() {
            accepted += 1;
        }
        if result.has_deny() {
            denied += 1;
        }
        if result.has_may() {
            may += 1;
        }
        if result.has_match() {
            matched += 1;
        }
    }

    if matched > 0 {
        return FwResult::MATCH;
    }
    let mut result = FwResult::empty();
    if may > 0 || (accepted > 0 && denied > 0) {
        result |= FwResult::MAY;
    }
    if accepted > 0 && denied == 0 {
        result |= FwResult::ACCEPT;
    }
    if denied > 0 && accepted == 0 {
        result |= FwResult::DENY;
    }
    result
}

/// Combine the routing results of several trackers. The result is only `Routed` (or
/// `NotRouted`) if all trackers agree on it.
pub fn aggregate_routing_results<I>(results: I) -> RoutingResult
where
    I: IntoIterator<Item = RoutingResult>,
{
    let (mut routed, mut not_routed, mut unknown) = (0, 0, 0);
    for result in results {
        match result {
            RoutingResult::Routed => routed += 1,
            RoutingResult::NotRouted => not_routed += 1,
            _ => unknown += 1,
        }
    }
    match (routed, not_routed, unknown) {
        (_, _, u) if u > 0 => RoutingResult::Unknown,
        (r, n, _) if r > 0 && n > 0 => RoutingResult::Unknown,
        (r, _, _) if r > 0 => RoutingResult::Routed,
        (_, n, _) if n > 0 => RoutingResult::NotRouted,
        _ => RoutingResult::Unknown,
    }
}
