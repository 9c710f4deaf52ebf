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

//! Four-valued result of testing a requested value against a static object definition.

use serde::{Deserialize, Serialize};

/// Result of testing a value (an address range, a protocol set, a port range) against a rule
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    /// Certainly disjoint
    Not,
    /// Partial overlap, the outcome depends on the concrete packet
    Match,
    /// Certainly contained
    All,
    /// The object is not modeled
    Unknown,
}

impl MatchResult {
    /// Rank used to pick the most informative of several results: `Not < Match < Unknown <= All`.
    fn certainty(&self) -> u8 {
        match self {
            Self::Not => 0,
            Self::Match => 1,
            Self::Unknown => 2,
            Self::All => 3,
        }
    }

    /// Returns `true` unless the result is `Not`.
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::Not)
    }

    /// Pick the most informative of several results. An empty input yields `Not`.
    pub fn most_informative<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        results
            .into_iter()
            .max_by_key(|r| r.certainty())
            .unwrap_or(Self::Not)
    }
}

impl std::ops::Not for MatchResult {
    type Output = Self;

    /// Negate a result: `All` and `Not` swap, `Match` and `Unknown` stay.
    fn not(self) -> Self {
        match self {
            Self::All => Self::Not,
            Self::Not => Self::All,
            Self::Match => Self::Match,
            Self::Unknown => Self::Unknown,
        }
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Not => "NOT",
            Self::Match => "MATCH",
            Self::All => "ALL",
            Self::Unknown => "UNKNOWN",
        })
    }
}
