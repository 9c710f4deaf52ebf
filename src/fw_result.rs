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

//! # Verdict algebra
//!
//! A [`FwResult`] is the verdict of a filter for a probe. It is a set of independent flags:
//! `ACCEPT` and `DENY` carry the decision, `MATCH` marks an inconclusive rule that does not stop
//! the evaluation, and `MAY` marks the decision as uncertain. A verdict without `MAY` is
//! *certain*, otherwise it is *soft*.
//!
//! Verdicts are combined in two different ways:
//! - [`FwResult::concat`] joins two legs that apply to the same packet (ingress and egress of one
//!   hop). A single certain deny is enough to deny the packet.
//! - [`FwResult::sum_path`] joins alternative paths. Both paths must agree for the result to be
//!   certain.

use bitflags::bitflags;

bitflags! {
    /// Flagged verdict of a filter, see the [module documentation](self).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FwResult: u8 {
        /// The probe is accepted
        const ACCEPT = 1;
        /// The probe is denied
        const DENY = 2;
        /// A rule matched without taking a decision
        const MATCH = 4;
        /// The decision is uncertain
        const MAY = 128;
    }
}

/// Verdict of a whole probe tree or probing session. Same shape as [`FwResult`].
pub type AclResult = FwResult;

impl FwResult {
    /// Returns `true` if the `ACCEPT` flag is set.
    pub fn has_accept(&self) -> bool {
        self.contains(Self::ACCEPT)
    }

    /// Returns `true` if the `DENY` flag is set.
    pub fn has_deny(&self) -> bool {
        self.contains(Self::DENY)
    }

    /// Returns `true` if the `MATCH` flag is set.
    pub fn has_match(&self) -> bool {
        self.contains(Self::MATCH)
    }

    /// Returns `true` if the `MAY` flag is set.
    pub fn has_may(&self) -> bool {
        self.contains(Self::MAY)
    }

    /// Accepted, and `MAY` is not set.
    pub fn is_certainly_accept(&self) -> bool {
        self.has_accept() && !self.has_may()
    }

    /// Denied, and `MAY` is not set.
    pub fn is_certainly_deny(&self) -> bool {
        self.has_deny() && !self.has_may()
    }

    /// Combine two legs of the same decision point.
    pub fn concat(self, other: Self) -> Self {
        if self.is_certainly_deny() || other.is_certainly_deny() {
            Self::DENY
        } else {
            self.soft_join(other)
        }
    }

    /// Combine the verdicts of two alternative paths.
    pub fn sum_path(self, other: Self) -> Self {
        if self.is_certainly_deny() && other.is_certainly_deny() {
            Self::DENY
        } else {
            self.soft_join(other)
        }
    }

    /// Common tail of `concat` and `sum_path`, once the certain deny is handled.
    fn soft_join(self, other: Self) -> Self {
        if self.is_certainly_accept() && other.is_certainly_accept() {
            Self::ACCEPT
        } else if self.has_deny() || other.has_deny() {
            Self::MAY | Self::DENY
        } else if self.has_accept() || other.has_accept() {
            Self::MAY | Self::ACCEPT
        } else {
            Self::empty()
        }
    }
}

impl Default for FwResult {
    /// Nothing applied: the probe is accepted.
    fn default() -> Self {
        Self::ACCEPT
    }
}

impl std::fmt::Display for FwResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let words = [
            (Self::MAY, "MAY"),
            (Self::ACCEPT, "ACCEPT"),
            (Self::DENY, "DENY"),
            (Self::MATCH, "MATCH"),
        ];
        let mut first = true;
        for (flag, word) in words {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(word)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Fold the verdicts of an ordered (first match wins) rule list into one verdict.
///
/// Entries with `MATCH` set are skipped. The first certain verdict is returned right away. Once a
/// soft verdict was seen, a following certain verdict is returned if the soft verdict already
/// pointed into its direction; a soft verdict of the same polarity replaces the running one, and
/// anything else ends the fold with the running soft verdict. An empty list accepts.
pub fn reduce_fw_results<I>(results: I) -> FwResult
where
    I: IntoIterator<Item = FwResult>,
{
    let mut last: Option<FwResult> = None;
    for cur in results {
        if cur.has_match() {
            continue;
        }
        match last {
            None => {
                if cur.is_certainly_accept() {
                    return FwResult::ACCEPT;
                }
                if cur.is_certainly_deny() {
                    return FwResult::DENY;
                }
                last = Some(cur);
            }
            Some(l) => {
                if l.has_accept() && cur.is_certainly_accept() {
                    return FwResult::ACCEPT;
                }
                if l.has_deny() && cur.is_certainly_deny() {
                    return FwResult::DENY;
                }
                if (l.has_accept() && cur.has_accept()) || (l.has_deny() && cur.has_deny()) {
                    last = Some(cur);
                    continue;
                }
                return l;
            }
        }
    }
    last.unwrap_or(FwResult::ACCEPT)
}
