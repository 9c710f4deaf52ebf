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

use crate::fw_result::{reduce_fw_results, FwResult};

const A: FwResult = FwResult::ACCEPT;
const D: FwResult = FwResult::DENY;
const M: FwResult = FwResult::MATCH;
const MAY: FwResult = FwResult::MAY;

#[test]
fn certainty() {
    assert!(A.is_certainly_accept());
    assert!(!(MAY | A).is_certainly_accept());
    assert!((MAY | A).has_accept());
    assert!(D.is_certainly_deny());
    assert!(!(MAY | D).is_certainly_deny());
    assert!(!FwResult::empty().has_accept());
    assert_eq!(FwResult::default(), A);
}

#[test]
fn display() {
    assert_eq!((MAY | A).to_string(), "MAY ACCEPT");
    assert_eq!((D | MAY).to_string(), "MAY DENY");
    assert_eq!((A | D | M | MAY).to_string(), "MAY ACCEPT DENY MATCH");
    assert_eq!(FwResult::empty().to_string(), "");
}

#[test]
fn concat() {
    assert_eq!(D.concat(A), D);
    assert_eq!(A.concat(D), D);
    assert_eq!((MAY | A).concat(MAY | A), MAY | A);
    assert_eq!(A.concat(A), A);
    assert_eq!(D.concat(FwResult::empty()), D);
    assert_eq!((MAY | D).concat(A), MAY | D);
    assert_eq!((MAY | A).concat(A), MAY | A);
    assert_eq!((MAY | D).concat(MAY | A), MAY | D);
    assert_eq!(M.concat(M), FwResult::empty());
}

#[test]
fn sum_path() {
    assert_eq!(D.sum_path(A), MAY | D);
    assert_eq!(A.sum_path(D), MAY | D);
    assert_eq!(D.sum_path(D), D);
    assert_eq!(A.sum_path(A), A);
    assert_eq!(D.sum_path(FwResult::empty()), MAY | D);
    assert_eq!(A.sum_path(FwResult::empty()), MAY | A);
    assert_eq!((MAY | A).sum_path(A), MAY | A);
}

#[test]
fn reduce_certain() {
    assert_eq!(reduce_fw_results([]), A);
    assert_eq!(reduce_fw_results([M, D, A]), D);
    assert_eq!(reduce_fw_results([A, D]), A);
    assert_eq!(reduce_fw_results([M | MAY, M, A]), A);
}

#[test]
fn reduce_soft() {
    assert_eq!(reduce_fw_results([MAY | A, A]), A);
    assert_eq!(reduce_fw_results([MAY | D, D]), D);
    assert_eq!(reduce_fw_results([MAY | D, A]), MAY | D);
    assert_eq!(reduce_fw_results([MAY | D, A, D]), MAY | D);
    assert_eq!(reduce_fw_results([MAY | A, D]), MAY | A);
    assert_eq!(reduce_fw_results([MAY | A, D, A]), MAY | A);
    assert_eq!(reduce_fw_results([MAY | A, MAY | A, A]), A);
    assert_eq!(reduce_fw_results([MAY | D, MAY | D, D, MAY | D]), D);
    assert_eq!(reduce_fw_results([MAY | D, M, D, MAY | D]), D);
    assert_eq!(reduce_fw_results([MAY | D, MAY | D]), MAY | D);
    assert_eq!(reduce_fw_results([MAY | A, MAY | A]), MAY | A);
    assert_eq!(reduce_fw_results([MAY | A, MAY | D, A]), MAY | A);
}
