// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

#![warn(missing_docs, clippy::needless_borrow)]
// Clippy lints, some should be disabled incrementally
#![allow(
    clippy::module_inception,
    clippy::new_without_default,
    clippy::type_complexity,
    clippy::upper_case_acronyms
)]

//! Parameter curation for the LDBC SNB Interactive update streams.
//!
//! The crate drives an embedded [DataFusion](https://github.com/apache/arrow-datafusion)
//! session over pre-computed factor tables and raw snapshot data. It slides a
//! day-stepped bucket over the update period, accumulates the candidates of
//! every query type, keeps only the most recent validity record per logical
//! key and exports one parquet file per query type. A second flow augments
//! the raw insert/delete event files with the dependent time of each event.

pub mod accumulate;
pub mod catalog;
pub mod config;
pub mod datasink;
pub mod dedup;
pub mod dependent;
pub mod engine;
pub mod error;
pub mod paramgen;
pub mod prelude;
pub mod relation;
pub mod scratch;
pub mod template;
pub mod test_util;
pub mod view;
pub mod window;
