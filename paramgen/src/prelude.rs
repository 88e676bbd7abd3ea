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

//! A "prelude" for users of the paramgen crate.
//!
//! Like the standard library's prelude, this module simplifies importing of
//! common items. Unlike the standard prelude, the contents of this module must
//! be imported manually:
//!
//! ```
//! use paramgen::prelude::*;
//! ```

pub use crate::accumulate::Accumulator;
pub use crate::catalog::event::{Dependency, DependencyMapping, EventType, Operation};
pub use crate::catalog::query::{QueryKind, QueryType};
pub use crate::config::{DependentTimeConfig, GenerateConfig, PARAMGEN_CONF};
pub use crate::datasink::ParquetSink;
pub use crate::dedup::{ConflictPolicy, Deduplicator};
pub use crate::dependent::{
    DependencyResolver, DependencyTime, DependentTimeAppender, ResolveReport, ResolvedEvents,
    UnmatchedPolicy,
};
pub use crate::engine::Engine;
pub use crate::error::{ParamgenError, Result};
pub use crate::paramgen::{ExportedParameters, GenerationReport, ParameterGenerator};
pub use crate::relation::Relation;
pub use crate::template::{QueryParameters, QueryTemplate, TemplateDirectory};
pub use crate::view::{View, ViewMaterializer};
pub use crate::window::BucketSchedule;
