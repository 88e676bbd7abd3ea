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

//! Paramgen error types

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use datafusion::parquet::errors::ParquetError;

use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::result;

/// Result type for operations that could result in a [ParamgenError]
pub type Result<T> = result::Result<T, ParamgenError>;

/// Paramgen error
#[derive(Debug)]
pub enum ParamgenError {
    /// Error raised before any processing starts, e.g. a missing input
    /// directory, a malformed date or a non-positive bucket width.
    Config(String),
    /// Error returned when a query template cannot be read or bound.
    Template(String),
    /// Error returned when a relation or an input file does not carry the
    /// columns the catalog expects.
    SchemaMismatch(String),
    /// Error returned when an update event file has no entry in the event
    /// catalog.
    UnknownEventType(String),
    /// Error returned by the deduplicator when a logical key keeps more than
    /// one validity record and the conflict policy rejects it.
    Conflict(String),
    /// Error returned when update events have no matching parent entity and
    /// the unmatched policy rejects the batch.
    UnresolvedDependency(String),
    /// Error associated to I/O operations and associated traits.
    IoError(io::Error),
    /// Error returned when Arrow is unexpectedly executed.
    Arrow(ArrowError),
    /// Error returned when reading or writing parquet files fails.
    Parquet(ParquetError),
    /// Error returned when DataFusion is unexpectedly executed.
    DataFusion(DataFusionError),
    /// Error returned when a glob pattern is invalid or a matched path cannot
    /// be read.
    Glob(String),
    /// Error returned as a consequence of an error in paramgen.
    /// This error should not happen in normal usage of paramgen.
    Internal(String),
}

impl From<io::Error> for ParamgenError {
    fn from(e: io::Error) -> Self {
        ParamgenError::IoError(e)
    }
}

impl From<ArrowError> for ParamgenError {
    fn from(e: ArrowError) -> Self {
        ParamgenError::Arrow(e)
    }
}

impl From<ParquetError> for ParamgenError {
    fn from(e: ParquetError) -> Self {
        ParamgenError::Parquet(e)
    }
}

impl From<DataFusionError> for ParamgenError {
    fn from(e: DataFusionError) -> Self {
        ParamgenError::DataFusion(e)
    }
}

impl From<glob::PatternError> for ParamgenError {
    fn from(e: glob::PatternError) -> Self {
        ParamgenError::Glob(e.to_string())
    }
}

impl From<glob::GlobError> for ParamgenError {
    fn from(e: glob::GlobError) -> Self {
        ParamgenError::Glob(e.to_string())
    }
}

impl From<chrono::ParseError> for ParamgenError {
    fn from(e: chrono::ParseError) -> Self {
        ParamgenError::Config(format!("invalid date: {}", e))
    }
}

impl Display for ParamgenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            ParamgenError::Config(ref desc) => write!(f, "Configuration error: {}", desc),
            ParamgenError::Template(ref desc) => write!(f, "Query template error: {}", desc),
            ParamgenError::SchemaMismatch(ref desc) => write!(f, "Schema mismatch: {}", desc),
            ParamgenError::UnknownEventType(ref desc) => {
                write!(f, "Unknown update event type: {}", desc)
            }
            ParamgenError::Conflict(ref desc) => write!(f, "Conflicting parameters: {}", desc),
            ParamgenError::UnresolvedDependency(ref desc) => {
                write!(f, "Unresolved dependency: {}", desc)
            }
            ParamgenError::IoError(ref desc) => write!(f, "IO error: {}", desc),
            ParamgenError::Arrow(ref desc) => write!(f, "Arrow error: {}", desc),
            ParamgenError::Parquet(ref desc) => write!(f, "Parquet error: {}", desc),
            ParamgenError::DataFusion(ref desc) => write!(f, "DataFusion error: {:?}", desc),
            ParamgenError::Glob(ref desc) => write!(f, "Glob error: {}", desc),
            ParamgenError::Internal(ref desc) => write!(
                f,
                "Internal error: {}. This was likely caused by a bug in paramgen's \
                    code and we would welcome that you file an bug report in our issue tracker",
                desc
            ),
        }
    }
}

impl error::Error for ParamgenError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ParamgenError::IoError(e) => Some(e),
            ParamgenError::Arrow(e) => Some(e),
            ParamgenError::Parquet(e) => Some(e),
            ParamgenError::DataFusion(e) => Some(e),
            _ => None,
        }
    }
}
