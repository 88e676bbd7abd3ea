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

//! Parquet output of finalized parameters and rewritten event files.

use crate::catalog::query::QueryType;
use crate::config::setting;
use crate::error::Result;
use crate::relation::Relation;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::ArrowWriter;
use log::info;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Writes `batches` into a single parquet file at `path`.
pub fn write_parquet(path: &Path, schema: SchemaRef, batches: &[RecordBatch]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Paramgen writes one parquet file per query type into the output
/// directory.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    output_dir: PathBuf,
    prefix:     String,
}

impl ParquetSink {
    /// Creates a sink writing `{prefix}-{query}.parquet` files.
    pub fn new<P: Into<PathBuf>>(output_dir: P, prefix: &str) -> Self {
        ParquetSink {
            output_dir: output_dir.into(),
            prefix:     prefix.to_owned(),
        }
    }

    /// Creates a sink with the configured output directory and prefix.
    pub fn try_default() -> Result<Self> {
        Ok(ParquetSink::new(
            setting("paramgen", "output_dir")?,
            setting("paramgen", "output_prefix")?,
        ))
    }

    /// The output directory.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The output path of `query`.
    pub fn path_for(&self, query: &QueryType) -> PathBuf {
        self.output_dir.join(query.output_file(&self.prefix))
    }

    /// Writes `relation` as the parameters of `query`, replacing any previous
    /// file.
    pub fn export(&self, query: &QueryType, relation: &Relation) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(query);
        write_parquet(&path, relation.schema(), relation.batches())?;
        info!(
            "- Q{} TO {} ({} rows)",
            query.name,
            path.display(),
            relation.num_rows()
        );
        Ok(path)
    }
}
