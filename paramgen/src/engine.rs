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

//! The engine handle every component runs its statements through.
//!
//! One [`Engine`] is opened per run and handed to the components explicitly.
//! Cloning it is cheap: clones share the same DataFusion session, so a view
//! bound through one clone is visible to every other.

use crate::error::Result;
use crate::relation::Relation;
use crate::scratch;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::execution::disk_manager::DiskManagerConfig;
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::{SessionConfig, SessionContext};
use itertools::Itertools;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A DataFusion session with an optional working directory for spills.
#[derive(Clone)]
pub struct Engine {
    ctx:         SessionContext,
    scratch_dir: Option<PathBuf>,
}

impl Engine {
    /// Creates an in-memory engine.
    pub fn new() -> Self {
        Engine {
            ctx:         SessionContext::new(),
            scratch_dir: None,
        }
    }

    /// Opens an engine that spills to `scratch_dir`. Leftovers of a previous
    /// run are removed first.
    pub fn open(scratch_dir: &Path, target_partitions: usize) -> Result<Self> {
        scratch::reset_dir(scratch_dir)?;
        let runtime = RuntimeEnvBuilder::new()
            .with_disk_manager(DiskManagerConfig::NewSpecified(vec![scratch_dir.to_path_buf()]))
            .build()?;
        let config = SessionConfig::new().with_target_partitions(target_partitions.max(1));
        info!(
            "Engine opened with {} partitions, working directory {}",
            target_partitions.max(1),
            scratch_dir.display()
        );
        Ok(Engine {
            ctx:         SessionContext::new_with_config_rt(config, Arc::new(runtime)),
            scratch_dir: Some(scratch_dir.to_path_buf()),
        })
    }

    /// The underlying session.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Plans a statement.
    pub async fn sql(&self, sql: &str) -> Result<DataFrame> {
        debug!("{}", sql);
        Ok(self.ctx.sql(sql).await?)
    }

    /// Runs a query to completion.
    pub async fn query(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let df = self.sql(sql).await?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        Ok((schema, batches))
    }

    /// Registers `relation` under its name, replacing any previous table.
    pub fn register_relation(&self, relation: &Relation) -> Result<()> {
        self.drop_table(relation.name())?;
        self.ctx
            .register_table(relation.name(), Arc::new(relation.to_mem_table()?))?;
        Ok(())
    }

    /// Drops a table or view. Dropping a missing name is not an error.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.ctx.deregister_table(name)?;
        Ok(())
    }

    /// Returns whether `name` is registered.
    pub fn table_exist(&self, name: &str) -> Result<bool> {
        Ok(self.ctx.table_exist(name)?)
    }

    /// Closes the engine and removes its working directory.
    pub fn close(self) {
        if let Some(dir) = self.scratch_dir {
            scratch::remove_dir_best_effort(&dir);
        }
    }
}

/// Quotes an identifier so that its case survives the SQL planner.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes and joins a column list, optionally qualified with `alias`.
pub fn column_list<S: AsRef<str>>(columns: &[S], alias: Option<&str>) -> String {
    columns
        .iter()
        .map(|c| match alias {
            Some(alias) => format!("{}.{}", alias, quote(c.as_ref())),
            None => quote(c.as_ref()),
        })
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::int64_batch;
    use datafusion::assert_batches_sorted_eq;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!("\"personId\"", quote("personId"));
        assert_eq!("\"a\"\"b\"", quote("a\"b"));
        assert_eq!(
            "t.\"PersonId\", t.\"TagId\"",
            column_list(&["PersonId", "TagId"], Some("t"))
        );
        assert_eq!("\"id\"", column_list(&["id".to_string()], None));
    }

    #[tokio::test]
    async fn relations_are_replaced() -> Result<()> {
        let engine = Engine::new();
        let batch = int64_batch(&[("personId", vec![Some(1), Some(2)])]);
        let relation = Relation::create("Q_7", batch.schema(), vec![batch])?;
        engine.register_relation(&relation)?;
        assert!(engine.table_exist("Q_7")?);

        let batch = int64_batch(&[("personId", vec![Some(3)])]);
        let relation = Relation::create("Q_7", batch.schema(), vec![batch])?;
        engine.register_relation(&relation)?;

        let (_, batches) = engine.query("SELECT \"personId\" FROM Q_7").await?;
        assert_batches_sorted_eq!(
            vec!["+----------+", "| personId |", "+----------+", "| 3        |", "+----------+"],
            &batches
        );

        engine.drop_table("Q_7")?;
        engine.drop_table("Q_7")?;
        assert!(!engine.table_exist("Q_7")?);
        Ok(())
    }

    #[tokio::test]
    async fn open_resets_the_working_directory() -> Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("scratch");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("paramgen.stale"), b"x")?;

        let engine = Engine::open(&dir, 2)?;
        assert!(dir.is_dir());
        assert!(!dir.join("paramgen.stale").exists());

        engine.close();
        assert!(!dir.exists());
        Ok(())
    }
}
