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

//! Binds names to directories of parquet files.
//!
//! A view is a listing table over every file with the configured extension
//! in one directory. Factor tables are bound under their directory name,
//! snapshot entities as `{Entity}_View`.

use crate::config::setting;
use crate::engine::Engine;
use crate::error::{ParamgenError, Result};
use datafusion::prelude::ParquetReadOptions;
use glob::glob;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// A bound view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// The name queries refer to.
    pub name:      String,
    /// The directory the view reads.
    pub directory: PathBuf,
    /// The files found when the view was bound.
    pub files:     Vec<PathBuf>,
}

/// Creates views on an [`Engine`].
#[derive(Clone)]
pub struct ViewMaterializer {
    engine:    Engine,
    extension: String,
}

impl ViewMaterializer {
    /// Creates a materializer for the configured file extension.
    pub fn new(engine: &Engine) -> Result<Self> {
        Ok(ViewMaterializer::with_extension(
            engine,
            setting("paramgen", "file_extension")?,
        ))
    }

    /// Creates a materializer for files ending in `extension`.
    pub fn with_extension(engine: &Engine, extension: &str) -> Self {
        ViewMaterializer {
            engine:    engine.clone(),
            extension: extension.to_owned(),
        }
    }

    /// Binds `name` to the files in `directory`. A previous binding of the
    /// same name is dropped first.
    pub async fn bind(&self, name: &str, directory: &Path) -> Result<View> {
        if !directory.is_dir() {
            return Err(ParamgenError::Config(format!(
                "directory {} of view {} does not exist",
                directory.display(),
                name
            )));
        }
        let directory = fs::canonicalize(directory)?;
        let mut files = vec![];
        for entry in glob(&format!("{}/*{}", directory.display(), self.extension))? {
            files.push(entry?);
        }
        if files.is_empty() {
            return Err(ParamgenError::Config(format!(
                "directory {} of view {} holds no {} file",
                directory.display(),
                name,
                self.extension
            )));
        }
        files.sort();

        self.engine.drop_table(name)?;
        self.engine
            .context()
            .register_parquet(
                name,
                &format!("{}/", directory.display()),
                ParquetReadOptions {
                    file_extension: &self.extension,
                    ..Default::default()
                },
            )
            .await?;
        info!("Loading {} ({} files)", name, files.len());

        Ok(View {
            name: name.to_owned(),
            directory,
            files,
        })
    }

    /// Binds every sub-directory of `parent` under its directory name.
    pub async fn bind_all(&self, parent: &Path) -> Result<Vec<View>> {
        if !parent.is_dir() {
            return Err(ParamgenError::Config(format!(
                "{} does not exist",
                parent.display()
            )));
        }
        let mut directories = vec![];
        for entry in fs::read_dir(parent)? {
            let path = entry?.path();
            if path.is_dir() {
                directories.push(path);
            }
        }
        if directories.is_empty() {
            return Err(ParamgenError::Config(format!(
                "{} is empty",
                parent.display()
            )));
        }
        directories.sort();

        let mut views = Vec::with_capacity(directories.len());
        for directory in directories {
            let name = directory
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    ParamgenError::Config(format!("invalid table name {}", directory.display()))
                })?
                .to_owned();
            views.push(self.bind(&name, &directory).await?);
        }
        Ok(views)
    }

    /// Binds the snapshot entities `{dynamic_dir}/{Entity}` as `{Entity}_View`.
    /// Every entity is mandatory.
    pub async fn bind_entities(&self, dynamic_dir: &Path, entities: &[String]) -> Result<Vec<View>> {
        let suffix = setting("dependent", "view_suffix")?;
        let mut views = Vec::with_capacity(entities.len());
        for entity in entities {
            let name = format!("{}{}", entity, suffix);
            views.push(self.bind(&name, &dynamic_dir.join(entity)).await?);
        }
        Ok(views)
    }

    /// Binds a single file.
    pub async fn bind_file(&self, name: &str, file: &Path) -> Result<()> {
        if !file.is_file() {
            return Err(ParamgenError::Config(format!(
                "{} does not exist",
                file.display()
            )));
        }
        let file = fs::canonicalize(file)?;
        self.engine.drop_table(name)?;
        self.engine
            .context()
            .register_parquet(
                name,
                &file.to_string_lossy(),
                ParquetReadOptions::default(),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{int64_batch, write_batch};
    use datafusion::assert_batches_sorted_eq;

    #[tokio::test]
    async fn bind_reads_every_file() -> Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("personNumFriends");
        write_batch(
            &dir.join("part-0.parquet"),
            &int64_batch(&[("personId", vec![Some(1)]), ("numFriends", vec![Some(4)])]),
        )?;
        write_batch(
            &dir.join("part-1.parquet"),
            &int64_batch(&[("personId", vec![Some(2)]), ("numFriends", vec![Some(0)])]),
        )?;
        fs::write(dir.join("_SUCCESS"), b"")?;

        let engine = Engine::new();
        let views = ViewMaterializer::new(&engine)?;
        let view = views.bind("personNumFriends", &dir).await?;
        assert_eq!(2, view.files.len());

        let (_, batches) = engine
            .query("SELECT \"personId\", \"numFriends\" FROM personNumFriends")
            .await?;
        assert_batches_sorted_eq!(
            vec![
                "+----------+------------+",
                "| personId | numFriends |",
                "+----------+------------+",
                "| 1        | 4          |",
                "| 2        | 0          |",
                "+----------+------------+",
            ],
            &batches
        );
        Ok(())
    }

    #[tokio::test]
    async fn rebind_replaces_the_view() -> Result<()> {
        let root = tempfile::tempdir()?;
        let old = root.path().join("old");
        let new = root.path().join("new");
        write_batch(&old.join("a.parquet"), &int64_batch(&[("id", vec![Some(1)])]))?;
        write_batch(&new.join("a.parquet"), &int64_batch(&[("id", vec![Some(7)])]))?;

        let engine = Engine::new();
        let views = ViewMaterializer::new(&engine)?;
        views.bind("Person_View", &old).await?;
        views.bind("Person_View", &new).await?;

        let (_, batches) = engine.query("SELECT \"id\" FROM Person_View").await?;
        assert_batches_sorted_eq!(
            vec!["+----+", "| id |", "+----+", "| 7  |", "+----+"],
            &batches
        );
        Ok(())
    }

    #[tokio::test]
    async fn bind_errors() -> Result<()> {
        let root = tempfile::tempdir()?;
        let engine = Engine::new();
        let views = ViewMaterializer::new(&engine)?;

        let missing = views.bind("Forum_View", &root.path().join("Forum")).await;
        assert!(matches!(missing, Err(ParamgenError::Config(_))));

        let empty = root.path().join("Post");
        fs::create_dir_all(&empty)?;
        fs::write(empty.join("part-0.csv"), b"id\n1\n")?;
        match views.bind("Post_View", &empty).await {
            Err(ParamgenError::Config(msg)) => assert!(msg.contains("holds no .parquet file")),
            other => panic!("unexpected: {:?}", other.map(|v| v.name)),
        }

        let factors = root.path().join("factors");
        fs::create_dir_all(&factors)?;
        assert!(matches!(
            views.bind_all(&factors).await,
            Err(ParamgenError::Config(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn factor_tables_and_entities() -> Result<()> {
        let root = tempfile::tempdir()?;
        let factors = root.path().join("factors");
        for table in ["personNumFriends", "countryNumPersons"] {
            write_batch(
                &factors.join(table).join("part-0.parquet"),
                &int64_batch(&[("id", vec![Some(1)])]),
            )?;
        }
        let dynamic = root.path().join("dynamic");
        for entity in ["Person", "Forum"] {
            write_batch(
                &dynamic.join(entity).join("part-0.snappy.parquet"),
                &int64_batch(&[("id", vec![Some(1)]), ("creationDate", vec![Some(10)])]),
            )?;
        }

        let engine = Engine::new();
        let views = ViewMaterializer::new(&engine)?;
        let names: Vec<_> = views
            .bind_all(&factors)
            .await?
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(vec!["countryNumPersons", "personNumFriends"], names);

        let entities = vec!["Person".to_owned(), "Forum".to_owned()];
        views.bind_entities(&dynamic, &entities).await?;
        assert!(engine.table_exist("Person_View")?);
        assert!(engine.table_exist("Forum_View")?);

        let entities = vec!["Comment".to_owned()];
        assert!(views.bind_entities(&dynamic, &entities).await.is_err());
        Ok(())
    }
}
