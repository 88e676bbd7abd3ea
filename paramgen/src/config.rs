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

//! Configuration settings that affect all crates in current system.
//!
//! Defaults are kept in the embedded `config.toml` and can be overridden per
//! run through [`GenerateConfig`] and [`DependentTimeConfig`], which validate
//! everything the command line hands over before any processing starts.

use crate::dedup::ConflictPolicy;
use crate::dependent::UnmatchedPolicy;
use crate::error::{ParamgenError, Result};
use crate::window::BucketSchedule;
use chrono::NaiveDate;
use ini::Ini;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::str::FromStr;

lazy_static! {
    /// Global settings.
    pub static ref PARAMGEN_CONF: Ini = Ini::load_from_str(include_str!("./config.toml"))
        .expect("embedded config.toml is not a valid ini file");
}

/// The date format accepted on the command line.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Returns the value of `key` in `section` of the embedded settings.
pub fn setting(section: &str, key: &str) -> Result<&'static str> {
    PARAMGEN_CONF
        .section(Some(section))
        .and_then(|properties| properties.get(key))
        .ok_or_else(|| ParamgenError::Config(format!("missing setting [{}] {}", section, key)))
}

/// Returns the value of `key` in `section` parsed into `T`.
pub fn setting_as<T: FromStr>(section: &str, key: &str) -> Result<T> {
    let value = setting(section, key)?;
    value.parse::<T>().map_err(|_| {
        ParamgenError::Config(format!(
            "setting [{}] {} has an invalid value: {}",
            section, key, value
        ))
    })
}

/// Returns the comma separated list `key` in `section`.
pub fn setting_list(section: &str, key: &str) -> Result<Vec<String>> {
    Ok(split_list(setting(section, key)?))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|e| e.trim().to_owned())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| ParamgenError::Config(format!("invalid date '{}': {}", date, e)))
}

/// Strips the glob suffix and trailing separators the factor table argument
/// is usually given with (`factors/`, `factors/*`).
pub fn normalize_dir(dir: &str) -> PathBuf {
    let trimmed = dir.trim_end_matches('*').trim_end_matches('/');
    if trimmed.is_empty() && dir.starts_with('/') {
        PathBuf::from("/")
    } else {
        PathBuf::from(trimmed)
    }
}

/// Reads a settings file laid out like the embedded one. Keys it holds take
/// precedence over the embedded defaults when applied with
/// [`GenerateConfig::with_settings`] or [`DependentTimeConfig::with_settings`].
pub fn load_settings(path: &Path) -> Result<Ini> {
    Ini::load_from_file(path).map_err(|e| {
        ParamgenError::Config(format!("cannot read settings {}: {}", path.display(), e))
    })
}

fn overridden<'a>(settings: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    settings
        .section(Some(section))
        .and_then(|properties| properties.get(key))
}

fn parse_overridden<T: FromStr>(settings: &Ini, section: &str, key: &str) -> Result<Option<T>> {
    match overridden(settings, section, key) {
        None => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|_| {
            ParamgenError::Config(format!(
                "setting [{}] {} has an invalid value: {}",
                section, key, value
            ))
        }),
    }
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ParamgenError::Config(format!(
            "{} {} does not exist",
            what,
            path.display()
        )))
    }
}

/// Settings of one parameter generation run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Directory with one sub-directory of parquet files per factor table.
    pub factor_tables_dir:      PathBuf,
    /// Raw snapshot directory; its `dynamic` entities are bound as views.
    pub raw_parquet_dir:        Option<PathBuf>,
    /// First day of the update streams.
    pub start_date:             NaiveDate,
    /// Day at which the bucket loop stops (exclusive).
    pub end_date:               NaiveDate,
    /// Width of a time bucket in days.
    pub bucket_days:            i64,
    /// Also extract the personId and messageId lookup parameters.
    pub short_query_parameters: bool,
    /// Directory with the `pg-{query}.sql` templates.
    pub query_dir:              PathBuf,
    /// Output directory of the parameter files.
    pub output_dir:             PathBuf,
    /// Prefix of the parameter file names.
    pub output_prefix:          String,
    /// Working directory of the engine.
    pub scratch_dir:            PathBuf,
    /// DataFusion target partitions.
    pub target_partitions:      usize,
    /// How keys that keep several latest rows are resolved.
    pub conflict_policy:        ConflictPolicy,
}

impl GenerateConfig {
    /// Creates a run configuration from the mandatory inputs, taking the rest
    /// from the embedded settings.
    pub fn new(
        factor_tables_dir: &str,
        start_date: &str,
        end_date: &str,
        bucket_days: i64,
    ) -> Result<Self> {
        let config = GenerateConfig {
            factor_tables_dir: normalize_dir(factor_tables_dir),
            raw_parquet_dir: None,
            start_date: parse_date(start_date)?,
            end_date: parse_date(end_date)?,
            bucket_days,
            short_query_parameters: false,
            query_dir: PathBuf::from(setting("paramgen", "query_dir")?),
            output_dir: PathBuf::from(setting("paramgen", "output_dir")?),
            output_prefix: setting("paramgen", "output_prefix")?.to_owned(),
            scratch_dir: PathBuf::from(setting("paramgen", "scratch_dir")?),
            target_partitions: setting_as("paramgen", "target_partitions")?,
            conflict_policy: ConflictPolicy::default(),
        };
        // Fail on the bucket width before anything touches the file system.
        config.schedule()?;
        Ok(config)
    }

    /// Applies the `[paramgen]` keys of a settings file.
    pub fn with_settings(mut self, settings: &Ini) -> Result<Self> {
        if let Some(dir) = overridden(settings, "paramgen", "query_dir") {
            self.query_dir = PathBuf::from(dir);
        }
        if let Some(dir) = overridden(settings, "paramgen", "output_dir") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = overridden(settings, "paramgen", "output_prefix") {
            self.output_prefix = prefix.to_owned();
        }
        if let Some(dir) = overridden(settings, "paramgen", "scratch_dir") {
            self.scratch_dir = PathBuf::from(dir);
        }
        if let Some(partitions) = parse_overridden(settings, "paramgen", "target_partitions")? {
            self.target_partitions = partitions;
        }
        Ok(self)
    }

    /// Sets the raw snapshot directory.
    pub fn with_raw_parquet_dir(mut self, dir: &str) -> Self {
        self.raw_parquet_dir = Some(normalize_dir(dir));
        self
    }

    /// Enables the short query lookup parameters.
    pub fn with_short_query_parameters(mut self, enabled: bool) -> Self {
        self.short_query_parameters = enabled;
        self
    }

    /// Sets the template directory.
    pub fn with_query_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.query_dir = dir.into();
        self
    }

    /// Sets the output directory.
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the engine working directory.
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Sets the conflict policy of the deduplicator.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Returns the bucket schedule of the run.
    pub fn schedule(&self) -> Result<BucketSchedule> {
        BucketSchedule::new(self.start_date, self.end_date, self.bucket_days)
    }

    /// Checks the input directories.
    pub fn validate(&self) -> Result<()> {
        self.schedule()?;
        require_dir(&self.factor_tables_dir, "factor table directory")?;
        require_dir(&self.query_dir, "query template directory")?;
        if let Some(raw) = &self.raw_parquet_dir {
            require_dir(raw, "raw parquet directory")?;
        }
        Ok(())
    }
}

/// Settings of one dependent time run.
#[derive(Debug, Clone)]
pub struct DependentTimeConfig {
    /// Raw data directory; entities are read from its snapshot sub-directory.
    pub raw_data_dir:           PathBuf,
    /// Directory holding the `inserts` and `deletes` event files.
    pub update_dir:             PathBuf,
    /// Name of the appended column.
    pub dependent_date_column:  String,
    /// Value written for event types without parent entities.
    pub default_dependent_time: i64,
    /// Parent entities bound as views.
    pub entities:               Vec<String>,
    /// What to do with events that match no parent.
    pub unmatched_policy:       UnmatchedPolicy,
    /// Working directory of the engine.
    pub scratch_dir:            PathBuf,
}

impl DependentTimeConfig {
    /// Creates a configuration with the embedded defaults.
    pub fn new(raw_data_dir: &str, update_dir: &str) -> Result<Self> {
        Ok(DependentTimeConfig {
            raw_data_dir:           normalize_dir(raw_data_dir),
            update_dir:             normalize_dir(update_dir),
            dependent_date_column:  setting("dependent", "date_column")?.to_owned(),
            default_dependent_time: setting_as("dependent", "default_time")?,
            entities:               setting_list("dependent", "entities")?,
            unmatched_policy:       UnmatchedPolicy::default(),
            scratch_dir:            PathBuf::from(setting("paramgen", "scratch_dir")?)
                .join("dependent"),
        })
    }

    /// Applies the `[dependent]` keys of a settings file.
    pub fn with_settings(mut self, settings: &Ini) -> Result<Self> {
        if let Some(column) = overridden(settings, "dependent", "date_column") {
            self.dependent_date_column = column.to_owned();
        }
        if let Some(time) = parse_overridden(settings, "dependent", "default_time")? {
            self.default_dependent_time = time;
        }
        if let Some(entities) = overridden(settings, "dependent", "entities") {
            self.entities = split_list(entities);
        }
        if let Some(dir) = overridden(settings, "paramgen", "scratch_dir") {
            self.scratch_dir = PathBuf::from(dir).join("dependent");
        }
        Ok(self)
    }

    /// The directory of the initial snapshot entities.
    pub fn snapshot_dir(&self) -> Result<PathBuf> {
        Ok(self.raw_data_dir.join(setting("dependent", "snapshot_dir")?))
    }

    /// Checks the input directories.
    pub fn validate(&self) -> Result<()> {
        require_dir(&self.raw_data_dir, "raw data directory")?;
        require_dir(&self.update_dir, "update event directory")
    }
}
