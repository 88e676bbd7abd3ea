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

//! Dependent time of update events.
//!
//! The dependent time of an event is the latest date among the parent
//! entities it refers to. Every [`Dependency`] of the event type is resolved
//! by a left join against the parent view, pre-aggregated to one date per
//! parent id. The candidates of all joins are unioned and reduced to their
//! maximum per group of match columns, so two events only share parents when
//! they agree on every match column.
//!
//! Each row ends up in one of three states, see [`DependencyTime`]. Rows that
//! match no parent at all are written as null and counted; whether such a
//! batch is acceptable is decided by the [`UnmatchedPolicy`].

use crate::catalog::event::{self, Dependency, DependencyMapping, EventType, Operation};
use crate::config::{setting, DependentTimeConfig};
use crate::datasink::write_parquet;
use crate::engine::{column_list, quote, Engine};
use crate::error::{ParamgenError, Result};
use crate::relation::Relation;
use crate::view::ViewMaterializer;
use datafusion::arrow::array::{Array, ArrayRef, AsArray, Int64Array, UInt64Array};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Field, Int64Type, Schema, SchemaRef, TimeUnit};
use datafusion::arrow::record_batch::RecordBatch;
use glob::glob;
use itertools::Itertools;
use log::{info, warn};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const ROW_COLUMN: &str = "__event_row";
const DEPENDENCY_COLUMN: &str = "__dependency";

/// What to do with events whose parents are all missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedPolicy {
    /// Write the events with a null dependent time.
    #[default]
    Keep,
    /// Fail with [`ParamgenError::UnresolvedDependency`].
    Reject,
}

/// The dependent time of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyTime {
    /// Latest parent date, in epoch milliseconds.
    Resolved(i64),
    /// The event type has no parents; the sentinel is written.
    NoDependency,
    /// None of the parents exists.
    Unmatched,
}

/// Outcome counts of one resolved event type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// The event type name.
    pub event_type:    String,
    /// Number of events.
    pub rows:          usize,
    /// Events with a resolved dependent time.
    pub resolved:      usize,
    /// Events of a type without parents.
    pub no_dependency: usize,
    /// Events whose parents are all missing.
    pub unmatched:     usize,
}

impl ResolveReport {
    /// Applies `policy` to the unmatched events.
    pub fn check(&self, policy: UnmatchedPolicy) -> Result<()> {
        if self.unmatched == 0 {
            return Ok(());
        }
        match policy {
            UnmatchedPolicy::Keep => {
                warn!(
                    "{}: {} of {} events match no parent entity",
                    self.event_type, self.unmatched, self.rows
                );
                Ok(())
            }
            UnmatchedPolicy::Reject => Err(ParamgenError::UnresolvedDependency(format!(
                "{} of {} {} events match no parent entity",
                self.unmatched, self.rows, self.event_type
            ))),
        }
    }
}

/// Events with their dependent time column appended.
#[derive(Debug, Clone)]
pub struct ResolvedEvents {
    /// Schema of the event columns plus the dependent time column.
    pub schema:  SchemaRef,
    /// The augmented events, ordered by their primary date.
    pub batches: Vec<RecordBatch>,
    /// Outcome of every row, in batch order.
    pub times:   Vec<DependencyTime>,
    /// Outcome counts.
    pub report:  ResolveReport,
}

/// Computes dependent times against the bound parent views.
#[derive(Clone)]
pub struct DependencyResolver {
    engine:       Engine,
    date_column:  String,
    default_time: i64,
    view_suffix:  String,
}

impl DependencyResolver {
    /// Creates a resolver writing `date_column`, with `default_time` for event
    /// types without parents.
    pub fn new(engine: &Engine, date_column: &str, default_time: i64) -> Result<Self> {
        Ok(DependencyResolver {
            engine:       engine.clone(),
            date_column:  date_column.to_owned(),
            default_time,
            view_suffix:  setting("dependent", "view_suffix")?.to_owned(),
        })
    }

    /// Creates a resolver from a run configuration.
    pub fn from_config(engine: &Engine, config: &DependentTimeConfig) -> Result<Self> {
        DependencyResolver::new(
            engine,
            &config.dependent_date_column,
            config.default_dependent_time,
        )
    }

    /// Appends the dependent time to `events`. A dependent time column already
    /// present in `events` is replaced.
    pub async fn resolve(&self, event: &EventType, events: &Relation) -> Result<ResolvedEvents> {
        let columns: Vec<String> = events
            .column_names()
            .into_iter()
            .filter(|c| c != &self.date_column && c != ROW_COLUMN)
            .collect();
        match event.mapping {
            None => self.bypass(event, events, &columns),
            Some(mapping) => self.join(event, &mapping, events, &columns).await,
        }
    }

    fn output_schema(&self, events: &Relation, columns: &[String]) -> Result<SchemaRef> {
        let mut fields = Vec::with_capacity(columns.len() + 1);
        for column in columns {
            fields.push(events.schema().field_with_name(column)?.clone());
        }
        fields.push(Field::new(&self.date_column, DataType::Int64, true));
        Ok(Arc::new(Schema::new(fields)))
    }

    fn bypass(&self, event: &EventType, events: &Relation, columns: &[String]) -> Result<ResolvedEvents> {
        let schema = self.output_schema(events, columns)?;
        let mut batches = Vec::with_capacity(events.batches().len());
        for batch in events.batches() {
            let mut arrays = Vec::with_capacity(columns.len() + 1);
            for column in columns {
                arrays.push(batch.column(batch.schema().index_of(column)?).clone());
            }
            arrays.push(
                Arc::new(Int64Array::from_value(self.default_time, batch.num_rows())) as ArrayRef,
            );
            batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
        }

        let rows = events.num_rows();
        Ok(ResolvedEvents {
            schema,
            batches,
            times: vec![DependencyTime::NoDependency; rows],
            report: ResolveReport {
                event_type: event.name(),
                rows,
                no_dependency: rows,
                ..Default::default()
            },
        })
    }

    async fn join(
        &self,
        event: &EventType,
        mapping: &DependencyMapping,
        events: &Relation,
        columns: &[String],
    ) -> Result<ResolvedEvents> {
        let required = mapping
            .dependencies
            .iter()
            .map(|d| d.event_column)
            .chain(mapping.match_columns.iter().copied())
            .chain(std::iter::once(event.date_column()));
        for column in required {
            if !events.has_column(column) {
                return Err(ParamgenError::SchemaMismatch(format!(
                    "{} events have no column {}",
                    event.name(),
                    column
                )));
            }
        }

        let staged = format!("{}_staged", event.name());
        let match_columns: Vec<&str> = if mapping.match_columns.is_empty() {
            self.engine
                .register_relation(&with_row_numbers(events)?.with_name(&staged))?;
            vec![ROW_COLUMN]
        } else {
            self.engine
                .register_relation(&events.clone().with_name(&staged))?;
            mapping.match_columns.to_vec()
        };

        let sql = self.plan(event, mapping.dependencies, &staged, columns, &match_columns);
        let result = self.engine.query(&sql).await;
        self.engine.drop_table(&staged)?;
        let (_, joined) = result?;

        let schema = self.output_schema(events, columns)?;
        let mut batches = Vec::with_capacity(joined.len());
        let mut times = Vec::with_capacity(events.num_rows());
        for batch in joined {
            let dependency = batch.column(batch.schema().index_of(DEPENDENCY_COLUMN)?);
            let millis = epoch_millis(dependency)?;
            times.extend(millis.iter().map(|value| match value {
                Some(ms) => DependencyTime::Resolved(ms),
                None => DependencyTime::Unmatched,
            }));

            let mut arrays = Vec::with_capacity(columns.len() + 1);
            for column in columns {
                arrays.push(batch.column(batch.schema().index_of(column)?).clone());
            }
            arrays.push(Arc::new(millis) as ArrayRef);
            batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
        }

        let unmatched = times
            .iter()
            .filter(|t| **t == DependencyTime::Unmatched)
            .count();
        let report = ResolveReport {
            event_type: event.name(),
            rows: times.len(),
            resolved: times.len() - unmatched,
            no_dependency: 0,
            unmatched,
        };
        Ok(ResolvedEvents {
            schema,
            batches,
            times,
            report,
        })
    }

    fn plan(
        &self,
        event: &EventType,
        dependencies: &[Dependency],
        staged: &str,
        columns: &[String],
        match_columns: &[&str],
    ) -> String {
        let matched = column_list(match_columns, Some("t"));
        let candidates = dependencies
            .iter()
            .enumerate()
            .map(|(i, dep)| {
                format!(
                    "SELECT {matched}, p{i}.\"__date\" AS \"__date\" FROM {staged} t \
                     LEFT JOIN (SELECT {key} AS \"__key\", MAX({date}) AS \"__date\" \
                        FROM {entity}{suffix} GROUP BY {key}) p{i} \
                     ON t.{column} = p{i}.\"__key\"",
                    key = quote(dep.entity_column),
                    date = quote(dep.date_column),
                    entity = dep.entity,
                    suffix = self.view_suffix,
                    column = quote(dep.event_column),
                )
            })
            .join(" UNION ALL ");
        let group = column_list(match_columns, None);
        let on = match_columns
            .iter()
            .map(|c| format!("(t.{c} IS NOT DISTINCT FROM r.{c})", c = quote(c)))
            .join(" AND ");

        format!(
            "WITH candidates AS ({candidates}), \
             resolved AS (\
                SELECT {group}, MAX(\"__date\") AS {dependency} FROM candidates GROUP BY {group}) \
             SELECT {projected}, r.{dependency} AS {dependency} \
             FROM {staged} t LEFT JOIN resolved r ON {on} \
             ORDER BY t.{order}",
            dependency = quote(DEPENDENCY_COLUMN),
            projected = column_list(columns, Some("t")),
            order = quote(event.date_column()),
        )
    }
}

/// Adds a row number column that stands in for the match columns.
fn with_row_numbers(events: &Relation) -> Result<Relation> {
    let mut fields: Vec<Field> = events
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new(ROW_COLUMN, DataType::UInt64, true));
    let schema = Arc::new(Schema::new(fields));

    let mut offset = 0u64;
    let mut batches = Vec::with_capacity(events.batches().len());
    for batch in events.batches() {
        let rows = batch.num_rows() as u64;
        let mut arrays = batch.columns().to_vec();
        arrays.push(Arc::new(UInt64Array::from_iter_values(offset..offset + rows)) as ArrayRef);
        batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
        offset += rows;
    }
    Relation::create(events.name(), schema, batches)
}

/// Converts a parent date column to epoch milliseconds.
fn epoch_millis(array: &ArrayRef) -> Result<Int64Array> {
    let millis = match array.data_type() {
        DataType::Int64 => array.clone(),
        DataType::Timestamp(_, tz) => {
            cast(array, &DataType::Timestamp(TimeUnit::Millisecond, tz.clone()))?
        }
        DataType::Date32 | DataType::Date64 => {
            cast(array, &DataType::Timestamp(TimeUnit::Millisecond, None))?
        }
        DataType::Null => Arc::new(Int64Array::new_null(array.len())) as ArrayRef,
        other => {
            return Err(ParamgenError::SchemaMismatch(format!(
                "parent dates of type {} cannot be written as a dependent time",
                other
            )))
        }
    };
    let millis = cast(&millis, &DataType::Int64)?;
    Ok(millis.as_primitive::<Int64Type>().clone())
}

/// Rewrites the update event files with their dependent time.
#[derive(Clone)]
pub struct DependentTimeAppender {
    engine:   Engine,
    config:   DependentTimeConfig,
    views:    ViewMaterializer,
    resolver: DependencyResolver,
}

impl DependentTimeAppender {
    /// Creates an appender running on `engine`.
    pub fn new(engine: &Engine, config: DependentTimeConfig) -> Result<Self> {
        Ok(DependentTimeAppender {
            engine: engine.clone(),
            views: ViewMaterializer::new(engine)?,
            resolver: DependencyResolver::from_config(engine, &config)?,
            config,
        })
    }

    /// Binds the parent views and rewrites every insert and delete file.
    pub async fn run(&self) -> Result<Vec<ResolveReport>> {
        self.config.validate()?;
        info!("Creating views");
        self.views
            .bind_entities(&self.config.snapshot_dir()?, &self.config.entities)
            .await?;

        let mut reports = vec![];
        for operation in Operation::ALL {
            let dir = self.config.update_dir.join(operation.directory());
            if !dir.is_dir() {
                info!("No {} in {}", operation.directory(), self.config.update_dir.display());
                continue;
            }
            let mut files = vec![];
            for entry in glob(&format!("{}/*.parquet", dir.display()))? {
                files.push(entry?);
            }
            files.sort();
            for file in files {
                reports.push(self.rewrite(&file, operation).await?);
            }
        }
        Ok(reports)
    }

    /// Resolves one event file and replaces it with the augmented events.
    pub async fn rewrite(&self, file: &Path, operation: Operation) -> Result<ResolveReport> {
        let stem = file
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".parquet"))
            .ok_or_else(|| {
                ParamgenError::UnknownEventType(format!("{}", file.display()))
            })?;
        let event = event::from_file_stem(stem, operation)?;
        info!("Parsing: {}", event.name());

        let events = self.load(event, file).await?;
        let resolved = self.resolver.resolve(event, &events).await?;
        resolved.report.check(self.config.unmatched_policy)?;

        // The input is gone until the rewrite below completes.
        fs::remove_file(file)?;
        write_parquet(file, resolved.schema.clone(), &resolved.batches)?;
        info!(
            "{} has updated {} rows",
            event.name(),
            resolved.report.rows
        );
        Ok(resolved.report)
    }

    async fn load(&self, event: &EventType, file: &Path) -> Result<Relation> {
        let name = format!("{}_file", event.name());
        self.views.bind_file(&name, file).await?;

        let table = self.engine.context().table(name.as_str()).await?;
        let missing: Vec<_> = event
            .columns
            .iter()
            .filter(|c| !table.schema().has_column_with_unqualified_name(c))
            .collect();
        if !missing.is_empty() {
            self.engine.drop_table(&name)?;
            return Err(ParamgenError::SchemaMismatch(format!(
                "{} has no column {}",
                file.display(),
                missing.iter().join(", ")
            )));
        }

        let sql = format!(
            "SELECT {} FROM {} ORDER BY {} ASC",
            column_list(event.columns, None),
            name,
            quote(event.date_column())
        );
        let result = self.engine.query(&sql).await;
        self.engine.drop_table(&name)?;
        let (schema, batches) = result?;
        Relation::create(&event.name(), schema, batches)
    }
}
