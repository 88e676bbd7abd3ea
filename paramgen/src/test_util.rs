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

//! Fixtures shared by the unit tests and the integration tests.

use crate::datasink::write_parquet;
use crate::error::Result;
use chrono::NaiveDate;
use datafusion::arrow::array::{ArrayRef, AsArray, Date32Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Int64Type, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Days since the epoch of a `YYYY-MM-DD` date.
pub fn date32(date: &str) -> i32 {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (date - epoch).num_days() as i32
}

/// A Q6 style parameter batch: `(personId, tagName, useFrom, useUntil)`.
pub fn parameter_batch(rows: &[(i64, &str, &str, &str)]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("personId", DataType::Int64, false),
        Field::new("tagName", DataType::Utf8, false),
        Field::new("useFrom", DataType::Date32, false),
        Field::new("useUntil", DataType::Date32, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.1))),
        Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| date32(r.2)))),
        Arc::new(Date32Array::from_iter_values(rows.iter().map(|r| date32(r.3)))),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

/// A batch of nullable `Int64` columns.
pub fn int64_batch(columns: &[(&str, Vec<Option<i64>>)]) -> RecordBatch {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Int64, true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(Int64Array::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(schema, arrays).unwrap()
}

/// Writes `batch` to `path`, creating the parent directories.
pub fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_parquet(path, batch.schema(), &[batch.clone()])
}

/// The values of the `Int64` column `name`, across all batches.
pub fn int64_values(batches: &[RecordBatch], name: &str) -> Vec<Option<i64>> {
    batches
        .iter()
        .flat_map(|batch| {
            let column = batch.column_by_name(name).unwrap();
            column.as_primitive::<Int64Type>().iter().collect::<Vec<_>>()
        })
        .collect()
}
