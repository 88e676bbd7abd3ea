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

//! A named, materialized result set.
//!
//! The schema of a relation is fixed by its first batch. Every later batch
//! must carry the same column names and types, in the same order. All fields
//! are kept nullable so that batches of different extraction passes, whose
//! nullability the planner infers independently, conform to one schema.

use crate::error::{ParamgenError, Result};
use datafusion::arrow::datatypes::{Field, Fields, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use itertools::Itertools;
use std::sync::Arc;

/// Record batches with a name and a fixed schema.
#[derive(Debug, Clone)]
pub struct Relation {
    name:    String,
    schema:  SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Relation {
    /// Creates the relation from the result of its first extraction.
    pub fn create(name: &str, schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        let mut relation = Relation {
            name:    name.to_owned(),
            schema:  nullable(&schema),
            batches: Vec::with_capacity(batches.len()),
        };
        relation.append(&schema, batches)?;
        Ok(relation)
    }

    /// Appends the result of a later extraction.
    pub fn append(&mut self, schema: &Schema, batches: Vec<RecordBatch>) -> Result<()> {
        self.check_compatible(schema.fields())?;
        for batch in batches {
            self.check_compatible(batch.schema().fields())?;
            if batch.num_rows() == 0 {
                continue;
            }
            self.batches.push(RecordBatch::try_new(
                self.schema.clone(),
                batch.columns().to_vec(),
            )?);
        }
        Ok(())
    }

    fn check_compatible(&self, fields: &Fields) -> Result<()> {
        let expected = self.schema.fields();
        let same = expected.len() == fields.len()
            && expected
                .iter()
                .zip(fields.iter())
                .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
        if same {
            Ok(())
        } else {
            Err(ParamgenError::SchemaMismatch(format!(
                "cannot append [{}] to {} [{}]",
                describe(fields),
                self.name,
                describe(expected)
            )))
        }
    }

    /// The relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the relation under another name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_owned();
        self
    }

    /// The relation schema.
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// The materialized batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Consumes the relation and returns its batches.
    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    /// The column names, in order.
    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    /// Returns whether the relation has a column `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.schema.field_with_name(name).is_ok()
    }

    /// The total number of rows.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Returns whether the relation holds no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Wraps the batches into a table provider.
    pub fn to_mem_table(&self) -> Result<MemTable> {
        Ok(MemTable::try_new(
            self.schema.clone(),
            vec![self.batches.clone()],
        )?)
    }
}

fn nullable(schema: &Schema) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_nullable(true))
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

fn describe(fields: &Fields) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.name(), f.data_type()))
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{int64_batch, parameter_batch};
    use datafusion::arrow::datatypes::DataType;

    #[test]
    fn first_batch_fixes_the_schema() -> Result<()> {
        let first = parameter_batch(&[(1, "X", "2012-11-28", "2012-11-28")]);
        let mut relation = Relation::create("Q_6", first.schema(), vec![first])?;
        assert!(relation.schema().fields().iter().all(|f| f.is_nullable()));

        let second = parameter_batch(&[
            (1, "X", "2012-11-28", "2012-11-29"),
            (2, "Y", "2012-11-28", "2012-11-29"),
        ]);
        relation.append(&second.schema(), vec![second])?;
        assert_eq!(3, relation.num_rows());
        assert_eq!(2, relation.batches().len());
        assert_eq!(
            vec!["personId", "tagName", "useFrom", "useUntil"],
            relation.column_names()
        );
        assert_eq!(
            &DataType::Date32,
            relation.schema().field_with_name("useUntil")?.data_type()
        );
        Ok(())
    }

    #[test]
    fn empty_extraction_still_creates() -> Result<()> {
        let schema = parameter_batch(&[]).schema();
        let relation = Relation::create("Q_6", schema, vec![])?;
        assert!(relation.is_empty());
        assert!(relation.has_column("tagName"));
        assert!(relation.to_mem_table().is_ok());
        Ok(())
    }

    #[test]
    fn mismatching_schema_is_rejected() -> Result<()> {
        let first = parameter_batch(&[(1, "X", "2012-11-28", "2012-11-28")]);
        let mut relation = Relation::create("Q_6", first.schema(), vec![first])?;

        let other = int64_batch(&[("personId", vec![Some(1)])]);
        match relation.append(&other.schema(), vec![other]) {
            Err(ParamgenError::SchemaMismatch(msg)) => {
                assert!(msg.contains("Q_6"));
                assert!(msg.contains("personId: Int64"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(1, relation.num_rows());
        Ok(())
    }
}
