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

//! Repeats the candidate extraction of a query type over a bucket schedule.

use crate::catalog::query::QueryType;
use crate::engine::Engine;
use crate::error::{ParamgenError, Result};
use crate::relation::Relation;
use crate::template::{QueryParameters, QueryTemplate, TemplateDirectory};
use crate::window::BucketSchedule;
use chrono::NaiveDate;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use log::{debug, info};

/// Extracts and accumulates parameter candidates.
#[derive(Clone)]
pub struct Accumulator {
    engine:    Engine,
    templates: TemplateDirectory,
}

impl Accumulator {
    /// Creates an accumulator reading its templates from `templates`.
    pub fn new(engine: &Engine, templates: TemplateDirectory) -> Self {
        Accumulator {
            engine: engine.clone(),
            templates,
        }
    }

    /// Runs `template` for one bucket.
    pub async fn extract(
        &self,
        template: &QueryTemplate,
        params: &QueryParameters,
    ) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let sql = template.bind(params)?;
        self.engine.query(&sql).await
    }

    /// Runs the extraction of `query` for every bucket of `schedule`. The first
    /// bucket creates the relation, every later one appends to it.
    pub async fn accumulate(&self, query: &QueryType, schedule: &BucketSchedule) -> Result<Relation> {
        let template = self.templates.template(query)?;
        let mut relation: Option<Relation> = None;

        for date_limit in schedule.buckets() {
            let params = QueryParameters::new(date_limit, schedule.start());
            debug!("- Q{}, date {}", query.name, date_limit);
            let (schema, batches) = self.extract(&template, &params).await?;
            relation = Some(match relation.take() {
                None => Relation::create(&query.relation_name(), schema, batches)?,
                Some(mut relation) => {
                    relation.append(&schema, batches)?;
                    relation
                }
            });
        }

        let relation = relation.ok_or_else(|| {
            ParamgenError::Internal(format!("no bucket was extracted for Q{}", query.name))
        })?;
        info!(
            "- Q{}: {} candidates in {} buckets",
            query.name,
            relation.num_rows(),
            schedule.len()
        );
        Ok(relation)
    }

    /// Runs the extraction of `query` once, with both the limit and the start
    /// at `date`.
    pub async fn extract_once(&self, query: &QueryType, date: NaiveDate) -> Result<Relation> {
        let template = self.templates.template(query)?;
        let (schema, batches) = self
            .extract(&template, &QueryParameters::new(date, date))
            .await?;
        let relation = Relation::create(&query.relation_name(), schema, batches)?;
        info!("- Q{}: {} rows", query.name, relation.num_rows());
        Ok(relation)
    }
}
