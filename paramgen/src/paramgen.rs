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

//! The parameter generation run.
//!
//! A run binds the factor tables, extracts the late-bound relations once,
//! accumulates every Interactive query type over the bucket schedule,
//! finalizes and exports it, and optionally exports the short query lookups.

use crate::accumulate::Accumulator;
use crate::catalog::query::{of_kind, QueryKind};
use crate::config::{setting, setting_list, GenerateConfig};
use crate::datasink::ParquetSink;
use crate::dedup::Deduplicator;
use crate::engine::Engine;
use crate::error::Result;
use crate::scratch;
use crate::template::TemplateDirectory;
use crate::view::ViewMaterializer;
use log::info;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One exported parameter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedParameters {
    /// The query type name.
    pub query: String,
    /// The written file.
    pub path:  PathBuf,
    /// Number of rows written.
    pub rows:  usize,
}

/// Summary of a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Factor tables bound as views.
    pub factor_tables: Vec<String>,
    /// Late-bound relations registered for the templates.
    pub late_bound:    Vec<String>,
    /// Exported parameter files, in export order.
    pub exported:      Vec<ExportedParameters>,
    /// Wall clock time of the run.
    pub elapsed:       Duration,
}

/// Generates the parameter files of the Interactive workload.
#[derive(Clone)]
pub struct ParameterGenerator {
    engine: Engine,
    config: GenerateConfig,
}

impl ParameterGenerator {
    /// Creates a generator running on `engine`.
    pub fn new(engine: &Engine, config: GenerateConfig) -> Self {
        ParameterGenerator {
            engine: engine.clone(),
            config,
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Runs the generation.
    pub async fn run(&self) -> Result<GenerationReport> {
        let started = Instant::now();
        let config = &self.config;
        config.validate()?;
        let schedule = config.schedule()?;
        let mut report = GenerationReport::default();

        info!("============ Loading the factor tables ============");
        let people_4_hops = config
            .factor_tables_dir
            .join(setting("paramgen", "people_4_hops")?);
        scratch::prune_except(&people_4_hops, setting("paramgen", "curated_paths")?)?;

        let views = ViewMaterializer::new(&self.engine)?;
        report.factor_tables = views
            .bind_all(&config.factor_tables_dir)
            .await?
            .into_iter()
            .map(|v| v.name)
            .collect();
        if let Some(raw) = &config.raw_parquet_dir {
            let dynamic = raw.join(setting("dependent", "snapshot_dir")?);
            if dynamic.is_dir() {
                views
                    .bind_entities(&dynamic, &setting_list("dependent", "entities")?)
                    .await?;
            } else {
                info!("No snapshot entities in {}", raw.display());
            }
        }

        let accumulator =
            Accumulator::new(&self.engine, TemplateDirectory::new(&config.query_dir));
        for query in of_kind(QueryKind::LateBound) {
            let relation = accumulator
                .extract_once(query, schedule.start())
                .await?;
            self.engine.register_relation(&relation)?;
            report.late_bound.push(relation.name().to_owned());
        }

        info!("============ Generating parameters ============");
        info!("Start time of initial_snapshot: {}", schedule.start());
        info!("End time of initial_snapshot: {}", schedule.end());
        info!("Time bucket size: {} days", schedule.width_days());

        let dedup = Deduplicator::new(&self.engine, config.conflict_policy);
        let sink = ParquetSink::new(&config.output_dir, &config.output_prefix);
        for query in of_kind(QueryKind::Interactive) {
            let accumulated = accumulator.accumulate(query, &schedule).await?;
            let finalized = dedup.finalize(&accumulated, query.key).await?;
            let path = sink.export(query, &finalized)?;
            report.exported.push(ExportedParameters {
                query: query.name.to_owned(),
                path,
                rows: finalized.num_rows(),
            });
        }

        if config.short_query_parameters {
            info!("============ Generate Short Query Parameters ============");
            for query in of_kind(QueryKind::ShortLookup) {
                let relation = accumulator
                    .extract_once(query, schedule.start())
                    .await?;
                let path = sink.export(query, &relation)?;
                report.exported.push(ExportedParameters {
                    query: query.name.to_owned(),
                    path,
                    rows: relation.num_rows(),
                });
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "Exported {} parameter files in {}",
            report.exported.len(),
            humantime::format_duration(Duration::from_millis(report.elapsed.as_millis() as u64))
        );
        Ok(report)
    }
}
