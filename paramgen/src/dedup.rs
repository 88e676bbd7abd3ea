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

//! Keeps the most recent validity record of every logical key.
//!
//! An accumulated relation holds one row per key and bucket in which the key
//! qualified. Finalizing it runs three steps:
//!
//! 1. keep-latest: rows whose `useUntil` is below the maximum `useUntil` of
//!    their key are dropped.
//! 2. collapse: identical `(key, useFrom, useUntil)` rows are merged.
//! 3. conflict resolution: a key left with several rows (same `useUntil`,
//!    different `useFrom`) is resolved by the [`ConflictPolicy`].
//!
//! Finalizing a finalized relation returns it unchanged.

use crate::engine::{column_list, quote, Engine};
use crate::error::{ParamgenError, Result};
use crate::relation::Relation;
use datafusion::arrow::array::AsArray;
use datafusion::arrow::datatypes::Int64Type;
use log::{info, warn};

/// Start of the validity interval of a parameter row.
pub const USE_FROM: &str = "useFrom";
/// End of the validity interval of a parameter row.
pub const USE_UNTIL: &str = "useUntil";

/// What to do with a key that keeps more than one latest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep the row with the greatest `useFrom`.
    #[default]
    LastWriteWins,
    /// Fail with [`ParamgenError::Conflict`].
    Reject,
}

/// Finalizes accumulated relations.
#[derive(Clone)]
pub struct Deduplicator {
    engine: Engine,
    policy: ConflictPolicy,
}

impl Deduplicator {
    /// Creates a deduplicator.
    pub fn new(engine: &Engine, policy: ConflictPolicy) -> Self {
        Deduplicator {
            engine: engine.clone(),
            policy,
        }
    }

    /// The conflict policy.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Reduces `relation` to exactly one row per `key`, the one carrying the
    /// maximal `useUntil`. Rows with a null `useUntil` are dropped.
    pub async fn finalize(&self, relation: &Relation, key: &[&str]) -> Result<Relation> {
        if key.is_empty() {
            return Err(ParamgenError::Config(format!(
                "{} has no logical key",
                relation.name()
            )));
        }
        for column in key.iter().chain([USE_FROM, USE_UNTIL].iter()) {
            if !relation.has_column(column) {
                return Err(ParamgenError::SchemaMismatch(format!(
                    "{} has no column {}",
                    relation.name(),
                    column
                )));
            }
        }

        let staged = format!("{}_staged", relation.name());
        self.engine
            .register_relation(&relation.clone().with_name(&staged))?;
        let result = self.run(relation, &staged, key).await;
        self.engine.drop_table(&staged)?;
        result
    }

    async fn run(&self, relation: &Relation, staged: &str, key: &[&str]) -> Result<Relation> {
        let columns = column_list(&relation.column_names(), None);
        let key = column_list(key, None);
        let (from, until) = (quote(USE_FROM), quote(USE_UNTIL));

        let collapsed = format!(
            "WITH latest AS (\
                SELECT {columns} FROM (\
                    SELECT {columns}, MAX({until}) OVER (PARTITION BY {key}) AS \"__latest\" \
                    FROM {staged}) l \
                WHERE {until} = \"__latest\"), \
             collapsed AS (\
                SELECT {columns} FROM (\
                    SELECT {columns}, ROW_NUMBER() OVER (PARTITION BY {key}, {from}, {until}) AS \"__copy\" \
                    FROM latest) c \
                WHERE \"__copy\" = 1)"
        );

        let sql = match self.policy {
            ConflictPolicy::LastWriteWins => format!(
                "{collapsed} \
                 SELECT {columns} FROM (\
                    SELECT {columns}, ROW_NUMBER() OVER (PARTITION BY {key} ORDER BY {from} DESC) AS \"__rank\" \
                    FROM collapsed) r \
                 WHERE \"__rank\" = 1"
            ),
            ConflictPolicy::Reject => {
                let conflicts = self
                    .count(&format!(
                        "{collapsed} \
                         SELECT COUNT(*) AS \"__conflicts\" FROM (\
                            SELECT {key} FROM collapsed GROUP BY {key} HAVING COUNT(*) > 1) k"
                    ))
                    .await?;
                if conflicts > 0 {
                    warn!("{}: {} keys keep several latest rows", relation.name(), conflicts);
                    return Err(ParamgenError::Conflict(format!(
                        "{} keys of {} keep more than one row with the latest useUntil",
                        conflicts,
                        relation.name()
                    )));
                }
                format!("{collapsed} SELECT {columns} FROM collapsed")
            }
        };

        let (schema, batches) = self.engine.query(&sql).await?;
        let finalized = Relation::create(relation.name(), schema, batches)?;
        info!(
            "{} finalized: {} -> {} rows",
            relation.name(),
            relation.num_rows(),
            finalized.num_rows()
        );
        Ok(finalized)
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        let (_, batches) = self.engine.query(sql).await?;
        let count = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .map(|b| b.column(0).as_primitive::<Int64Type>().value(0))
            .unwrap_or(0);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::parameter_batch;
    use datafusion::assert_batches_sorted_eq;

    const KEY: &[&str] = &["personId", "tagName"];

    fn relation(rows: &[(i64, &str, &str, &str)]) -> Relation {
        let batch = parameter_batch(rows);
        Relation::create("Q_6", batch.schema(), vec![batch]).unwrap()
    }

    #[tokio::test]
    async fn latest_bucket_survives() -> Result<()> {
        let engine = Engine::new();
        let dedup = Deduplicator::new(&engine, ConflictPolicy::default());
        let accumulated = relation(&[
            (1, "X", "2012-11-28", "2012-11-28"),
            (1, "X", "2012-11-28", "2012-11-29"),
        ]);

        let finalized = dedup.finalize(&accumulated, KEY).await?;
        assert_batches_sorted_eq!(
            vec![
                "+----------+---------+------------+------------+",
                "| personId | tagName | useFrom    | useUntil   |",
                "+----------+---------+------------+------------+",
                "| 1        | X       | 2012-11-28 | 2012-11-29 |",
                "+----------+---------+------------+------------+",
            ],
            finalized.batches()
        );
        assert_eq!("Q_6", finalized.name());
        Ok(())
    }

    #[tokio::test]
    async fn open_ended_rows_are_dropped() -> Result<()> {
        use crate::test_util::date32;
        use datafusion::arrow::array::{ArrayRef, Date32Array, Int64Array, StringArray};
        use datafusion::arrow::datatypes::{DataType, Field, Schema};
        use datafusion::arrow::record_batch::RecordBatch;
        use std::sync::Arc;

        let schema = Arc::new(Schema::new(vec![
            Field::new("personId", DataType::Int64, true),
            Field::new("tagName", DataType::Utf8, true),
            Field::new("useFrom", DataType::Date32, true),
            Field::new("useUntil", DataType::Date32, true),
        ]));
        let batch = RecordBatch::try_new(schema.clone(), vec![
            Arc::new(Int64Array::from(vec![1, 1, 2])) as ArrayRef,
            Arc::new(StringArray::from(vec!["X", "X", "X"])),
            Arc::new(Date32Array::from(vec![date32("2012-11-28"); 3])),
            Arc::new(Date32Array::from(vec![None, Some(date32("2012-11-29")), None])),
        ])
        .unwrap();
        let accumulated = Relation::create("Q_6", schema, vec![batch]).unwrap();

        let engine = Engine::new();
        let finalized = Deduplicator::new(&engine, ConflictPolicy::default())
            .finalize(&accumulated, KEY)
            .await?;
        assert_batches_sorted_eq!(
            vec![
                "+----------+---------+------------+------------+",
                "| personId | tagName | useFrom    | useUntil   |",
                "+----------+---------+------------+------------+",
                "| 1        | X       | 2012-11-28 | 2012-11-29 |",
                "+----------+---------+------------+------------+",
            ],
            finalized.batches()
        );
        Ok(())
    }

    #[tokio::test]
    async fn one_row_per_key_and_idempotent() -> Result<()> {
        let engine = Engine::new();
        let dedup = Deduplicator::new(&engine, ConflictPolicy::default());
        let accumulated = relation(&[
            (1, "X", "2012-11-28", "2012-11-28"),
            (1, "X", "2012-11-28", "2012-11-29"),
            (1, "X", "2012-11-28", "2012-11-29"),
            (1, "Y", "2012-11-28", "2012-11-28"),
            (2, "X", "2012-11-28", "2012-11-30"),
            (2, "X", "2012-11-29", "2012-11-29"),
        ]);

        let once = dedup.finalize(&accumulated, KEY).await?;
        let expected = vec![
            "+----------+---------+------------+------------+",
            "| personId | tagName | useFrom    | useUntil   |",
            "+----------+---------+------------+------------+",
            "| 1        | X       | 2012-11-28 | 2012-11-29 |",
            "| 1        | Y       | 2012-11-28 | 2012-11-28 |",
            "| 2        | X       | 2012-11-28 | 2012-11-30 |",
            "+----------+---------+------------+------------+",
        ];
        assert_batches_sorted_eq!(expected, once.batches());

        let twice = dedup.finalize(&once, KEY).await?;
        assert_batches_sorted_eq!(expected, twice.batches());
        Ok(())
    }

    #[tokio::test]
    async fn conflicting_rows() -> Result<()> {
        let engine = Engine::new();
        let accumulated = relation(&[
            (1, "X", "2012-11-28", "2012-11-30"),
            (1, "X", "2012-11-29", "2012-11-30"),
            (2, "X", "2012-11-28", "2012-11-30"),
        ]);

        let finalized = Deduplicator::new(&engine, ConflictPolicy::LastWriteWins)
            .finalize(&accumulated, KEY)
            .await?;
        assert_batches_sorted_eq!(
            vec![
                "+----------+---------+------------+------------+",
                "| personId | tagName | useFrom    | useUntil   |",
                "+----------+---------+------------+------------+",
                "| 1        | X       | 2012-11-29 | 2012-11-30 |",
                "| 2        | X       | 2012-11-28 | 2012-11-30 |",
                "+----------+---------+------------+------------+",
            ],
            finalized.batches()
        );

        match Deduplicator::new(&engine, ConflictPolicy::Reject)
            .finalize(&accumulated, KEY)
            .await
        {
            Err(ParamgenError::Conflict(msg)) => assert!(msg.starts_with("1 keys of Q_6")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!engine.table_exist("Q_6_staged")?);
        Ok(())
    }

    #[tokio::test]
    async fn reject_passes_clean_relations() -> Result<()> {
        let engine = Engine::new();
        let accumulated = relation(&[
            (1, "X", "2012-11-28", "2012-11-28"),
            (1, "X", "2012-11-28", "2012-11-29"),
        ]);
        let finalized = Deduplicator::new(&engine, ConflictPolicy::Reject)
            .finalize(&accumulated, KEY)
            .await?;
        assert_eq!(1, finalized.num_rows());
        Ok(())
    }

    #[tokio::test]
    async fn key_must_exist() {
        let engine = Engine::new();
        let dedup = Deduplicator::new(&engine, ConflictPolicy::default());
        let accumulated = relation(&[]);
        assert!(matches!(
            dedup.finalize(&accumulated, &["person1Id"]).await,
            Err(ParamgenError::SchemaMismatch(_))
        ));
        assert!(matches!(
            dedup.finalize(&accumulated, &[]).await,
            Err(ParamgenError::Config(_))
        ));
    }
}
