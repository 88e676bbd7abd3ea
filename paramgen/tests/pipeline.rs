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

//! End-to-end runs over small on-disk fixtures.

use datafusion::arrow::array::{ArrayRef, Date32Array, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::assert_batches_sorted_eq;
use datafusion::prelude::ParquetReadOptions;
use paramgen::catalog::query::{of_kind, QueryKind};
use paramgen::prelude::*;
use paramgen::test_util::{date32, int64_batch, int64_values, write_batch};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn person_interests() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("personId", DataType::Int64, false),
        Field::new("tagName", DataType::Utf8, false),
        Field::new("since", DataType::Date32, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2])),
        Arc::new(StringArray::from(vec!["X", "Y"])),
        Arc::new(Date32Array::from(vec![
            date32("2012-11-28"),
            date32("2012-11-29"),
        ])),
    ];
    RecordBatch::try_new(schema, columns).unwrap()
}

fn template(query: &QueryType) -> String {
    let validity = ":date_start_filter AS \"useFrom\", :date_limit_filter AS \"useUntil\"";
    match query.name {
        "13b" | "14b" => format!(
            "SELECT \"person1Id\", \"person2Id\", {} FROM people4Hops",
            validity
        ),
        "13a" => format!(
            "SELECT \"person1Id\", \"person2Id\", {} FROM Q_13b",
            validity
        ),
        "14a" => format!(
            "SELECT \"person1Id\", \"person2Id\", {} FROM Q_14b",
            validity
        ),
        "personId" => "SELECT DISTINCT \"personId\" FROM personInterests;".to_owned(),
        "messageId" => "SELECT \"personId\" * 10 AS \"messageId\" FROM personInterests;".to_owned(),
        _ => {
            let key = query
                .key
                .iter()
                .map(|c| match *c {
                    "personId" | "tagName" => format!("\"{}\"", c),
                    _ => format!("'k' AS \"{}\"", c),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "SELECT {}, {} FROM personInterests WHERE \"since\" <= :date_limit_filter;",
                key, validity
            )
        }
    }
}

fn fixture(root: &Path) -> Result<()> {
    let factors = root.join("factors");
    write_batch(
        &factors.join("personInterests/part-0.parquet"),
        &person_interests(),
    )?;
    write_batch(
        &factors.join("people4Hops/curated_paths.parquet"),
        &int64_batch(&[("person1Id", vec![Some(1)]), ("person2Id", vec![Some(2)])]),
    )?;
    write_batch(
        &factors.join("people4Hops/part-0.parquet"),
        &int64_batch(&[("stale", vec![Some(0)])]),
    )?;

    let queries = root.join("paramgen-queries");
    fs::create_dir_all(&queries)?;
    for kind in [QueryKind::LateBound, QueryKind::Interactive, QueryKind::ShortLookup] {
        for query in of_kind(kind) {
            fs::write(queries.join(query.template_file()), template(query))?;
        }
    }
    Ok(())
}

async fn read(engine: &Engine, path: &Path) -> Result<Vec<RecordBatch>> {
    Ok(engine
        .context()
        .read_parquet(path.to_str().unwrap(), ParquetReadOptions::default())
        .await?
        .collect()
        .await?)
}

#[tokio::test]
async fn generate_exports_every_query_type() -> Result<()> {
    let root = tempfile::tempdir()?;
    fixture(root.path())?;
    let output = root.path().join("parameters");

    let config = GenerateConfig::new(
        &format!("{}/factors/*", root.path().display()),
        "2012-11-28",
        "2012-11-30",
        1,
    )?
    .with_short_query_parameters(true)
    .with_query_dir(root.path().join("paramgen-queries"))
    .with_output_dir(&output)
    .with_scratch_dir(root.path().join("scratch"));

    let engine = Engine::open(&config.scratch_dir, config.target_partitions)?;
    let report = ParameterGenerator::new(&engine, config).run().await?;

    assert_eq!(vec!["people4Hops", "personInterests"], report.factor_tables);
    assert_eq!(vec!["Q_13b", "Q_14b"], report.late_bound);
    assert_eq!(17, report.exported.len());
    assert!(report.exported.iter().all(|e| e.path.is_file()));
    assert_eq!(
        vec![std::ffi::OsString::from("curated_paths.parquet")],
        fs::read_dir(root.path().join("factors/people4Hops"))?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<std::io::Result<Vec<_>>>()?
    );

    let q6 = read(&engine, &output.join("interactive-6.parquet")).await?;
    assert_batches_sorted_eq!(
        vec![
            "+----------+---------+------------+------------+",
            "| personId | tagName | useFrom    | useUntil   |",
            "+----------+---------+------------+------------+",
            "| 1        | X       | 2012-11-28 | 2012-11-29 |",
            "| 2        | Y       | 2012-11-28 | 2012-11-29 |",
            "+----------+---------+------------+------------+",
        ],
        &q6
    );

    let q13a = read(&engine, &output.join("interactive-13a.parquet")).await?;
    assert_batches_sorted_eq!(
        vec![
            "+-----------+-----------+------------+------------+",
            "| person1Id | person2Id | useFrom    | useUntil   |",
            "+-----------+-----------+------------+------------+",
            "| 1         | 2         | 2012-11-28 | 2012-11-29 |",
            "+-----------+-----------+------------+------------+",
        ],
        &q13a
    );

    let message_ids = read(&engine, &output.join("interactive-messageId.parquet")).await?;
    let mut ids = int64_values(&message_ids, "messageId");
    ids.sort();
    assert_eq!(vec![Some(10), Some(20)], ids);

    engine.close();
    assert!(!root.path().join("scratch").exists());
    Ok(())
}

#[tokio::test]
async fn dependent_time_rewrites_the_update_streams() -> Result<()> {
    let root = tempfile::tempdir()?;
    let raw = root.path().join("raw");
    for (entity, date) in [("Person", 10), ("Post", 20), ("Comment", 30), ("Forum", 40)] {
        write_batch(
            &raw.join("dynamic").join(entity).join("part-0.snappy.parquet"),
            &int64_batch(&[("id", vec![Some(1)]), ("creationDate", vec![Some(date)])]),
        )?;
    }
    let updates = root.path().join("updates");
    let likes = updates.join("inserts/Person_likes_Post.parquet");
    write_batch(
        &likes,
        &int64_batch(&[
            ("creationDate", vec![Some(100), Some(101)]),
            ("PersonId", vec![Some(1), Some(1)]),
            ("PostId", vec![Some(1), Some(2)]),
        ]),
    )?;

    let config = DependentTimeConfig::new(raw.to_str().unwrap(), updates.to_str().unwrap())?;
    let engine = Engine::new();
    let reports = DependentTimeAppender::new(&engine, config)?.run().await?;
    assert_eq!(1, reports.len());
    assert_eq!(2, reports[0].resolved);

    let rewritten = read(&engine, &likes).await?;
    assert_eq!(vec![Some(20), Some(10)], int64_values(&rewritten, "dependentDate"));
    Ok(())
}
