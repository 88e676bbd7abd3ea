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

//! Generates the parameter files of the Interactive workload.

use crate::args::{parse, value};
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use ini::Ini;
use log::info;
use paramgen::prelude::*;

pub fn command_args() -> Command<'static> {
    Command::new("generate")
        .about("Generates the time-bucketed parameters of the Interactive queries")
        .arg(
            Arg::new("raw parquet dir")
                .long("raw-parquet-dir")
                .value_name("DIR")
                .help("Sets the raw parquet directory, e.g. '/data/out-sf1/graphs/parquet/raw/'")
                .takes_value(true),
        )
        .arg(
            Arg::new("factor tables dir")
                .long("factor-tables-dir")
                .value_name("DIR")
                .help("Sets the directory containing the factor tables")
                .takes_value(true)
                .default_value("factors/"),
        )
        .arg(
            Arg::new("start date")
                .long("start-date")
                .value_name("DATE")
                .help("Start date of the update streams")
                .takes_value(true)
                .default_value("2012-11-28"),
        )
        .arg(
            Arg::new("end date")
                .long("end-date")
                .value_name("DATE")
                .help("End date of the update streams")
                .takes_value(true)
                .default_value("2013-01-01"),
        )
        .arg(
            Arg::new("time bucket size")
                .long("time-bucket-size-in-days")
                .value_name("DAYS")
                .help("How many days a time bucket spans")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::new("short query parameters")
                .long("generate-short-query-parameters")
                .help("Also generates the personId and messageId parameters of the short reads"),
        )
        .arg(
            Arg::new("query dir")
                .long("query-dir")
                .value_name("DIR")
                .help("Sets the directory of the pg-{query}.sql templates")
                .takes_value(true),
        )
        .arg(
            Arg::new("output dir")
                .long("output-dir")
                .value_name("DIR")
                .help("Sets the output directory of the parameter files")
                .takes_value(true),
        )
        .arg(
            Arg::new("scratch dir")
                .long("scratch-dir")
                .value_name("DIR")
                .help("Sets the working directory of the query engine")
                .takes_value(true),
        )
        .arg(
            Arg::new("reject conflicts")
                .long("reject-conflicts")
                .help("Fails when a parameter keeps several latest validity records"),
        )
}

pub async fn command(matches: &ArgMatches, settings: Option<&Ini>) -> Result<()> {
    let mut config = GenerateConfig::new(
        value(matches, "factor tables dir")?,
        value(matches, "start date")?,
        value(matches, "end date")?,
        parse::<i64>(matches, "time bucket size")?,
    )?;
    if let Some(settings) = settings {
        config = config.with_settings(settings)?;
    }
    if let Some(dir) = matches.value_of("raw parquet dir") {
        config = config.with_raw_parquet_dir(dir);
    }
    if let Some(dir) = matches.value_of("query dir") {
        config = config.with_query_dir(dir);
    }
    if let Some(dir) = matches.value_of("output dir") {
        config = config.with_output_dir(dir);
    }
    if let Some(dir) = matches.value_of("scratch dir") {
        config = config.with_scratch_dir(dir);
    }
    if matches.is_present("reject conflicts") {
        config = config.with_conflict_policy(ConflictPolicy::Reject);
    }
    config = config.with_short_query_parameters(matches.is_present("short query parameters"));
    config.validate()?;

    let engine = Engine::open(&config.scratch_dir, config.target_partitions)?;
    let result = ParameterGenerator::new(&engine, config).run().await;
    engine.close();
    let report = result?;

    for exported in &report.exported {
        info!("{:>10} {:>8} rows", format!("Q{}", exported.query), exported.rows);
    }
    info!(
        "Done in {}",
        humantime::format_duration(std::time::Duration::from_secs(report.elapsed.as_secs()))
    );
    Ok(())
}
