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

//! Appends the dependent time to the update event files.

use crate::args::{parse, value};
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use ini::Ini;
use log::info;
use paramgen::config::setting_as;
use paramgen::prelude::*;

pub fn command_args() -> Command<'static> {
    Command::new("dependent-time")
        .about("Adds the dependent time to the insert and delete event files")
        .arg(
            Arg::new("raw data dir")
                .long("raw-data-dir")
                .value_name("DIR")
                .help("Sets the raw data directory holding the initial snapshot")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("update dir")
                .long("update-dir")
                .value_name("DIR")
                .help("Sets the directory holding the inserts and deletes folders")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("dependent date column")
                .long("dependent-date-column")
                .value_name("NAME")
                .help("Sets the name of the appended column")
                .takes_value(true),
        )
        .arg(
            Arg::new("default dependent time")
                .long("default-dependent-time")
                .value_name("MILLIS")
                .help("Sets the time written for events without parent entities")
                .takes_value(true)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("reject unmatched")
                .long("reject-unmatched")
                .help("Fails when an event matches none of its parent entities"),
        )
}

pub async fn command(matches: &ArgMatches, settings: Option<&Ini>) -> Result<()> {
    let mut config = DependentTimeConfig::new(
        value(matches, "raw data dir")?,
        value(matches, "update dir")?,
    )?;
    if let Some(settings) = settings {
        config = config.with_settings(settings)?;
    }
    if let Some(column) = matches.value_of("dependent date column") {
        config.dependent_date_column = column.to_owned();
    }
    if matches.is_present("default dependent time") {
        config.default_dependent_time = parse::<i64>(matches, "default dependent time")?;
    }
    if matches.is_present("reject unmatched") {
        config.unmatched_policy = UnmatchedPolicy::Reject;
    }
    config.validate()?;

    let engine = Engine::open(
        &config.scratch_dir,
        setting_as::<usize>("paramgen", "target_partitions")?,
    )?;
    let result = match DependentTimeAppender::new(&engine, config) {
        Ok(appender) => appender.run().await,
        Err(e) => Err(e),
    };
    engine.close();

    for report in result? {
        info!(
            "{}: {} rows, {} resolved, {} without dependency, {} unmatched",
            report.event_type, report.rows, report.resolved, report.no_dependency, report.unmatched
        );
    }
    Ok(())
}
