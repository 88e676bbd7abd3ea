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

use anyhow::{anyhow, Context as _, Result};
use clap::{Arg, ArgMatches};
use ini::Ini;
use paramgen::config::load_settings;
use std::io::Write;
use std::path::Path;

pub fn get_args() -> Vec<Arg<'static>> {
    let config = Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Sets a custom config file")
        .global(true)
        .takes_value(true);
    get_logging_args().into_iter().chain(vec![config]).collect()
}

fn get_logging_args() -> Vec<Arg<'static>> {
    [
        Arg::new("log-level")
            .short('L')
            .long("log-level")
            .possible_values(["error", "warn", "info", "debug", "trace", "off"])
            .help("Log level [default: info]")
            .global(true)
            .takes_value(true),
        Arg::new("trace")
            .long("trace")
            .help("Log ultra-verbose (trace level) information")
            .global(true)
            .takes_value(false),
        Arg::new("silent")
            .long("silent")
            .help("Suppress all output")
            .global(true)
            .takes_value(false),
    ]
    .to_vec()
}

/// Builds the logger from the level flags: `--trace`, then `--silent`, then
/// `-L`. The SQL parser and DataFusion stay at `warn` so that `-L debug` shows
/// the paramgen SQL without planner chatter.
pub fn get_logging(
    global_matches: &ArgMatches,
    matches: &ArgMatches,
) -> Result<env_logger::Builder> {
    let mut builder = env_logger::Builder::new();

    let level = if matches.is_present("trace") {
        log::LevelFilter::Trace
    } else if matches.is_present("silent") {
        log::LevelFilter::Off
    } else {
        match matches
            .value_of("log-level")
            .or_else(|| global_matches.value_of("log-level"))
        {
            Some("error") => log::LevelFilter::Error,
            Some("warn") => log::LevelFilter::Warn,
            Some("debug") => log::LevelFilter::Debug,
            Some("trace") => log::LevelFilter::Trace,
            Some("off") => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        }
    };
    builder.filter(None, level);
    for module in ["sqlparser", "datafusion"] {
        builder.filter_module(module, level.min(log::LevelFilter::Warn));
    }

    if level == log::LevelFilter::Trace {
        builder.format_timestamp_secs();
    } else {
        builder.format(|f, record| {
            writeln!(
                f,
                "[{}] {}",
                record.level().to_string().to_lowercase(),
                record.args()
            )
        });
    }

    Ok(builder)
}

/// Loads the settings file given with `--config`, if any.
pub fn get_settings(matches: &ArgMatches) -> Result<Option<Ini>> {
    match matches.value_of("config") {
        None => Ok(None),
        Some(path) => Ok(Some(
            load_settings(Path::new(path)).with_context(|| anyhow!("invalid --config"))?,
        )),
    }
}

/// Returns the value of an argument that has a default or is required.
pub fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| anyhow!("missing argument {}", name))
}

/// Parses the value of an argument.
pub fn parse<T>(matches: &ArgMatches, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value(matches, name)?
        .parse::<T>()
        .with_context(|| anyhow!("invalid {}", name))
}
