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

mod args;
mod dependent;
mod generate;

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{crate_version, Command};

fn cli() -> Command<'static> {
    Command::new("paramgen")
        .version(crate_version!())
        .about("Parameter curation for the LDBC SNB Interactive update streams")
        .author("UMD Database Group")
        .args(args::get_args())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(generate::command_args())
        .subcommand(dependent::command_args())
}

#[tokio::main]
pub async fn main() -> Result<()> {
    // Command line arg parsing and configuration.
    let matches = cli().get_matches();

    let (command, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("no command given"))?;
    args::get_logging(&matches, sub_matches)?.init();
    let settings = args::get_settings(&matches)?;

    match command {
        "generate" => generate::command(sub_matches, settings.as_ref()).await,
        "dependent-time" => dependent::command(sub_matches, settings.as_ref()).await,
        _ => bail!("unknown command {}", command),
    }
    .with_context(|| anyhow!("{} command failed", command))?;

    Ok(())
}
