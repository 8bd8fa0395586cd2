/* PSPP - a program for statistical analysis.
 * Copyright (C) 2025 Free Software Foundation, Inc.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>. */

use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Result};
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use env_logger::Env;
use spv::{
    message::{count, set_handler, Severity},
    output::spv::detect_file,
};

use crate::{
    convert::Convert,
    dir::Dir,
    dump::{Dump, DumpLegacyData, DumpLegacyTable, DumpLightTable, DumpStructure, IsLegacy},
    selection::Selection,
};

mod convert;
mod dir;
mod dump;
mod selection;

/// Tool for examining SPSS Viewer (SPV) files.
#[derive(Parser, Debug)]
#[command(name = "spv-tool", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Clone, Debug)]
enum Command {
    Detect(Detect),
    Dir(Dir),
    Convert(Convert),
    Dump(Dump),
    DumpLightTable(DumpLightTable),
    DumpLegacyData(DumpLegacyData),
    DumpLegacyTable(DumpLegacyTable),
    DumpStructure(DumpStructure),
    IsLegacy(IsLegacy),
}

/// Exit with status 0 if a file is an SPV file, 1 otherwise.
#[derive(Args, Clone, Debug)]
struct Detect {
    /// File to examine.
    input: PathBuf,
}

impl Detect {
    fn run(self) -> Result<()> {
        if !detect_file(&self.input)? {
            bail!("{}: not an SPV file", self.input.display());
        }
        Ok(())
    }
}

/// Returns true if any warnings or errors have been reported.
fn diagnostics_reported() -> bool {
    count(Severity::Warning) + count(Severity::Error) > 0
}

fn status(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Exit status for a command that honors `--force`.
fn finish(selection: &Selection) -> ExitCode {
    status(selection.force || !diagnostics_reported())
}

impl Command {
    fn run(self, matches: &ArgMatches) -> Result<ExitCode> {
        let criteria = || Selection::criteria(matches);
        match self {
            Command::Detect(detect) => {
                detect.run()?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Dir(dir) => {
                let selection = dir.selection.clone();
                dir.run(&criteria()?)?;
                Ok(finish(&selection))
            }
            Command::Convert(convert) => Ok(status(convert.run(&criteria()?)?)),
            Command::Dump(dump) => {
                let selection = dump.selection.clone();
                dump.run(&criteria()?)?;
                Ok(finish(&selection))
            }
            Command::DumpLightTable(dump) => {
                let selection = dump.selection.clone();
                dump.run(&criteria()?)?;
                Ok(finish(&selection))
            }
            Command::DumpLegacyData(dump) => {
                let selection = dump.selection.clone();
                dump.run(&criteria()?)?;
                Ok(finish(&selection))
            }
            Command::DumpLegacyTable(dump) => {
                let selection = dump.selection.clone();
                dump.run(&criteria()?)?;
                Ok(finish(&selection))
            }
            Command::DumpStructure(dump) => {
                let selection = dump.selection.clone();
                dump.run(&criteria()?)?;
                Ok(finish(&selection))
            }
            Command::IsLegacy(is_legacy) => Ok(status(is_legacy.run(&criteria()?)?)),
        }
    }
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    set_handler(|diagnostic| eprintln!("spv-tool: {diagnostic}"));

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|error| error.exit());
    let Some((_, sub_matches)) = matches.subcommand() else {
        bail!("missing subcommand");
    };
    cli.command.run(sub_matches)
}
