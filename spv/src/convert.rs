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

use std::{fs::remove_file, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use spv::output::{
    driver::{Config, Driver},
    spv::select::Criteria,
};

use crate::{
    diagnostics_reported,
    selection::{open_and_select, Selection},
};

/// Convert the tables and text in an SPV file into another format.
#[derive(Args, Clone, Debug)]
pub struct Convert {
    /// SPV file to read.
    input: PathBuf,

    /// Output file name.
    output: PathBuf,

    /// Output driver options, as `KEY=VALUE`.  `format=csv` or `format=json`
    /// chooses the output format, which is otherwise inferred from the output
    /// file's extension.
    #[arg(short = 'O', value_name = "KEY=VALUE")]
    options: Vec<String>,

    #[command(flatten)]
    pub selection: Selection,
}

/// Parses `KEY=VALUE`.  `VALUE` may be any TOML value, and anything that
/// isn't valid TOML is taken as a string.
fn parse_option(option: &str) -> Result<(String, toml::Value)> {
    let (key, value) = option
        .split_once('=')
        .ok_or_else(|| anyhow!("{option}: driver option must have the form KEY=VALUE"))?;
    let value = match toml::from_str::<toml::Table>(&format!("value = {value}")) {
        Ok(mut table) => table
            .remove("value")
            .unwrap_or_else(|| toml::Value::String(value.into())),
        Err(_) => toml::Value::String(value.into()),
    };
    Ok((key.trim().into(), value))
}

impl Convert {
    fn config(&self) -> Result<Config> {
        let mut table = toml::Table::new();
        table.insert(
            String::from("file"),
            toml::Value::String(self.output.display().to_string()),
        );
        for option in &self.options {
            let (key, value) = parse_option(option)?;
            table.insert(key, value);
        }
        if !table.contains_key("format") {
            let format = <dyn Driver>::format_from_file_name(&self.output).ok_or_else(|| {
                anyhow!(
                    "{}: no default output format for file name",
                    self.output.display()
                )
            })?;
            table.insert(String::from("format"), toml::Value::String(format.into()));
        }
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Writes the output file.  Returns false if warnings caused it to be
    /// deleted.
    pub fn run(self, criteria: &[Criteria]) -> Result<bool> {
        let config = self.config()?;
        let (spv, selected) = open_and_select(&self.input, criteria)?;

        let mut driver = <dyn Driver>::new(&config)
            .with_context(|| format!("{}", self.output.display()))?;
        if let Some(page_setup) = spv.page_setup() {
            driver.setup(page_setup);
        }
        for item in selected.children() {
            driver.write(item)?;
        }
        driver.flush()?;
        drop(driver);

        if diagnostics_reported() && !self.selection.force {
            remove_file(&self.output)
                .with_context(|| format!("{}: could not remove", self.output.display()))?;
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_option;

    #[test]
    fn options() {
        assert_eq!(
            parse_option("delimiter=;").unwrap(),
            (String::from("delimiter"), toml::Value::String(String::from(";")))
        );
        assert_eq!(
            parse_option("pretty=false").unwrap(),
            (String::from("pretty"), toml::Value::Boolean(false))
        );
        assert_eq!(
            parse_option("format=\"csv\"").unwrap(),
            (String::from("format"), toml::Value::String(String::from("csv")))
        );
        assert_eq!(
            parse_option("format=csv").unwrap(),
            (String::from("format"), toml::Value::String(String::from("csv")))
        );
        assert!(parse_option("format").is_err());
    }
}
