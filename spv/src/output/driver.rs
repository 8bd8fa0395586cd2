// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.


use std::{borrow::Cow, io::Result as IoResult, path::Path};

use serde::{Deserialize, Serialize};

use super::{
    csv::{CsvConfig, CsvDriver},
    json::{JsonConfig, JsonDriver},
    page::Setup,
    pivot::{CellIndex, PivotTable, Value},
    Item,
};

/// An output driver.
pub trait Driver {
    fn name(&self) -> Cow<'static, str>;

    /// Writes `item`.  For a heading, this writes its children too.
    fn write(&mut self, item: &Item) -> IoResult<()>;

    /// Returns false if the driver doesn't support page setup.
    fn setup(&mut self, page_setup: &Setup) -> bool {
        let _ = page_setup;
        false
    }

    /// Ensures that anything written with [Self::write] has reached its
    /// destination.
    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Configuration for an output driver, as read from `key=value` options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Config {
    Csv(CsvConfig),
    Json(JsonConfig),
}

impl dyn Driver {
    /// Creates the driver that `config` describes.
    pub fn new(config: &Config) -> IoResult<Box<Self>> {
        Ok(match config {
            Config::Csv(csv_config) => Box::new(CsvDriver::new(csv_config)?),
            Config::Json(json_config) => Box::new(JsonDriver::new(json_config)?),
        })
    }

    /// Returns the format of the driver to use for writing to `file_name`,
    /// based on its extension.
    pub fn format_from_file_name(file_name: &Path) -> Option<&'static str> {
        let extension = file_name.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some("csv"),
            "json" => Some("json"),
            _ => None,
        }
    }
}

/// Returns the cells in `table` in order of their data indexes.
pub(crate) fn sorted_cells(table: &PivotTable) -> Vec<(&CellIndex, &Value)> {
    let mut cells: Vec<_> = table.cells.iter().collect();
    cells.sort_by(|(a, _), (b, _)| a.cmp(b));
    cells
}

/// Returns the names of the leaves that `index` refers to, one per dimension.
pub(crate) fn leaf_names(table: &PivotTable, index: &[usize]) -> Vec<String> {
    table
        .dimensions
        .iter()
        .zip(index)
        .map(|(dimension, data_index)| match dimension.data_leaf(*data_index) {
            Some(leaf) => leaf.name.display(table).to_string(),
            None => data_index.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{Config, Driver};

    #[test]
    fn format_from_file_name() {
        assert_eq!(
            <dyn Driver>::format_from_file_name(Path::new("out.CSV")),
            Some("csv")
        );
        assert_eq!(
            <dyn Driver>::format_from_file_name(Path::new("dir/out.json")),
            Some("json")
        );
        assert_eq!(<dyn Driver>::format_from_file_name(Path::new("out")), None);
        assert_eq!(<dyn Driver>::format_from_file_name(Path::new("out.pdf")), None);
    }

    #[test]
    fn config() {
        let config: Config = toml::from_str(
            r#"format = "csv"
file = "out.csv"
delimiter = ";"
"#,
        )
        .unwrap();
        let Config::Csv(csv) = config else {
            panic!()
        };
        assert_eq!(csv.delimiter, ';');
        assert_eq!(csv.quote, '"');

        let config: Config = toml::from_str(
            r#"format = "json"
file = "out.json"
"#,
        )
        .unwrap();
        assert!(matches!(config, Config::Json(_)));

        assert!(toml::from_str::<Config>(r#"format = "pdf""#).is_err());
    }
}
