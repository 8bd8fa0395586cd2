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


use std::{
    borrow::Cow,
    fs::File,
    io::{BufWriter, Error, ErrorKind, Result as IoResult, Write},
    path::PathBuf,
};

use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};

use super::{
    driver::{leaf_names, sorted_cells, Driver},
    pivot::PivotTable,
    Details, Item, TextType,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Output file name.
    pub file: PathBuf,

    /// Field separator.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Character for quoting fields that contain the delimiter, a quote, or
    /// a new-line.
    #[serde(default = "default_quote")]
    pub quote: char,
}

fn default_delimiter() -> char {
    ','
}

fn default_quote() -> char {
    '"'
}

fn ascii(c: char, what: &str) -> IoResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, format!("{what} {c:?} is not ASCII")))
}

/// Writes output items as comma-separated values.
///
/// Each table becomes a title line, a header line that names the dimensions,
/// and a line per cell with the names of the cell's categories followed by
/// its value.  Text items become one line per line of text.  A blank line
/// separates items.
pub struct CsvDriver<W: Write = BufWriter<File>> {
    inner: W,
    builder: WriterBuilder,

    /// Number of items written so far.
    n_items: usize,
}

impl CsvDriver {
    pub fn new(config: &CsvConfig) -> IoResult<Self> {
        let file = BufWriter::new(File::create(&config.file)?);
        Self::for_writer(file, config)
    }
}

impl<W: Write> CsvDriver<W> {
    pub fn for_writer(inner: W, config: &CsvConfig) -> IoResult<Self> {
        let mut builder = WriterBuilder::new();
        builder
            .flexible(true)
            .delimiter(ascii(config.delimiter, "delimiter")?)
            .quote(ascii(config.quote, "quote")?);
        Ok(Self {
            inner,
            builder,
            n_items: 0,
        })
    }

    pub fn into_inner(mut self) -> IoResult<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    /// Separates a new item from the previous one and returns a writer for
    /// its records.
    fn start_item(&mut self) -> IoResult<Writer<&mut W>> {
        if self.n_items > 0 {
            writeln!(self.inner)?;
        }
        self.n_items += 1;
        Ok(self.builder.from_writer(&mut self.inner))
    }

    fn write_table(&mut self, pt: &PivotTable) -> IoResult<()> {
        let mut writer = self.start_item()?;
        writer.write_record([format!("Table: {}", pt.title().display(pt))])?;

        let header = pt
            .dimensions
            .iter()
            .map(|dimension| dimension.root.name.display(pt).to_string())
            .chain(Some(String::from("Value")));
        writer.write_record(header)?;
        for (index, value) in sorted_cells(pt) {
            let mut record = leaf_names(pt, index);
            record.push(value.display(pt).to_string());
            writer.write_record(&record)?;
        }

        if let Some(caption) = &pt.caption {
            writer.write_record([format!("Caption: {}", caption.display(pt))])?;
        }
        for footnote in pt.footnotes.iter().filter(|footnote| footnote.show) {
            writer.write_record([format!(
                "Footnote: {}. {}",
                footnote.display_marker(pt),
                footnote.display_content(pt)
            )])?;
        }
        writer.flush()
    }

    fn write_text(&mut self, text: &str) -> IoResult<()> {
        let mut writer = self.start_item()?;
        for line in text.lines() {
            writer.write_record([line])?;
        }
        writer.flush()
    }
}

impl<W: Write> Driver for CsvDriver<W> {
    fn name(&self) -> Cow<'static, str> {
        Cow::from("csv")
    }

    fn write(&mut self, item: &Item) -> IoResult<()> {
        match &item.details {
            Details::Heading(children) => {
                for child in children {
                    self.write(child)?;
                }
            }
            Details::Table(_) => {
                if let Some(table) = item.table() {
                    self.write_table(table)?;
                }
            }
            Details::Text(text) => match text.type_ {
                TextType::PageTitle => (),
                TextType::Title | TextType::Text | TextType::Log => {
                    self.write_text(&text.content.display(()).to_string())?;
                }
            },
            Details::PageBreak => {
                self.start_item()?;
            }
            Details::Graph | Details::Model | Details::Tree | Details::Image => (),
        }
        Ok(())
    }

    fn flush(&mut self) -> IoResult<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::output::{
        driver::Driver,
        pivot::{Axis3, Footnote, PivotTable, Value},
        Item, Text,
    };

    use super::{CsvConfig, CsvDriver};

    fn config(delimiter: char) -> CsvConfig {
        CsvConfig {
            file: PathBuf::from("unused.csv"),
            delimiter,
            quote: '"',
        }
    }

    fn table() -> PivotTable {
        let mut pt = PivotTable::new("Counts", "Counts");
        let rows = pt.add_dimension(Axis3::Y, "Sex");
        pt.dimensions[rows].add_leaf(&[], "Male");
        pt.dimensions[rows].add_leaf(&[], "Female");
        let columns = pt.add_dimension(Axis3::X, "Statistics");
        pt.dimensions[columns].add_leaf(&[], "N");
        pt.put2(0, 0, Value::new_user_text("10"));
        pt.put2(1, 0, Value::new_user_text("12, maybe"));
        pt.footnotes.push(Footnote::new("Estimated.").with_marker("a"));
        pt
    }

    #[test]
    fn table_and_text() {
        let mut heading = Item::new_root();
        heading.push(Item::new(Text::new_log(Value::new_user_text(
            "FREQUENCIES sex.\nline 2",
        ))));
        heading.push(Item::new(table()));

        let mut driver = CsvDriver::for_writer(Vec::new(), &config(',')).unwrap();
        driver.write(&heading).unwrap();
        driver.flush().unwrap();
        let output = String::from_utf8(driver.into_inner().unwrap()).unwrap();
        assert_eq!(
            output,
            r#"FREQUENCIES sex.
line 2

Table: Counts
Sex,Statistics,Value
Male,N,10
Female,N,"12, maybe"
Footnote: a. Estimated.
"#
        );
    }

    #[test]
    fn delimiter() {
        let mut driver = CsvDriver::for_writer(Vec::new(), &config(';')).unwrap();
        driver.write(&Item::new(table())).unwrap();
        let output = String::from_utf8(driver.into_inner().unwrap()).unwrap();
        assert!(output.contains("Female;N;12, maybe\n"), "{output}");

        assert!(CsvDriver::for_writer(Vec::new(), &config('→')).is_err());
    }
}
