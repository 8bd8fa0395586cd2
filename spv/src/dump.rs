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

//! Commands for examining the internals of SPV files.

use std::{
    fmt::Write as _,
    fs::File,
    io::{stdout, BufReader, IsTerminal, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use clap::Args;
use spv::{
    message::{emit, Diagnostic, Location},
    output::{
        pivot::PivotTable,
        spv::{
            legacy_bin::LegacyData,
            light,
            select::Criteria,
            xml::{Element, Error as XmlError},
            zip::ZipArchive,
        },
        Details, Item,
    },
};

use crate::selection::{open_and_select, Selection};

type Archive = ZipArchive<BufReader<File>>;

fn report(input: &Path, member: &str, text: impl Into<String>) {
    emit(Diagnostic::error(text).with_location(Location {
        file_name: Some(input.display().to_string()),
        path: None,
        member: Some(member.into()),
    }));
}

/// Iterates over the tables in `selected`.
fn tables(selected: &Item) -> impl Iterator<Item = &Item> {
    selected
        .descendants()
        .map(|(_, item)| &**item)
        .filter(|item| matches!(item.details, Details::Table(_)))
}

/// Returns the table's legacy visualization member and data member, if it is
/// a legacy table.
fn legacy_members(item: &Item) -> Option<(&str, &str)> {
    let info = item.spv_info.as_ref()?;
    Some((info.xml_member.as_deref()?, info.bin_member.as_deref()?))
}

/// Returns the table's light table member, if it is a light table.
fn light_member(item: &Item) -> Option<&str> {
    let info = item.spv_info.as_ref()?;
    match info.xml_member {
        Some(_) => None,
        None => info.bin_member.as_deref(),
    }
}

/// Print the selected items with their content.
#[derive(Args, Clone, Debug)]
pub struct Dump {
    /// SPV file to read.
    input: PathBuf,

    #[command(flatten)]
    pub selection: Selection,
}

fn dump_table(pt: &PivotTable, s: &mut String) -> std::fmt::Result {
    writeln!(s, "    title {:?}", pt.title().display(pt).to_string())?;
    for dimension in &pt.dimensions {
        write!(
            s,
            "    {} dimension {:?}:",
            dimension.axis_type,
            dimension.root.name.display(pt).to_string()
        )?;
        for leaf in (0..dimension.len()).filter_map(|index| dimension.data_leaf(index)) {
            write!(s, " {:?}", leaf.name.display(pt).to_string())?;
        }
        writeln!(s)?;
    }
    let mut cells: Vec<_> = pt.cells.iter().collect();
    cells.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (index, value) in cells {
        writeln!(s, "    {:?} {}", index.as_slice(), value.display(pt))?;
    }
    if let Some(caption) = &pt.caption {
        writeln!(s, "    caption {:?}", caption.display(pt).to_string())?;
    }
    for footnote in &pt.footnotes {
        writeln!(
            s,
            "    footnote {}: {:?}",
            footnote.display_marker(pt),
            footnote.display_content(pt).to_string()
        )?;
    }
    Ok(())
}

impl Dump {
    pub fn run(self, criteria: &[Criteria]) -> Result<()> {
        let (_spv, selected) = open_and_select(&self.input, criteria)?;
        let mut out = stdout().lock();
        for (_, item) in selected.descendants() {
            let mut s = format!("- {} {:?}\n", item.class(), item.label());
            match &item.details {
                Details::Table(_) => {
                    if let Some(pt) = item.table() {
                        dump_table(pt, &mut s)?;
                    }
                }
                Details::Text(text) => {
                    for line in text.content.display(()).to_string().lines() {
                        writeln!(s, "    {line}")?;
                    }
                }
                _ => (),
            }
            out.write_all(s.as_bytes())?;
        }
        Ok(())
    }
}

/// Print the light tables in an SPV file in their raw form.
#[derive(Args, Clone, Debug)]
pub struct DumpLightTable {
    /// SPV file to read.
    input: PathBuf,

    /// Write the raw binary members to stdout.
    #[arg(long)]
    raw: bool,

    /// Sort borders and cells before printing.
    #[arg(long)]
    sort: bool,

    #[command(flatten)]
    pub selection: Selection,
}

impl DumpLightTable {
    pub fn run(self, criteria: &[Criteria]) -> Result<()> {
        if self.raw && stdout().is_terminal() {
            bail!("not writing binary data to tty");
        }
        let (spv, selected) = open_and_select(&self.input, criteria)?;
        let mut out = stdout().lock();
        for member in tables(&selected).filter_map(light_member) {
            let data = match spv.archive().read_all(member) {
                Ok(data) => data,
                Err(error) => {
                    report(&self.input, member, error.to_string());
                    continue;
                }
            };
            if self.raw {
                out.write_all(&data)?;
                continue;
            }
            match light::parse(&data) {
                Ok(mut table) => {
                    if self.sort {
                        table.sort();
                    }
                    writeln!(out, "{member}:\n{table:#?}\n")?;
                }
                Err(error) => report(&self.input, member, error.to_string()),
            }
        }
        Ok(())
    }
}

/// Print the data in the legacy tables in an SPV file.
#[derive(Args, Clone, Debug)]
pub struct DumpLegacyData {
    /// SPV file to read.
    input: PathBuf,

    #[command(flatten)]
    pub selection: Selection,
}

impl DumpLegacyData {
    pub fn run(self, criteria: &[Criteria]) -> Result<()> {
        let (spv, selected) = open_and_select(&self.input, criteria)?;
        let mut out = stdout().lock();
        for (_, bin_member) in tables(&selected).filter_map(legacy_members) {
            let data = spv
                .archive()
                .read_all(bin_member)
                .map_err(|error| error.to_string())
                .and_then(|data| LegacyData::parse(&data).map_err(|error| error.to_string()));
            match data {
                Ok(data) => write!(out, "{bin_member}:\n{data}\n")?,
                Err(error) => report(&self.input, bin_member, error),
            }
        }
        Ok(())
    }
}

/// Reads `member` from `archive` as XML.
fn read_xml(archive: &Archive, member: &str) -> Result<Element, String> {
    let data = archive.read_all(member).map_err(|error| error.to_string())?;
    let xml = String::from_utf8(data).map_err(|error| error.to_string())?;
    Element::parse(&xml).map_err(|error: XmlError| error.to_string())
}

/// Prints the XML in `member`, or just the parts of it that `path` selects.
fn dump_xml(
    out: &mut impl Write,
    input: &Path,
    archive: &Archive,
    member: &str,
    path: Option<&str>,
) -> Result<()> {
    let root = match read_xml(archive, member) {
        Ok(root) => root,
        Err(error) => {
            writeln!(out, "<!-- {member} -->")?;
            report(input, member, error);
            return Ok(());
        }
    };
    match path {
        None => writeln!(out, "<!-- {member} -->\n{root}")?,
        Some(path) => {
            let matches = root.select(path);
            for (index, element) in matches.iter().enumerate() {
                if index == 0 {
                    writeln!(out, "<!-- {member} -->")?;
                }
                writeln!(out, "{element}")?;
            }
            if !matches.is_empty() {
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

/// Print the visualization XML of the legacy tables in an SPV file.
#[derive(Args, Clone, Debug)]
pub struct DumpLegacyTable {
    /// SPV file to read.
    input: PathBuf,

    /// Print only the elements that this path selects, e.g. `graph/facetLayout`.
    path: Option<String>,

    #[command(flatten)]
    pub selection: Selection,
}

impl DumpLegacyTable {
    pub fn run(self, criteria: &[Criteria]) -> Result<()> {
        let (spv, selected) = open_and_select(&self.input, criteria)?;
        let mut out = stdout().lock();
        for (xml_member, _) in tables(&selected).filter_map(legacy_members) {
            dump_xml(
                &mut out,
                &self.input,
                spv.archive(),
                xml_member,
                self.path.as_deref(),
            )?;
        }
        Ok(())
    }
}

/// Print the structure XML that describes the selected items.
#[derive(Args, Clone, Debug)]
pub struct DumpStructure {
    /// SPV file to read.
    input: PathBuf,

    /// Print only the elements that this path selects, e.g. `heading/label`.
    path: Option<String>,

    #[command(flatten)]
    pub selection: Selection,
}

impl DumpStructure {
    pub fn run(self, criteria: &[Criteria]) -> Result<()> {
        let (spv, selected) = open_and_select(&self.input, criteria)?;
        let mut out = stdout().lock();
        let mut previous = None;
        for (_, item) in selected.descendants() {
            let Some(member) = item
                .spv_info
                .as_ref()
                .and_then(|info| info.structure_member.as_deref())
            else {
                continue;
            };
            if previous == Some(member) {
                continue;
            }
            previous = Some(member);
            dump_xml(
                &mut out,
                &self.input,
                spv.archive(),
                member,
                self.path.as_deref(),
            )?;
        }
        Ok(())
    }
}

/// Exit with status 0 if any of the selected tables is a legacy table.
#[derive(Args, Clone, Debug)]
pub struct IsLegacy {
    /// SPV file to read.
    input: PathBuf,

    #[command(flatten)]
    pub selection: Selection,
}

impl IsLegacy {
    pub fn run(self, criteria: &[Criteria]) -> Result<bool> {
        let (_spv, selected) = open_and_select(&self.input, criteria)?;
        let is_legacy = tables(&selected).any(|item| legacy_members(item).is_some());
        Ok(is_legacy)
    }
}
