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

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{stdout, Write},
    path::PathBuf,
};

use anyhow::Result;
use clap::Args;
use spv::output::{spv::select::Criteria, Item};

use crate::selection::{open_and_select, Selection};

/// List the output items in an SPV file.
#[derive(Args, Clone, Debug)]
pub struct Dir {
    /// SPV file to read.
    input: PathBuf,

    /// Show the names of the ZIP members that each item came from.
    #[arg(long)]
    member_names: bool,

    #[command(flatten)]
    pub selection: Selection,
}

impl Dir {
    pub fn run(self, criteria: &[Criteria]) -> Result<()> {
        let (_spv, selected) = open_and_select(&self.input, criteria)?;
        let mut out = stdout().lock();
        for (depth, item) in selected.descendants() {
            writeln!(
                out,
                "{:indent$}{}",
                "",
                DirEntry {
                    item,
                    member_names: self.member_names
                },
                indent = depth * 4
            )?;
        }
        Ok(())
    }
}

/// One line of `dir` output, without indentation.
struct DirEntry<'a> {
    item: &'a Item,
    member_names: bool,
}

impl Display for DirEntry<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let item = self.item;
        let label = item.label();
        write!(f, "- {} {label:?}", item.details.type_name())?;

        if let Some(table) = item.table() {
            let title = table.title().display(&**table).to_string();
            if title != label {
                write!(f, " title {title:?}")?;
            }
        }
        if let Some(command_name) = &item.command_name {
            write!(f, " command {command_name:?}")?;
        }
        if let Some(subtype) = &item.subtype {
            if *subtype != label {
                write!(f, " subtype {subtype:?}")?;
            }
        }
        if !item.is_visible() {
            write!(f, " (hidden)")?;
        } else if !item.show {
            write!(f, " (collapsed)")?;
        }
        if self.member_names {
            if let Some(spv_info) = &item.spv_info {
                for (index, member) in spv_info.members().enumerate() {
                    let conjunction = if index == 0 { "in" } else { "and" };
                    write!(f, " {conjunction} {member}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use spv::output::{
        pivot::{PivotTable, Value},
        Item, SpvInfo, Text, TextType,
    };

    use super::DirEntry;

    fn entry(item: &Item, member_names: bool) -> String {
        DirEntry { item, member_names }.to_string()
    }

    #[test]
    fn entries() {
        let heading = Item::new_root()
            .with_label(Some(String::from("Frequencies")))
            .with_command_name(Some(String::from("Frequencies")))
            .with_show(false);
        assert_eq!(
            entry(&heading, false),
            r#"- heading "Frequencies" command "Frequencies" (collapsed)"#
        );
        let hidden = Item::new_root()
            .with_label(Some(String::from("Notes")))
            .with_show(false)
            .with_spv_info(SpvInfo {
                hidden: true,
                ..SpvInfo::new("outputViewer0000000002.xml")
            });
        assert_eq!(entry(&hidden, false), r#"- heading "Notes" (hidden)"#);

        let title = Item::new(Text::new(TextType::Title, Value::new_user_text("x")))
            .with_spv_info(SpvInfo::new("outputViewer0000000001.xml"));
        assert_eq!(
            entry(&title, true),
            r#"- text "Title" in outputViewer0000000001.xml"#
        );

        let mut table = Item::new(PivotTable::new("Statistics", "Statistics"))
            .with_label(Some(String::from("Statistics")))
            .with_show(false)
            .with_spv_info(SpvInfo {
                bin_member: Some(String::from("t0.bin")),
                xml_member: Some(String::from("t0.xml")),
                ..SpvInfo::new("outputViewer0000000001.xml")
            });
        table.subtype = Some(String::from("Statistics"));
        assert_eq!(entry(&table, false), r#"- table "Statistics" (hidden)"#);
        assert_eq!(
            entry(&table, true),
            r#"- table "Statistics" (hidden) in outputViewer0000000001.xml and t0.xml and t0.bin"#
        );

        let mut renamed = Item::new(PivotTable::new("Case Summary", "Summary"))
            .with_label(Some(String::from("Cases")));
        renamed.subtype = Some(String::from("Summary"));
        assert_eq!(
            entry(&renamed, false),
            r#"- table "Cases" title "Case Summary" subtype "Summary""#
        );
    }
}
