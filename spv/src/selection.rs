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

//! Options for selecting the output items that a command applies to.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, ArgMatches, Args};
use spv::output::{
    spv::{
        select::{parse_classes, select, Criteria, Instance},
        SpvFile,
    },
    Item, ItemClass,
};

/// Options for selecting output items.
///
/// Each option narrows the current set of criteria.  `--or` starts a new
/// set, and an item is selected if it satisfies any of the sets.
#[derive(Args, Clone, Debug, Default)]
pub struct Selection {
    /// Classes of items to select (`--select=help` lists them).  A leading
    /// `^` selects all the classes except those listed.
    #[arg(long = "select", value_name = "CLASS,...", help_heading = "Selection options")]
    classes: Vec<String>,

    /// Commands to select, by identifier.  A leading `^` excludes them
    /// instead.
    #[arg(long, value_name = "COMMAND,...", help_heading = "Selection options")]
    commands: Vec<String>,

    /// Commands to select, by 1-based position in the output.
    #[arg(long, value_name = "N,...", help_heading = "Selection options")]
    nth_commands: Vec<String>,

    /// Table subtypes to select.  A leading `^` excludes them instead.
    #[arg(long, value_name = "SUBTYPE,...", help_heading = "Selection options")]
    subtypes: Vec<String>,

    /// Labels to select.  A leading `^` excludes them instead.
    #[arg(long, value_name = "LABEL,...", help_heading = "Selection options")]
    labels: Vec<String>,

    /// Instances to select within each command, by 1-based position or
    /// `last`.
    #[arg(long, value_name = "N,...", help_heading = "Selection options")]
    instances: Vec<String>,

    /// Select items read from the named ZIP members.
    #[arg(long, value_name = "MEMBER,...", help_heading = "Selection options")]
    members: Vec<String>,

    /// Include hidden items.
    #[arg(long, action = ArgAction::Count, help_heading = "Selection options")]
    show_hidden: u8,

    /// Select only items that could not be read.
    #[arg(long, action = ArgAction::Count, help_heading = "Selection options")]
    errors: u8,

    /// Start a new set of criteria.
    #[arg(long, action = ArgAction::Count, help_heading = "Selection options")]
    or: u8,

    /// Do not treat warnings as errors.
    #[arg(long)]
    pub force: bool,
}

fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').filter(|item| !item.is_empty())
}

/// Parses `s`, which may begin with `^`, and appends its elements to
/// `include` or `exclude` accordingly.
fn include_or_exclude(s: &str, include: &mut Vec<String>, exclude: &mut Vec<String>) {
    let (list, s) = match s.strip_prefix('^') {
        Some(rest) => (exclude, rest),
        None => (include, s),
    };
    list.extend(split_list(s).map(String::from));
}

fn print_class_help() {
    println!("The following object classes are supported:");
    for class in enum_iterator::all::<ItemClass>() {
        println!("- {class}");
    }
}

impl Selection {
    /// Collects the selection options from `matches`, in the order they
    /// appeared, into sets of criteria.  Prints the list of classes and exits
    /// for `--select=help`.
    pub fn criteria(matches: &ArgMatches) -> Result<Vec<Criteria>> {
        // (position on command line, option id, value)
        let mut options = Vec::new();
        for id in [
            "classes",
            "commands",
            "nth_commands",
            "subtypes",
            "labels",
            "instances",
            "members",
        ] {
            if let (Some(indexes), Some(values)) =
                (matches.indices_of(id), matches.get_many::<String>(id))
            {
                options.extend(indexes.zip(values).map(|(index, value)| {
                    (index, id, value.as_str())
                }));
            }
        }
        for id in ["show_hidden", "errors", "or"] {
            if let Some(indexes) = matches.indices_of(id) {
                options.extend(indexes.map(|index| (index, id, "")));
            }
        }
        options.sort_by_key(|(index, _, _)| *index);

        let mut criteria = Vec::new();
        let mut c = Criteria::default();
        for (_, id, s) in options {
            match id {
                "classes" => {
                    if s == "help" {
                        print_class_help();
                        std::process::exit(0);
                    }
                    c.classes = parse_classes(s)?;
                }
                "commands" => {
                    include_or_exclude(s, &mut c.include.commands, &mut c.exclude.commands)
                }
                "subtypes" => {
                    include_or_exclude(s, &mut c.include.subtypes, &mut c.exclude.subtypes)
                }
                "labels" => include_or_exclude(s, &mut c.include.labels, &mut c.exclude.labels),
                "nth_commands" => {
                    for n in split_list(s) {
                        c.commands.push(parse_index(n, "--nth-commands")?);
                    }
                }
                "instances" => {
                    for n in split_list(s) {
                        c.instances.push(if n == "last" {
                            Instance::Last
                        } else {
                            Instance::Nth(parse_index(n, "--instances")?)
                        });
                    }
                }
                "members" => c.members.extend(split_list(s).map(String::from)),
                "show_hidden" => c.include_hidden = true,
                "errors" => c.error = true,
                _ => criteria.push(std::mem::take(&mut c)),
            }
        }
        criteria.push(c);
        Ok(criteria)
    }
}

fn parse_index(s: &str, option: &str) -> Result<usize> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("{option}: {s:?} is not a positive integer")),
    }
}

/// Opens the SPV file `input`.
pub fn open(input: &Path) -> Result<SpvFile<BufReader<File>>> {
    SpvFile::open(input).with_context(|| format!("{}", input.display()))
}

/// Opens the SPV file `input` and returns it along with the items in it that
/// `criteria` select.
pub fn open_and_select(
    input: &Path,
    criteria: &[Criteria],
) -> Result<(SpvFile<BufReader<File>>, Item)> {
    let spv = open(input)?;
    let selected = select(spv.root(), criteria);
    Ok((spv, selected))
}
