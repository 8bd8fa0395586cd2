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


//! Selecting output items by class, command, label, and other criteria.

use std::rc::Rc;

use displaydoc::Display;
use enum_map::EnumMap;
use thiserror::Error as ThisError;

use crate::output::{Item, ItemClass};

/// Strings to match against an item's command name, subtype, and label.
///
/// Matching is case-insensitive, and a trailing `*` in a pattern matches any
/// suffix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patterns {
    pub commands: Vec<String>,
    pub subtypes: Vec<String>,
    pub labels: Vec<String>,
}

/// An item's ordinal within the command that produced it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instance {
    /// The item with the given 1-based index.
    Nth(usize),

    /// The last item.
    Last,
}

/// One set of selection criteria.  An item must satisfy all of them to be
/// selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Criteria {
    /// Classes to select.
    pub classes: EnumMap<ItemClass, bool>,

    /// Patterns that an item must match.  An empty list matches everything.
    pub include: Patterns,

    /// Patterns that an item must not match.
    pub exclude: Patterns,

    /// 1-based indexes of the commands to select.  Empty selects all commands.
    pub commands: Vec<usize>,

    /// Member name patterns, any one of which an item's members must match.
    /// Empty selects all items.
    pub members: Vec<String>,

    /// Instances within each command to select.  Empty selects all instances.
    pub instances: Vec<Instance>,

    /// Whether to select hidden items.
    pub include_hidden: bool,

    /// Whether to select only items that could not be read.
    pub error: bool,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            classes: ItemClass::all(),
            include: Patterns::default(),
            exclude: Patterns::default(),
            commands: Vec::new(),
            members: Vec::new(),
            instances: Vec::new(),
            include_hidden: false,
            error: false,
        }
    }
}

#[derive(Clone, Debug, Display, ThisError, PartialEq, Eq)]
/// unknown object class "{0}" (use --select=help for help)
pub struct UnknownClass(pub String);

/// Parses a comma-separated list of class names, such as `tables,texts`.  A
/// leading `^` selects all the classes except those listed.  `all` stands
/// for every class.
pub fn parse_classes(s: &str) -> Result<EnumMap<ItemClass, bool>, UnknownClass> {
    let (invert, s) = match s.strip_prefix('^') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let mut classes = EnumMap::default();
    for token in s.split(',').filter(|token| !token.is_empty()) {
        if token == "all" {
            classes = ItemClass::all();
        } else {
            let class: ItemClass = token.parse().map_err(|_| UnknownClass(token.into()))?;
            classes[class] = true;
        }
    }
    if invert {
        for value in classes.values_mut() {
            *value = !*value;
        }
    }
    Ok(classes)
}

fn string_matches(pattern: &str, s: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let s = s.to_lowercase();
    match pattern.strip_suffix('*') {
        Some(prefix) => s.starts_with(prefix),
        None => pattern == s,
    }
}

/// Returns `None` if `patterns` is empty, otherwise whether `name` matches any
/// of them.  A missing `name` matches nothing.
fn any_matches(name: Option<&str>, patterns: &[String]) -> Option<bool> {
    if patterns.is_empty() {
        return None;
    }
    let Some(name) = name else {
        return Some(false);
    };
    Some(patterns.iter().any(|pattern| string_matches(pattern, name)))
}

fn include_exclude(name: Option<&str>, include: &[String], exclude: &[String]) -> bool {
    any_matches(name, include).unwrap_or(true) && !any_matches(name, exclude).unwrap_or(false)
}

/// Returns `None` if `instance` matches only as the last instance.
fn match_instance(instances: &[Instance], instance: usize) -> Option<bool> {
    if instances.contains(&Instance::Nth(instance)) {
        Some(true)
    } else if instances.contains(&Instance::Last) {
        None
    } else {
        Some(false)
    }
}

impl Criteria {
    /// Marks the items in `items` that satisfy these criteria in `include`.
    /// `items` is a pre-order traversal of the tree, with depths.
    fn select_matches(&self, items: &[(usize, &Rc<Item>)], include: &mut [bool]) {
        // Counting instances within a command.
        let mut instance_within_command = 0;
        let mut last_instance = None;

        // Counting commands.
        let mut command_item = None;
        let mut counted_command_item = None;
        let mut nth_command = 0;

        // Depth of the hidden heading whose subtree is being skipped.
        let mut hidden_depth = None;

        for (index, (depth, item)) in items.iter().enumerate() {
            if *depth == 0 {
                command_item = Some(index);
                if let Some(last) = last_instance.take() {
                    include[last] = true;
                }
                instance_within_command = 0;
            }

            match hidden_depth {
                Some(hidden) if *depth > hidden => continue,
                _ => hidden_depth = None,
            }
            if !self.include_hidden && !item.is_visible() {
                if item.is_heading() {
                    hidden_depth = Some(*depth);
                }
                continue;
            }
            if !self.classes[item.class()] {
                continue;
            }
            if self.error && !item.is_error() {
                continue;
            }
            if !include_exclude(
                item.command_name.as_deref(),
                &self.include.commands,
                &self.exclude.commands,
            ) {
                continue;
            }
            if !self.commands.is_empty() {
                if command_item != counted_command_item {
                    counted_command_item = command_item;
                    nth_command += 1;
                }
                if !self.commands.contains(&nth_command) {
                    continue;
                }
            }
            if !include_exclude(
                item.subtype.as_deref(),
                &self.include.subtypes,
                &self.exclude.subtypes,
            ) {
                continue;
            }
            if !include_exclude(
                Some(&item.label()),
                &self.include.labels,
                &self.exclude.labels,
            ) {
                continue;
            }
            if !self.members.is_empty() {
                let found = item.spv_info.as_ref().is_some_and(|info| {
                    info.members()
                        .any(|member| any_matches(Some(member), &self.members) == Some(true))
                });
                if !found {
                    continue;
                }
            }
            if !self.instances.is_empty() {
                if *depth == 0 {
                    continue;
                }
                instance_within_command += 1;
                match match_instance(&self.instances, instance_within_command) {
                    Some(false) => continue,
                    Some(true) => (),
                    None => {
                        last_instance = Some(index);
                        continue;
                    }
                }
            }

            include[index] = true;
        }

        if let Some(last) = last_instance {
            include[last] = true;
        }
    }
}

fn unflatten(item: &Rc<Item>, index: &mut usize, include: &[bool], out: &mut Item) {
    let include_item = include[*index];
    *index += 1;
    if item.is_heading() {
        if include_item {
            let mut heading = item.clone_empty();
            for child in item.children() {
                unflatten(child, index, include, &mut heading);
            }
            out.push(heading);
        } else {
            for child in item.children() {
                unflatten(child, index, include, out);
            }
        }
    } else if include_item {
        out.push(item.clone());
    }
}

/// Returns a new root item whose descendants are the descendants of `root`
/// that satisfy any of the sets of `criteria`, in their original order.  A
/// heading that is not selected is replaced by its selected descendants.
///
/// With no criteria, selects according to [Criteria::default], which selects
/// all the items that are not hidden.
pub fn select(root: &Item, criteria: &[Criteria]) -> Item {
    let default = [Criteria::default()];
    let criteria = if criteria.is_empty() {
        &default[..]
    } else {
        criteria
    };

    let items: Vec<_> = root.descendants().collect();
    let mut include = vec![false; items.len()];
    for criteria in criteria {
        criteria.select_matches(&items, &mut include);
    }

    let mut out = root.clone_empty();
    let mut index = 0;
    for child in root.children() {
        unflatten(child, &mut index, &include, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use enum_map::EnumMap;

    use crate::output::{
        pivot::{PivotTable, Value},
        Details, Item, ItemClass, SpvInfo, Text, TextType,
    };

    use super::{parse_classes, select, Criteria, Instance, UnknownClass};

    fn heading(label: &str, command: &str, children: Vec<Item>) -> Item {
        let mut item = Item::new_root()
            .with_label(Some(label.into()))
            .with_command_name(Some(command.into()));
        for child in children {
            item.push(child);
        }
        item
    }

    fn table(label: &str, command: &str, subtype: &str, member: &str) -> Item {
        let mut item = Item::new(PivotTable::new(label, subtype))
            .with_label(Some(label.into()))
            .with_command_name(Some(command.into()))
            .with_spv_info(SpvInfo {
                bin_member: Some(member.into()),
                ..SpvInfo::new("outputViewer0000000001.xml")
            });
        item.subtype = Some(subtype.into());
        item
    }

    fn title(command: &str) -> Item {
        Item::new(Text::new(TextType::Title, Value::new_user_text(command)))
            .with_label(Some("Title".into()))
            .with_command_name(Some(command.into()))
    }

    /// Two commands, each with a title and tables; the second command's
    /// second table is hidden.
    fn sample() -> Item {
        let mut root = Item::new_root();
        root.push(heading(
            "Frequencies",
            "Frequencies",
            vec![
                title("Frequencies"),
                table("Statistics", "Frequencies", "Statistics", "t1.bin"),
                table("age", "Frequencies", "Frequencies", "t2.bin"),
            ],
        ));
        root.push(heading(
            "Descriptives",
            "Descriptives",
            vec![
                title("Descriptives"),
                table("Descriptive Statistics", "Descriptives", "Descriptives", "t3.bin"),
                table("Notes", "Descriptives", "Notes", "t4.bin").with_show(false),
            ],
        ));
        root
    }

    fn outline(item: &Item) -> Vec<String> {
        item.descendants()
            .map(|(depth, item)| format!("{}{}", "    ".repeat(depth), item.label()))
            .collect()
    }

    fn labels(item: &Item) -> Vec<String> {
        item.descendants()
            .filter(|(_, item)| !item.is_heading())
            .map(|(_, item)| item.label().into_owned())
            .collect()
    }

    #[test]
    fn default_hides_hidden() {
        let root = sample();
        assert_eq!(
            outline(&select(&root, &[])),
            vec![
                "Frequencies",
                "    Title",
                "    Statistics",
                "    age",
                "Descriptives",
                "    Title",
                "    Descriptive Statistics",
            ]
        );

        let all = Criteria {
            include_hidden: true,
            ..Criteria::default()
        };
        assert_eq!(outline(&select(&root, &[all])).len(), 8);
    }

    #[test]
    fn classes() {
        let root = sample();
        let tables = Criteria {
            classes: parse_classes("tables").unwrap(),
            ..Criteria::default()
        };
        assert_eq!(
            outline(&select(&root, &[tables])),
            vec!["Statistics", "age", "Descriptive Statistics"]
        );

        let not_tables = Criteria {
            classes: parse_classes("^tables,notes").unwrap(),
            ..Criteria::default()
        };
        assert_eq!(
            outline(&select(&root, &[not_tables])),
            vec!["Frequencies", "    Title", "Descriptives", "    Title"]
        );

        assert_eq!(parse_classes("all").unwrap(), ItemClass::all());
        assert_eq!(parse_classes("^all").unwrap(), EnumMap::default());
        assert_eq!(
            parse_classes("tables,bogus"),
            Err(UnknownClass("bogus".into()))
        );
        assert_eq!(
            UnknownClass("bogus".into()).to_string(),
            "unknown object class \"bogus\" (use --select=help for help)"
        );
    }

    #[test]
    fn patterns() {
        let root = sample();
        let mut criteria = Criteria::default();
        criteria.include.commands = vec!["desc*".into()];
        criteria.exclude.labels = vec!["TITLE".into()];
        assert_eq!(
            outline(&select(&root, &[criteria])),
            vec!["Descriptives", "    Descriptive Statistics"]
        );

        let mut criteria = Criteria::default();
        criteria.include.subtypes = vec!["statistics".into()];
        assert_eq!(labels(&select(&root, &[criteria])), vec!["Statistics"]);
    }

    #[test]
    fn missing_names() {
        let mut root = Item::new_root();
        root.push(
            Item::new(Text::new(TextType::Text, Value::new_user_text("x")))
                .with_label(Some("Notes text".into())),
        );

        let mut criteria = Criteria::default();
        criteria.include.subtypes = vec!["Statistics".into()];
        assert!(labels(&select(&root, &[criteria])).is_empty());

        let mut criteria = Criteria::default();
        criteria.include.commands = vec!["*".into()];
        assert!(labels(&select(&root, &[criteria])).is_empty());

        let mut criteria = Criteria::default();
        criteria.exclude.subtypes = vec!["Statistics".into()];
        assert_eq!(labels(&select(&root, &[criteria])), vec!["Notes text"]);
    }

    #[test]
    fn hidden_heading() {
        let mut root = sample();
        root.push(
            heading(
                "Crosstabs",
                "Crosstabs",
                vec![table("Case Summary", "Crosstabs", "Case Processing Summary", "t5.bin")],
            )
            .with_spv_info(SpvInfo {
                hidden: true,
                ..SpvInfo::new("outputViewer0000000003.xml")
            }),
        );
        root.push(heading(
            "Explore",
            "Explore",
            vec![table("Extremes", "Explore", "Extreme Values", "t6.bin")],
        ));

        assert_eq!(
            labels(&select(&root, &[])),
            vec!["Title", "Statistics", "age", "Title", "Descriptive Statistics", "Extremes"]
        );

        let tables = Criteria {
            classes: parse_classes("tables").unwrap(),
            ..Criteria::default()
        };
        assert!(!labels(&select(&root, &[tables])).contains(&String::from("Case Summary")));

        let all = Criteria {
            include_hidden: true,
            ..Criteria::default()
        };
        assert!(labels(&select(&root, &[all])).contains(&String::from("Case Summary")));
    }

    #[test]
    fn nth_commands_and_instances() {
        let root = sample();
        let second = Criteria {
            commands: vec![2],
            ..Criteria::default()
        };
        assert_eq!(
            labels(&select(&root, &[second])),
            vec!["Title", "Descriptive Statistics"]
        );

        let first_instance = Criteria {
            instances: vec![Instance::Nth(1)],
            ..Criteria::default()
        };
        assert_eq!(labels(&select(&root, &[first_instance])), vec!["Title", "Title"]);

        let last = Criteria {
            instances: vec![Instance::Last],
            ..Criteria::default()
        };
        assert_eq!(
            labels(&select(&root, &[last])),
            vec!["age", "Descriptive Statistics"]
        );
    }

    #[test]
    fn members_and_errors() {
        let mut root = sample();
        root.push(
            Item::new(Details::Graph)
                .with_label(Some("Error".into()))
                .with_spv_info(SpvInfo {
                    error: true,
                    ..SpvInfo::new("outputViewer0000000002.xml")
                }),
        );

        let members = Criteria {
            members: vec!["T3.BIN".into(), "t1*".into()],
            ..Criteria::default()
        };
        assert_eq!(
            labels(&select(&root, &[members])),
            vec!["Statistics", "Descriptive Statistics"]
        );

        let errors = Criteria {
            error: true,
            ..Criteria::default()
        };
        assert_eq!(labels(&select(&root, &[errors])), vec!["Error"]);
    }

    #[test]
    fn or_is_union() {
        let root = sample();
        let a = Criteria {
            classes: parse_classes("texts,outlineheaders").unwrap(),
            ..Criteria::default()
        };
        let mut b = Criteria::default();
        b.include.labels = vec!["age".into()];

        let mut union: Vec<_> = labels(&select(&root, &[a.clone()]));
        union.extend(labels(&select(&root, &[b.clone()])));
        union.sort();
        let mut both = labels(&select(&root, &[a, b]));
        both.sort();
        assert_eq!(union, both);
        assert_eq!(both, vec!["Title", "Title", "age"]);
    }

    #[test]
    fn selected_items_are_shared() {
        let root = sample();
        let selected = select(&root, &[]);
        let original = &root.children()[0].children()[1];
        let copy = &selected.children()[0].children()[1];
        assert!(Rc::ptr_eq(original, copy));
    }
}
