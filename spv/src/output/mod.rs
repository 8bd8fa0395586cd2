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


//! Output items.
//!
//! An SPV file holds a tree of output items.  Headings group other items, and
//! the leaves of the tree are tables, text, charts, and the like.

use std::{
    borrow::Cow,
    cell::OnceCell,
    fmt::{Display, Formatter, Result as FmtResult},
    rc::Rc,
    str::FromStr,
    sync::Arc,
};

use enum_iterator::Sequence;
use enum_map::{Enum, EnumMap};
use serde::Deserialize;

use self::pivot::{PivotTable, Value};

pub mod csv;
pub mod driver;
pub mod json;
pub mod page;
pub mod pivot;
pub mod spv;

/// A single output item.
#[derive(Debug)]
pub struct Item {
    /// The localized label for the item that appears in the outline pane in the
    /// output viewer.  This is `None` if no label has been explicitly set.
    pub label: Option<String>,

    /// A locale-invariant identifier for the command that produced the output,
    /// which may be `None` if unknown or if a command did not produce this
    /// output.
    pub command_name: Option<String>,

    /// The table's subtype, as recorded in the output structure.
    pub subtype: Option<String>,

    /// For a heading, this is true if its subtree should be expanded in an
    /// outline view, false otherwise.
    ///
    /// For other kinds of output items, this is true to show the item's
    /// content, false to hide it.  The item's label is always shown in an
    /// outline view.
    pub show: bool,

    /// Item details.
    pub details: Details,

    /// Where the item came from, for items read from an SPV file.
    pub spv_info: Option<Box<SpvInfo>>,
}

impl Item {
    pub fn new(details: impl Into<Details>) -> Self {
        Self {
            label: None,
            command_name: None,
            subtype: None,
            show: true,
            details: details.into(),
            spv_info: None,
        }
    }

    /// Creates an empty heading.  The reader uses one of these as the root of
    /// an SPV file's item tree.
    pub fn new_root() -> Self {
        Self::new(Details::Heading(Vec::new()))
    }

    pub fn with_label(self, label: Option<String>) -> Self {
        Self { label, ..self }
    }

    pub fn with_command_name(self, command_name: Option<String>) -> Self {
        Self {
            command_name,
            ..self
        }
    }

    pub fn with_show(self, show: bool) -> Self {
        Self { show, ..self }
    }

    pub fn with_spv_info(self, spv_info: SpvInfo) -> Self {
        Self {
            spv_info: Some(Box::new(spv_info)),
            ..self
        }
    }

    pub fn label(&self) -> Cow<'_, str> {
        match &self.label {
            Some(label) => Cow::from(label.as_str()),
            None => self.details.label(),
        }
    }

    /// Returns this item's children, which is empty except for headings.
    pub fn children(&self) -> &[Rc<Item>] {
        match &self.details {
            Details::Heading(children) => children,
            _ => &[],
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.details, Details::Heading(_))
    }

    /// Returns whether the item is visible in the output viewer.  A collapsed
    /// heading is visible, but a hidden one is not.
    pub fn is_visible(&self) -> bool {
        if self.is_heading() {
            !self.spv_info.as_ref().is_some_and(|info| info.hidden)
        } else {
            self.show
        }
    }

    /// Returns this item's table, decoding it on first use.
    pub fn table(&self) -> Option<&Arc<PivotTable>> {
        match &self.details {
            Details::Table(table) => Some(table.get()),
            _ => None,
        }
    }

    /// Returns whether this item represents a failure to read part of an SPV
    /// file.  For a table, this decodes the table if it hasn't been decoded
    /// yet.
    pub fn is_error(&self) -> bool {
        self.spv_info.as_ref().is_some_and(|info| info.error)
            || matches!(&self.details, Details::Table(table) if table.is_error())
    }

    pub fn class(&self) -> ItemClass {
        let label = self.label();
        match &self.details {
            Details::Heading(_) => ItemClass::Headings,
            Details::Text(text) => match label.as_ref() {
                "Title" => ItemClass::OutlineHeaders,
                "Log" => ItemClass::Logs,
                "Page Title" => ItemClass::PageTitle,
                _ => match text.type_ {
                    TextType::Log => ItemClass::Logs,
                    _ => ItemClass::Texts,
                },
            },
            Details::Table(_) => match label.as_ref() {
                "Warnings" => ItemClass::Warnings,
                "Notes" => ItemClass::Notes,
                _ => ItemClass::Tables,
            },
            Details::Graph => ItemClass::Charts,
            Details::Model => ItemClass::Models,
            Details::Tree => ItemClass::Trees,
            Details::Image | Details::PageBreak => ItemClass::Other,
        }
    }

    /// Returns a copy of this heading without its children.
    pub fn clone_empty(&self) -> Self {
        Self {
            label: self.label.clone(),
            command_name: self.command_name.clone(),
            subtype: self.subtype.clone(),
            show: self.show,
            details: Details::Heading(Vec::new()),
            spv_info: self.spv_info.clone(),
        }
    }

    /// Appends `child`, if this is a heading.
    pub fn push(&mut self, child: impl Into<Rc<Item>>) {
        if let Details::Heading(children) = &mut self.details {
            children.push(child.into());
        }
    }

    /// Iterates over this item's descendants in document order, not including
    /// this item itself.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![(self.children().iter(), 0)],
        }
    }
}

/// An iterator over an [Item]'s descendants.  Each element is the descendant
/// along with its depth, which is 0 for the item's children.
pub struct Descendants<'a> {
    stack: Vec<(std::slice::Iter<'a, Rc<Item>>, usize)>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = (usize, &'a Rc<Item>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (iter, depth) = self.stack.last_mut()?;
            let depth = *depth;
            match iter.next() {
                Some(item) => {
                    if item.is_heading() {
                        self.stack.push((item.children().iter(), depth + 1));
                    }
                    return Some((depth, item));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum Details {
    Heading(Vec<Rc<Item>>),
    Text(Box<Text>),
    Table(Box<TableItem>),
    Graph,
    Model,
    Tree,
    Image,
    PageBreak,
}

impl Details {
    pub fn label(&self) -> Cow<'static, str> {
        match self {
            Details::Heading(_) => Cow::from("Heading"),
            Details::Text(text) => Cow::from(text.type_.as_str()),
            Details::Table(_) => Cow::from("Table"),
            Details::Graph => Cow::from("Chart"),
            Details::Model => Cow::from("Model"),
            Details::Tree => Cow::from("Tree"),
            Details::Image => Cow::from("Image"),
            Details::PageBreak => Cow::from("Page Break"),
        }
    }

    /// The name of this kind of item, as `dir` lists it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Details::Heading(_) => "heading",
            Details::Text(_) => "text",
            Details::Table(_) => "table",
            Details::Graph => "graph",
            Details::Model => "model",
            Details::Tree => "tree",
            Details::Image => "image",
            Details::PageBreak => "page break",
        }
    }
}

impl From<PivotTable> for Details {
    fn from(value: PivotTable) -> Self {
        Self::Table(Box::new(TableItem::new(value)))
    }
}

impl From<TableItem> for Details {
    fn from(value: TableItem) -> Self {
        Self::Table(Box::new(value))
    }
}

impl From<Text> for Details {
    fn from(value: Text) -> Self {
        Self::Text(Box::new(value))
    }
}

/// Members of an SPV file that an item was read from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpvInfo {
    /// The output structure member (`outputViewer*.xml`).
    pub structure_member: Option<String>,

    /// For a legacy table, the visualization member.
    pub xml_member: Option<String>,

    /// For a light table, the table; for a legacy table, its data.
    pub bin_member: Option<String>,

    /// For an image, the PNG member.
    pub png_member: Option<String>,

    /// Whether the item stands in for something that could not be read.
    pub error: bool,

    /// For a heading, whether the structure marks it hidden.  A hidden
    /// heading hides everything beneath it.
    pub hidden: bool,
}

impl SpvInfo {
    pub fn new(structure_member: &str) -> Self {
        Self {
            structure_member: Some(structure_member.into()),
            ..Self::default()
        }
    }

    /// The names of all the members, in a fixed order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        [
            &self.structure_member,
            &self.xml_member,
            &self.bin_member,
            &self.png_member,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
    }
}

type TableLoader = Box<dyn Fn() -> Result<PivotTable, String>>;

struct LoadedTable {
    table: Arc<PivotTable>,
    error: bool,
}

/// A table item, whose table may be decoded on first use.
pub struct TableItem {
    loaded: OnceCell<LoadedTable>,
    loader: Option<TableLoader>,
}

impl std::fmt::Debug for TableItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TableItem")
            .field("loaded", &self.loaded.get().is_some())
            .finish()
    }
}

impl TableItem {
    pub fn new(table: PivotTable) -> Self {
        Self {
            loaded: OnceCell::from(LoadedTable {
                table: Arc::new(table),
                error: false,
            }),
            loader: None,
        }
    }

    /// Creates a table item whose table `loader` produces when it is first
    /// needed.  If `loader` fails, the table becomes a one-cell table titled
    /// "Error" that contains the error message.
    pub fn lazy(loader: impl Fn() -> Result<PivotTable, String> + 'static) -> Self {
        Self {
            loaded: OnceCell::new(),
            loader: Some(Box::new(loader)),
        }
    }

    fn loaded(&self) -> &LoadedTable {
        self.loaded.get_or_init(|| {
            let result = match &self.loader {
                Some(loader) => loader(),
                None => Err(String::from("table is not available")),
            };
            match result {
                Ok(table) => LoadedTable {
                    table: Arc::new(table),
                    error: false,
                },
                Err(error) => LoadedTable {
                    table: Arc::new(PivotTable::for_text(
                        Value::new_text("Error"),
                        Value::new_user_text(error),
                    )),
                    error: true,
                },
            }
        })
    }

    /// Returns the table, decoding it if necessary.  Every call returns the
    /// same table.
    pub fn get(&self) -> &Arc<PivotTable> {
        &self.loaded().table
    }

    /// Returns whether decoding the table failed, decoding it if necessary.
    pub fn is_error(&self) -> bool {
        self.loaded().error
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }
}

#[derive(Clone, Debug)]
pub struct Text {
    pub type_: TextType,

    /// The text, as Pango-style markup if the value's font style says so.
    pub content: Value,
}

impl Text {
    pub fn new(type_: TextType, content: impl Into<Value>) -> Self {
        Self {
            type_,
            content: content.into(),
        }
    }

    pub fn new_log(value: impl Into<Value>) -> Self {
        Self::new(TextType::Log, value)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextType {
    /// `TITLE` and `SUBTITLE` commands.
    PageTitle,

    /// Title,
    Title,

    /// Other text.
    Text,

    /// Syntax printback and other logging.
    #[default]
    Log,
}

impl TextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextType::PageTitle => "Page Title",
            TextType::Title => "Title",
            TextType::Text => "Text",
            TextType::Log => "Log",
        }
    }
}

/// A category of output item, which [Item::class] derives from the item's
/// type and label, for use in selecting items.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum, Sequence)]
pub enum ItemClass {
    Charts,
    Headings,
    Logs,
    Models,
    Tables,
    Texts,
    Trees,
    Warnings,
    OutlineHeaders,
    PageTitle,
    Notes,
    Unknown,
    Other,
}

impl ItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Charts => "charts",
            ItemClass::Headings => "headings",
            ItemClass::Logs => "logs",
            ItemClass::Models => "models",
            ItemClass::Tables => "tables",
            ItemClass::Texts => "texts",
            ItemClass::Trees => "trees",
            ItemClass::Warnings => "warnings",
            ItemClass::OutlineHeaders => "outlineheaders",
            ItemClass::PageTitle => "pagetitle",
            ItemClass::Notes => "notes",
            ItemClass::Unknown => "unknown",
            ItemClass::Other => "other",
        }
    }

    /// A set that contains every class.
    pub fn all() -> EnumMap<ItemClass, bool> {
        EnumMap::from_fn(|_| true)
    }
}

impl Display for ItemClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        enum_iterator::all::<ItemClass>()
            .find(|class| class.as_str() == s)
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        rc::Rc,
        sync::Arc,
    };

    use super::{
        pivot::{PivotTable, Value},
        Details, Item, ItemClass, TableItem, Text, TextType,
    };

    fn labeled(details: impl Into<Details>, label: &str) -> Item {
        Item::new(details).with_label(Some(label.into()))
    }

    #[test]
    fn classes() {
        let log = labeled(Text::new_log(Value::new_user_text("x")), "Log");
        assert_eq!(log.class(), ItemClass::Logs);
        let title = labeled(Text::new(TextType::Title, Value::new_user_text("x")), "Title");
        assert_eq!(title.class(), ItemClass::OutlineHeaders);
        let other = labeled(Text::new(TextType::Text, Value::new_user_text("x")), "Note");
        assert_eq!(other.class(), ItemClass::Texts);
        let error = labeled(Text::new_log(Value::new_user_text("x")), "Error");
        assert_eq!(error.class(), ItemClass::Logs);
        assert_eq!(
            labeled(PivotTable::default(), "Warnings").class(),
            ItemClass::Warnings
        );
        assert_eq!(labeled(PivotTable::default(), "Stats").class(), ItemClass::Tables);
        assert_eq!(Item::new_root().class(), ItemClass::Headings);
        assert_eq!(Item::new(Details::Image).class(), ItemClass::Other);
        assert_eq!(Item::new(Details::Graph).class(), ItemClass::Charts);

        assert_eq!("outlineheaders".parse(), Ok(ItemClass::OutlineHeaders));
        assert_eq!("bogus".parse::<ItemClass>(), Err(()));
    }

    #[test]
    fn lazy_table() {
        let calls = Rc::new(Cell::new(0));
        let item = Item::new(TableItem::lazy({
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                Ok(PivotTable::new("Lazy", "Sample"))
            }
        }));
        let Details::Table(table) = &item.details else {
            panic!()
        };
        assert!(!table.is_loaded());
        let first = item.table().unwrap();
        let second = item.table().unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(calls.get(), 1);
        assert_eq!(first.label(), "Lazy");
        assert!(!item.is_error());
    }

    #[test]
    fn failed_table() {
        let item = Item::new(TableItem::lazy(|| Err(String::from("bad magic"))));
        assert!(item.is_error());
        let table = item.table().unwrap();
        assert_eq!(table.label(), "Error");
        assert_eq!(table.get(&[0]).unwrap().display(()).to_string(), "bad magic");
    }

    #[test]
    fn descendants() {
        let mut heading = labeled(Details::Heading(Vec::new()), "h");
        heading.push(labeled(Details::Graph, "g"));
        let mut root = Item::new_root();
        root.push(heading);
        root.push(labeled(Details::Tree, "t"));
        let outline: Vec<_> = root
            .descendants()
            .map(|(depth, item)| (depth, item.label().into_owned()))
            .collect();
        assert_eq!(
            outline,
            vec![(0, "h".into()), (1, "g".into()), (0, "t".into())]
        );
        assert_eq!(Rc::strong_count(&root.children()[0]), 1);
    }
}
