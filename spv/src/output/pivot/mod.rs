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

//! Pivot tables.
//!
//! Pivot tables are the primary form of output in SPV files.  They are
//! analogous to the pivot tables you might be familiar with from spreadsheets
//! and databases.  See <https://en.wikipedia.org/wiki/Pivot_table> for a brief
//! introduction to the overall concept of a pivot table.
//!
//! The most important internal pieces of a pivot table are:
//!
//! - Title.  Every pivot table has a title that is displayed above it.  It also
//!   has an optional caption (displayed below it) and corner text (displayed in
//!   the upper left corner).
//!
//! - Dimensions.  A dimension consists of zero or more categories.  A category
//!   has a label, such as "df" or "Asymp. Sig." or 123 or a variable name.  The
//!   categories are the leaves of a tree whose non-leaf nodes form groups of
//!   categories.  The tree always has a root group whose label is the name of
//!   the dimension.
//!
//! - Axes.  A table has three axes: column, row, and layer.  Each dimension is
//!   assigned to an axis, and each axis has zero or more dimensions.  When an
//!   axis has more than one dimension, they are ordered from innermost to
//!   outermost.
//!
//! - Data.  A table's data consists of zero or more cells.  Each cell maps from
//!   a category for each dimension to a value, which is commonly a number but
//!   could also be a variable name or an arbitrary text string.
//!
//! Each leaf category has two indexes within its dimension.  Its "data index"
//! identifies it within cell coordinates, and its "presentation index" is its
//! position in the category tree's in-order traversal.  The two differ when
//! the categories were reordered after the data was produced.

use std::{
    collections::HashMap,
    fmt::Display,
    iter::{once, repeat_n, FusedIterator},
    ops::Range,
    sync::Arc,
};

use chrono::NaiveDateTime;
use enum_iterator::Sequence;
use enum_map::{Enum, EnumMap};
use smallvec::{smallvec, SmallVec};
use thiserror::Error as ThisError;

use crate::{
    format::{Format, Settings as FormatSettings},
    settings::{Settings, Show},
};

mod look;
pub(crate) mod look_xml;
mod value;

pub use look::*;
pub use value::*;


/// Sizing for rows or columns of a rendered table.
///
/// The comments below talk about columns and their widths but they apply
/// equally to rows and their heights.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Sizing {
    /// Specific column widths, in 1/96" units.
    pub widths: Vec<i32>,

    /// Specific page breaks: 0-based columns after which a page break must
    /// occur, e.g. a value of 1 requests a break after the second column.
    pub breaks: Vec<usize>,

    /// Keeps: columns to keep together on a page if possible.
    pub keeps: Vec<Range<usize>>,
}

impl Sizing {
    pub fn is_empty(&self) -> bool {
        self.widths.is_empty() && self.breaks.is_empty() && self.keeps.is_empty()
    }
}

#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq, Sequence)]
pub enum Axis3 {
    /// Columns.
    X,

    /// Rows.
    Y,

    /// Layers.
    Z,
}

impl Axis3 {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis3::X => "column",
            Axis3::Y => "row",
            Axis3::Z => "layer",
        }
    }
}

impl Display for Axis3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Axis2> for Axis3 {
    fn from(axis2: Axis2) -> Self {
        match axis2 {
            Axis2::X => Self::X,
            Axis2::Y => Self::Y,
        }
    }
}

/// An axis within a pivot table.
#[derive(Clone, Debug, PartialEq)]
pub struct Axis {
    /// `dimensions[0]` is the innermost dimension.  Each element is an index
    /// into [PivotTable::dimensions].
    pub dimensions: Vec<usize>,

    /// Sum of the label depths of the axis's dimensions.  Computed by
    /// [PivotTable::assign_label_depth].
    pub label_depth: usize,

    /// Product of the number of leaves in the axis's dimensions.  Like
    /// `label_depth`, this is only up to date after
    /// [PivotTable::assign_label_depth]; adding dimensions or categories
    /// leaves it stale.
    pub extent: usize,
}

impl Default for Axis {
    fn default() -> Self {
        Self {
            dimensions: Vec::new(),
            label_depth: 0,
            extent: 1,
        }
    }
}

pub struct AxisIterator {
    indexes: SmallVec<[usize; 4]>,
    lengths: SmallVec<[usize; 4]>,
    done: bool,
}

impl FusedIterator for AxisIterator {}
impl Iterator for AxisIterator {
    type Item = SmallVec<[usize; 4]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            None
        } else {
            let retval = self.indexes.clone();
            for (index, len) in self.indexes.iter_mut().zip(self.lengths.iter().copied()) {
                *index += 1;
                if *index < len {
                    return Some(retval);
                };
                *index = 0;
            }
            self.done = true;
            Some(retval)
        }
    }
}

/// Coordinates of a cell: one data index per dimension, in the order of
/// [PivotTable::dimensions].
pub type CellIndex = SmallVec<[usize; 4]>;

/// Identifies a group within a dimension as a sequence of child indexes
/// starting from the root.  The empty path is the root.
pub type CategoryPath = SmallVec<[usize; 4]>;

/// Pivot result classes.
///
/// These are used to mark [Leaf] categories as having particular types of data,
/// to set their numeric formats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Class {
    Other,
    Integer,
    Correlations,
    Significance,
    Percent,
    Residual,
    Count,
}

/// Dimensions.
///
/// A [Dimension] identifies the categories associated with a single dimension
/// within a multidimensional pivot table.
///
/// A dimension contains a collection of categories, which are the leaves in a
/// tree of groups.
///
/// (A dimension or a group can contain zero categories, but this is unusual.
/// If a dimension contains no categories, then its table cannot contain any
/// data.)
#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    /// Hierarchy of categories within the dimension.  The groups and categories
    /// are sorted in the order that should be used for display.  This might be
    /// different from the original order produced for output if the user
    /// adjusted it.
    ///
    /// The root must always be a group, although it is allowed to have no
    /// subcategories.
    pub root: Group,

    /// Ordering of leaves for presentation.
    ///
    /// This is a permutation of `0..n` where `n` is the number of leaves.  It
    /// maps from an index in presentation order to an index in data order.
    pub presentation_order: Vec<usize>,

    /// The inverse of `presentation_order`: maps from a data index to a
    /// presentation index.
    pub presentation_indexes: Vec<usize>,

    /// Display.
    pub hide_all_labels: bool,

    /// The axis that contains this dimension.
    pub axis_type: Axis3,

    /// Position within `axis_type`, with 0 as the innermost.
    pub level: usize,

    /// Index within [PivotTable::dimensions].
    pub top_index: usize,

    /// Number of rows or columns needed to show the dimension's labels.
    /// Computed by [PivotTable::assign_label_depth].
    pub label_depth: usize,
}

/// A leaf category along with the groups that contain it, outermost first.
pub struct Path<'a> {
    pub groups: GroupVec<'a>,
    pub leaf: &'a Leaf,
}

pub type GroupVec<'a> = SmallVec<[&'a Group; 4]>;

#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum DimensionError {
    #[error("leaf_index {data_index} >= n_leaves {n_leaves}")]
    DataIndexOutOfRange { data_index: usize, n_leaves: usize },

    #[error("two leaves with data_index {0}")]
    DuplicateDataIndex(usize),
}

impl Dimension {
    /// Creates a dimension from `root`, numbering its leaves in order so that
    /// each leaf's data index equals its presentation index.
    pub fn new(mut root: Group) -> Self {
        let mut n = 0;
        root.for_each_leaf_mut(&mut |leaf| {
            leaf.data_index = n;
            leaf.presentation_index = n;
            n += 1;
        });
        Self::with_orders(root, (0..n).collect(), (0..n).collect())
    }

    /// Creates a dimension from `root`, whose leaves already carry their data
    /// indexes.  Presentation indexes are assigned in order.
    pub fn from_root(mut root: Group) -> Result<Self, DimensionError> {
        let n_leaves = root.len();
        let mut presentation_order = Vec::with_capacity(n_leaves);
        root.for_each_leaf_mut(&mut |leaf| {
            leaf.presentation_index = presentation_order.len();
            presentation_order.push(leaf.data_index);
        });

        let mut presentation_indexes = vec![usize::MAX; n_leaves];
        for (presentation_index, &data_index) in presentation_order.iter().enumerate() {
            match presentation_indexes.get_mut(data_index) {
                None => {
                    return Err(DimensionError::DataIndexOutOfRange {
                        data_index,
                        n_leaves,
                    });
                }
                Some(slot) if *slot != usize::MAX => {
                    return Err(DimensionError::DuplicateDataIndex(data_index));
                }
                Some(slot) => *slot = presentation_index,
            }
        }
        Ok(Self::with_orders(root, presentation_order, presentation_indexes))
    }

    fn with_orders(
        root: Group,
        presentation_order: Vec<usize>,
        presentation_indexes: Vec<usize>,
    ) -> Self {
        Self {
            root,
            presentation_order,
            presentation_indexes,
            hide_all_labels: false,
            axis_type: Axis3::X,
            level: 0,
            top_index: 0,
            label_depth: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of (leaf) categories in this dimension.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns the leaf with the given presentation index.
    pub fn nth_leaf(&self, index: usize) -> Option<&Leaf> {
        self.root.nth_leaf(index)
    }

    pub fn presentation_leaf(&self, presentation_index: usize) -> Option<&Leaf> {
        self.nth_leaf(presentation_index)
    }

    pub fn data_leaf(&self, data_index: usize) -> Option<&Leaf> {
        self.presentation_indexes
            .get(data_index)
            .and_then(|index| self.nth_leaf(*index))
    }

    pub fn leaf_path(&self, presentation_index: usize) -> Option<Path<'_>> {
        self.root.leaf_path(presentation_index, SmallVec::new())
    }

    pub fn with_all_labels_hidden(self) -> Self {
        Self {
            hide_all_labels: true,
            ..self
        }
    }

    fn group_mut(&mut self, path: &[usize]) -> &mut Group {
        let mut group = &mut self.root;
        for (depth, &child) in path.iter().enumerate() {
            assert!(
                group.children[child + 1..].iter().all(|c| c.is_empty()),
                "categories must be added in order"
            );
            group.len_dirty = true;
            group = match &mut group.children[child] {
                Category::Group(group) => group,
                Category::Leaf(_) => panic!("{:?} is not a group", &path[..=depth]),
            };
        }
        group
    }

    /// Adds a new group named `name` as the last child of the group at
    /// `parent`, and returns the new group's path.
    ///
    /// Categories must be added in order: `parent` may not be followed by any
    /// sibling, at any level, that already contains leaves.
    pub fn add_group(&mut self, parent: &[usize], name: impl Into<Value>) -> CategoryPath {
        let group = self.group_mut(parent);
        group.push(Group::new(name));
        let index = group.children.len() - 1;
        self.root.update_len();
        parent.iter().copied().chain(once(index)).collect()
    }

    /// Adds a new leaf named `name` as the last child of the group at `parent`
    /// and returns its data index, which is also its presentation index.
    pub fn add_leaf(&mut self, parent: &[usize], name: impl Into<Value>) -> usize {
        self.add_leaf_with_class(parent, name.into(), None)
    }

    /// Like [Dimension::add_leaf], also tagging the leaf with `class` so that
    /// numbers put into its cells without a format take one from it.
    pub fn add_leaf_rc(&mut self, parent: &[usize], name: impl Into<Value>, class: Class) -> usize {
        self.add_leaf_with_class(parent, name.into(), Some(class))
    }

    fn add_leaf_with_class(&mut self, parent: &[usize], name: Value, class: Option<Class>) -> usize {
        let index = self.len();
        let mut leaf = Leaf::new(name);
        leaf.data_index = index;
        leaf.presentation_index = index;
        leaf.class = class;
        self.group_mut(parent).push(leaf);
        self.root.update_len();
        self.presentation_order.push(index);
        self.presentation_indexes.push(index);
        index
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    len: usize,
    len_dirty: bool,
    pub name: Box<Value>,

    /// The child categories.
    ///
    /// A group usually has multiple children, but it is allowed to have
    /// only one or even (pathologically) none.
    pub children: Vec<Category>,

    /// Whether to show the group's label.
    pub show_label: bool,

    pub label_depth: usize,
    pub extra_depth: usize,

    /// Whether the label is shown in the corner instead of in the row
    /// headings.  Only the root group of a row dimension can do this.
    pub show_label_in_corner: bool,
}

impl Group {
    pub fn new(name: impl Into<Value>) -> Group {
        Self {
            len: 0,
            len_dirty: false,
            name: Box::new(name.into()),
            children: Vec::new(),
            show_label: false,
            label_depth: 0,
            extra_depth: 0,
            show_label_in_corner: false,
        }
    }

    pub fn push(&mut self, child: impl Into<Category>) {
        let mut child = child.into();
        if let Category::Group(group) = &mut child {
            group.show_label = true;
        }
        self.len += child.len();
        self.children.push(child);
    }

    pub fn with(mut self, child: impl Into<Category>) -> Self {
        self.push(child);
        self
    }

    pub fn with_multiple<C>(mut self, children: impl IntoIterator<Item = C>) -> Self
    where
        C: Into<Category>,
    {
        self.extend(children);
        self
    }

    pub fn with_show_label(mut self, show_label: bool) -> Self {
        self.show_label = show_label;
        self
    }

    pub fn nth_leaf(&self, mut index: usize) -> Option<&Leaf> {
        for child in &self.children {
            let len = child.len();
            if index < len {
                return child.nth_leaf(index);
            }
            index -= len;
        }
        None
    }

    pub fn leaf_path<'a>(&'a self, mut index: usize, mut groups: GroupVec<'a>) -> Option<Path<'a>> {
        for child in &self.children {
            let len = child.len();
            if index < len {
                groups.push(self);
                return child.leaf_path(index, groups);
            }
            index -= len;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &Value {
        &self.name
    }

    /// Visits the leaves in order.
    pub fn leaves(&self) -> impl Iterator<Item = &Leaf> {
        (0..self.len).filter_map(|index| self.nth_leaf(index))
    }

    fn for_each_leaf_mut(&mut self, f: &mut impl FnMut(&mut Leaf)) {
        for child in &mut self.children {
            match child {
                Category::Group(group) => group.for_each_leaf_mut(f),
                Category::Leaf(leaf) => f(leaf),
            }
        }
    }

    /// Recomputes `len` along the path of groups marked dirty by
    /// [Dimension::group_mut].
    fn update_len(&mut self) {
        if self.len_dirty {
            self.len_dirty = false;
            for child in &mut self.children {
                if let Category::Group(group) = child {
                    group.update_len();
                }
            }
        }
        self.len = self.children.iter().map(Category::len).sum();
    }

    fn assign_label_depth(&mut self, labels_in_corner: bool) {
        self.extra_depth = 0;

        let mut depth = 0;
        for child in &mut self.children {
            child.assign_label_depth();
            depth = depth.max(child.label_depth());
        }

        for child in &mut self.children {
            let extra_depth = depth - child.label_depth();
            if extra_depth > 0 {
                child.distribute_extra_depth(extra_depth);
            }
            child.set_label_depth(depth);
        }

        self.show_label_in_corner = self.show_label && labels_in_corner;
        self.label_depth = if self.show_label && !self.show_label_in_corner {
            depth + 1
        } else {
            depth
        };
    }
}

impl<C> Extend<C> for Group
where
    C: Into<Category>,
{
    fn extend<T: IntoIterator<Item = C>>(&mut self, children: T) {
        let children = children.into_iter();
        self.children.reserve(children.size_hint().0);
        for child in children {
            self.push(child);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Leaf {
    pub name: Box<Value>,

    /// Index of this leaf in cell coordinates.
    pub data_index: usize,

    /// Index of this leaf in the in-order traversal of its dimension.
    pub presentation_index: usize,

    /// Supplies a format for numbers put into cells in this category.
    pub class: Option<Class>,

    pub label_depth: usize,
    pub extra_depth: usize,
}

impl Leaf {
    pub fn new(name: Value) -> Self {
        Self {
            name: Box::new(name),
            data_index: 0,
            presentation_index: 0,
            class: None,
            label_depth: 0,
            extra_depth: 0,
        }
    }

    pub fn with_data_index(self, data_index: usize) -> Self {
        Self { data_index, ..self }
    }

    pub fn name(&self) -> &Value {
        &self.name
    }
}

/// A leaf (a category) or a group.
#[derive(Clone, Debug, PartialEq)]
pub enum Category {
    Group(Group),
    Leaf(Leaf),
}

impl Category {
    pub fn name(&self) -> &Value {
        match self {
            Category::Group(group) => &group.name,
            Category::Leaf(leaf) => &leaf.name,
        }
    }

    pub fn name_mut(&mut self) -> &mut Value {
        match self {
            Category::Group(group) => &mut group.name,
            Category::Leaf(leaf) => &mut leaf.name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Category::Group(group) => group.len,
            Category::Leaf(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nth_leaf(&self, index: usize) -> Option<&Leaf> {
        match self {
            Category::Group(group) => group.nth_leaf(index),
            Category::Leaf(leaf) => {
                if index == 0 {
                    Some(leaf)
                } else {
                    None
                }
            }
        }
    }

    pub fn leaf_path<'a>(&'a self, index: usize, groups: GroupVec<'a>) -> Option<Path<'a>> {
        match self {
            Category::Group(group) => group.leaf_path(index, groups),
            Category::Leaf(leaf) => {
                if index == 0 {
                    Some(Path { groups, leaf })
                } else {
                    None
                }
            }
        }
    }

    pub fn show_label(&self) -> bool {
        match self {
            Category::Group(group) => group.show_label,
            Category::Leaf(_) => true,
        }
    }

    pub fn label_depth(&self) -> usize {
        match self {
            Category::Group(group) => group.label_depth,
            Category::Leaf(leaf) => leaf.label_depth,
        }
    }

    pub fn extra_depth(&self) -> usize {
        match self {
            Category::Group(group) => group.extra_depth,
            Category::Leaf(leaf) => leaf.extra_depth,
        }
    }

    fn set_label_depth(&mut self, label_depth: usize) {
        match self {
            Category::Group(group) => group.label_depth = label_depth,
            Category::Leaf(leaf) => leaf.label_depth = label_depth,
        }
    }

    fn assign_label_depth(&mut self) {
        match self {
            Category::Group(group) => group.assign_label_depth(false),
            Category::Leaf(leaf) => {
                leaf.extra_depth = 0;
                leaf.label_depth = 1;
            }
        }
    }

    /// Pads this category out to a deeper level by adding `extra_depth` to
    /// its deepest descendants.
    fn distribute_extra_depth(&mut self, extra_depth: usize) {
        match self {
            Category::Group(group) if !group.children.is_empty() => {
                for child in &mut group.children {
                    child.distribute_extra_depth(extra_depth);
                }
            }
            Category::Group(group) => group.extra_depth += extra_depth,
            Category::Leaf(leaf) => leaf.extra_depth += extra_depth,
        }
    }
}

impl From<Group> for Category {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

impl From<Leaf> for Category {
    fn from(group: Leaf) -> Self {
        Self::Leaf(group)
    }
}

impl From<Value> for Category {
    fn from(name: Value) -> Self {
        Leaf::new(name).into()
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::Leaf(Leaf::new(Value::new_text(name)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Footnote {
    index: usize,
    pub content: Box<Value>,
    pub marker: Option<Box<Value>>,
    pub show: bool,
}

impl Footnote {
    pub fn new(content: impl Into<Value>) -> Self {
        Self {
            index: 0,
            content: Box::new(content.into()),
            marker: None,
            show: true,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<Value>) -> Self {
        self.marker = Some(Box::new(marker.into()));
        self
    }

    pub fn with_show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn display_marker<'a>(&'a self, options: impl IntoValueOptions<'a>) -> DisplayMarker<'a> {
        DisplayMarker {
            index: self.index,
            marker: self.marker.as_deref(),
            options: options.into_value_options(),
        }
    }

    pub fn display_content<'a>(&'a self, options: impl IntoValueOptions<'a>) -> DisplayValue<'a> {
        self.content.display(options)
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

pub struct Display26Adic(pub usize);

impl Display for Display26Adic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = SmallVec::<[char; 16]>::new();
        let mut number = self.0;
        while number > 0 {
            number -= 1;
            let digit = (number % 26) as u8;
            output.push(char::from(digit + b'a'));
            number /= 26;
        }
        for c in output.into_iter().rev() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PivotTable {
    pub look: Arc<Look>,

    pub rotate_inner_column_labels: bool,

    pub rotate_outer_row_labels: bool,

    pub show_grid_lines: bool,

    pub show_title: bool,

    pub show_caption: bool,

    pub show_values: Option<Show>,

    pub show_variables: Option<Show>,

    /// Format for [Class::Count] categories.
    pub weight_format: Format,

    /// Current layer indexes, with `axes[Axis3::Z].dimensions.len()` elements.
    /// `current_layer[i]` is an offset into the data leaves of
    /// `axes[Axis3::Z].dimensions[i]`, except that a dimension can have zero
    /// leaves, in which case `current_layer[i]` is zero and there's no
    /// corresponding leaf.
    pub current_layer: Vec<usize>,

    /// Column and row sizing and page breaks.
    pub sizing: EnumMap<Axis2, Option<Box<Sizing>>>,

    /// Format settings.
    pub settings: FormatSettings,

    /// Numeric grouping character (usually `.` or `,`).
    pub grouping: Option<char>,

    pub small: f64,

    pub command_local: Option<String>,
    pub command_c: Option<String>,
    pub language: Option<String>,
    pub locale: Option<String>,
    pub dataset: Option<String>,
    pub datafile: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub footnotes: Vec<Footnote>,
    pub title: Option<Box<Value>>,
    pub subtype: Option<Box<Value>>,
    pub corner_text: Option<Box<Value>>,
    pub caption: Option<Box<Value>>,
    pub notes: Option<String>,
    pub dimensions: Vec<Dimension>,
    pub axes: EnumMap<Axis3, Axis>,
    pub cells: HashMap<CellIndex, Value>,
}

impl Default for PivotTable {
    fn default() -> Self {
        let settings = Settings::global();
        Self {
            look: settings.look.clone(),
            rotate_inner_column_labels: false,
            rotate_outer_row_labels: false,
            show_grid_lines: false,
            show_title: true,
            show_caption: true,
            show_values: None,
            show_variables: None,
            weight_format: Format::F40,
            current_layer: Vec::new(),
            sizing: EnumMap::default(),
            settings: settings.formats.clone(),
            grouping: None,
            small: settings.small,
            command_local: None,
            command_c: None,
            language: None,
            locale: None,
            dataset: None,
            datafile: None,
            date: None,
            footnotes: Vec::new(),
            subtype: None,
            title: None,
            corner_text: None,
            caption: None,
            notes: None,
            dimensions: Vec::new(),
            axes: EnumMap::default(),
            cells: HashMap::new(),
        }
    }
}

impl PivotTable {
    /// Creates an empty table with the given `title` and `subtype`.
    pub fn new(title: impl Into<Value>, subtype: impl Into<Value>) -> Self {
        Self::default()
            .with_title(title)
            .with_subtype(subtype.into())
    }

    /// Creates a table that just displays `content`, with `title`.  The reader
    /// uses this to stand in for tables that fail to decode.
    pub fn for_text(title: impl Into<Value>, content: impl Into<Value>) -> Self {
        let mut table = Self::default().with_title(title);
        let mut dimension = Dimension::new(Group::new("Error")).with_all_labels_hidden();
        dimension.add_leaf(&[], Value::new_text("null"));
        table.insert_dimension(Axis3::Y, dimension);
        table.put1(0, content);
        table
    }

    pub fn with_look(mut self, look: Arc<Look>) -> Self {
        self.look = look;
        self
    }

    pub fn with_title(mut self, title: impl Into<Value>) -> Self {
        self.title = Some(Box::new(title.into()));
        self.show_title = true;
        self
    }

    pub fn with_corner_text(mut self, corner_text: Value) -> Self {
        self.corner_text = Some(Box::new(corner_text));
        self
    }

    pub fn with_subtype(self, subtype: Value) -> Self {
        Self {
            subtype: Some(Box::new(subtype)),
            ..self
        }
    }

    pub fn look_mut(&mut self) -> &mut Look {
        Arc::make_mut(&mut self.look)
    }

    pub fn label(&self) -> String {
        match &self.title {
            Some(title) => title.display(self).to_string(),
            None => String::from("Table"),
        }
    }

    pub fn title(&self) -> &Value {
        match &self.title {
            Some(title) => title,
            None => {
                static EMPTY: Value = Value::empty();
                &EMPTY
            }
        }
    }

    pub fn subtype(&self) -> &Value {
        match &self.subtype {
            Some(subtype) => subtype,
            None => {
                static EMPTY: Value = Value::empty();
                &EMPTY
            }
        }
    }

    pub fn value_options(&self) -> ValueOptions<'_> {
        ValueOptions {
            show_values: self.show_values,
            show_variables: self.show_variables,
            small: self.small,
            footnote_marker_type: self.look.footnote_marker_type,
            settings: &self.settings,
            footnotes: &self.footnotes,
        }
    }

    /// Returns true if the table has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Appends `dimension` to `axis` as its new outermost dimension and
    /// returns the dimension's index in [PivotTable::dimensions].
    ///
    /// The table must not yet have any cells.
    pub fn insert_dimension(&mut self, axis: Axis3, mut dimension: Dimension) -> usize {
        assert!(self.is_empty(), "dimensions must be added before cells");
        let index = self.dimensions.len();
        dimension.axis_type = axis;
        dimension.level = self.axes[axis].dimensions.len();
        dimension.top_index = index;
        self.axes[axis].dimensions.push(index);
        self.dimensions.push(dimension);
        if axis == Axis3::Z {
            self.current_layer.push(0);
        }
        index
    }

    /// Adds a new, empty dimension named `name` to `axis` and returns its
    /// index.  Use [Dimension::add_group] and [Dimension::add_leaf] to
    /// populate it.
    pub fn add_dimension(&mut self, axis: Axis3, name: impl Into<Value>) -> usize {
        self.insert_dimension(axis, Dimension::new(Group::new(name)))
    }

    /// Returns the format to use for numbers in categories with `class`, and
    /// whether it honors [PivotTable::small].
    pub fn class_format(&self, class: Class) -> (Format, bool) {
        match class {
            Class::Other => (Settings::global().default_format, true),
            Class::Integer => (Format::F40, false),
            Class::Correlations => (Format::F40_3, false),
            Class::Significance => (Format::F40_3, false),
            Class::Percent => (Format::PCT40_1, false),
            Class::Residual => (Format::F40_2, false),
            Class::Count => (self.weight_format, false),
        }
    }

    /// Sets the format used for [Class::Count] categories.  The width is
    /// always widened to 40.
    pub fn set_weight_format(&mut self, format: Format) {
        self.weight_format = format.with_width(40);
    }

    /// Like [Dimension::add_leaf_rc], for the dimension with index
    /// `dimension`.  If `name` is a number without a format, it takes the
    /// format from `class` too.
    pub fn add_leaf_rc(
        &mut self,
        dimension: usize,
        parent: &[usize],
        name: impl Into<Value>,
        class: Class,
    ) -> usize {
        let mut name = name.into();
        if let ValueInner::Number(number) = &mut name.inner {
            if number.format.is_none() {
                let (format, honor_small) = self.class_format(class);
                number.format = Some(format);
                number.honor_small = honor_small;
            }
        }
        self.dimensions[dimension].add_leaf_rc(parent, name, class)
    }

    fn check_indexes(&self, data_indexes: &[usize]) {
        assert_eq!(
            data_indexes.len(),
            self.dimensions.len(),
            "cell index has wrong number of dimensions"
        );
        for (index, dimension) in data_indexes.iter().zip(self.dimensions.iter()) {
            assert!(
                *index < dimension.len(),
                "cell index {index} out of range in dimension with {} leaves",
                dimension.len()
            );
        }
    }

    /// Puts `value` into the cell with the given `data_indexes`, replacing
    /// any value already there.
    ///
    /// A number without a format takes its format from the first dimension
    /// whose category at that index has a result class, or the default format
    /// if there is none.
    pub fn put(&mut self, data_indexes: &[usize], value: impl Into<Value>) {
        self.check_indexes(data_indexes);
        let mut value = value.into();
        if let ValueInner::Number(number) = &mut value.inner {
            if number.format.is_none() {
                let (format, honor_small) = self
                    .dimensions
                    .iter()
                    .zip(data_indexes)
                    .find_map(|(dimension, index)| dimension.data_leaf(*index)?.class)
                    .map_or_else(
                        || (Settings::global().default_format, true),
                        |class| self.class_format(class),
                    );
                number.format = Some(format);
                number.honor_small = honor_small;
            }
        }
        self.cells.insert(SmallVec::from_slice(data_indexes), value);
    }

    pub fn put1(&mut self, index: usize, value: impl Into<Value>) {
        self.put(&[index], value)
    }

    pub fn put2(&mut self, index0: usize, index1: usize, value: impl Into<Value>) {
        self.put(&[index0, index1], value)
    }

    pub fn put3(&mut self, index0: usize, index1: usize, index2: usize, value: impl Into<Value>) {
        self.put(&[index0, index1, index2], value)
    }

    pub fn put4(
        &mut self,
        index0: usize,
        index1: usize,
        index2: usize,
        index3: usize,
        value: impl Into<Value>,
    ) {
        self.put(&[index0, index1, index2, index3], value)
    }

    pub fn get(&self, data_indexes: &[usize]) -> Option<&Value> {
        self.cells.get(data_indexes)
    }

    pub fn get_mut(&mut self, data_indexes: &[usize]) -> Option<&mut Value> {
        self.cells.get_mut(data_indexes)
    }

    /// Deletes the cell with the given `data_indexes`, returning true if there
    /// was one.
    pub fn delete(&mut self, data_indexes: &[usize]) -> bool {
        self.cells.remove(data_indexes).is_some()
    }

    /// Combines `data_indexes` into a single number, with the last dimension
    /// varying fastest.
    pub fn linear_index(&self, data_indexes: &[usize]) -> u64 {
        debug_assert_eq!(data_indexes.len(), self.dimensions.len());
        self.dimensions
            .iter()
            .zip(data_indexes)
            .fold(0, |acc, (dimension, index)| {
                acc * dimension.len() as u64 + *index as u64
            })
    }

    /// Splits `linear` into one data index per dimension, the inverse of
    /// [PivotTable::linear_index].  Returns `None` if `linear` is out of range,
    /// which is always the case if any dimension has no leaves.
    pub fn decompose_linear_index(&self, linear: u64) -> Option<CellIndex> {
        let Some((first, rest)) = self.dimensions.split_first() else {
            return (linear == 0).then(SmallVec::new);
        };
        let mut indexes: CellIndex = smallvec![0; self.dimensions.len()];
        let mut remainder = linear;
        for (index, dimension) in indexes[1..].iter_mut().zip(rest).rev() {
            let n = dimension.len() as u64;
            if n == 0 {
                return None;
            }
            *index = (remainder % n) as usize;
            remainder /= n;
        }
        if remainder >= first.len() as u64 {
            return None;
        }
        indexes[0] = remainder as usize;
        Some(indexes)
    }

    /// Sets the current layer from `linear`, which combines one data index
    /// per layer dimension, innermost varying fastest.  Returns false if
    /// `linear` is out of range.
    pub fn set_current_layer_linear(&mut self, linear: u64) -> bool {
        let mut remainder = linear;
        self.current_layer = self.axes[Axis3::Z]
            .dimensions
            .iter()
            .map(|index| {
                let n = self.dimensions[*index].len() as u64;
                if n > 0 {
                    let layer = remainder % n;
                    remainder /= n;
                    layer as usize
                } else {
                    0
                }
            })
            .collect();
        remainder == 0
    }

    fn axis_values(&self, axis: Axis3) -> AxisIterator {
        AxisIterator {
            indexes: repeat_n(0, self.axes[axis].dimensions.len()).collect(),
            lengths: self.axis_dimensions(axis).map(|d| d.len()).collect(),
            done: self.axis_extent(axis) == 0,
        }
    }

    fn axis_extent(&self, axis: Axis3) -> usize {
        self.axis_dimensions(axis).map(|d| d.len()).product()
    }

    /// Returns an iterator over all of the combinations of data indexes for
    /// the dimensions in `axis`, innermost varying fastest.
    pub fn axis_data_indexes(&self, axis: Axis3) -> impl Iterator<Item = SmallVec<[usize; 4]>> {
        let presentation_orders: SmallVec<[&[usize]; 4]> = self
            .axis_dimensions(axis)
            .map(|d| d.presentation_order.as_slice())
            .collect();
        self.axis_values(axis).map(move |pindexes| {
            pindexes
                .iter()
                .zip(presentation_orders.iter())
                .map(|(pindex, order)| order[*pindex])
                .collect()
        })
    }

    /// Converts per-axis data indexes in `axis_indexes` into a cell index.
    pub fn cell_index(&self, axis_indexes: EnumMap<Axis3, &[usize]>) -> CellIndex {
        let mut data_indexes = SmallVec::from_elem(0, self.dimensions.len());
        for (axis, indexes) in axis_indexes {
            for (&dim_index, &index) in self.axes[axis].dimensions.iter().zip(indexes.iter()) {
                data_indexes[dim_index] = index;
            }
        }
        data_indexes
    }

    /// Returns an iterator for the layer axis:
    ///
    /// - If `print` is true and `self.look.print_all_layers`, then the iterator
    ///   will visit all values of the layer axis.
    ///
    /// - Otherwise, the iterator will just visit `self.current_layer`.
    pub fn layers(&self, print: bool) -> Box<dyn Iterator<Item = SmallVec<[usize; 4]>> + '_> {
        if print && self.look.print_all_layers {
            Box::new(self.axis_data_indexes(Axis3::Z))
        } else {
            Box::new(once(SmallVec::from_slice(&self.current_layer)))
        }
    }

    pub fn axis_dimensions(
        &self,
        axis: Axis3,
    ) -> impl DoubleEndedIterator<Item = &Dimension> + ExactSizeIterator {
        self.axes[axis]
            .dimensions
            .iter()
            .copied()
            .map(|index| &self.dimensions[index])
    }

    /// Updates each dimension's `axis_type` and `level` to match the axes.
    fn update_axes(&mut self) {
        for (axis_type, axis) in &self.axes {
            for (level, &index) in axis.dimensions.iter().enumerate() {
                let dimension = &mut self.dimensions[index];
                dimension.axis_type = axis_type;
                dimension.level = level;
            }
        }
    }

    /// Exchanges the dimensions on axes `a` and `b`.  If either is the layer
    /// axis, the current layer resets to the first.
    pub fn swap_axes(&mut self, a: Axis3, b: Axis3) {
        if a == b {
            return;
        }
        self.axes.swap(a, b);
        self.update_axes();
        if a == Axis3::Z || b == Axis3::Z {
            self.current_layer = vec![0; self.axes[Axis3::Z].dimensions.len()];
        }
    }

    pub fn transpose(&mut self) {
        self.swap_axes(Axis3::X, Axis3::Y);
    }

    /// Moves dimension `dim_index` to position `new_position` within
    /// `new_axis`, where 0 is innermost.  The position is clamped to the
    /// axis's length.
    pub fn move_dimension(&mut self, dim_index: usize, new_axis: Axis3, new_position: usize) {
        let old_axis = self.dimensions[dim_index].axis_type;
        let old_position = self.dimensions[dim_index].level;
        let new_len = self.axes[new_axis].dimensions.len();
        let new_position = if old_axis == new_axis {
            new_position.min(new_len - 1)
        } else {
            new_position.min(new_len)
        };
        if old_axis == new_axis && old_position == new_position {
            return;
        }

        // Update the current layer, if necessary.  If we're moving within the
        // layer axis, preserve the current layer.
        match (old_axis, new_axis) {
            (Axis3::Z, Axis3::Z) => {
                // Rearrange the layer axis.
                if old_position < new_position {
                    self.current_layer[old_position..=new_position].rotate_left(1);
                } else {
                    self.current_layer[new_position..=old_position].rotate_right(1);
                }
            }
            (Axis3::Z, _) => {
                // A layer is becoming a row or column.
                self.current_layer.remove(old_position);
            }
            (_, Axis3::Z) => {
                // A row or column is becoming a layer.
                self.current_layer.insert(new_position, 0);
            }
            _ => (),
        }

        self.axes[old_axis].dimensions.remove(old_position);
        self.axes[new_axis]
            .dimensions
            .insert(new_position, dim_index);
        self.update_axes();
    }

    /// Appends a new footnote with `content` and returns its index.
    pub fn create_footnote(&mut self, content: impl Into<Value>) -> usize {
        let index = self.footnotes.len();
        self.footnotes
            .push(Footnote::new(content).with_index(index));
        index
    }

    /// Returns the footnote with the given `index`, first creating it and any
    /// missing footnotes before it as empty placeholders.  Then replaces its
    /// marker and content by `marker` and `content` if they are present.
    pub fn create_footnote_at(
        &mut self,
        index: usize,
        marker: Option<Value>,
        content: Option<Value>,
    ) -> &mut Footnote {
        while self.footnotes.len() <= index {
            let placeholder = Footnote::new(Value::empty()).with_index(self.footnotes.len());
            self.footnotes.push(placeholder);
        }
        let footnote = &mut self.footnotes[index];
        if let Some(marker) = marker {
            footnote.marker = Some(Box::new(marker));
        }
        if let Some(content) = content {
            footnote.content = Box::new(content);
        }
        footnote
    }

    fn assign_axis_label_depth(&mut self, axis: Axis3, labels_in_corner: bool) -> bool {
        let mut any_label_shown_in_corner = false;
        let mut label_depth = 0;
        let mut extent = 1;
        for &index in &self.axes[axis].dimensions {
            let dimension = &mut self.dimensions[index];
            dimension.root.assign_label_depth(labels_in_corner);
            dimension.label_depth = if dimension.hide_all_labels {
                0
            } else {
                dimension.root.label_depth
            };
            label_depth += dimension.label_depth;
            extent *= dimension.len();
            any_label_shown_in_corner |= dimension.root.show_label_in_corner;
        }
        self.axes[axis].label_depth = label_depth;
        self.axes[axis].extent = extent;
        any_label_shown_in_corner
    }

    /// Computes the label depth of every category, dimension, and axis, and
    /// the extent of every axis.
    ///
    /// Row dimension labels go in the corner if the look says so and there is
    /// no corner text.  In that case the column labels take at least one row,
    /// to make room for them.
    pub fn assign_label_depth(&mut self) {
        self.assign_axis_label_depth(Axis3::X, false);
        let row_labels_in_corner = self.look.row_labels_in_corner() && self.corner_text.is_none();
        if self.assign_axis_label_depth(Axis3::Y, row_labels_in_corner)
            && self.axes[Axis3::X].label_depth == 0
        {
            self.axes[Axis3::X].label_depth = 1;
        }
        self.assign_axis_label_depth(Axis3::Z, false);
    }
}
