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

//! Building a [PivotTable] from a legacy table's [Visualization] and
//! [LegacyData].
//!
//! Each variable in the visualization becomes a [Series] of values.  The
//! series named in the faceting become the table's dimensions, the `cell`
//! series supplies the data, and the remaining elements adjust styles,
//! formats, and footnotes.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::RangeInclusive,
    sync::Arc,
};

use displaydoc::Display;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use thiserror::Error as ThisError;

use crate::{
    calendar::{parse_iso_date_time, parse_time},
    format::{Category as FormatCategory, Decimal, Format, Type, UncheckedFormat},
    output::pivot::{
        look_xml::{FontStyle, FontUnderline, FontWeight, LabelLocationVertical, TextAlignment},
        Area, AreaStyle, Axis2, Axis3, Category, Dimension, DimensionError, Group, HeadingRegion,
        HorzAlign, Leaf, Look, PivotTable, Value, ValueInner, VertAlign,
    },
};

use super::{
    legacy_bin::{DataValue, Datum, DisplayG, LegacyData},
    legacy_xml::{
        self as xml, Affix, BaseFormat, DerivedVariable, Footnotes, Graph, Intersect, Label,
        MdyOrder, MonthFormat, Purpose, Scientific, SetCellProperties, SetFormat, SetFormatKind,
        SourceVariable, Target, Variable, VariableFormat, Visualization,
    },
};

#[derive(Clone, Debug, Display, ThisError, PartialEq)]
pub enum Error {
    /// Visualization lacks a `graph` element.
    MissingGraph,

    /// Reference to unknown style {0:?}.
    UnknownStyle(String),

    /// Variable {id:?} refers to nonexistent variable {variable:?} in source {source_name:?}.
    NonexistentVariable {
        id: String,
        source_name: String,
        variable: String,
    },

    /// Derived variable {id:?} has unknown value {value:?}.
    UnknownDerivedValue { id: String, value: String },

    /// Duplicate relabeling for {0}.
    DuplicateRelabel(DisplayG),

    /// Syntax error in value mapping {0:?}.
    ValueMapSyntax(String),

    /// Circular references among {n} variables, including {id:?}.
    CircularReferences { n: usize, id: String },

    /// Variable {0:?} has no categories.
    NoCategories(String),

    /// Layer value {value} exceeds the {n_leaves} categories in the layer.
    BadLayer { value: String, n_leaves: usize },

    /// Visualization lacks a variable named `cell`.
    MissingCells,

    /// Cell format {0:#x} is not valid.
    BadFormat(u32),

    /// {0}
    Dimension(#[from] DimensionError),
}

/// Decodes a legacy table.
///
/// `look` is the table's initial look, and `subtype` is its subtype from the
/// output structure, if any.
pub fn decode(
    visualization: &Visualization,
    data: &LegacyData,
    look: Arc<Look>,
    subtype: Option<&str>,
) -> Result<PivotTable, Error> {
    let graph = visualization.graph().ok_or(Error::MissingGraph)?;
    let mut pt = PivotTable::default().with_look(look);
    pt.title = Some(Box::new(Value::new_user_text(
        visualization.name.as_deref().unwrap_or_default(),
    )));
    pt.subtype = subtype.map(|subtype| Box::new(Value::new_user_text(subtype)));

    let mut decoder = Decoder {
        graph,
        styles: visualization.styles(),
        targets: visualization.targets(),
        series: IndexMap::new(),
        dimension_series: Vec::new(),
        pt,
    };
    decoder.decode(visualization, data)?;
    Ok(decoder.pt)
}

/// Maps numbers in a series to new values.
#[derive(Default)]
struct Map(HashMap<OrderedFloat<f64>, Datum>);

impl Map {
    /// Maps `from` to `to`.  If `try_strings_as_numbers`, then `to` becomes
    /// a number if it looks like one.  Otherwise, if `format` is numeric, a
    /// numeric `to` is reformatted with it.
    fn insert(
        &mut self,
        from: f64,
        to: &str,
        try_strings_as_numbers: bool,
        format: Option<Format>,
    ) -> Result<(), Error> {
        let number = to.trim_start().parse::<f64>().ok();
        let datum = match (number, format) {
            (Some(number), _) if try_strings_as_numbers => Datum::Number(Some(number)),
            (Some(number), Some(format)) => {
                Datum::String(format_number(Some(number), format))
            }
            _ => Datum::String(to.into()),
        };
        match self.0.get(&OrderedFloat(from)) {
            Some(old) if *old != datum => Err(Error::DuplicateRelabel(DisplayG(from))),
            Some(_) => Ok(()),
            None => {
                self.0.insert(OrderedFloat(from), datum);
                Ok(())
            }
        }
    }

    fn lookup<'a>(&'a self, value: &'a DataValue) -> &'a Datum {
        match value.datum {
            Datum::Number(Some(number)) => {
                self.0.get(&OrderedFloat(number)).unwrap_or(&value.datum)
            }
            _ => &value.datum,
        }
    }
}

fn format_number(number: Option<f64>, format: Format) -> String {
    Value::new_number_with_format(number, format)
        .display(())
        .to_string()
}

/// The values of one source or derived variable.
struct Series<'a> {
    label: Option<&'a str>,
    format: Format,
    values: Vec<DataValue>,
    map: Map,

    /// Whether `map` has been applied to `values`.
    remapped: bool,

    affixes: Vec<&'a Affix>,

    /// The dimension made from this series, if any.
    dimension: Option<usize>,

    /// Where each category number ended up within a dimension.
    categories: HashMap<usize, CategoryLocation>,
}

#[derive(Clone, Debug)]
struct CategoryLocation {
    dimension: usize,

    /// Path from the dimension's root to the category.
    path: Vec<usize>,

    /// The leaf's data index, or `None` for a group.
    data_index: Option<usize>,
}

impl<'a> Series<'a> {
    fn new(values: Vec<DataValue>, label: Option<&'a str>) -> Self {
        Self {
            label,
            format: UncheckedFormat::new(Type::F, 8, 0).fix(),
            values,
            map: Map::default(),
            remapped: false,
            affixes: Vec::new(),
            dimension: None,
            categories: HashMap::new(),
        }
    }

    fn execute_mapping(&mut self) {
        if self.map.0.is_empty() {
            return;
        }
        self.remapped = true;
        for value in &mut self.values {
            if let Datum::Number(Some(number)) = value.datum {
                if let Some(to) = self.map.0.get(&OrderedFloat(number)) {
                    value.index = Some(number);
                    value.datum = to.clone();
                }
            }
        }
    }

    fn remap_formats(
        &mut self,
        formats: impl Iterator<Item = VariableFormat<'a>>,
    ) -> Result<(), Error> {
        self.map = Map::default();
        for format in formats {
            match format {
                VariableFormat::Format(format) => {
                    self.format = decode_format(format);
                    let try_strings_as_numbers = format.try_strings_as_numbers == Some(true);
                    for relabel in format.relabels() {
                        self.map.insert(
                            relabel.from,
                            &relabel.to,
                            try_strings_as_numbers,
                            Some(self.format),
                        )?;
                    }
                    self.affixes = format.affixes().collect();
                }
                VariableFormat::StringFormat(format) => {
                    for relabel in format.relabels() {
                        self.map.insert(relabel.from, &relabel.to, false, None)?;
                    }
                    self.affixes = format.affixes().collect();
                }
            }
        }
        self.execute_mapping();
        Ok(())
    }

    fn remap_value_map_entries(
        &mut self,
        entries: impl Iterator<Item = &'a xml::ValueMapEntry>,
    ) -> Result<(), Error> {
        self.map = Map::default();
        for entry in entries {
            for from in entry.from.split(';') {
                let from = from
                    .trim_start()
                    .parse::<f64>()
                    .map_err(|_| Error::ValueMapSyntax(entry.from.clone()))?;
                self.map.insert(from, &entry.to, true, None)?;
            }
        }
        self.execute_mapping();
        Ok(())
    }
}

type SeriesMap<'a> = IndexMap<&'a str, Series<'a>>;

/// Decodes `variable`, or returns `None` if it depends on a variable that
/// has not been decoded yet.
fn decode_source_variable<'a>(
    series: &SeriesMap<'a>,
    variable: &'a SourceVariable,
    data: &LegacyData,
) -> Result<Option<Series<'a>>, Error> {
    let label_series = match &variable.label_variable {
        Some(label_variable) => match series.get(label_variable.as_str()) {
            Some(label_series) => Some(label_series),
            None => return Ok(None),
        },
        None => None,
    };

    let values = data
        .find_variable(&variable.source, &variable.source_name)
        .ok_or_else(|| Error::NonexistentVariable {
            id: variable.id.clone(),
            source_name: variable.source.clone(),
            variable: variable.source_name.clone(),
        })?
        .values
        .clone();
    let mut s = Series::new(values, variable.label.as_deref());
    s.remap_formats(variable.formats())?;

    if let Some(label_series) = label_series {
        if !s.remapped {
            for (value, label) in s.values.iter().zip(&label_series.values) {
                if let Datum::Number(Some(number)) = value.datum {
                    let label = match &label.datum {
                        Datum::Number(label) => format_number(*label, s.format),
                        Datum::String(label) => label.clone(),
                    };
                    // The same number may be labeled more than once.
                    let _ = s.map.insert(number, &label, false, None);
                }
            }
        }
    }
    Ok(Some(s))
}

/// Decodes `variable`, or returns `None` if it depends on a variable that
/// has not been decoded yet.
fn decode_derived_variable<'a>(
    series: &SeriesMap<'a>,
    variable: &'a DerivedVariable,
) -> Result<Option<Series<'a>>, Error> {
    let value = variable.value.as_str();
    let values = if value == "constant(0)" {
        let Some((_, first)) = series.first() else {
            return Ok(None);
        };
        vec![
            DataValue {
                index: None,
                datum: Datum::Number(Some(0.0)),
            };
            first.values.len()
        ]
    } else if value.starts_with("constant") {
        Vec::new()
    } else if let Some(dependency) = value
        .strip_prefix("map(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        match series.get(dependency) {
            Some(dependency) => dependency.values.clone(),
            None => return Ok(None),
        }
    } else {
        return Err(Error::UnknownDerivedValue {
            id: variable.id.clone(),
            value: variable.value.clone(),
        });
    };

    let mut s = Series::new(values, None);
    s.remap_value_map_entries(variable.value_map_entries())?;
    s.remap_formats(variable.formats())?;
    if s
        .values
        .iter()
        .all(|value| matches!(&value.datum, Datum::String(s) if s.is_empty()))
    {
        s.values.clear();
    }
    Ok(Some(s))
}

fn decode_date_format(format: &xml::Format) -> Format {
    let type_ = if format.show_quarter == Some(true) {
        Type::QYr
    } else if format.show_week == Some(true) {
        Type::WkYr
    } else {
        match format.mdy_order {
            Some(MdyOrder::DayMonthYear) => match format.month_format {
                Some(MonthFormat::Number | MonthFormat::PaddedNumber) => Type::EDate,
                _ => Type::Date,
            },
            Some(MdyOrder::YearMonthDay) => Type::SDate,
            _ => Type::ADate,
        }
    };
    let mut w = type_.min_width();
    if format.year_abbreviation != Some(true) {
        w += 2;
    }
    UncheckedFormat::new(type_, w, 0).fix()
}

/// Adds room for seconds, and possibly milliseconds, to a time format.
fn with_seconds(format: &xml::Format, type_: Type) -> Format {
    let mut w = type_.min_width();
    let mut d = 0;
    if format.show_second == Some(true) {
        w += 3;
        if format.show_millis == Some(true) {
            d = 3;
            w += 4;
        }
    }
    UncheckedFormat::new(type_, w, d).fix()
}

fn decode_date_time_format(format: &xml::Format) -> Format {
    match format.base_format {
        Some(BaseFormat::Date) => decode_date_format(format),
        Some(BaseFormat::Time) => {
            let type_ = if format.show_day == Some(true) {
                Type::DTime
            } else if format.show_hour == Some(true) {
                Type::Time
            } else {
                Type::MTime
            };
            with_seconds(format, type_)
        }
        _ => {
            let type_ = if format.mdy_order == Some(MdyOrder::YearMonthDay) {
                Type::YmdHms
            } else {
                Type::DateTime
            };
            with_seconds(format, type_)
        }
    }
}

fn decode_elapsed_time_format(format: &xml::Format) -> Format {
    let type_ = if format.base_format != Some(BaseFormat::Time) {
        Type::DTime
    } else if format.show_hour == Some(true) {
        Type::Time
    } else {
        Type::MTime
    };
    with_seconds(format, type_)
}

fn decode_number_format(format: &xml::Format) -> Format {
    let type_ = if format.scientific == Some(Scientific::True) {
        Type::E
    } else if format.prefix.as_deref() == Some("$") {
        Type::Dollar
    } else if format.suffix.as_deref() == Some("%") {
        Type::Pct
    } else if format.use_grouping == Some(true) {
        Type::Comma
    } else {
        Type::F
    };
    let d = format
        .maximum_fraction_digits
        .and_then(|d| u8::try_from(d).ok())
        .filter(|d| *d <= 15)
        .unwrap_or(2);
    UncheckedFormat::new(type_, 40, d).fix()
}

fn decode_format(format: &xml::Format) -> Format {
    match format.base_format {
        Some(BaseFormat::Date | BaseFormat::Time | BaseFormat::DateTime) => {
            decode_date_time_format(format)
        }
        Some(BaseFormat::ElapsedTime) => decode_elapsed_time_format(format),
        None => decode_number_format(format),
    }
}

/// Parses a leading integer from `s`, the way C `atoi` does except that an
/// unparseable string yields `None`.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

fn decode_style_incremental(
    fg: Option<&xml::Style>,
    bg: Option<&xml::Style>,
    out: &mut AreaStyle,
) {
    if let Some(fg) = fg {
        let font = &mut out.font_style;
        if let Some(weight) = fg.font_weight {
            font.bold = weight == FontWeight::Bold;
        }
        if let Some(style) = fg.font_style {
            font.italic = style == FontStyle::Italic;
        }
        if let Some(underline) = fg.font_underline {
            font.underline = underline == FontUnderline::Underline;
        }
        if let Some(color) = fg.color {
            font.fg = [color; 2];
        }
        if let Some(family) = &fg.font_family {
            font.font = family.clone();
        }
        if let Some(size) = fg
            .font_size
            .as_deref()
            .and_then(leading_int)
            .and_then(|size| i32::try_from(size).ok())
            .filter(|size| *size != 0)
        {
            font.size = size;
        }

        let cell = &mut out.cell_style;
        if let Some(alignment) = fg.text_alignment {
            cell.horz_align = match alignment {
                TextAlignment::Left => Some(HorzAlign::Left),
                TextAlignment::Right => Some(HorzAlign::Right),
                TextAlignment::Center => Some(HorzAlign::Center),
                TextAlignment::Decimal => Some(HorzAlign::Decimal {
                    offset: fg.decimal_offset.map_or(0.0, |offset| offset.as_px_f64()),
                    decimal: Decimal::Dot,
                }),
                TextAlignment::Mixed => None,
            };
        }
        if let Some(location) = fg.label_location_vertical {
            cell.vert_align = match location {
                LabelLocationVertical::Positive => VertAlign::Top,
                LabelLocationVertical::Negative => VertAlign::Bottom,
                LabelLocationVertical::Center => VertAlign::Middle,
            };
        }
    }
    if let Some(color) = bg.and_then(|bg| bg.color) {
        out.font_style.bg = [color; 2];
    }
}

fn decode_style(fg: Option<&xml::Style>, bg: Option<&xml::Style>) -> AreaStyle {
    let mut area = AreaStyle::default();
    decode_style_incremental(fg, bg, &mut area);
    area
}

/// Parses a cell style width such as `10%;40pt;300pt` into a range of
/// column widths.
fn parse_width(s: &str) -> Option<RangeInclusive<usize>> {
    let mut parts = s.split(';');
    parts.next()?.strip_suffix('%')?.parse::<f64>().ok()?;
    let min = parts.next()?.strip_suffix("pt")?.parse().ok()?;
    let max = parts.next()?.strip_suffix("pt")?.parse().ok()?;
    parts.next().is_none().then_some(min..=max)
}

/// Adds 1-based footnote `index` to `value` if it is in range.
fn add_footnote(value: &mut Value, index: i32, n_footnotes: usize) {
    if let Ok(index) = usize::try_from(index) {
        if (1..=n_footnotes).contains(&index) {
            value.add_footnote(index - 1);
        }
    }
}

fn add_affixes<'a>(value: &mut Value, affixes: impl IntoIterator<Item = &'a Affix>, n: usize) {
    for affix in affixes {
        add_footnote(value, affix.defines_reference, n);
    }
}

fn footnote_index(reference: i32) -> Option<usize> {
    usize::try_from(reference).ok()?.checked_sub(1)
}

fn category_index(category: f64) -> Option<usize> {
    (category >= 0.0 && category < usize::MAX as f64).then_some(category as usize)
}

/// Converts a category's datum into a value for its name.
fn datum_to_value(datum: &Datum) -> Value {
    match datum {
        Datum::Number(number) => Value::new_number_with_format(*number, Format::F40_2),
        Datum::String(s) => Value::new_string(s.clone()),
    }
}

/// Converts a cell's `datum` into a value, using the format number in
/// `format_value` if there is one.
fn value_from_data(
    datum: &Datum,
    format_value: Option<&DataValue>,
    format_map: &HashMap<u32, Format>,
) -> Result<Value, Error> {
    let format = match format_value {
        None => Format::F40_2,
        Some(format_value) => {
            let raw = match &format_value.datum {
                Datum::Number(number) => number.unwrap_or_default() as u32,
                Datum::String(s) => leading_int(s).unwrap_or_default() as u32,
            };
            match format_map.get(&raw) {
                Some(format) => *format,
                None => Format::from_u32(raw).map_err(|_| Error::BadFormat(raw))?,
            }
        }
    };
    match datum {
        Datum::String(s) => {
            if format_value.is_some() {
                let number = match format.type_().category() {
                    FormatCategory::Date => parse_iso_date_time(s),
                    FormatCategory::Time => parse_time(s),
                    _ => None,
                };
                if let Some(number) = number {
                    return Ok(Value::new_number_with_format(Some(number), format));
                }
            }
            Ok(Value::new_string(s.clone()))
        }
        Datum::Number(number) => Ok(Value::new_number_with_format(*number, format)),
    }
}

/// A category under construction.
enum Node {
    Leaf {
        leaf: Leaf,
        row: usize,
        category: usize,
    },
    Group {
        name: Value,
        row: usize,
        children: Vec<Node>,

        /// Index of the grouping series within the nest, and the category
        /// number the group represents.
        series: usize,
        category: Option<usize>,
    },
}

impl Node {
    /// The row of the node's first leaf.
    fn row(&self) -> usize {
        match self {
            Node::Leaf { row, .. } | Node::Group { row, .. } => *row,
        }
    }
}

struct Location {
    series: usize,
    category: usize,
    path: Vec<usize>,
    data_index: Option<usize>,
}

fn build_group(
    nodes: Vec<Node>,
    parent: &mut Group,
    path: &mut Vec<usize>,
    locations: &mut Vec<Location>,
) {
    for (index, node) in nodes.into_iter().enumerate() {
        path.push(index);
        match node {
            Node::Leaf { leaf, category, .. } => {
                locations.push(Location {
                    series: 0,
                    category,
                    path: path.clone(),
                    data_index: Some(leaf.data_index),
                });
                parent.push(leaf);
            }
            Node::Group {
                name,
                children,
                series,
                category,
                ..
            } => {
                let mut group = Group::new(name);
                build_group(children, &mut group, path, locations);
                parent.push(group);
                if let Some(category) = category {
                    locations.push(Location {
                        series,
                        category,
                        path: path.clone(),
                        data_index: None,
                    });
                }
            }
        }
        path.pop();
    }
}

fn category_mut<'a>(group: &'a mut Group, path: &[usize]) -> Option<&'a mut Category> {
    let (&first, rest) = path.split_first()?;
    let child = group.children.get_mut(first)?;
    if rest.is_empty() {
        return Some(child);
    }
    match child {
        Category::Group(group) => category_mut(group, rest),
        Category::Leaf(_) => None,
    }
}

/// The styles named by the `setStyle` and `setFrameStyle` children of a
/// `setCellProperties`, by the kind of element that they target.
#[derive(Copy, Clone, Default)]
struct TargetStyles<'a> {
    graph: Option<&'a xml::Style>,
    labeling: Option<&'a xml::Style>,
    interval: Option<&'a xml::Style>,
    major_ticks: Option<&'a xml::Style>,
    frame: Option<&'a xml::Style>,
}

/// Applies `set_format` and the `fg` and `bg` styles to `value`.  `base`
/// supplies the styles that `value` does not override.
fn apply_styles(
    value: &mut Value,
    set_format: Option<&SetFormat>,
    base: &AreaStyle,
    fg: Option<&xml::Style>,
    bg: Option<&xml::Style>,
    n_footnotes: usize,
) {
    if let Some(set_format) = set_format {
        if set_format.reset == Some(true) {
            value.clear_footnotes();
        }
        let format = match set_format.kind() {
            Some(SetFormatKind::Format(format)) => {
                add_affixes(value, format.affixes(), n_footnotes);
                Some(decode_format(format))
            }
            Some(SetFormatKind::Number(format)) => {
                add_affixes(value, format.affixes(), n_footnotes);
                Some(decode_number_format(format))
            }
            Some(SetFormatKind::DateTime(format)) => Some(decode_date_time_format(format)),
            Some(SetFormatKind::ElapsedTime(format)) => Some(decode_elapsed_time_format(format)),
            None => {
                for string_format in set_format.string_formats() {
                    add_affixes(value, string_format.affixes(), n_footnotes);
                }
                None
            }
        };
        if let Some(format) = format {
            if let ValueInner::Number(number) = &mut value.inner {
                number.format = Some(format);
            }
        }
    }

    if fg.is_some() || bg.is_some() {
        let mut area = AreaStyle {
            font_style: value
                .font_style()
                .cloned()
                .unwrap_or_else(|| base.font_style.clone()),
            cell_style: value
                .cell_style()
                .cloned()
                .unwrap_or_else(|| base.cell_style.clone()),
        };
        decode_style_incremental(fg, bg, &mut area);
        let styling = value.styling.get_or_insert_default();
        styling.font_style = Some(area.font_style);
        styling.cell_style = Some(area.cell_style);
    }
}

struct Decoder<'a> {
    graph: &'a Graph,
    styles: HashMap<&'a str, &'a xml::Style>,
    targets: HashMap<&'a str, Target>,
    series: SeriesMap<'a>,

    /// The names of the series that became dimensions, in dimension order.
    dimension_series: Vec<&'a str>,

    pt: PivotTable,
}

impl<'a> Decoder<'a> {
    fn style(&self, id: Option<&str>) -> Result<Option<&'a xml::Style>, Error> {
        match id {
            None => Ok(None),
            Some(id) => match self.styles.get(id) {
                Some(style) => Ok(Some(*style)),
                None => Err(Error::UnknownStyle(id.into())),
            },
        }
    }

    fn decode(&mut self, visualization: &'a Visualization, data: &LegacyData) -> Result<(), Error> {
        let graph = self.graph;
        let interval = graph.interval.as_ref();
        let labeling = interval.map(|interval| &interval.labeling);

        // Footnotes have to exist before anything refers to them.
        let container_frames = visualization
            .container()
            .map_or(&[][..], |container| container.label_frames.as_slice());
        for label in container_frames.iter().filter_map(|frame| frame.label.as_ref()) {
            if label.purpose == Some(Purpose::Footnote) {
                if let Some(index) = label
                    .texts()
                    .next()
                    .and_then(|text| text.uses_reference)
                    .and_then(footnote_index)
                {
                    self.pt.create_footnote_at(index, None, None);
                }
            }
        }
        if let Some(footnotes) = interval.and_then(|interval| interval.footnotes.as_ref()) {
            self.decode_footnotes(footnotes);
        }
        let mut footnotes_variable = None;
        for footnotes in labeling.into_iter().flat_map(|labeling| labeling.footnotes()) {
            self.decode_footnotes(footnotes);
            if let Some(variable) = &footnotes.variable {
                footnotes_variable = Some(variable.as_str());
            }
        }

        for label in visualization
            .label_frames()
            .chain(container_frames)
            .filter_map(|frame| frame.label.as_ref())
        {
            self.decode_label_frame(label)?;
        }

        if let Some(labeling) = labeling {
            if labeling.style.is_some() {
                let style = decode_style(
                    self.style(labeling.style.as_deref())?,
                    self.style(graph.cell_style.as_deref())?,
                );
                self.pt.look_mut().areas[Area::Data] = style;
            }
        }

        self.pt.show_grid_lines = visualization
            .extension()
            .is_some_and(|extension| extension.show_gridline == Some(true));

        if let Some(width) = self
            .style(graph.cell_style.as_deref())?
            .and_then(|style| style.width.as_deref())
            .and_then(parse_width)
        {
            self.pt.look_mut().heading_widths[HeadingRegion::Columns] = width;
        }

        self.decode_series(visualization, data)?;

        let (columns, rows) = graph.faceting.nests();
        let columns = columns.map_or_else(Vec::new, |nest| {
            nest.variables
                .iter()
                .map(|reference| reference.reference.as_str())
                .collect()
        });
        let rows = rows.map_or_else(Vec::new, |nest| {
            nest.variables
                .iter()
                .map(|reference| reference.reference.as_str())
                .collect()
        });
        self.add_dimensions(&columns, Axis3::X, 1)?;
        self.add_dimensions(&rows, Axis3::Y, columns.len() + 1)?;
        let (layers1, layers2) = graph.faceting.layers();
        self.add_layers(&layers1, columns.len() + rows.len() + 1)?;
        self.add_layers(&layers2, columns.len() + rows.len() + layers1.len() + 1)?;

        let cell_format = labeling
            .into_iter()
            .flat_map(|labeling| labeling.formattings())
            .last();
        self.decode_cells(cell_format, footnotes_variable)?;

        for scp in graph.set_cell_properties() {
            self.decode_set_cell_properties(scp)?;
        }

        self.pt.assign_label_depth();
        Ok(())
    }

    fn decode_footnotes(&mut self, footnotes: &Footnotes) {
        if let Some(last) = footnotes.mappings.len().checked_sub(1) {
            self.pt.create_footnote_at(last, None, None);
        }
        for mapping in &footnotes.mappings {
            if let Some(index) = footnote_index(mapping.defines_reference) {
                self.pt
                    .create_footnote_at(index, Some(Value::new_user_text(&mapping.to)), None);
            }
        }
    }

    fn decode_label_frame(&mut self, label: &Label) -> Result<(), Error> {
        let area = match label.purpose {
            Some(Purpose::Title) => Area::Title,
            Some(Purpose::SubTitle) => Area::Caption,
            Some(Purpose::Layer) => Area::Layers,
            Some(Purpose::Footnote) => {
                if label
                    .texts()
                    .next()
                    .is_none_or(|text| text.uses_reference.is_none())
                {
                    return Ok(());
                }
                Area::Footer
            }
            _ => return Ok(()),
        };
        let style = decode_style(
            self.style(label.style.as_deref())?,
            self.style(label.text_frame_style.as_deref())?,
        );
        self.pt.look_mut().areas[area] = style;

        match area {
            Area::Title | Area::Caption => {
                let mut text = String::new();
                let mut references = Vec::new();
                for t in label.texts() {
                    match t.defines_reference {
                        Some(reference) => references.push(reference),
                        None => text.push_str(&t.text),
                    }
                }
                let mut value = Value::new_text(text);
                let n_footnotes = self.pt.footnotes.len();
                for reference in references {
                    add_footnote(&mut value, reference, n_footnotes);
                }
                let value = Some(Box::new(value));
                if area == Area::Title {
                    self.pt.title = value;
                } else {
                    self.pt.caption = value;
                }
            }
            _ => {
                // Footnote texts alternate between a marker and its content.
                for (i, t) in label.texts().enumerate() {
                    let Some(index) = t.uses_reference.and_then(footnote_index) else {
                        continue;
                    };
                    if i % 2 == 1 {
                        let content = t.text.strip_suffix('\n').unwrap_or(&t.text);
                        self.pt
                            .create_footnote_at(index, None, Some(Value::new_user_text(content)));
                    } else {
                        let marker = t.text.strip_suffix('.').unwrap_or(&t.text);
                        self.pt
                            .create_footnote_at(index, Some(Value::new_user_text(marker)), None);
                    }
                }
            }
        }
        Ok(())
    }

    /// Decodes all of the variables.  Variables can refer to each other, so
    /// this keeps making passes until it resolves all of them.
    fn decode_series(
        &mut self,
        visualization: &'a Visualization,
        data: &LegacyData,
    ) -> Result<(), Error> {
        let mut pending = visualization.variables().collect::<Vec<_>>();
        while !pending.is_empty() {
            let mut progress = false;
            let mut i = 0;
            while i < pending.len() {
                let series = match pending[i] {
                    Variable::Source(variable) => {
                        decode_source_variable(&self.series, variable, data)?
                    }
                    Variable::Derived(variable) => decode_derived_variable(&self.series, variable)?,
                };
                match series {
                    Some(series) => {
                        self.series.insert(pending[i].id(), series);
                        pending.swap_remove(i);
                        progress = true;
                    }
                    None => i += 1,
                }
            }
            if !progress {
                return Err(Error::CircularReferences {
                    n: pending.len(),
                    id: pending[0].id().into(),
                });
            }
        }
        Ok(())
    }

    /// Adds a dimension for each run of usable variables in `names`.
    /// Returns the index within `names` and the dimension index for each one
    /// added.
    fn add_dimensions(
        &mut self,
        names: &[&'a str],
        axis: Axis3,
        level_offset: usize,
    ) -> Result<Vec<(usize, usize)>, Error> {
        let mut added = Vec::new();
        let mut i = 0;
        while i < names.len() {
            let n = names[i..]
                .iter()
                .take_while(|name| {
                    self.series
                        .get(**name)
                        .is_some_and(|series| !series.values.is_empty())
                })
                .count();
            if n > 0 {
                let dimension = self.add_dimension(&names[i..i + n], axis, level_offset + i)?;
                added.push((i, dimension));
            }
            i += n + 1;
        }
        Ok(added)
    }

    fn add_layers(&mut self, layers: &[&'a xml::Layer], level_offset: usize) -> Result<(), Error> {
        let names = layers
            .iter()
            .map(|layer| layer.variable.as_str())
            .collect::<Vec<_>>();
        for (i, dimension) in self.add_dimensions(&names, Axis3::Z, level_offset)? {
            let dimension = &self.pt.dimensions[dimension];
            let n_leaves = dimension.len();
            let value = &layers[i].value;
            match usize::try_from(leading_int(value).unwrap_or_default()) {
                Ok(index) if index < n_leaves => {
                    let level = dimension.level;
                    self.pt.current_layer[level] = index;
                }
                _ => {
                    return Err(Error::BadLayer {
                        value: value.clone(),
                        n_leaves,
                    })
                }
            }
        }
        Ok(())
    }

    /// Adds a dimension whose leaves come from the first of `names` and
    /// whose groups come from the rest.
    fn add_dimension(
        &mut self,
        names: &[&'a str],
        axis: Axis3,
        level: usize,
    ) -> Result<usize, Error> {
        let graph = self.graph;
        let n = names.len();

        let label_area = match axis {
            Axis3::X => Some(Area::Labels(Axis2::X)),
            Axis3::Y => Some(Area::Labels(Axis2::Y)),
            Axis3::Z => None,
        };
        if let Some(area) = label_area {
            if let Some(label) = graph
                .facet_level(level + n)
                .and_then(|facet_level| facet_level.axis.label.as_ref())
            {
                let style = decode_style(
                    self.style(label.style.as_deref())?,
                    self.style(label.text_frame_style.as_deref())?,
                );
                self.pt.look_mut().areas[area] = style;
            }
        }
        if axis == Axis3::Y {
            if let Some(major_ticks) = graph
                .facet_level(level + n - 1)
                .and_then(|facet_level| facet_level.axis.major_ticks.as_ref())
            {
                let fg = self.style(major_ticks.style.as_deref())?;
                let bg = self.style(major_ticks.tick_frame_style.as_deref())?;
                decode_style_incremental(
                    fg,
                    bg,
                    &mut self.pt.look_mut().areas[Area::Labels(Axis2::Y)],
                );
            }
        }
        if graph
            .facet_level(level)
            .and_then(|facet_level| facet_level.axis.major_ticks.as_ref())
            .and_then(|major_ticks| major_ticks.label_angle)
            == Some(-90.0)
        {
            if axis == Axis3::X {
                self.pt.rotate_inner_column_labels = true;
            } else {
                self.pt.rotate_outer_row_labels = true;
            }
        }
        let show_label = match graph
            .facet_level(level + n)
            .and_then(|facet_level| facet_level.axis.label.as_ref())
        {
            Some(label) => self
                .style(label.style.as_deref())?
                .is_none_or(|style| style.visible != Some(false)),
            None => false,
        };

        let n_footnotes = self.pt.footnotes.len();
        let Some(series0) = self.series.get(names[0]) else {
            return Err(Error::NoCategories(names[0].into()));
        };

        // The first row in which each category appears, in category order.
        let mut first_rows = BTreeMap::new();
        for (row, value) in series0.values.iter().enumerate() {
            if let Some(category) = value.category().and_then(category_index) {
                first_rows.entry(category).or_insert(row);
            }
        }
        if first_rows.is_empty() {
            return Err(Error::NoCategories(names[0].into()));
        }

        let mut nodes = first_rows
            .into_iter()
            .enumerate()
            .map(|(data_index, (category, row))| {
                let mut name = datum_to_value(series0.map.lookup(&series0.values[row]));
                add_affixes(&mut name, series0.affixes.iter().copied(), n_footnotes);
                Node::Leaf {
                    leaf: Leaf::new(name).with_data_index(data_index),
                    row,
                    category,
                }
            })
            .collect::<Vec<_>>();

        // Group runs of adjacent nodes that have the same value in each of
        // the other series.
        for (j, name) in names.iter().enumerate().skip(1) {
            let Some(series) = self.series.get(*name) else {
                continue;
            };
            let datum_at = |row: usize| series.values.get(row).map(|value| &value.datum);
            let mut grouped = Vec::with_capacity(nodes.len());
            let mut iter = nodes.into_iter().peekable();
            while let Some(first) = iter.next() {
                let row = first.row();
                let datum = datum_at(row);
                let mut run = vec![first];
                while let Some(next) = iter.next_if(|node| datum_at(node.row()) == datum) {
                    run.push(next);
                }

                let value = series.values.get(row);
                let name = value.map(|value| series.map.lookup(value));
                let unnamed = match name {
                    None => true,
                    Some(Datum::String(s)) => s.is_empty(),
                    Some(Datum::Number(_)) => false,
                };
                if run.len() == 1 && unnamed {
                    grouped.extend(run);
                } else {
                    let mut name = name.map_or_else(|| Value::new_string(""), datum_to_value);
                    add_affixes(&mut name, series.affixes.iter().copied(), n_footnotes);
                    grouped.push(Node::Group {
                        name,
                        row,
                        children: run,
                        series: j,
                        category: value.and_then(|value| value.category()).and_then(category_index),
                    });
                }
            }
            nodes = grouped;
        }

        let mut root = Group::new(Value::new_user_text(series0.label.unwrap_or_default()))
            .with_show_label(show_label);
        let mut locations = Vec::new();
        build_group(nodes, &mut root, &mut Vec::new(), &mut locations);
        let dimension = self
            .pt
            .insert_dimension(axis, Dimension::from_root(root)?);

        for location in locations {
            if let Some(series) = self.series.get_mut(names[location.series]) {
                series.categories.insert(
                    location.category,
                    CategoryLocation {
                        dimension,
                        path: location.path,
                        data_index: location.data_index,
                    },
                );
            }
        }
        if let Some(series0) = self.series.get_mut(names[0]) {
            series0.dimension = Some(dimension);
        }
        self.dimension_series.push(names[0]);
        Ok(dimension)
    }

    fn decode_cells(
        &mut self,
        cell_format: Option<&xml::Formatting>,
        footnotes_variable: Option<&str>,
    ) -> Result<(), Error> {
        let cells = self.series.get("cell").ok_or(Error::MissingCells)?;
        let format_series = cell_format.and_then(|formatting| self.series.get(formatting.variable.as_str()));
        let format_map = cell_format.map_or_else(HashMap::new, |formatting| {
            formatting
                .mappings
                .iter()
                .filter_map(|mapping| Some((mapping.from, decode_format(mapping.format.as_ref()?))))
                .collect()
        });
        let footnotes_series = footnotes_variable.and_then(|variable| self.series.get(variable));

        'rows: for (row, cell) in cells.values.iter().enumerate() {
            let mut indexes = Vec::with_capacity(self.dimension_series.len());
            for name in &self.dimension_series {
                let Some(data_index) = self.series.get(name).and_then(|series| {
                    let category = series.values.get(row)?.category().and_then(category_index)?;
                    series.categories.get(&category)?.data_index
                }) else {
                    continue 'rows;
                };
                indexes.push(data_index);
            }

            let format_value = format_series.and_then(|series| series.values.get(row));
            let mut value = value_from_data(&cell.datum, format_value, &format_map)?;
            if let Some(Datum::String(references)) = footnotes_series
                .and_then(|series| series.values.get(row))
                .map(|value| &value.datum)
            {
                let n_footnotes = self.pt.footnotes.len();
                for reference in references.split(',').map_while(|s| s.trim().parse().ok()) {
                    add_footnote(&mut value, reference, n_footnotes);
                }
            }
            if matches!(&value.inner, ValueInner::Number(number) if number.value.is_none())
                && value.footnotes().is_empty()
            {
                continue;
            }
            self.pt.put(&indexes, value);
        }
        Ok(())
    }

    fn decode_set_cell_properties(&mut self, scp: &'a SetCellProperties) -> Result<(), Error> {
        let mut styles = TargetStyles::default();
        for set_style in scp.set_styles() {
            let style = self.style(Some(&set_style.style))?;
            match self.targets.get(set_style.target.as_str()) {
                Some(Target::Graph) => styles.graph = style,
                Some(Target::Labeling) => styles.labeling = style,
                Some(Target::Interval) => styles.interval = style,
                Some(Target::MajorTicks) => styles.major_ticks = style,
                None => (),
            }
        }
        for set_frame_style in scp.set_frame_styles() {
            styles.frame = self.style(Some(&set_frame_style.style))?;
        }
        let set_format = scp.set_format().map(|set_format| {
            let target = self.targets.get(set_format.target.as_str()).copied();
            (set_format, target)
        });

        match (scp.union(), scp.apply_to_converse == Some(true)) {
            (Some(union), false) => {
                for intersect in &union.intersects {
                    self.apply_intersect(intersect, styles, set_format);
                }
            }
            (None, true) => {
                let format_targets_labeling =
                    set_format.is_some_and(|(_, target)| target == Some(Target::Labeling));
                if format_targets_labeling || styles.labeling.is_some() || styles.interval.is_some()
                {
                    // Applies to all the cells.
                    let base = self.pt.look.areas[Area::Data].clone();
                    let n_footnotes = self.pt.footnotes.len();
                    for value in self.pt.cells.values_mut() {
                        apply_styles(
                            value,
                            set_format.map(|(set_format, _)| set_format),
                            &base,
                            styles.labeling,
                            styles.interval,
                            n_footnotes,
                        );
                    }
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn apply_intersect(
        &mut self,
        intersect: &Intersect,
        styles: TargetStyles<'a>,
        set_format: Option<(&SetFormat, Option<Target>)>,
    ) {
        let format_target = set_format.and_then(|(_, target)| target);
        let set_format = set_format.map(|(set_format, _)| set_format);
        let TargetStyles {
            graph,
            labeling,
            interval,
            major_ticks,
            frame,
        } = styles;
        let wheres = intersect.wheres().collect::<Vec<_>>();
        let n_footnotes = self.pt.footnotes.len();

        if graph.is_some()
            && labeling.is_some()
            && intersect.alternating()
            && interval.is_none()
            && major_ticks.is_none()
            && frame.is_none()
            && set_format.is_none()
        {
            // Alternating row colors.
            let alternate = decode_style(labeling, graph).font_style;
            let data = &mut self.pt.look_mut().areas[Area::Data].font_style;
            data.fg[1] = alternate.fg[0];
            data.bg[1] = alternate.bg[0];
        } else if labeling.is_none()
            && interval.is_none()
            && major_ticks.is_none()
            && frame.is_none()
            && set_format.is_none()
        {
            // Only the table's width, or nothing at all.
        } else if (format_target == Some(Target::MajorTicks)
            || major_ticks.is_some()
            || frame.is_some())
            && wheres.len() == 1
        {
            // Category labels.
            let Some(series) = self.series.get(wheres[0].variable.as_str()) else {
                return;
            };
            for include in wheres[0].include() {
                let Some(location) = usize::try_from(include)
                    .ok()
                    .and_then(|include| series.categories.get(&include))
                else {
                    continue;
                };
                let dimension = &mut self.pt.dimensions[location.dimension];
                let area = match dimension.axis_type {
                    Axis3::Y => Area::Labels(Axis2::Y),
                    _ => Area::Labels(Axis2::X),
                };
                let base = &self.pt.look.areas[area];
                if let Some(category) = category_mut(&mut dimension.root, &location.path) {
                    apply_styles(
                        category.name_mut(),
                        set_format,
                        base,
                        major_ticks,
                        frame,
                        n_footnotes,
                    );
                }
            }
        } else if format_target == Some(Target::Labeling)
            || labeling.is_some()
            || interval.is_some()
        {
            // Cells selected by category in each dimension.  A dimension
            // without a selection matches every cell.
            let mut selections: Vec<Option<HashSet<usize>>> = vec![None; self.pt.dimensions.len()];
            for w in &wheres {
                let Some(series) = self.series.get(w.variable.as_str()) else {
                    continue;
                };
                let Some(dimension) = series.dimension else {
                    continue;
                };
                for include in w.include() {
                    if let Some(location) = usize::try_from(include)
                        .ok()
                        .and_then(|include| series.categories.get(&include))
                    {
                        if let Some(data_index) = location.data_index {
                            selections[dimension]
                                .get_or_insert_default()
                                .insert(data_index);
                        }
                    }
                }
            }

            let base = &self.pt.look.areas[Area::Data];
            for (indexes, value) in self.pt.cells.iter_mut() {
                let selected = selections
                    .iter()
                    .zip(indexes.iter())
                    .all(|(selection, index)| {
                        selection
                            .as_ref()
                            .is_none_or(|selection| selection.contains(index))
                    });
                if selected {
                    apply_styles(value, set_format, base, labeling, interval, n_footnotes);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        calendar::parse_iso_date_time,
        format::Type,
        output::{
            pivot::{Area, Axis2, Axis3, Category, HeadingRegion, Look, PivotTable, ValueInner},
            spv::{
                legacy_bin::{DataValue, Datum, LegacyData, Source, Variable},
                legacy_xml::Visualization,
            },
        },
    };

    use super::{decode, Error};

    fn numbers(values: &[Option<f64>]) -> Vec<DataValue> {
        values
            .iter()
            .map(|value| DataValue {
                index: None,
                datum: Datum::Number(*value),
            })
            .collect()
    }

    fn data(variables: Vec<(&str, Vec<DataValue>)>) -> LegacyData {
        let n_values = variables.first().map_or(0, |(_, values)| values.len());
        LegacyData {
            sources: vec![Source {
                name: String::from("tableData"),
                n_values,
                variables: variables
                    .into_iter()
                    .map(|(name, values)| Variable {
                        name: name.into(),
                        values,
                    })
                    .collect(),
            }],
        }
    }

    fn decode_xml(xml: &str, data: &LegacyData) -> Result<PivotTable, Error> {
        let visualization = Visualization::from_xml(xml).unwrap();
        decode(&visualization, data, Arc::new(Look::default()), Some("Table"))
    }

    const COUNTS: &str = r##"<visualization name="Counts">
  <sourceVariable id="row" categorical="true" source="tableData" sourceName="row" label="Sex">
    <format><relabel from="0" to="Male"/><relabel from="1" to="Female"/></format>
  </sourceVariable>
  <sourceVariable id="col" categorical="true" source="tableData" sourceName="col" label="Statistics">
    <stringFormat><relabel from="0" to="N"/><relabel from="1" to="Percent"/></stringFormat>
  </sourceVariable>
  <sourceVariable id="cell" categorical="false" source="tableData" sourceName="cell"/>
  <graph id="g" cellStyle="s2">
    <faceting>
      <cross>
        <nest><variableReference ref="col"/></nest>
        <nest><variableReference ref="row"/></nest>
      </cross>
    </faceting>
    <facetLayout>
      <facetLevel level="3" gap="0pt">
        <axis><label style="s1"><text>Sex</text></label></axis>
      </facetLevel>
    </facetLayout>
    <interval id="i"><labeling id="l" variable="cell"/></interval>
  </graph>
  <labelFrame>
    <label purpose="title"><text>Counts by sex</text><text definesReference="1">a</text></label>
  </labelFrame>
  <container>
    <labelFrame>
      <label purpose="footnote"><text usesReference="1">a.</text><text usesReference="1">A note.</text></label>
    </labelFrame>
  </container>
  <style id="s1" font-weight="bold"/>
  <style id="s2" width="10%;40pt;300pt"/>
</visualization>"##;

    fn counts_data() -> LegacyData {
        data(vec![
            ("row", numbers(&[Some(0.0), Some(0.0), Some(1.0), Some(1.0)])),
            ("col", numbers(&[Some(0.0), Some(1.0), Some(0.0), Some(1.0)])),
            ("cell", numbers(&[Some(10.0), Some(50.0), Some(10.0), None])),
        ])
    }

    #[test]
    fn dimensions_and_cells() {
        let pt = decode_xml(COUNTS, &counts_data()).unwrap();
        assert_eq!(pt.dimensions.len(), 2);

        let columns = &pt.dimensions[0];
        assert_eq!(columns.axis_type, Axis3::X);
        assert_eq!(columns.root.name.display(()).to_string(), "Statistics");
        assert!(!columns.root.show_label);
        let names = (0..2)
            .map(|i| columns.data_leaf(i).unwrap().name.display(()).to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["N", "Percent"]);

        let rows = &pt.dimensions[1];
        assert_eq!(rows.axis_type, Axis3::Y);
        assert!(rows.root.show_label);
        let names = (0..2)
            .map(|i| rows.data_leaf(i).unwrap().name.display(()).to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Male", "Female"]);
        assert!(pt.look.areas[Area::Labels(Axis2::Y)].font_style.bold);

        assert_eq!(pt.get(&[0, 0]).unwrap().display(()).to_string(), "10.00");
        assert_eq!(pt.get(&[1, 0]).unwrap().display(()).to_string(), "50.00");
        assert_eq!(pt.get(&[0, 1]).unwrap().display(()).to_string(), "10.00");
        assert!(pt.get(&[1, 1]).is_none());

        assert_eq!(
            pt.look.heading_widths[HeadingRegion::Columns],
            40..=300
        );
    }

    #[test]
    fn title_and_footnote() {
        let pt = decode_xml(COUNTS, &counts_data()).unwrap();
        let title = pt.title.as_ref().unwrap();
        assert_eq!(title.display(()).without_suffixes().to_string(), "Counts by sex");
        assert_eq!(title.footnotes(), &[0]);
        assert_eq!(pt.footnotes.len(), 1);
        let footnote = &pt.footnotes[0];
        assert_eq!(footnote.content.display(()).to_string(), "A note.");
        assert_eq!(
            footnote.marker.as_ref().unwrap().display(()).to_string(),
            "a"
        );
        assert_eq!(
            pt.subtype.as_ref().unwrap().display(()).to_string(),
            "Table"
        );
    }

    #[test]
    fn groups() {
        let xml = r##"<visualization name="Groups">
  <sourceVariable id="names" categorical="true" source="tableData" sourceName="names"/>
  <sourceVariable id="a" categorical="true" source="tableData" sourceName="a" label="Items" labelVariable="names"/>
  <derivedVariable id="group" categorical="true" value="map(a)">
    <valueMapEntry from="0;1" to="G1"/>
    <valueMapEntry from="2" to=""/>
  </derivedVariable>
  <sourceVariable id="cell" categorical="false" source="tableData" sourceName="cell"/>
  <graph>
    <faceting>
      <cross>
        <unity/>
        <nest><variableReference ref="a"/><variableReference ref="group"/></nest>
      </cross>
    </faceting>
  </graph>
</visualization>"##;
        let data = data(vec![
            ("a", numbers(&[Some(0.0), Some(1.0), Some(2.0)])),
            (
                "names",
                ["X", "Y", "Z"]
                    .into_iter()
                    .map(|name| DataValue {
                        index: None,
                        datum: Datum::String(name.into()),
                    })
                    .collect(),
            ),
            ("cell", numbers(&[Some(1.0), Some(2.0), Some(3.0)])),
        ]);
        let pt = decode_xml(xml, &data).unwrap();
        assert_eq!(pt.dimensions.len(), 1);
        let root = &pt.dimensions[0].root;
        assert_eq!(pt.dimensions[0].axis_type, Axis3::Y);
        assert_eq!(root.children.len(), 2);
        let Category::Group(group) = &root.children[0] else {
            panic!()
        };
        assert_eq!(group.name.display(()).to_string(), "G1");
        assert!(group.show_label);
        assert_eq!(group.children.len(), 2);
        let Category::Leaf(first) = &group.children[0] else {
            panic!()
        };
        assert_eq!(first.name.display(()).to_string(), "X");
        let Category::Leaf(leaf) = &root.children[1] else {
            panic!()
        };
        assert_eq!(leaf.name.display(()).to_string(), "Z");
        assert_eq!(leaf.data_index, 2);
        assert_eq!(pt.get(&[2]).unwrap().display(()).to_string(), "3.00");
    }

    #[test]
    fn date_cells() {
        let xml = r##"<visualization name="Dates">
  <sourceVariable id="col" categorical="true" source="tableData" sourceName="col"/>
  <sourceVariable id="cell" categorical="false" source="tableData" sourceName="cell"/>
  <sourceVariable id="cellFormat" categorical="false" source="tableData" sourceName="cellFormat"/>
  <graph>
    <faceting>
      <cross>
        <nest><variableReference ref="col"/></nest>
        <unity/>
      </cross>
    </faceting>
    <interval>
      <labeling variable="cell">
        <formatting variable="cellFormat">
          <formatMapping from="1">
            <format baseFormat="date" mdyOrder="dayMonthYear" monthFormat="short"/>
          </formatMapping>
        </formatting>
      </labeling>
    </interval>
  </graph>
</visualization>"##;
        let data = data(vec![
            ("col", numbers(&[Some(0.0)])),
            (
                "cell",
                vec![DataValue {
                    index: None,
                    datum: Datum::String(String::from("2020-01-15T00:00:00.000")),
                }],
            ),
            ("cellFormat", numbers(&[Some(1.0)])),
        ]);
        let pt = decode_xml(xml, &data).unwrap();
        let ValueInner::Number(number) = &pt.get(&[0]).unwrap().inner else {
            panic!()
        };
        assert_eq!(number.value, parse_iso_date_time("2020-01-15T00:00:00.000"));
        let format = number.format.unwrap();
        assert_eq!(format.type_(), Type::Date);
        assert_eq!(format.w(), 11);
    }

    #[test]
    fn circular_references() {
        let xml = r##"<visualization name="Circular">
  <derivedVariable id="x" categorical="true" value="map(y)"/>
  <derivedVariable id="y" categorical="true" value="map(x)"/>
  <graph/>
</visualization>"##;
        assert_eq!(
            decode_xml(xml, &LegacyData::default()).unwrap_err(),
            Error::CircularReferences {
                n: 2,
                id: String::from("x")
            }
        );
    }

    #[test]
    fn missing_cells() {
        let xml = r##"<visualization name="Empty">
  <sourceVariable id="col" categorical="true" source="tableData" sourceName="col"/>
  <graph>
    <faceting><cross><nest><variableReference ref="col"/></nest><unity/></cross></faceting>
  </graph>
</visualization>"##;
        let data = data(vec![("col", numbers(&[Some(0.0)]))]);
        assert_eq!(decode_xml(xml, &data).unwrap_err(), Error::MissingCells);
        assert_eq!(
            decode_xml(r#"<visualization name="x"/>"#, &data).unwrap_err(),
            Error::MissingGraph
        );
    }
}
