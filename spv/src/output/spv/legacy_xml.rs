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

//! The `visualization` XML that describes how to build a legacy table out of
//! its data.
//!
//! Only the elements and attributes that affect the decoded table are
//! represented.  Everything else is skipped.  Elements that may appear in
//! any order, or that repeat around other elements, are collected through
//! `$value` enums so that their document order is kept.

use std::collections::HashMap;

use quick_xml::de::{from_str, DeError};
use serde::Deserialize;

use crate::output::pivot::{
    look_xml::{
        Dimension as Length, FontStyle, FontUnderline, FontWeight, LabelLocationVertical,
        TextAlignment,
    },
    Color,
};

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Visualization {
    /// The table's title.
    #[serde(rename = "@name")]
    pub name: Option<String>,

    #[serde(rename = "$value")]
    children: Vec<VisualizationChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum VisualizationChild {
    VisualizationExtension(VisualizationExtension),
    SourceVariable(SourceVariable),
    DerivedVariable(DerivedVariable),
    Graph(Graph),
    LabelFrame(LabelFrame),
    Container(Container),
    Style(Style),
    #[serde(other)]
    Other,
}

impl Visualization {
    pub fn from_xml(xml: &str) -> Result<Self, DeError> {
        from_str(xml)
    }

    pub fn extension(&self) -> Option<&VisualizationExtension> {
        self.children.iter().find_map(|child| match child {
            VisualizationChild::VisualizationExtension(extension) => Some(extension),
            _ => None,
        })
    }

    /// The source and derived variables, in document order.
    pub fn variables(&self) -> impl Iterator<Item = Variable<'_>> {
        self.children.iter().filter_map(|child| match child {
            VisualizationChild::SourceVariable(variable) => Some(Variable::Source(variable)),
            VisualizationChild::DerivedVariable(variable) => Some(Variable::Derived(variable)),
            _ => None,
        })
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.children.iter().find_map(|child| match child {
            VisualizationChild::Graph(graph) => Some(graph),
            _ => None,
        })
    }

    /// The label frames that are direct children of the visualization.
    pub fn label_frames(&self) -> impl Iterator<Item = &LabelFrame> {
        self.children.iter().filter_map(|child| match child {
            VisualizationChild::LabelFrame(label_frame) => Some(label_frame),
            _ => None,
        })
    }

    pub fn container(&self) -> Option<&Container> {
        self.children.iter().find_map(|child| match child {
            VisualizationChild::Container(container) => Some(container),
            _ => None,
        })
    }

    /// Returns all the `style` elements, indexed by their `id`.
    pub fn styles(&self) -> HashMap<&str, &Style> {
        self.children
            .iter()
            .filter_map(|child| match child {
                VisualizationChild::Style(style) => Some((style.id.as_deref()?, style)),
                _ => None,
            })
            .collect()
    }

    /// Returns the kind of element that each `setStyle` or `setFormat`
    /// target may name, indexed by `id`.
    pub fn targets(&self) -> HashMap<&str, Target> {
        let mut targets = HashMap::new();
        let Some(graph) = self.graph() else {
            return targets;
        };
        if let Some(id) = &graph.id {
            targets.insert(id.as_str(), Target::Graph);
        }
        if let Some(interval) = &graph.interval {
            if let Some(id) = &interval.id {
                targets.insert(id.as_str(), Target::Interval);
            }
            if let Some(id) = &interval.labeling.id {
                targets.insert(id.as_str(), Target::Labeling);
            }
        }
        for level in graph.facet_levels() {
            if let Some(major_ticks) = &level.axis.major_ticks {
                if let Some(id) = &major_ticks.id {
                    targets.insert(id.as_str(), Target::MajorTicks);
                }
            }
        }
        targets
    }
}

/// What a `setStyle`, `setFrameStyle`, or `setFormat` element applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Graph,
    Labeling,
    Interval,
    MajorTicks,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct VisualizationExtension {
    #[serde(rename = "@showGridline")]
    pub show_gridline: Option<bool>,
}

/// A source or derived variable.
#[derive(Copy, Clone, Debug)]
pub enum Variable<'a> {
    Source(&'a SourceVariable),
    Derived(&'a DerivedVariable),
}

impl<'a> Variable<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            Variable::Source(variable) => &variable.id,
            Variable::Derived(variable) => &variable.id,
        }
    }
}

/// A variable whose values come from the table's data.
#[derive(Deserialize, Debug)]
pub struct SourceVariable {
    #[serde(rename = "@id")]
    pub id: String,

    /// Name of the data source.
    #[serde(rename = "@source")]
    pub source: String,

    /// Name of the variable within `source`.
    #[serde(rename = "@sourceName")]
    pub source_name: String,

    #[serde(rename = "@label", default)]
    pub label: Option<String>,

    /// Another variable whose values label this one's.
    #[serde(rename = "@labelVariable", default)]
    pub label_variable: Option<String>,

    #[serde(rename = "$value", default)]
    children: Vec<VariableChild>,
}

impl SourceVariable {
    pub fn formats(&self) -> impl Iterator<Item = VariableFormat<'_>> {
        formats(&self.children)
    }
}

/// A variable computed from other variables.
#[derive(Deserialize, Debug)]
pub struct DerivedVariable {
    #[serde(rename = "@id")]
    pub id: String,

    /// An expression: `constant(0)`, `constant(...)`, or `map(id)`.
    #[serde(rename = "@value")]
    pub value: String,

    #[serde(rename = "$value", default)]
    children: Vec<VariableChild>,
}

impl DerivedVariable {
    pub fn formats(&self) -> impl Iterator<Item = VariableFormat<'_>> {
        formats(&self.children)
    }

    pub fn value_map_entries(&self) -> impl Iterator<Item = &ValueMapEntry> {
        self.children.iter().filter_map(|child| match child {
            VariableChild::ValueMapEntry(entry) => Some(entry),
            _ => None,
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum VariableChild {
    Format(Format),
    StringFormat(StringFormat),
    ValueMapEntry(ValueMapEntry),
    #[serde(other)]
    Other,
}

/// The formatting attached to a variable.
#[derive(Copy, Clone, Debug)]
pub enum VariableFormat<'a> {
    Format(&'a Format),
    StringFormat(&'a StringFormat),
}

fn formats(children: &[VariableChild]) -> impl Iterator<Item = VariableFormat<'_>> {
    children.iter().filter_map(|child| match child {
        VariableChild::Format(format) => Some(VariableFormat::Format(format)),
        VariableChild::StringFormat(format) => Some(VariableFormat::StringFormat(format)),
        _ => None,
    })
}

/// Maps one or more numbers, separated by `;`, to a new value.
#[derive(Deserialize, Debug)]
pub struct ValueMapEntry {
    #[serde(rename = "@from")]
    pub from: String,

    #[serde(rename = "@to")]
    pub to: String,
}

/// A number, date, or time format.  The same attributes serve `format`,
/// `numberFormat`, `dateTimeFormat`, and `elapsedTimeFormat`.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Format {
    #[serde(rename = "@baseFormat")]
    pub base_format: Option<BaseFormat>,

    #[serde(rename = "@mdyOrder")]
    pub mdy_order: Option<MdyOrder>,

    #[serde(rename = "@yearAbbreviation")]
    pub year_abbreviation: Option<bool>,

    #[serde(rename = "@showQuarter")]
    pub show_quarter: Option<bool>,

    #[serde(rename = "@showWeek")]
    pub show_week: Option<bool>,

    #[serde(rename = "@monthFormat")]
    pub month_format: Option<MonthFormat>,

    #[serde(rename = "@showDay")]
    pub show_day: Option<bool>,

    #[serde(rename = "@showHour")]
    pub show_hour: Option<bool>,

    #[serde(rename = "@showSecond")]
    pub show_second: Option<bool>,

    #[serde(rename = "@showMillis")]
    pub show_millis: Option<bool>,

    #[serde(rename = "@maximumFractionDigits")]
    pub maximum_fraction_digits: Option<i32>,

    #[serde(rename = "@useGrouping")]
    pub use_grouping: Option<bool>,

    #[serde(rename = "@scientific")]
    pub scientific: Option<Scientific>,

    #[serde(rename = "@prefix")]
    pub prefix: Option<String>,

    #[serde(rename = "@suffix")]
    pub suffix: Option<String>,

    #[serde(rename = "@tryStringsAsNumbers")]
    pub try_strings_as_numbers: Option<bool>,

    #[serde(rename = "$value")]
    children: Vec<FormatChild>,
}

impl Format {
    pub fn relabels(&self) -> impl Iterator<Item = &Relabel> {
        relabels(&self.children)
    }

    pub fn affixes(&self) -> impl Iterator<Item = &Affix> {
        affixes(&self.children)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct StringFormat {
    #[serde(rename = "$value")]
    children: Vec<FormatChild>,
}

impl StringFormat {
    pub fn relabels(&self) -> impl Iterator<Item = &Relabel> {
        relabels(&self.children)
    }

    pub fn affixes(&self) -> impl Iterator<Item = &Affix> {
        affixes(&self.children)
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum FormatChild {
    Relabel(Relabel),
    Affix(Affix),
    #[serde(other)]
    Other,
}

fn relabels(children: &[FormatChild]) -> impl Iterator<Item = &Relabel> {
    children.iter().filter_map(|child| match child {
        FormatChild::Relabel(relabel) => Some(relabel),
        _ => None,
    })
}

fn affixes(children: &[FormatChild]) -> impl Iterator<Item = &Affix> {
    children.iter().filter_map(|child| match child {
        FormatChild::Affix(affix) => Some(affix),
        _ => None,
    })
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BaseFormat {
    Date,
    Time,
    DateTime,
    ElapsedTime,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MdyOrder {
    DayMonthYear,
    MonthDayYear,
    YearMonthDay,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MonthFormat {
    Long,
    Short,
    Number,
    PaddedNumber,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Scientific {
    OnlyForSmall,
    WhenNeeded,
    True,
    False,
}

/// Replaces the value `from` by the string `to`.
#[derive(Deserialize, Debug)]
pub struct Relabel {
    #[serde(rename = "@from")]
    pub from: f64,

    #[serde(rename = "@to")]
    pub to: String,
}

/// A footnote reference attached to a value.
#[derive(Deserialize, Debug)]
pub struct Affix {
    /// 1-based footnote index.
    #[serde(rename = "@definesReference")]
    pub defines_reference: i32,

    #[serde(rename = "@value", default)]
    pub value: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Style {
    #[serde(rename = "@id")]
    pub id: Option<String>,

    #[serde(rename = "@color")]
    pub color: Option<Color>,

    #[serde(rename = "@font-family")]
    pub font_family: Option<String>,

    #[serde(rename = "@font-size")]
    pub font_size: Option<String>,

    #[serde(rename = "@font-style")]
    pub font_style: Option<FontStyle>,

    #[serde(rename = "@font-weight")]
    pub font_weight: Option<FontWeight>,

    #[serde(rename = "@font-underline")]
    pub font_underline: Option<FontUnderline>,

    #[serde(rename = "@textAlignment")]
    pub text_alignment: Option<TextAlignment>,

    #[serde(rename = "@labelLocationVertical")]
    pub label_location_vertical: Option<LabelLocationVertical>,

    #[serde(rename = "@decimal-offset")]
    pub decimal_offset: Option<Length>,

    /// Something like `10%;40pt;720pt`.
    #[serde(rename = "@width")]
    pub width: Option<String>,

    #[serde(rename = "@visible")]
    pub visible: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Graph {
    #[serde(rename = "@id")]
    pub id: Option<String>,

    /// Reference to a [Style].
    #[serde(rename = "@cellStyle")]
    pub cell_style: Option<String>,

    pub faceting: Faceting,
    pub facet_layout: FacetLayout,
    pub interval: Option<Interval>,
}

impl Graph {
    pub fn facet_levels(&self) -> impl Iterator<Item = &FacetLevel> {
        self.facet_layout.children.iter().filter_map(|child| match child {
            FacetLayoutChild::FacetLevel(level) => Some(level),
            _ => None,
        })
    }

    pub fn facet_level(&self, level: usize) -> Option<&FacetLevel> {
        self.facet_levels()
            .find(|facet_level| facet_level.level == level as i64)
    }

    pub fn set_cell_properties(&self) -> impl Iterator<Item = &SetCellProperties> {
        self.facet_layout.children.iter().filter_map(|child| match child {
            FacetLayoutChild::SetCellProperties(scp) => Some(scp),
            _ => None,
        })
    }
}

/// How the variables are arranged into rows, columns, and layers.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Faceting {
    #[serde(rename = "$value")]
    children: Vec<FacetingChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum FacetingChild {
    Layer(Layer),
    Cross(Cross),
    #[serde(other)]
    Other,
}

impl Faceting {
    fn cross(&self) -> Option<&Cross> {
        self.children.iter().find_map(|child| match child {
            FacetingChild::Cross(cross) => Some(cross),
            _ => None,
        })
    }

    /// Returns the nests for the columns and the rows, in that order.
    pub fn nests(&self) -> (Option<&Nest>, Option<&Nest>) {
        let mut nests = self
            .cross()
            .into_iter()
            .flat_map(|cross| cross.children.iter())
            .filter_map(|child| match child {
                CrossChild::Nest(nest) => Some(Some(nest)),
                CrossChild::Unity => Some(None),
                CrossChild::Other => None,
            });
        let columns = nests.next().flatten();
        let rows = nests.next().flatten();
        (columns, rows)
    }

    /// Returns the layers that precede the `cross` element and those that
    /// follow it.
    pub fn layers(&self) -> (Vec<&Layer>, Vec<&Layer>) {
        let mut before = Vec::new();
        let mut after = Vec::new();
        let mut seen_cross = false;
        for child in &self.children {
            match child {
                FacetingChild::Layer(layer) if seen_cross => after.push(layer),
                FacetingChild::Layer(layer) => before.push(layer),
                FacetingChild::Cross(_) => seen_cross = true,
                FacetingChild::Other => (),
            }
        }
        (before, after)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Cross {
    #[serde(rename = "$value")]
    children: Vec<CrossChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum CrossChild {
    Unity,
    Nest(Nest),
    #[serde(other)]
    Other,
}

/// Variables nested along one axis.  The first supplies the leaf
/// categories, and each later one groups the categories before it.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Nest {
    #[serde(rename = "variableReference")]
    pub variables: Vec<VariableReference>,
}

#[derive(Deserialize, Debug)]
pub struct VariableReference {
    #[serde(rename = "@ref")]
    pub reference: String,
}

#[derive(Deserialize, Debug)]
pub struct Layer {
    #[serde(rename = "@variable")]
    pub variable: String,

    /// The initially displayed category.
    #[serde(rename = "@value", default)]
    pub value: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct FacetLayout {
    #[serde(rename = "$value")]
    children: Vec<FacetLayoutChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum FacetLayoutChild {
    SetCellProperties(SetCellProperties),
    FacetLevel(FacetLevel),
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
pub struct FacetLevel {
    #[serde(rename = "@level")]
    pub level: i64,

    pub axis: Axis,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Axis {
    pub label: Option<Label>,
    pub major_ticks: Option<MajorTicks>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct MajorTicks {
    #[serde(rename = "@id")]
    pub id: Option<String>,

    #[serde(rename = "@labelAngle")]
    pub label_angle: Option<f64>,

    #[serde(rename = "@style")]
    pub style: Option<String>,

    #[serde(rename = "@tickFrameStyle")]
    pub tick_frame_style: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Label {
    #[serde(rename = "@style")]
    pub style: Option<String>,

    #[serde(rename = "@textFrameStyle")]
    pub text_frame_style: Option<String>,

    #[serde(rename = "@purpose")]
    pub purpose: Option<Purpose>,

    #[serde(rename = "$value")]
    children: Vec<LabelChild>,
}

impl Label {
    pub fn texts(&self) -> impl Iterator<Item = &Text> {
        self.children.iter().filter_map(|child| match child {
            LabelChild::Text(text) => Some(text),
            LabelChild::Other => None,
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum LabelChild {
    Text(Text),
    #[serde(other)]
    Other,
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Purpose {
    Title,
    SubTitle,
    SubSubTitle,
    Layer,
    Footnote,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Text {
    /// 1-based index of a footnote that this text is part of.
    #[serde(rename = "@usesReference")]
    pub uses_reference: Option<i32>,

    /// 1-based index of a footnote that this text marks.
    #[serde(rename = "@definesReference")]
    pub defines_reference: Option<i32>,

    #[serde(rename = "$text")]
    pub text: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Interval {
    #[serde(rename = "@id")]
    pub id: Option<String>,

    pub labeling: Labeling,
    pub footnotes: Option<Footnotes>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Labeling {
    #[serde(rename = "@id")]
    pub id: Option<String>,

    #[serde(rename = "@style")]
    pub style: Option<String>,

    #[serde(rename = "$value")]
    children: Vec<LabelingChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum LabelingChild {
    Formatting(Formatting),
    Footnotes(Footnotes),
    #[serde(other)]
    Other,
}

impl Labeling {
    pub fn formattings(&self) -> impl Iterator<Item = &Formatting> {
        self.children.iter().filter_map(|child| match child {
            LabelingChild::Formatting(formatting) => Some(formatting),
            _ => None,
        })
    }

    pub fn footnotes(&self) -> impl Iterator<Item = &Footnotes> {
        self.children.iter().filter_map(|child| match child {
            LabelingChild::Footnotes(footnotes) => Some(footnotes),
            _ => None,
        })
    }
}

/// Names the variable that holds each cell's format.
#[derive(Deserialize, Debug)]
pub struct Formatting {
    #[serde(rename = "@variable")]
    pub variable: String,

    #[serde(rename = "formatMapping", default)]
    pub mappings: Vec<FormatMapping>,
}

#[derive(Deserialize, Debug)]
pub struct FormatMapping {
    #[serde(rename = "@from")]
    pub from: u32,

    #[serde(default)]
    pub format: Option<Format>,
}

/// Footnote markers, and optionally the variable that holds each cell's
/// footnote references.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Footnotes {
    #[serde(rename = "@variable")]
    pub variable: Option<String>,

    #[serde(rename = "footnoteMapping")]
    pub mappings: Vec<FootnoteMapping>,
}

#[derive(Deserialize, Debug)]
pub struct FootnoteMapping {
    #[serde(rename = "@definesReference")]
    pub defines_reference: i32,

    /// The marker.
    #[serde(rename = "@to")]
    pub to: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LabelFrame {
    pub label: Option<Label>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Container {
    #[serde(rename = "labelFrame")]
    pub label_frames: Vec<LabelFrame>,
}

/// Styles or formats a slice of the table.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SetCellProperties {
    #[serde(rename = "@applyToConverse")]
    pub apply_to_converse: Option<bool>,

    #[serde(rename = "$value")]
    children: Vec<SetCellPropertiesChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum SetCellPropertiesChild {
    SetStyle(SetStyle),
    SetFrameStyle(SetStyle),
    SetFormat(SetFormat),
    Union(Union),
    #[serde(other)]
    Other,
}

impl SetCellProperties {
    pub fn set_styles(&self) -> impl Iterator<Item = &SetStyle> {
        self.children.iter().filter_map(|child| match child {
            SetCellPropertiesChild::SetStyle(set_style) => Some(set_style),
            _ => None,
        })
    }

    pub fn set_frame_styles(&self) -> impl Iterator<Item = &SetStyle> {
        self.children.iter().filter_map(|child| match child {
            SetCellPropertiesChild::SetFrameStyle(set_style) => Some(set_style),
            _ => None,
        })
    }

    pub fn set_format(&self) -> Option<&SetFormat> {
        self.children.iter().rev().find_map(|child| match child {
            SetCellPropertiesChild::SetFormat(set_format) => Some(set_format),
            _ => None,
        })
    }

    pub fn union(&self) -> Option<&Union> {
        self.children.iter().find_map(|child| match child {
            SetCellPropertiesChild::Union(union) => Some(union),
            _ => None,
        })
    }
}

/// A `setStyle` or `setFrameStyle` element.
#[derive(Deserialize, Debug)]
pub struct SetStyle {
    #[serde(rename = "@target")]
    pub target: String,

    /// Reference to a [Style].
    #[serde(rename = "@style")]
    pub style: String,
}

#[derive(Deserialize, Debug)]
pub struct SetFormat {
    #[serde(rename = "@target")]
    pub target: String,

    /// Whether to discard the existing footnotes.
    #[serde(rename = "@reset", default)]
    pub reset: Option<bool>,

    #[serde(rename = "$value", default)]
    children: Vec<SetFormatChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum SetFormatChild {
    Format(Format),
    NumberFormat(Format),
    StringFormat(StringFormat),
    DateTimeFormat(Format),
    ElapsedTimeFormat(Format),
    #[serde(other)]
    Other,
}

/// The format that a `setFormat` applies.
#[derive(Copy, Clone, Debug)]
pub enum SetFormatKind<'a> {
    Format(&'a Format),
    Number(&'a Format),
    DateTime(&'a Format),
    ElapsedTime(&'a Format),
}

impl SetFormat {
    /// Returns the format, unless only string formats are present.
    pub fn kind(&self) -> Option<SetFormatKind<'_>> {
        self.children.iter().find_map(|child| match child {
            SetFormatChild::Format(format) => Some(SetFormatKind::Format(format)),
            SetFormatChild::NumberFormat(format) => Some(SetFormatKind::Number(format)),
            SetFormatChild::DateTimeFormat(format) => Some(SetFormatKind::DateTime(format)),
            SetFormatChild::ElapsedTimeFormat(format) => {
                Some(SetFormatKind::ElapsedTime(format))
            }
            SetFormatChild::StringFormat(_) | SetFormatChild::Other => None,
        })
    }

    pub fn string_formats(&self) -> impl Iterator<Item = &StringFormat> {
        self.children.iter().filter_map(|child| match child {
            SetFormatChild::StringFormat(format) => Some(format),
            _ => None,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Union {
    #[serde(rename = "intersect")]
    pub intersects: Vec<Intersect>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Intersect {
    #[serde(rename = "$value")]
    children: Vec<IntersectChild>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
enum IntersectChild {
    Where(Where),
    Alternating,
    #[serde(other)]
    Other,
}

impl Intersect {
    pub fn wheres(&self) -> impl Iterator<Item = &Where> {
        self.children.iter().filter_map(|child| match child {
            IntersectChild::Where(w) => Some(w),
            _ => None,
        })
    }

    pub fn alternating(&self) -> bool {
        self.children
            .iter()
            .any(|child| matches!(child, IntersectChild::Alternating))
    }
}

/// Selects categories of `variable` by their indexes, separated by `;`.
#[derive(Deserialize, Debug)]
pub struct Where {
    #[serde(rename = "@variable")]
    pub variable: String,

    #[serde(rename = "@include", default)]
    pub include: String,
}

impl Where {
    pub fn include(&self) -> impl Iterator<Item = i64> + '_ {
        self.include
            .split(';')
            .map_while(|s| s.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use crate::output::pivot::Color;

    use super::{BaseFormat, Purpose, Target, Variable, Visualization};

    const XML: &str = r##"<visualization xmlns="http://xml.spss.com/visualization" name="Statistics" style="s1">
  <visualizationExtension showGridline="true"/>
  <userSource missingValueDisplay="hide"/>
  <sourceVariable id="a" categorical="true" source="tableData" sourceName="a" label="Variables">
    <variableExtension from="0" helpId="x"/>
    <stringFormat>
      <relabel from="0" to="Mean"/>
      <affix definesReference="1" position="superscript" suffix="true" value="a"/>
    </stringFormat>
  </sourceVariable>
  <derivedVariable id="dimension0group0map" categorical="true" value="map(a)">
    <valueMapEntry from="0;1" to="Group"/>
  </derivedVariable>
  <sourceVariable id="cell" categorical="false" source="tableData" sourceName="cell">
    <format baseFormat="date" mdyOrder="yearMonthDay" maximumFractionDigits="3" tryStringsAsNumbers="false"/>
  </sourceVariable>
  <graph id="g" cellStyle="s2" style="s3">
    <location part="height" method="sizeToContent"/>
    <coordinates/>
    <faceting>
      <layer variable="a" value="0" visible="true"/>
      <cross>
        <unity/>
        <nest>
          <variableReference ref="a"/>
          <variableReference ref="dimension0group0map"/>
        </nest>
      </cross>
    </faceting>
    <facetLayout>
      <tableLayout verticalTitlesInCorner="true"/>
      <setCellProperties applyToConverse="true">
        <setFormat target="l" reset="true"><numberFormat maximumFractionDigits="1"/></setFormat>
      </setCellProperties>
      <facetLevel level="1" gap="0pt">
        <axis style="s4">
          <label style="s5" purpose="layer"><text>Layer</text></label>
          <majorTicks id="t" labelAngle="-90" length="0pt" style="s6" tickFrameStyle="s7"/>
        </axis>
      </facetLevel>
      <setCellProperties>
        <setStyle target="t" style="s8"/>
        <union><intersect><where variable="a" include="0;2"/><alternating/></intersect></union>
      </setCellProperties>
    </facetLayout>
    <interval id="i" style="s9">
      <labeling id="l" style="s10" variable="cell">
        <formatting variable="cellFormat"><formatMapping from="327683"><format maximumFractionDigits="2"/></formatMapping></formatting>
        <footnotes variable="footnotes"><footnoteMapping definesReference="1" from="1" to="a"/></footnotes>
      </labeling>
    </interval>
  </graph>
  <labelFrame style="s11">
    <location part="top" method="attach" target="g"/>
    <label style="s12" purpose="title"><text>Title</text><text definesReference="1">a</text></label>
  </labelFrame>
  <container style="s13">
    <labelFrame><label purpose="footnote"><text usesReference="1">a.</text><text usesReference="1">Note.</text></label></labelFrame>
  </container>
  <style id="s1" color="#000000" font-size="9pt" font-weight="bold" visible="false"/>
  <style id="s2" width="10%;40pt;300pt"/>
</visualization>"##;

    #[test]
    fn parse() {
        let v = Visualization::from_xml(XML).unwrap();
        assert_eq!(v.name.as_deref(), Some("Statistics"));
        assert_eq!(v.extension().unwrap().show_gridline, Some(true));

        let ids = v.variables().map(|v| v.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids, ["a", "dimension0group0map", "cell"]);
        let Some(Variable::Derived(derived)) = v.variables().nth(1) else {
            panic!()
        };
        assert_eq!(derived.value, "map(a)");
        assert_eq!(derived.value_map_entries().next().unwrap().from, "0;1");

        let graph = v.graph().unwrap();
        let (columns, rows) = graph.faceting.nests();
        assert!(columns.is_none());
        let refs = rows
            .unwrap()
            .variables
            .iter()
            .map(|r| r.reference.as_str())
            .collect::<Vec<_>>();
        assert_eq!(refs, ["a", "dimension0group0map"]);
        let (before, after) = graph.faceting.layers();
        assert_eq!(before.len(), 1);
        assert!(after.is_empty());
        assert_eq!(before[0].value, "0");

        assert_eq!(graph.set_cell_properties().count(), 2);
        let level = graph.facet_level(1).unwrap();
        assert_eq!(level.axis.major_ticks.as_ref().unwrap().label_angle, Some(-90.0));
        let label = level.axis.label.as_ref().unwrap();
        assert_eq!(label.purpose, Some(Purpose::Layer));

        let scp = graph.set_cell_properties().nth(1).unwrap();
        let intersect = &scp.union().unwrap().intersects[0];
        assert!(intersect.alternating());
        assert_eq!(
            intersect.wheres().next().unwrap().include().collect::<Vec<_>>(),
            [0, 2]
        );

        let interval = graph.interval.as_ref().unwrap();
        let formatting = interval.labeling.formattings().next().unwrap();
        assert_eq!(formatting.mappings[0].from, 327683);
        assert_eq!(
            interval.labeling.footnotes().next().unwrap().mappings[0].to,
            "a"
        );

        let title = v.label_frames().next().unwrap().label.as_ref().unwrap();
        let texts = title.texts().collect::<Vec<_>>();
        assert_eq!(texts[0].text, "Title");
        assert_eq!(texts[1].defines_reference, Some(1));
        assert_eq!(v.container().unwrap().label_frames.len(), 1);

        let styles = v.styles();
        assert_eq!(styles["s1"].color, Some(Color::BLACK));
        assert_eq!(styles["s1"].visible, Some(false));
        assert_eq!(styles["s2"].width.as_deref(), Some("10%;40pt;300pt"));

        let targets = v.targets();
        assert_eq!(targets["g"], Target::Graph);
        assert_eq!(targets["l"], Target::Labeling);
        assert_eq!(targets["i"], Target::Interval);
        assert_eq!(targets["t"], Target::MajorTicks);
    }

    #[test]
    fn cell_format() {
        let v = Visualization::from_xml(XML).unwrap();
        let Some(Variable::Source(cell)) = v.variables().nth(2) else {
            panic!()
        };
        let super::VariableFormat::Format(format) = cell.formats().next().unwrap() else {
            panic!()
        };
        assert_eq!(format.base_format, Some(BaseFormat::Date));
        assert_eq!(format.maximum_fraction_digits, Some(3));
        assert_eq!(format.try_strings_as_numbers, Some(false));
    }
}
