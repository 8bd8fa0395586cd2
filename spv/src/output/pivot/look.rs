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

//! Styling for pivot tables.
//!
//! A [Look] is shared among tables through an [`Arc`](std::sync::Arc), so that a table decoded
//! from an SPV file can point to the same look as every other table that did
//! not customize it.  A table that needs to change its look unshares it first
//! with [`Arc::make_mut`](std::sync::Arc::make_mut).

use std::{
    fmt::{Debug, Display},
    ops::{Not, RangeInclusive},
    str::FromStr,
};

pub use color::ParseError as ParseColorError;
use color::{palette::css::TRANSPARENT, AlphaColor, Rgba8, Srgb};
use enum_map::{enum_map, Enum, EnumMap};
use quick_xml::{de::from_str, DeError};
use serde::{de::Visitor, Deserialize};

use super::look_xml::TableProperties;
use crate::format::Decimal;

/// Areas of a pivot table for styling purposes.
#[derive(Copy, Clone, Debug, Default, Enum, PartialEq, Eq)]
pub enum Area {
    Title,
    Caption,

    /// Footnotes,
    Footer,

    // Top-left corner.
    Corner,

    /// Labels for columns ([Axis2::X]) and rows ([Axis2::Y]).
    Labels(Axis2),

    #[default]
    Data,

    /// Layer indication.
    Layers,
}

impl Area {
    fn default_cell_style(self) -> CellStyle {
        use HorzAlign::*;
        use VertAlign::*;
        let (horz_align, vert_align, hmargins, vmargins) = match self {
            Area::Title => (Some(Center), Middle, [8, 11], [1, 8]),
            Area::Caption => (Some(Left), Top, [8, 11], [1, 1]),
            Area::Footer => (Some(Left), Top, [11, 8], [2, 3]),
            Area::Corner => (Some(Left), Bottom, [8, 11], [1, 1]),
            Area::Labels(Axis2::X) => (Some(Center), Top, [8, 11], [1, 3]),
            Area::Labels(Axis2::Y) => (Some(Left), Top, [8, 11], [1, 3]),
            Area::Data => (None, Top, [8, 11], [1, 1]),
            Area::Layers => (Some(Left), Bottom, [8, 11], [1, 3]),
        };
        CellStyle {
            horz_align,
            vert_align,
            margins: enum_map! { Axis2::X => hmargins, Axis2::Y => vmargins },
        }
    }

    fn default_font_style(self) -> FontStyle {
        FontStyle {
            bold: self == Area::Title,
            ..FontStyle::default()
        }
    }

    pub fn default_area_style(self) -> AreaStyle {
        AreaStyle {
            cell_style: self.default_cell_style(),
            font_style: self.default_font_style(),
        }
    }

    /// Returns the area with the given index in the order that SPV files list
    /// them, or `None` if `index` is out of range.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::LENGTH).then(|| Self::from_usize(index))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Title => "title",
            Area::Caption => "caption",
            Area::Footer => "footer",
            Area::Corner => "corner",
            Area::Labels(Axis2::X) => "column labels",
            Area::Labels(Axis2::Y) => "row labels",
            Area::Data => "data",
            Area::Layers => "layers",
        }
    }
}

/// Table borders for styling purposes.
#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq)]
pub enum Border {
    Title,
    OuterFrame(BoxBorder),
    InnerFrame(BoxBorder),
    Dimension(RowColBorder),
    Category(RowColBorder),
    DataLeft,
    DataTop,
}

impl Border {
    pub fn default_stroke(self) -> Stroke {
        match self {
            Self::InnerFrame(_) | Self::DataLeft | Self::DataTop => Stroke::Thick,
            Self::Dimension(
                RowColBorder(HeadingRegion::Columns, _) | RowColBorder(_, Axis2::X),
            )
            | Self::Category(RowColBorder(HeadingRegion::Columns, _)) => Stroke::Solid,
            _ => Stroke::None,
        }
    }
    pub fn default_border_style(self) -> BorderStyle {
        BorderStyle {
            stroke: self.default_stroke(),
            color: Color::BLACK,
        }
    }

    /// Returns the border with the given index in the order that SPV light
    /// tables number them, or `None` if `index` is out of range.
    ///
    /// This order differs from the order of the enumeration: the data area
    /// borders come right after the frames.
    pub fn from_index(index: u32) -> Option<Self> {
        use Axis2::*;
        use BoxBorder::*;
        use HeadingRegion::*;
        let border = match index {
            0 => Self::Title,
            1 => Self::OuterFrame(Left),
            2 => Self::OuterFrame(Top),
            3 => Self::OuterFrame(Right),
            4 => Self::OuterFrame(Bottom),
            5 => Self::InnerFrame(Left),
            6 => Self::InnerFrame(Top),
            7 => Self::InnerFrame(Right),
            8 => Self::InnerFrame(Bottom),
            9 => Self::DataLeft,
            10 => Self::DataTop,
            11 => Self::Dimension(RowColBorder(Rows, X)),
            12 => Self::Dimension(RowColBorder(Rows, Y)),
            13 => Self::Dimension(RowColBorder(Columns, X)),
            14 => Self::Dimension(RowColBorder(Columns, Y)),
            15 => Self::Category(RowColBorder(Rows, X)),
            16 => Self::Category(RowColBorder(Rows, Y)),
            17 => Self::Category(RowColBorder(Columns, X)),
            18 => Self::Category(RowColBorder(Columns, Y)),
            _ => return None,
        };
        Some(border)
    }
}

/// The borders on a box.
#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq)]
pub enum BoxBorder {
    Left,
    Top,
    Right,
    Bottom,
}

/// Borders between rows and columns.
#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq)]
pub struct RowColBorder(
    /// Row or column headings.
    pub HeadingRegion,
    /// Horizontal ([Axis2::X]) or vertical ([Axis2::Y]) borders.
    pub Axis2,
);

/// An axis of a 2-dimensional table.
#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq)]
pub enum Axis2 {
    X,
    Y,
}

impl Axis2 {
    pub fn new_enum<T>(x: T, y: T) -> EnumMap<Axis2, T> {
        EnumMap::from_array([x, y])
    }
}

impl Not for Axis2 {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }
}

/// Styling for a pivot table.
///
/// The division between this and the style information in
/// [PivotTable](super::PivotTable) seems fairly arbitrary.  The ultimate reason
/// for the division is simply because that's how SPSS documentation and file
/// formats do it.
#[derive(Clone, Debug, PartialEq)]
pub struct Look {
    pub name: Option<String>,

    /// Whether to hide rows or columns whose cells are all empty.
    pub hide_empty: bool,

    pub row_label_position: LabelPosition,

    /// Ranges of column widths in the two heading regions, in 1/96" units.
    pub heading_widths: EnumMap<HeadingRegion, RangeInclusive<usize>>,

    /// Kind of markers to use for footnotes.
    pub footnote_marker_type: FootnoteMarkerType,

    /// Where to put the footnote markers.
    pub footnote_marker_position: FootnoteMarkerPosition,

    /// Styles for areas of the pivot table.
    pub areas: EnumMap<Area, AreaStyle>,

    /// Styles for borders in the pivot table.
    pub borders: EnumMap<Border, BorderStyle>,

    pub print_all_layers: bool,

    pub paginate_layers: bool,

    pub shrink_to_fit: EnumMap<Axis2, bool>,

    pub top_continuation: bool,

    pub bottom_continuation: bool,

    pub continuation: Option<String>,

    pub n_orphan_lines: usize,
}

impl Look {
    /// Whether group labels on the row axis go in the corner instead of
    /// enclosing their categories.
    pub fn row_labels_in_corner(&self) -> bool {
        self.row_label_position == LabelPosition::Corner
    }
}

impl Default for Look {
    fn default() -> Self {
        Self {
            name: None,
            hide_empty: true,
            row_label_position: LabelPosition::default(),
            heading_widths: EnumMap::from_fn(|region| match region {
                HeadingRegion::Rows => 36..=72,
                HeadingRegion::Columns => 36..=120,
            }),
            footnote_marker_type: FootnoteMarkerType::default(),
            footnote_marker_position: FootnoteMarkerPosition::default(),
            areas: EnumMap::from_fn(Area::default_area_style),
            borders: EnumMap::from_fn(Border::default_border_style),
            print_all_layers: false,
            paginate_layers: false,
            shrink_to_fit: EnumMap::from_fn(|_| false),
            top_continuation: false,
            bottom_continuation: false,
            continuation: None,
            n_orphan_lines: 0,
        }
    }
}

impl Look {
    /// Parses a `tableProperties` element, as found in a legacy table's
    /// structure member or in a `.stt` file.
    pub fn from_xml(xml: &str) -> Result<Self, DeError> {
        Ok(from_str::<TableProperties>(xml)?.into())
    }
}

/// Position for group labels.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum LabelPosition {
    /// Hierarachically enclosing the categories.
    ///
    /// For column labels, group labels appear above the categories.  For row
    /// labels, group labels appear to the left of the categories.
    #[serde(rename = "nested")]
    Nested,

    /// In the corner (row labels only).
    #[default]
    #[serde(rename = "inCorner")]
    Corner,
}

/// The heading region of a rendered pivot table: the column headings across
/// the top, or the corner and row headings down the left side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum HeadingRegion {
    Rows,
    Columns,
}

impl From<Axis2> for HeadingRegion {
    fn from(axis: Axis2) -> Self {
        match axis {
            Axis2::X => HeadingRegion::Columns,
            Axis2::Y => HeadingRegion::Rows,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AreaStyle {
    pub cell_style: CellStyle,
    pub font_style: FontStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CellStyle {
    /// `None` means "mixed" alignment: align strings to the left, numbers to
    /// the right.
    pub horz_align: Option<HorzAlign>,
    pub vert_align: VertAlign,

    /// Margins in 1/96" units.
    ///
    /// `margins[Axis2::X][0]` is the left margin.
    /// `margins[Axis2::X][1]` is the right margin.
    /// `margins[Axis2::Y][0]` is the top margin.
    /// `margins[Axis2::Y][1]` is the bottom margin.
    pub margins: EnumMap<Axis2, [i32; 2]>,
}

impl Default for CellStyle {
    fn default() -> Self {
        Area::default().default_cell_style()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum HorzAlign {
    /// Right aligned.
    Right,

    /// Left aligned.
    Left,

    /// Centered.
    Center,

    /// Align the decimal point at the specified position.
    Decimal {
        /// Decimal offset from the right side of the cell, in 1/96" units.
        offset: f64,

        /// Decimal character.
        decimal: Decimal,
    },
}

impl HorzAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            HorzAlign::Right => "right",
            HorzAlign::Left => "left",
            HorzAlign::Center => "center",
            HorzAlign::Decimal { .. } => "decimal",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VertAlign {
    /// Top alignment.
    Top,

    /// Centered,
    Middle,

    /// Bottom alignment.
    Bottom,
}

impl VertAlign {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertAlign::Top => "top",
            VertAlign::Middle => "middle",
            VertAlign::Bottom => "bottom",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,

    /// Whether text in this style contains Pango-style markup.
    pub markup: bool,
    pub font: String,

    /// `fg[0]` is the usual foreground color.
    ///
    /// `fg[1]` is used only in [Area::Data] for odd-numbered rows.
    pub fg: [Color; 2],

    /// `bg[0]` is the usual background color.
    ///
    /// `bg[1]` is used only in [Area::Data] for odd-numbered rows.
    pub bg: [Color; 2],

    /// In 1/72" units.
    pub size: i32,
}

impl Default for FontStyle {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            underline: false,
            markup: false,
            font: String::from("Sans Serif"),
            fg: [Color::BLACK; 2],
            bg: [Color::WHITE; 2],
            size: 9,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Color {
    pub alpha: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);
    pub const TRANSPARENT: Color = Color::new(0, 0, 0).with_alpha(0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self {
            alpha: 255,
            r,
            g,
            b,
        }
    }

    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self { alpha, ..self }
    }

    pub const fn without_alpha(self) -> Self {
        self.with_alpha(255)
    }

    /// Decodes a color packed as `0xaarrggbb`, as light tables store border
    /// colors.
    pub const fn from_u32(x: u32) -> Self {
        let [alpha, r, g, b] = x.to_be_bytes();
        Self { alpha, r, g, b }
    }

    pub fn display_css(&self) -> DisplayCss {
        DisplayCss(*self)
    }
}

impl Debug for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_css())
    }
}

impl From<Rgba8> for Color {
    fn from(Rgba8 { r, g, b, a }: Rgba8) -> Self {
        Self::new(r, g, b).with_alpha(a)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn is_bare_hex(s: &str) -> bool {
            let s = s.trim();
            s.chars().count() == 6 && s.chars().all(|c| c.is_ascii_hexdigit())
        }
        let color: AlphaColor<Srgb> = match s.parse() {
            Err(ParseColorError::UnknownColorSyntax) if is_bare_hex(s) => {
                ("#".to_owned() + s).parse()
            }
            Err(ParseColorError::UnknownColorSyntax)
                if s.trim().eq_ignore_ascii_case("transparent") =>
            {
                Ok(TRANSPARENT)
            }
            other => other,
        }?;
        Ok(color.to_rgba8().into())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ColorVisitor;

        impl<'de> Visitor<'de> for ColorVisitor {
            type Value = Color;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("\"#rrggbb\" or \"rrggbb\" or web color name")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(ColorVisitor)
    }
}

pub struct DisplayCss(Color);

impl Display for DisplayCss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Color { alpha, r, g, b } = self.0;
        match alpha {
            255 => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            _ => write!(f, "rgb({r}, {g}, {b}, {:.2})", alpha as f64 / 255.0),
        }
    }
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BorderStyle {
    #[serde(rename = "@borderStyleType")]
    pub stroke: Stroke,

    #[serde(rename = "@color")]
    pub color: Color,
}

impl BorderStyle {
    pub const fn none() -> Self {
        Self {
            stroke: Stroke::None,
            color: Color::BLACK,
        }
    }

    pub fn is_none(&self) -> bool {
        self.stroke.is_none()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Enum, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stroke {
    None,
    Solid,
    Dashed,
    Thick,
    Thin,
    Double,
}

impl Stroke {
    pub fn is_none(&self) -> bool {
        self == &Self::None
    }

    /// Decodes a stroke type as numbered in light tables.
    pub fn from_u32(stroke: u32) -> Option<Self> {
        match stroke {
            0 => Some(Self::None),
            1 => Some(Self::Solid),
            2 => Some(Self::Dashed),
            3 => Some(Self::Thick),
            4 => Some(Self::Thin),
            5 => Some(Self::Double),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stroke::None => "none",
            Stroke::Solid => "solid",
            Stroke::Dashed => "dashed",
            Stroke::Thick => "thick",
            Stroke::Thin => "thin",
            Stroke::Double => "double",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FootnoteMarkerType {
    /// a, b, c, ...
    #[default]
    Alphabetic,

    /// 1, 2, 3, ...
    Numeric,
}

#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FootnoteMarkerPosition {
    /// Subscripts.
    #[default]
    Subscript,

    /// Superscripts.
    Superscript,
}

#[cfg(test)]
mod tests {
    use super::{Axis2, Border, BoxBorder, Color, HeadingRegion, RowColBorder, Stroke};

    #[test]
    fn colors() {
        assert_eq!("#ff0000".parse::<Color>().ok(), Some(Color::RED));
        assert_eq!("0000ff".parse::<Color>().ok(), Some(Color::BLUE));
        assert_eq!(
            "transparent".parse::<Color>().ok(),
            Some(Color::TRANSPARENT)
        );
        assert_eq!(Color::from_u32(0xff102030), Color::new(0x10, 0x20, 0x30));
        assert_eq!(Color::new(1, 2, 255).display_css().to_string(), "#0102ff");
    }

    #[test]
    fn light_border_order() {
        assert_eq!(Border::from_index(0), Some(Border::Title));
        assert_eq!(
            Border::from_index(8),
            Some(Border::InnerFrame(BoxBorder::Bottom))
        );
        assert_eq!(Border::from_index(9), Some(Border::DataLeft));
        assert_eq!(
            Border::from_index(14),
            Some(Border::Dimension(RowColBorder(
                HeadingRegion::Columns,
                Axis2::Y
            )))
        );
        assert_eq!(Border::from_index(19), None);
        assert_eq!(Stroke::from_u32(3), Some(Stroke::Thick));
        assert_eq!(Stroke::from_u32(6), None);
    }
}
