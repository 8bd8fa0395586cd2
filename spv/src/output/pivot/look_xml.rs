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

//! The `tableProperties` XML element, which legacy tables use to carry their
//! [Look].
//!
//! Every element and attribute is optional.  Whatever is missing keeps the
//! value from [Look::default].

use std::{fmt::Debug, num::ParseFloatError, str::FromStr};

use serde::{de::Visitor, Deserialize};
use thiserror::Error as ThisError;

use crate::{
    format::Decimal,
    output::pivot::{
        Area, AreaStyle, Axis2, Border, BoxBorder, Color, FootnoteMarkerPosition,
        FootnoteMarkerType, HeadingRegion, HorzAlign, LabelPosition, Look, RowColBorder, Stroke,
        VertAlign,
    },
};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TableProperties {
    #[serde(rename = "@name")]
    name: Option<String>,
    general_properties: GeneralProperties,
    footnote_properties: FootnoteProperties,
    cell_format_properties: CellFormatProperties,
    border_properties: BorderProperties,
    printing_properties: PrintingProperties,
}

impl From<TableProperties> for Look {
    fn from(table_properties: TableProperties) -> Self {
        let mut look = Look {
            name: table_properties.name,
            ..Look::default()
        };

        let general = &table_properties.general_properties;
        if let Some(hide_empty_rows) = general.hide_empty_rows {
            look.hide_empty = hide_empty_rows;
        }
        if let Some(row_label_position) = general.row_label_position {
            look.row_label_position = row_label_position;
        }
        for (region, min, max) in [
            (
                HeadingRegion::Columns,
                general.minimum_column_width,
                general.maximum_column_width,
            ),
            (
                HeadingRegion::Rows,
                general.minimum_row_width,
                general.maximum_row_width,
            ),
        ] {
            let range = &mut look.heading_widths[region];
            let min = min.map_or(*range.start(), |min| min.try_into().unwrap_or_default());
            let max = max.map_or(*range.end(), |max| max.try_into().unwrap_or_default());
            *range = min..=max;
        }

        let footnotes = &table_properties.footnote_properties;
        if let Some(marker_type) = footnotes.marker_type {
            look.footnote_marker_type = marker_type;
        }
        if let Some(marker_position) = footnotes.marker_position {
            look.footnote_marker_position = marker_position;
        }

        let cells = &table_properties.cell_format_properties;
        for (area, holder) in [
            (Area::Title, &cells.title),
            (Area::Caption, &cells.caption),
            (Area::Footer, &cells.footnotes),
            (Area::Corner, &cells.corner_labels),
            (Area::Labels(Axis2::X), &cells.column_labels),
            (Area::Labels(Axis2::Y), &cells.row_labels),
            (Area::Data, &cells.data),
            (Area::Layers, &cells.layers),
        ] {
            if let Some(holder) = holder {
                holder.apply(&mut look.areas[area]);
            }
        }

        let borders = &table_properties.border_properties;
        for (border, element) in borders.iter() {
            if let Some(element) = element {
                let style = &mut look.borders[border];
                style.stroke = element.stroke;
                if let Some(color) = element.color {
                    style.color = color;
                }
            }
        }

        let printing = table_properties.printing_properties;
        look.print_all_layers = printing.print_all_layers;
        look.paginate_layers = printing.print_each_layer_on_separate_page;
        look.shrink_to_fit = Axis2::new_enum(
            printing.rescale_wide_table_to_fit_page,
            printing.rescale_long_table_to_fit_page,
        );
        look.top_continuation = printing.continuation_text_at_top;
        look.bottom_continuation = printing.continuation_text_at_bottom;
        look.continuation = printing.continuation_text.filter(|text| !text.is_empty());
        look.n_orphan_lines = printing.window_orphan_lines.try_into().unwrap_or_default();

        look
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct GeneralProperties {
    #[serde(rename = "@hideEmptyRows")]
    hide_empty_rows: Option<bool>,

    #[serde(rename = "@maximumColumnWidth")]
    maximum_column_width: Option<i64>,

    #[serde(rename = "@minimumColumnWidth")]
    minimum_column_width: Option<i64>,

    #[serde(rename = "@maximumRowWidth")]
    maximum_row_width: Option<i64>,

    #[serde(rename = "@minimumRowWidth")]
    minimum_row_width: Option<i64>,

    #[serde(rename = "@rowDimensionLabels")]
    row_label_position: Option<LabelPosition>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct FootnoteProperties {
    #[serde(rename = "@markerPosition")]
    marker_position: Option<FootnoteMarkerPosition>,

    #[serde(rename = "@numberFormat")]
    marker_type: Option<FootnoteMarkerType>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct CellFormatProperties {
    caption: Option<CellStyleHolder>,
    column_labels: Option<CellStyleHolder>,
    corner_labels: Option<CellStyleHolder>,
    data: Option<CellStyleHolder>,
    footnotes: Option<CellStyleHolder>,
    layers: Option<CellStyleHolder>,
    row_labels: Option<CellStyleHolder>,
    title: Option<CellStyleHolder>,
}

/// One of the areas in `cellFormatProperties`.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct CellStyleHolder {
    /// Background for odd-numbered rows.
    #[serde(rename = "@alternatingColor")]
    alternating_color: Option<Color>,

    /// Foreground for odd-numbered rows.
    #[serde(rename = "@alternatingTextColor")]
    alternating_text_color: Option<Color>,

    style: Style,
}

impl CellStyleHolder {
    fn apply(&self, area: &mut AreaStyle) {
        let style = &self.style;
        let font = &mut area.font_style;
        if let Some(weight) = style.font_weight {
            font.bold = weight == FontWeight::Bold;
        }
        if let Some(font_style) = style.font_style {
            font.italic = font_style == FontStyle::Italic;
        }
        if let Some(underline) = style.font_underline {
            font.underline = underline == FontUnderline::Underline;
        }
        if let Some(color) = style.color {
            font.fg[0] = color;
        }
        if self.alternating_text_color.is_some() || style.color.is_some() {
            font.fg[1] = self.alternating_text_color.unwrap_or(font.fg[0]);
        }
        if let Some(color2) = style.color2 {
            font.bg[0] = color2;
        }
        if self.alternating_color.is_some() || style.color2.is_some() {
            font.bg[1] = self.alternating_color.unwrap_or(font.bg[0]);
        }
        if let Some(family) = &style.font_family {
            font.font = family.clone();
        }
        if let Some(size) = style.font_size {
            font.size = size.as_pt_i32();
        }

        let cell = &mut area.cell_style;
        if let Some(alignment) = style.text_alignment {
            cell.horz_align = match alignment {
                TextAlignment::Left => Some(HorzAlign::Left),
                TextAlignment::Right => Some(HorzAlign::Right),
                TextAlignment::Center => Some(HorzAlign::Center),
                TextAlignment::Decimal => Some(HorzAlign::Decimal {
                    offset: style.decimal_offset.map_or(0.0, Dimension::as_px_f64),
                    decimal: Decimal::Dot,
                }),
                TextAlignment::Mixed => None,
            };
        }
        if let Some(location) = style.label_location_vertical {
            cell.vert_align = match location {
                LabelLocationVertical::Positive => VertAlign::Top,
                LabelLocationVertical::Negative => VertAlign::Bottom,
                LabelLocationVertical::Center => VertAlign::Middle,
            };
        }
        for (margin, axis, side) in [
            (style.margin_left, Axis2::X, 0),
            (style.margin_right, Axis2::X, 1),
            (style.margin_top, Axis2::Y, 0),
            (style.margin_bottom, Axis2::Y, 1),
        ] {
            if let Some(margin) = margin {
                cell.margins[axis][side] = margin.as_px_i32();
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Style {
    #[serde(rename = "@color")]
    color: Option<Color>,
    #[serde(rename = "@color2")]
    color2: Option<Color>,
    #[serde(rename = "@font-family")]
    font_family: Option<String>,
    #[serde(rename = "@font-size")]
    font_size: Option<Dimension>,
    #[serde(rename = "@font-style")]
    font_style: Option<FontStyle>,
    #[serde(rename = "@font-weight")]
    font_weight: Option<FontWeight>,
    #[serde(rename = "@font-underline")]
    font_underline: Option<FontUnderline>,
    #[serde(rename = "@labelLocationVertical")]
    label_location_vertical: Option<LabelLocationVertical>,
    #[serde(rename = "@margin-bottom")]
    margin_bottom: Option<Dimension>,
    #[serde(rename = "@margin-left")]
    margin_left: Option<Dimension>,
    #[serde(rename = "@margin-right")]
    margin_right: Option<Dimension>,
    #[serde(rename = "@margin-top")]
    margin_top: Option<Dimension>,
    #[serde(rename = "@textAlignment")]
    text_alignment: Option<TextAlignment>,
    #[serde(rename = "@decimal-offset")]
    decimal_offset: Option<Dimension>,
}

#[derive(Copy, Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) enum FontStyle {
    Regular,
    Italic,
}

#[derive(Copy, Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) enum FontWeight {
    Regular,
    Bold,
}

#[derive(Copy, Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) enum FontUnderline {
    None,
    Underline,
}

#[derive(Copy, Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) enum TextAlignment {
    Left,
    Right,
    Center,
    Decimal,
    Mixed,
}

#[derive(Copy, Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) enum LabelLocationVertical {
    /// Top.
    Positive,

    /// Bottom.
    Negative,

    /// Center.
    Center,
}

/// A border in `borderProperties`.
#[derive(Copy, Clone, Deserialize, Debug)]
struct BorderElement {
    #[serde(rename = "@borderStyleType")]
    stroke: Stroke,

    #[serde(rename = "@color")]
    color: Option<Color>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct BorderProperties {
    bottom_inner_frame: Option<BorderElement>,
    bottom_outer_frame: Option<BorderElement>,
    data_area_left: Option<BorderElement>,
    data_area_top: Option<BorderElement>,
    horizontal_category_border_columns: Option<BorderElement>,
    horizontal_category_border_rows: Option<BorderElement>,
    horizontal_dimension_border_columns: Option<BorderElement>,
    horizontal_dimension_border_rows: Option<BorderElement>,
    left_inner_frame: Option<BorderElement>,
    left_outer_frame: Option<BorderElement>,
    right_inner_frame: Option<BorderElement>,
    right_outer_frame: Option<BorderElement>,
    title_layer_separator: Option<BorderElement>,
    top_inner_frame: Option<BorderElement>,
    top_outer_frame: Option<BorderElement>,
    vertical_category_border_columns: Option<BorderElement>,
    vertical_category_border_rows: Option<BorderElement>,
    vertical_dimension_border_rows: Option<BorderElement>,
    vertical_dimension_border_columns: Option<BorderElement>,
}

impl BorderProperties {
    fn iter(&self) -> impl Iterator<Item = (Border, Option<BorderElement>)> {
        use Axis2::*;
        use BoxBorder::*;
        use HeadingRegion::*;
        [
            (Border::Title, self.title_layer_separator),
            (Border::OuterFrame(Left), self.left_outer_frame),
            (Border::OuterFrame(Top), self.top_outer_frame),
            (Border::OuterFrame(Right), self.right_outer_frame),
            (Border::OuterFrame(Bottom), self.bottom_outer_frame),
            (Border::InnerFrame(Left), self.left_inner_frame),
            (Border::InnerFrame(Top), self.top_inner_frame),
            (Border::InnerFrame(Right), self.right_inner_frame),
            (Border::InnerFrame(Bottom), self.bottom_inner_frame),
            (Border::DataLeft, self.data_area_left),
            (Border::DataTop, self.data_area_top),
            (
                Border::Dimension(RowColBorder(Rows, X)),
                self.horizontal_dimension_border_rows,
            ),
            (
                Border::Dimension(RowColBorder(Rows, Y)),
                self.vertical_dimension_border_rows,
            ),
            (
                Border::Dimension(RowColBorder(Columns, X)),
                self.horizontal_dimension_border_columns,
            ),
            (
                Border::Dimension(RowColBorder(Columns, Y)),
                self.vertical_dimension_border_columns,
            ),
            (
                Border::Category(RowColBorder(Rows, X)),
                self.horizontal_category_border_rows,
            ),
            (
                Border::Category(RowColBorder(Rows, Y)),
                self.vertical_category_border_rows,
            ),
            (
                Border::Category(RowColBorder(Columns, X)),
                self.horizontal_category_border_columns,
            ),
            (
                Border::Category(RowColBorder(Columns, Y)),
                self.vertical_category_border_columns,
            ),
        ]
        .into_iter()
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct PrintingProperties {
    #[serde(rename = "@printAllLayers")]
    print_all_layers: bool,

    #[serde(rename = "@printEachLayerOnSeparatePage")]
    print_each_layer_on_separate_page: bool,

    #[serde(rename = "@rescaleWideTableToFitPage")]
    rescale_wide_table_to_fit_page: bool,

    #[serde(rename = "@rescaleLongTableToFitPage")]
    rescale_long_table_to_fit_page: bool,

    #[serde(rename = "@windowOrphanLines")]
    window_orphan_lines: i64,

    #[serde(rename = "@continuationText")]
    continuation_text: Option<String>,

    #[serde(rename = "@continuationTextAtBottom")]
    continuation_text_at_bottom: bool,

    #[serde(rename = "@continuationTextAtTop")]
    continuation_text_at_top: bool,
}

/// A length, such as `9pt` or `0.25in`.
#[derive(Copy, Clone, Default, PartialEq)]
pub(crate) struct Dimension(
    /// In inches.
    pub(crate) f64,
);

impl Dimension {
    pub(crate) fn as_px_f64(self) -> f64 {
        self.0 * 96.0
    }
    pub(crate) fn as_px_i32(self) -> i32 {
        num::cast(self.as_px_f64() + 0.5).unwrap_or_default()
    }
    pub(crate) fn as_pt_f64(self) -> f64 {
        self.0 * 72.0
    }
    pub(crate) fn as_pt_i32(self) -> i32 {
        num::cast(self.as_pt_f64() + 0.5).unwrap_or_default()
    }
}

impl Debug for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}in", self.0)
    }
}

impl FromStr for Dimension {
    type Err = DimensionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start();
        let unit = s.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == '-');
        let number: f64 = s[..s.len() - unit.len()]
            .parse()
            .map_err(DimensionParseError::ParseFloatError)?;
        let divisor = match unit.trim() {
            // Inches.
            "in" | "인치" | "pol." | "cala" | "cali" => 1.0,

            // Device-independent pixels.
            "px" => 96.0,

            // Points.
            "pt" | "пт" | "" => 72.0,

            // Centimeters.
            "cm" | "см" => 2.54,

            // Millimeters.
            "mm" => 25.4,

            other => return Err(DimensionParseError::InvalidUnit(other.into())),
        };
        Ok(Dimension(number / divisor))
    }
}

#[derive(ThisError, Debug, PartialEq, Eq)]
pub(crate) enum DimensionParseError {
    /// Invalid number.
    #[error("{0}")]
    ParseFloatError(ParseFloatError),

    /// Unknown unit.
    #[error("Unknown unit {0:?}")]
    InvalidUnit(String),
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl<'de> Visitor<'de> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a length")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DimensionVisitor)
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use crate::output::pivot::{
        look_xml::{Dimension, DimensionParseError},
        Area, Axis2, Border, BoxBorder, Color, FootnoteMarkerPosition, FootnoteMarkerType,
        HeadingRegion, HorzAlign, LabelPosition, Look, RowColBorder, Stroke, VertAlign,
    };

    #[test]
    fn dimension() {
        assert_eq!(Dimension::from_str("1"), Ok(Dimension(1.0 / 72.0)));
        assert_eq!(Dimension::from_str("1pt"), Ok(Dimension(1.0 / 72.0)));
        assert_eq!(Dimension::from_str("1пт"), Ok(Dimension(1.0 / 72.0)));
        assert_eq!(Dimension::from_str(" 1.0 pt"), Ok(Dimension(1.0 / 72.0)));
        assert_eq!(Dimension::from_str("1in"), Ok(Dimension(1.0)));
        assert_eq!(Dimension::from_str("96px"), Ok(Dimension(1.0)));
        assert_eq!(Dimension::from_str("2.54cm"), Ok(Dimension(1.0)));
        assert_eq!(Dimension::from_str("25.4mm"), Ok(Dimension(1.0)));
        assert_eq!(
            Dimension::from_str("1.2.3"),
            Err(DimensionParseError::ParseFloatError(
                "1.2.3".parse::<f64>().unwrap_err()
            ))
        );
        assert_eq!(
            Dimension::from_str("1asdf"),
            Err(DimensionParseError::InvalidUnit("asdf".into()))
        );
    }

    #[test]
    fn partial_look() {
        const XML: &str = r##"<tableProperties name="Compact">
    <generalProperties hideEmptyRows="false" rowDimensionLabels="nested"/>
    <footnoteProperties markerPosition="superscript" numberFormat="numeric"/>
    <cellFormatProperties>
        <title alternatingColor="#eeeeee">
            <vizml:style color="#ff0000" font-size="12pt" font-weight="regular" textAlignment="right" labelLocationVertical="negative" margin-left="0.25in"/>
        </title>
    </cellFormatProperties>
    <borderProperties>
        <titleLayerSeparator borderStyleType="double" color="#0000ff"/>
        <verticalDimensionBorderColumns borderStyleType="dashed"/>
    </borderProperties>
</tableProperties>"##;
        let look = Look::from_xml(XML).unwrap();
        let default = Look::default();

        assert_eq!(look.name.as_deref(), Some("Compact"));
        assert!(!look.hide_empty);
        assert_eq!(look.row_label_position, LabelPosition::Nested);
        assert_eq!(look.footnote_marker_type, FootnoteMarkerType::Numeric);
        assert_eq!(
            look.footnote_marker_position,
            FootnoteMarkerPosition::Superscript
        );
        assert_eq!(look.heading_widths, default.heading_widths);

        let title = &look.areas[Area::Title];
        assert_eq!(title.font_style.fg, [Color::RED, Color::RED]);
        assert_eq!(title.font_style.bg[0], Color::WHITE);
        assert_eq!(title.font_style.bg[1], Color::new(0xee, 0xee, 0xee));
        assert_eq!(title.font_style.size, 12);
        assert!(!title.font_style.bold);
        assert_eq!(title.cell_style.horz_align, Some(HorzAlign::Right));
        assert_eq!(title.cell_style.vert_align, VertAlign::Bottom);
        assert_eq!(title.cell_style.margins[Axis2::X], [24, 11]);
        assert_eq!(look.areas[Area::Data], default.areas[Area::Data]);

        assert_eq!(look.borders[Border::Title].stroke, Stroke::Double);
        assert_eq!(look.borders[Border::Title].color, Color::BLUE);
        let vertical = Border::Dimension(RowColBorder(HeadingRegion::Columns, Axis2::Y));
        assert_eq!(look.borders[vertical].stroke, Stroke::Dashed);
        assert_eq!(look.borders[vertical].color, Color::BLACK);
        assert_eq!(
            look.borders[Border::InnerFrame(BoxBorder::Left)],
            default.borders[Border::InnerFrame(BoxBorder::Left)]
        );
    }
}
