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

//! Lowering a [LightTable] into a [PivotTable].

use std::{
    ops::{Range, RangeInclusive},
    str::FromStr,
};

use chrono::DateTime;
use displaydoc::Display;
use encoding_rs::{Encoding, WINDOWS_1252};
use enum_iterator::all;
use enum_map::{enum_map, EnumMap};
use thiserror::Error as ThisError;

use crate::{
    format::{Decimal, Epoch, Format, NumberStyle, CC},
    output::pivot::{
        AreaStyle, Axis2, Axis3, Border, BorderStyle, CellStyle, Color, Dimension,
        DimensionError, FontStyle, FootnoteMarkerPosition, FootnoteMarkerType, Group,
        HeadingRegion, HorzAlign, LabelPosition, Leaf, NumberValue, PivotTable, Sizing,
        StringValue, Stroke, TemplateValue, TextValue, Value, ValueInner, VariableValue, VertAlign,
    },
    settings::Show,
};

use super::{self as light, Category, Child, Error, Keeps, LightTable, RawString, Y1};

/// A recoverable problem found while decoding a light table.
#[derive(Clone, Debug, Display, ThisError, PartialEq, Eq)]
pub enum Warning {
    /// bad format {0:#x}; using F40.2 instead
    BadFormat(u32),

    /// bad decimal point {0:#04x}
    BadDecimal(u8),

    /// custom currency {index} has unparseable style {style:?}
    BadCustomCurrency { index: usize, style: String },
}

/// Decodes `table` into a pivot table.  Problems that do not prevent decoding
/// are passed to `warn`.
pub fn decode(table: &LightTable, mut warn: impl FnMut(Warning)) -> Result<PivotTable, Error> {
    let y1 = table.formats.extension.y1();
    let mut decoder = Decoder {
        encoding: table_encoding(table),
        n_footnotes: table.footnotes.footnotes.len(),
        decimal: Decimal::Dot,
        warn: &mut warn,
    };

    let mut pt = PivotTable::default();
    decoder.decode_settings(table, y1, &mut pt)?;
    decoder.decimal = pt.settings.decimal;

    if let Some(last) = decoder.n_footnotes.checked_sub(1) {
        pt.create_footnote_at(last, None, None);
        for (index, footnote) in table.footnotes.footnotes.iter().enumerate() {
            let content = decoder.decode_value(&footnote.text)?;
            let marker = match &footnote.marker.0 {
                Some(marker) => {
                    let mut marker = decoder.decode_value(marker)?;
                    if let ValueInner::Text(text) = &mut marker.inner {
                        text.user_provided = false;
                    }
                    Some(marker)
                }
                None => None,
            };
            pt.create_footnote_at(index, marker, Some(content)).show = footnote.show > 0;
        }
    }

    let titles = &table.titles;
    pt.title = Some(Box::new(decoder.decode_value(&titles.user_title)?));
    pt.subtype = Some(Box::new(decoder.decode_value(&titles.subtype)?));
    if let Some(corner_text) = &titles.corner_text.0 {
        pt.corner_text = Some(Box::new(decoder.decode_value(corner_text)?));
    }
    if let Some(caption) = &titles.caption.0 {
        pt.caption = Some(Box::new(decoder.decode_value(caption)?));
    }

    let look = pt.look_mut();
    for ((_, style), area) in look.areas.iter_mut().zip(&table.areas.areas) {
        decoder.decode_area(area, style)?;
    }
    for border in &table.borders.0.borders {
        let which = Border::from_index(border.border_type)
            .ok_or(Error::BadBorderType(border.border_type))?;
        let stroke =
            Stroke::from_u32(border.stroke_type).ok_or(Error::BadStroke(border.stroke_type))?;
        look.borders[which] = BorderStyle {
            stroke,
            color: Color::from_u32(border.color),
        };
    }

    let dimensions = table
        .dimensions
        .dimensions
        .iter()
        .map(|dimension| decoder.decode_dimension(dimension))
        .collect::<Result<Vec<_>, _>>()?;
    decode_axes(&table.axes, dimensions, &mut pt)?;
    pt.assign_label_depth();

    let current_layer = table
        .table_settings
        .as_ref()
        .map_or(0, |ts| ts.current_layer);
    if !pt.set_current_layer_linear(current_layer as u64) {
        return Err(Error::BadLayerIndex(current_layer));
    }

    if !pt.dimensions.is_empty() {
        for cell in &table.cells.cells {
            let indexes = pt
                .decompose_linear_index(cell.index)
                .ok_or(Error::BadCellIndex(cell.index))?;
            let value = decoder.decode_value(&cell.value)?;
            pt.put(&indexes, value);
        }
    }
    Ok(pt)
}

/// Returns the encoding that `table` declares for its strings.  The
/// declaration is not always accurate, so strings that are already valid
/// UTF-8 are taken as UTF-8 regardless.
fn table_encoding(table: &LightTable) -> &'static Encoding {
    let label = match table.formats.extension.y1() {
        Some(y1) => y1.charset.0.clone(),
        None => match table.formats.locale.0.iter().position(|b| *b == b'.') {
            Some(dot) => table.formats.locale.0[dot + 1..].to_vec(),
            None => Vec::new(),
        },
    };
    Encoding::for_label(&label).unwrap_or(WINDOWS_1252)
}

struct Decoder<'a, W> {
    encoding: &'static Encoding,
    n_footnotes: usize,
    decimal: Decimal,
    warn: &'a mut W,
}

impl<W> Decoder<'_, W>
where
    W: FnMut(Warning),
{
    fn string(&self, s: &RawString) -> String {
        match std::str::from_utf8(&s.0) {
            Ok(s) => s.into(),
            Err(_) => self
                .encoding
                .decode_without_bom_handling(&s.0)
                .0
                .into_owned(),
        }
    }

    fn string_if_nonempty(&self, s: &RawString) -> Option<String> {
        (!s.is_empty()).then(|| self.string(s))
    }

    fn format(&mut self, raw: u32) -> Format {
        Format::from_u32(raw).unwrap_or_else(|_| {
            (self.warn)(Warning::BadFormat(raw));
            Format::F40_2
        })
    }

    fn decode_settings(
        &mut self,
        table: &LightTable,
        y1: Option<&Y1>,
        pt: &mut PivotTable,
    ) -> Result<(), Error> {
        let header = &table.header;
        pt.rotate_inner_column_labels = header.rotate_inner_column_labels;
        pt.rotate_outer_row_labels = header.rotate_outer_row_labels;
        pt.show_grid_lines = table.borders.0.show_grid_lines;
        pt.show_title = true;
        pt.show_caption = true;

        let extension = &table.formats.extension;
        if let Some(x1) = &extension.x1 {
            pt.show_values = decode_show(x1.show_values)?;
            pt.show_variables = decode_show(x1.show_variables)?;
            pt.show_caption = x1.show_caption;
            pt.show_title = x1.show_title != 10;
        }

        let mut x_sizing = Sizing {
            widths: table.formats.column_widths.clone(),
            ..Sizing::default()
        };
        let mut y_sizing = Sizing {
            widths: extension
                .x2
                .as_ref()
                .map(|x2| x2.row_heights.clone())
                .unwrap_or_default(),
            ..Sizing::default()
        };

        let look = pt.look_mut();
        look.heading_widths = enum_map! {
            HeadingRegion::Rows => width_range(header.min_row_heading_width, header.max_row_heading_width),
            HeadingRegion::Columns => width_range(header.min_column_heading_width, header.max_column_heading_width),
        };
        if let Some(ts) = &table.table_settings {
            look.footnote_marker_type = if ts.show_alphabetic_markers {
                FootnoteMarkerType::Alphabetic
            } else {
                FootnoteMarkerType::Numeric
            };
            look.row_label_position = if ts.row_labels_in_corner {
                LabelPosition::Corner
            } else {
                LabelPosition::Nested
            };
            look.footnote_marker_position = if ts.footnote_marker_superscripts {
                FootnoteMarkerPosition::Superscript
            } else {
                FootnoteMarkerPosition::Subscript
            };
            look.hide_empty = ts.omit_empty;

            let bk = &ts.breaks_and_keeps.0;
            y_sizing.breaks = bk.row_breaks.breaks.iter().map(|b| *b as usize).collect();
            x_sizing.breaks = bk.column_breaks.breaks.iter().map(|b| *b as usize).collect();
            y_sizing.keeps = decode_keeps(&bk.row_keeps);
            x_sizing.keeps = decode_keeps(&bk.column_keeps);

            look.name = self.string_if_nonempty(&ts.table_look);
        }
        if let Some(ps) = &table.print_settings {
            look.print_all_layers = ps.all_layers;
            look.paginate_layers = ps.paginate_layers;
            look.shrink_to_fit = enum_map! {
                Axis2::X => ps.fit_width,
                Axis2::Y => ps.fit_length,
            };
            look.top_continuation = ps.top_continuation;
            look.bottom_continuation = ps.bottom_continuation;
            look.continuation = self.string_if_nonempty(&ps.continuation);
            look.n_orphan_lines = ps.n_orphan_lines as usize;
        }
        if let Some(ts) = &table.table_settings {
            pt.notes = self.string_if_nonempty(&ts.notes);
        }

        pt.sizing = EnumMap::from_fn(|axis| {
            let sizing = match axis {
                Axis2::X => std::mem::take(&mut x_sizing),
                Axis2::Y => std::mem::take(&mut y_sizing),
            };
            (!sizing.is_empty()).then(|| Box::new(sizing))
        });

        let y0 = &table.formats.y0;
        if (1000..=9999).contains(&y0.epoch) {
            pt.settings.epoch = Epoch(y0.epoch);
        }
        match Decimal::try_from(y0.decimal as char) {
            Ok(decimal) => pt.settings.decimal = decimal,
            Err(()) => (self.warn)(Warning::BadDecimal(y0.decimal)),
        }
        pt.grouping = (y0.grouping != 0).then_some(y0.grouping as char);
        for (index, (cc, style)) in all::<CC>()
            .zip(&table.formats.custom_currency.ccs)
            .enumerate()
        {
            let style = self.string(style);
            match NumberStyle::from_str(&style) {
                Ok(number_style) => pt.settings.ccs[cc] = Some(Box::new(number_style)),
                Err(()) => (self.warn)(Warning::BadCustomCurrency { index, style }),
            }
        }
        pt.small = extension.x3.as_ref().map_or(0.0, |x3| x3.small);

        if let Some(y1) = y1 {
            pt.settings.leading_zero = y1.include_leading_zero;
            pt.command_local = Some(self.string(&y1.command_local));
            pt.command_c = Some(self.string(&y1.command));
            pt.language = Some(self.string(&y1.language));
            pt.locale = Some(self.string(&y1.locale));
        }

        if let Some(source) = extension.x3.as_ref().and_then(|x3| x3.source.as_ref()) {
            if source.dataset.0.first().is_some_and(|b| *b != 4) {
                pt.dataset = Some(self.string(&source.dataset));
            }
            pt.datafile = self.string_if_nonempty(&source.datafile);
            if source.date != 0 {
                pt.date = DateTime::from_timestamp(source.date as i64, 0).map(|d| d.naive_utc());
            }
        }
        Ok(())
    }

    fn decode_area(&self, area: &light::Area, style: &mut AreaStyle) -> Result<(), Error> {
        let fg0 = decode_color(&self.string(&area.fg), Color::BLACK)?;
        let bg0 = decode_color(&self.string(&area.bg), Color::WHITE)?;
        let (fg1, bg1) = if area.alternate {
            (
                decode_color(&self.string(&area.alt_fg), Color::BLACK)?,
                decode_color(&self.string(&area.alt_bg), Color::WHITE)?,
            )
        } else {
            (fg0, bg0)
        };

        // Areas have nowhere to put a decimal offset.
        let horz_align = match decode_horz_align(area.halign, 0.0, self.decimal)? {
            Some(HorzAlign::Decimal { .. }) => None,
            other => other,
        };
        let [left, right, top, bottom] = area.margins.unwrap_or_default();
        *style = AreaStyle {
            cell_style: CellStyle {
                horz_align,
                vert_align: decode_vert_align(area.valign)?,
                margins: enum_map! {
                    Axis2::X => [left, right],
                    Axis2::Y => [top, bottom],
                },
            },
            font_style: FontStyle {
                bold: (area.style & 1) != 0,
                italic: (area.style & 2) != 0,
                underline: area.underline,
                markup: false,
                font: self.string(&area.typeface),
                fg: [fg0, fg1],
                bg: [bg0, bg1],
                size: (area.size as f64 / 1.33) as i32,
            },
        };
        Ok(())
    }

    fn decode_font_style(&self, font_style: &light::FontStyle) -> Result<FontStyle, Error> {
        let fg = decode_color(&self.string(&font_style.fg), Color::BLACK)?;
        let bg = decode_color(&self.string(&font_style.bg), Color::WHITE)?;
        Ok(FontStyle {
            bold: font_style.bold,
            italic: font_style.italic,
            underline: font_style.underline,
            markup: false,
            font: self.string(&font_style.typeface),
            fg: [fg, fg],
            bg: [bg, bg],
            size: (font_style.size as f64 / 1.33) as i32,
        })
    }

    fn decode_cell_style(&self, cell_style: &light::CellStyle) -> Result<CellStyle, Error> {
        Ok(CellStyle {
            horz_align: decode_horz_align(
                cell_style.halign,
                cell_style.decimal_offset,
                self.decimal,
            )?,
            vert_align: decode_vert_align(cell_style.valign)?,
            margins: enum_map! {
                Axis2::X => [cell_style.left_margin as i32, cell_style.right_margin as i32],
                Axis2::Y => [cell_style.top_margin as i32, cell_style.bottom_margin as i32],
            },
        })
    }

    fn decode_value(&mut self, value: &light::Value) -> Result<Value, Error> {
        let inner = match &value.inner {
            light::ValueInner::Number { format, x, .. } => ValueInner::Number(NumberValue {
                show: None,
                format: Some(self.format(*format)),
                honor_small: (*format >> 16) == 40,
                value: decode_number(*x),
                var_name: None,
                value_label: None,
            }),
            light::ValueInner::VarNumber {
                format,
                x,
                var_name,
                value_label,
                show,
                ..
            } => ValueInner::Number(NumberValue {
                show: decode_show(*show)?,
                format: Some(self.format(*format)),
                honor_small: (*format >> 16) == 40,
                value: decode_number(*x),
                var_name: self.string_if_nonempty(var_name),
                value_label: self.string_if_nonempty(value_label),
            }),
            light::ValueInner::Text {
                local, id, c, fixed, ..
            } => ValueInner::Text(TextValue {
                user_provided: !*fixed,
                local: self.string(local),
                c: self.string(c),
                id: self.string(id),
            }),
            light::ValueInner::String {
                format,
                value_label,
                var_name,
                show,
                s,
                ..
            } => ValueInner::String(StringValue {
                show: decode_show(*show)?,
                hex: (*format >> 16) == 2,
                s: self.string(s),
                var_name: self.string_if_nonempty(var_name),
                value_label: self.string_if_nonempty(value_label),
            }),
            light::ValueInner::Variable {
                var_name,
                var_label,
                show,
                ..
            } => ValueInner::Variable(VariableValue {
                show: decode_show(*show)?,
                var_name: self.string(var_name),
                variable_label: self.string_if_nonempty(var_label),
            }),
            light::ValueInner::TextNoFixed { local, id, c, .. } => ValueInner::Text(TextValue {
                user_provided: false,
                local: self.string(local),
                c: self.string(c),
                id: self.string(id),
            }),
            light::ValueInner::Template { template, args, .. } => {
                let args = args
                    .iter()
                    .map(|arg| {
                        arg.0
                            .iter()
                            .map(|value| self.decode_value(value))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let local = self.string(template);
                ValueInner::Template(TemplateValue {
                    args,
                    id: local.clone(),
                    local,
                })
            }
        };
        let mut decoded = Value::new(inner);

        if let Some(mods) = value.inner.mods() {
            for &index in &mods.refs {
                if index as usize >= self.n_footnotes {
                    return Err(Error::BadFootnoteIndex {
                        index,
                        n_footnotes: self.n_footnotes,
                    });
                }
                decoded.add_footnote(index as usize);
            }
            if !mods.subscripts.is_empty() {
                let subscripts = mods.subscripts.iter().map(|s| self.string(s)).collect();
                decoded = decoded.with_subscripts(subscripts);
            }
            if let Some(style_pair) = mods.style_pair() {
                if let Some(font_style) = &style_pair.font_style.0 {
                    decoded = decoded.with_font_style(self.decode_font_style(font_style)?);
                }
                if let Some(cell_style) = &style_pair.cell_style.0 {
                    decoded = decoded.with_cell_style(self.decode_cell_style(cell_style)?);
                }
            }
            if let ValueInner::Template(template) = &mut decoded.inner {
                if let Some(id) = mods.template_id() {
                    if !id.is_empty() {
                        template.id = self.string(id);
                    }
                }
            }
        }
        Ok(decoded)
    }

    fn decode_dimension(&mut self, dimension: &light::Dimension) -> Result<Dimension, Error> {
        let mut root = Group::new(self.decode_value(&dimension.name)?)
            .with_show_label(!dimension.hide_dim_label);
        self.decode_categories(&dimension.categories, &mut root)?;
        let mut dimension_out = Dimension::from_root(root).map_err(|error| match error {
            DimensionError::DataIndexOutOfRange {
                data_index,
                n_leaves,
            } => Error::LeafIndexOutOfRange {
                leaf_index: data_index,
                n_leaves,
            },
            DimensionError::DuplicateDataIndex(index) => Error::DuplicateLeafIndex(index),
        })?;
        dimension_out.hide_all_labels = dimension.hide_all_labels;
        Ok(dimension_out)
    }

    fn decode_categories(&mut self, categories: &[Category], parent: &mut Group) -> Result<(), Error> {
        for category in categories {
            match &category.child {
                Child::Leaf { leaf_index } => {
                    let name = self.decode_value(&category.name)?;
                    parent.push(Leaf::new(name).with_data_index(*leaf_index as usize));
                }
                Child::Group {
                    merge: true,
                    subcategories,
                    ..
                } => self.decode_categories(subcategories, parent)?,
                Child::Group {
                    merge: false,
                    subcategories,
                    ..
                } => {
                    let mut group = Group::new(self.decode_value(&category.name)?);
                    self.decode_categories(subcategories, &mut group)?;
                    parent.push(group);
                }
            }
        }
        Ok(())
    }
}

fn decode_axes(
    axes: &light::Axes,
    dimensions: Vec<Dimension>,
    pt: &mut PivotTable,
) -> Result<(), Error> {
    let n_dimensions = dimensions.len();
    if axes.layers.len() + axes.rows.len() + axes.columns.len() != n_dimensions {
        return Err(Error::BadAxisSum {
            n_layers: axes.layers.len(),
            n_rows: axes.rows.len(),
            n_columns: axes.columns.len(),
            n_dimensions,
        });
    }

    // Cell indexes are computed over the dimensions in file order, so the
    // dimensions keep that order and the axes refer to them.
    let mut placement = vec![None; n_dimensions];
    for (axis, indexes) in [
        (Axis3::Z, &axes.layers),
        (Axis3::Y, &axes.rows),
        (Axis3::X, &axes.columns),
    ] {
        for (level, &index) in indexes.iter().enumerate() {
            let slot = placement
                .get_mut(index as usize)
                .ok_or(Error::BadDimensionIndex {
                    index,
                    n_dimensions,
                })?;
            if slot.is_some() {
                return Err(Error::DuplicateDimension(index));
            }
            *slot = Some((axis, level));
        }
        pt.axes[axis].dimensions = indexes.iter().map(|index| *index as usize).collect();
    }

    for (top_index, (mut dimension, placement)) in dimensions.into_iter().zip(placement).enumerate()
    {
        // The sum check guarantees that every dimension was placed.
        let (axis, level) = placement.unwrap_or((Axis3::X, 0));
        dimension.axis_type = axis;
        dimension.level = level;
        dimension.top_index = top_index;
        pt.dimensions.push(dimension);
    }
    pt.current_layer = vec![0; axes.layers.len()];
    Ok(())
}

fn width_range(min: i32, max: i32) -> RangeInclusive<usize> {
    min.max(0) as usize..=max.max(0) as usize
}

fn decode_keeps(keeps: &Keeps) -> Vec<Range<usize>> {
    keeps
        .keeps
        .iter()
        .map(|keep| {
            let start = keep.offset as usize;
            start..start + keep.n as usize
        })
        .collect()
}

/// The lowest double marks a system-missing value.
fn decode_number(x: f64) -> Option<f64> {
    (x != -f64::MAX).then_some(x)
}

fn decode_show(show: u8) -> Result<Option<Show>, Error> {
    match show {
        0 => Ok(None),
        1 => Ok(Some(Show::Value)),
        2 => Ok(Some(Show::Label)),
        3 => Ok(Some(Show::Both)),
        other => Err(Error::BadShow(other)),
    }
}

/// Parses a `#rrggbb` color.  An empty string yields `default`.
fn decode_color(s: &str, default: Color) -> Result<Color, Error> {
    if s.is_empty() {
        return Ok(default);
    }
    let bad_color = || Error::BadColor(s.into());
    let hex = s.strip_prefix('#').ok_or_else(bad_color)?;
    let channel = |range: Range<usize>| {
        hex.get(range)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .ok_or_else(bad_color)
    };
    Ok(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Decodes a horizontal alignment.  `None` means mixed alignment.
fn decode_horz_align(
    halign: u32,
    decimal_offset: f64,
    decimal: Decimal,
) -> Result<Option<HorzAlign>, Error> {
    match halign {
        0 => Ok(Some(HorzAlign::Center)),
        2 => Ok(Some(HorzAlign::Left)),
        4 => Ok(Some(HorzAlign::Right)),
        6 | 61453 => Ok(Some(HorzAlign::Decimal {
            offset: decimal_offset,
            decimal,
        })),
        0xffffffad | 64173 => Ok(None),
        other => Err(Error::BadHorzAlign(other)),
    }
}

fn decode_vert_align(valign: u32) -> Result<VertAlign, Error> {
    match valign {
        0 => Ok(VertAlign::Middle),
        1 => Ok(VertAlign::Top),
        3 => Ok(VertAlign::Bottom),
        other => Err(Error::BadVertAlign(other)),
    }
}
