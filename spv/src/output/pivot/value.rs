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

use std::{
    fmt::{Debug, Display, Write},
    iter::{once, repeat},
};

use quick_xml::{events::Event, Reader};

use super::{Display26Adic, FontStyle, Footnote, FootnoteMarkerType, PivotTable};
use crate::{
    data::Datum,
    format::{Format, Settings as FormatSettings, Type, UncheckedFormat},
    output::pivot::CellStyle,
    settings::{Settings, Show},
};

/// The content of a single pivot table cell.
///
/// A [Value] is also a pivot table's title, caption, footnote marker and
/// contents, and so on.
///
/// A given [Value] is one of:
///
/// 1. A number resulting from a calculation ([ValueInner::Number]).
///
///    A number has an associated display format (usually [F] or [Pct]).  A
///    number without a format takes one from the categories of the cell that
///    it is put into, see [PivotTable::put].
///
///    [F]: crate::format::Type::F
///    [Pct]: crate::format::Type::Pct
///
/// 2. A numeric or string value obtained from data ([ValueInner::Number] or
///    [ValueInner::String]).  If such a value corresponds to a variable, then
///    the variable's name can be attached to it.  If the value has a value
///    label, then that can also be attached.  When a label is present, the
///    user can control whether to show the value or the label or both.
///
/// 3. A variable name ([ValueInner::Variable]).  The variable label, if any,
///    can be attached too, and again the user can control whether to show the
///    value or the label or both.
///
/// 4. A text string ([ValueInner::Text]).  The value stores the string in
///    English and translated into the output language (localized).
///
/// 5. A template ([ValueInner::Template]), as written by SPSS.
#[derive(Clone, Default, PartialEq)]
pub struct Value {
    pub inner: ValueInner,
    pub styling: Option<Box<ValueStyle>>,
}

impl Value {
    pub fn new(inner: ValueInner) -> Self {
        Self {
            inner,
            styling: None,
        }
    }

    /// Creates a number whose format will be chosen by the table that it is
    /// put into.
    pub fn new_number(x: Option<f64>) -> Self {
        Self::new(ValueInner::Number(NumberValue {
            show: None,
            format: None,
            honor_small: false,
            value: x,
            var_name: None,
            value_label: None,
        }))
    }

    pub fn new_number_with_format(x: Option<f64>, format: Format) -> Self {
        Self::new(ValueInner::Number(NumberValue {
            show: None,
            format: Some(format),
            honor_small: false,
            value: x,
            var_name: None,
            value_label: None,
        }))
    }

    pub fn new_integer(x: Option<f64>) -> Self {
        Self::new_number_with_format(x, Format::F40)
    }

    pub fn new_string(s: impl Into<String>) -> Self {
        Self::new(ValueInner::String(StringValue {
            show: None,
            hex: false,
            s: s.into(),
            var_name: None,
            value_label: None,
        }))
    }

    pub fn new_variable(var_name: impl Into<String>, variable_label: Option<String>) -> Self {
        Self::new(ValueInner::Variable(VariableValue {
            show: None,
            var_name: var_name.into(),
            variable_label,
        }))
    }

    pub fn new_text(s: impl Into<String>) -> Self {
        let s: String = s.into();
        Self::new(ValueInner::Text(TextValue {
            user_provided: false,
            local: s.clone(),
            c: s.clone(),
            id: s,
        }))
    }

    pub fn new_user_text(s: impl Into<String>) -> Self {
        let s: String = s.into();
        if s.is_empty() {
            Self::default()
        } else {
            Self::new(ValueInner::Text(TextValue {
                user_provided: true,
                local: s.clone(),
                c: s.clone(),
                id: s,
            }))
        }
    }

    pub fn with_footnote(mut self, footnote: usize) -> Self {
        self.add_footnote(footnote);
        self
    }

    /// Adds a reference to the footnote with index `footnote`, keeping the
    /// references in order.
    pub fn add_footnote(&mut self, footnote: usize) {
        let footnotes = &mut self.styling.get_or_insert_default().footnotes;
        if let Err(position) = footnotes.binary_search(&footnote) {
            footnotes.insert(position, footnote);
        }
    }

    pub fn clear_footnotes(&mut self) {
        if let Some(styling) = &mut self.styling {
            styling.footnotes.clear();
        }
    }

    pub fn with_subscripts(mut self, subscripts: Vec<String>) -> Self {
        self.styling.get_or_insert_default().subscripts = subscripts;
        self
    }

    pub fn with_font_style(mut self, font_style: FontStyle) -> Self {
        self.styling.get_or_insert_default().font_style = Some(font_style);
        self
    }

    pub fn with_cell_style(mut self, cell_style: CellStyle) -> Self {
        self.styling.get_or_insert_default().cell_style = Some(cell_style);
        self
    }

    pub fn with_show_value_label(mut self, show: Option<Show>) -> Self {
        let new_show = show;
        match &mut self.inner {
            ValueInner::Number(NumberValue { show, .. })
            | ValueInner::String(StringValue { show, .. }) => {
                *show = new_show;
            }
            _ => (),
        }
        self
    }

    pub fn with_value_label(mut self, label: Option<String>) -> Self {
        match &mut self.inner {
            ValueInner::Number(NumberValue { value_label, .. })
            | ValueInner::String(StringValue { value_label, .. }) => *value_label = label,
            _ => (),
        }
        self
    }

    pub const fn empty() -> Self {
        Value {
            inner: ValueInner::Empty,
            styling: None,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty() && self.styling.is_none()
    }

    /// Returns the footnote indexes that this value references.
    pub fn footnotes(&self) -> &[usize] {
        match &self.styling {
            Some(styling) => &styling.footnotes,
            None => &[],
        }
    }

    pub fn font_style(&self) -> Option<&FontStyle> {
        self.styling.as_ref().and_then(|s| s.font_style.as_ref())
    }

    pub fn cell_style(&self) -> Option<&CellStyle> {
        self.styling.as_ref().and_then(|s| s.cell_style.as_ref())
    }

    /// Returns an object that will format this value, including subscripts and
    /// footnote markers.  `options` controls whether variable and value labels
    /// are included.
    pub fn display<'a>(&'a self, options: impl IntoValueOptions<'a>) -> DisplayValue<'a> {
        let display = self.inner.display(options);
        match &self.styling {
            Some(styling) => display.with_styling(styling),
            None => display,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::new_text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::new_text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::new_number(Some(value))
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.display(()).to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NumberValue {
    pub show: Option<Show>,

    /// `None` until the number is put into a table that chooses one.
    pub format: Option<Format>,
    pub honor_small: bool,
    pub value: Option<f64>,
    pub var_name: Option<String>,
    pub value_label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringValue {
    pub show: Option<Show>,
    pub hex: bool,

    /// If `hex` is true, this string should already be hex digits
    /// (otherwise it would be impossible to encode non-UTF-8 data).
    pub s: String,
    pub var_name: Option<String>,
    pub value_label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableValue {
    pub show: Option<Show>,
    pub var_name: String,
    pub variable_label: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TextValue {
    pub user_provided: bool,
    /// Localized.
    pub local: String,
    /// English.
    pub c: String,
    /// Identifier.
    pub id: String,
}

impl TextValue {
    /// Returns the text to display: the localized version, or the English one
    /// if there is no localized version.
    pub fn text(&self) -> &str {
        if self.local.is_empty() {
            &self.c
        } else {
            &self.local
        }
    }
}

impl PartialEq for TextValue {
    fn eq(&self, other: &Self) -> bool {
        self.user_provided == other.user_provided
            && self.text() == other.text()
            && self.c == other.c
            && self.id == other.id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateValue {
    pub args: Vec<Vec<Value>>,
    pub local: String,
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ValueInner {
    Number(NumberValue),
    String(StringValue),
    Variable(VariableValue),
    Text(TextValue),
    Template(TemplateValue),

    #[default]
    Empty,
}

impl ValueInner {
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn show(&self) -> Option<Show> {
        match self {
            ValueInner::Number(NumberValue { show, .. })
            | ValueInner::String(StringValue { show, .. })
            | ValueInner::Variable(VariableValue { show, .. }) => *show,
            _ => None,
        }
    }

    fn value_label(&self) -> Option<&str> {
        match self {
            ValueInner::Number(NumberValue { value_label, .. })
            | ValueInner::String(StringValue { value_label, .. }) => value_label.as_deref(),
            _ => None,
        }
    }

    fn variable_label(&self) -> Option<&str> {
        match self {
            ValueInner::Variable(VariableValue { variable_label, .. }) => {
                variable_label.as_deref()
            }
            _ => None,
        }
    }

    // Returns an object that will format this value.  Settings on `options`
    // control whether variable and value labels are included.
    pub fn display<'a>(&'a self, options: impl IntoValueOptions<'a>) -> DisplayValue<'a> {
        let options = options.into_value_options();
        let (show_value, show_label) = if let Some(value_label) = self.value_label() {
            interpret_show(
                || Settings::global().show_values,
                options.show_values,
                self.show(),
                value_label,
            )
        } else if let Some(variable_label) = self.variable_label() {
            interpret_show(
                || Settings::global().show_variables,
                options.show_variables,
                self.show(),
                variable_label,
            )
        } else {
            (true, None)
        };
        DisplayValue {
            inner: self,
            markup: false,
            subscripts: &[],
            footnotes: &[],
            options,
            show_value,
            show_label,
        }
    }
}

/// Optional styling and decorations for a [Value].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueStyle {
    pub font_style: Option<FontStyle>,
    pub cell_style: Option<CellStyle>,
    pub subscripts: Vec<String>,

    /// Indexes into the table's footnotes, in increasing order.
    pub footnotes: Vec<usize>,
}

impl ValueStyle {
    pub fn is_empty(&self) -> bool {
        self.font_style.is_none()
            && self.cell_style.is_none()
            && self.subscripts.is_empty()
            && self.footnotes.is_empty()
    }
}

/// Settings that affect how a [Value] is formatted.
#[derive(Copy, Clone, Debug)]
pub struct ValueOptions<'a> {
    pub show_values: Option<Show>,

    pub show_variables: Option<Show>,

    /// Numbers with smaller magnitude than this, in categories that honor it,
    /// are shown in scientific notation.
    pub small: f64,

    pub footnote_marker_type: FootnoteMarkerType,

    pub settings: &'a FormatSettings,

    /// The footnotes that footnote references resolve against.
    pub footnotes: &'a [Footnote],
}

impl Default for ValueOptions<'static> {
    fn default() -> Self {
        let settings = Settings::global();
        Self {
            show_values: None,
            show_variables: None,
            small: settings.small,
            footnote_marker_type: FootnoteMarkerType::default(),
            settings: &settings.formats,
            footnotes: &[],
        }
    }
}

pub trait IntoValueOptions<'a> {
    fn into_value_options(self) -> ValueOptions<'a>;
}

impl<'a> IntoValueOptions<'a> for () {
    fn into_value_options(self) -> ValueOptions<'a> {
        ValueOptions::default()
    }
}

impl<'a> IntoValueOptions<'a> for &'a PivotTable {
    fn into_value_options(self) -> ValueOptions<'a> {
        self.value_options()
    }
}

impl<'a> IntoValueOptions<'a> for &ValueOptions<'a> {
    fn into_value_options(self) -> ValueOptions<'a> {
        *self
    }
}

impl<'a> IntoValueOptions<'a> for ValueOptions<'a> {
    fn into_value_options(self) -> ValueOptions<'a> {
        self
    }
}

pub struct DisplayValue<'a> {
    inner: &'a ValueInner,
    markup: bool,
    subscripts: &'a [String],
    footnotes: &'a [usize],
    options: ValueOptions<'a>,
    show_value: bool,
    show_label: Option<&'a str>,
}

impl<'a> DisplayValue<'a> {
    pub fn subscripts(&self) -> impl Iterator<Item = &str> {
        self.subscripts.iter().map(String::as_str)
    }

    /// Returns the markers for the footnotes that should be shown.
    pub fn footnotes(&self) -> impl Iterator<Item = DisplayMarker<'a>> + '_ {
        self.footnotes.iter().filter_map(|index| {
            let footnote = self.options.footnotes.get(*index);
            if footnote.is_some_and(|footnote| !footnote.show) {
                None
            } else {
                Some(DisplayMarker {
                    index: *index,
                    marker: footnote.and_then(|f| f.marker.as_deref()),
                    options: self.options,
                })
            }
        })
    }

    pub fn without_suffixes(self) -> Self {
        Self {
            subscripts: &[],
            footnotes: &[],
            ..self
        }
    }

    pub fn with_styling(mut self, styling: &'a ValueStyle) -> Self {
        if let Some(font_style) = &styling.font_style {
            self.markup = font_style.markup;
        }
        self.subscripts = styling.subscripts.as_slice();
        self.footnotes = styling.footnotes.as_slice();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty() && self.subscripts.is_empty() && self.footnotes.is_empty()
    }

    fn template(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        template: &str,
        args: &[Vec<Value>],
    ) -> std::fmt::Result {
        let mut iter = template.chars();
        while let Some(c) = iter.next() {
            match c {
                '\\' => match iter.next() {
                    Some('n') => f.write_char('\n')?,
                    Some(c) => f.write_char(c)?,
                    None => f.write_char('\\')?,
                },
                '^' => {
                    let (index, rest) = consume_int(iter.as_str());
                    iter = rest.chars();
                    if let Some(arg) = index
                        .checked_sub(1)
                        .and_then(|i| args.get(i))
                        .and_then(|arg| arg.first())
                    {
                        write!(f, "{}", arg.display(self.options))?;
                    }
                }
                '[' => {
                    let (first, rest) = extract_inner_template(iter.as_str());
                    let (subsequent, rest) = extract_inner_template(rest);
                    let rest = rest.strip_prefix(']').unwrap_or(rest);
                    let (index, rest) = consume_int(rest);
                    iter = rest.chars();

                    let Some(mut args) = index.checked_sub(1).and_then(|i| args.get(i)) else {
                        continue;
                    };
                    let mut args = args.as_slice();
                    let (mut template, mut escape) = if !first.is_empty() {
                        (first, '%')
                    } else {
                        (subsequent, '^')
                    };
                    while !args.is_empty() {
                        let n_consumed = self.inner_template(f, template, escape, args)?;
                        if n_consumed == 0 {
                            break;
                        }
                        args = &args[n_consumed..];

                        template = subsequent;
                        escape = '^';
                    }
                }
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }

    fn inner_template(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        template: &str,
        escape: char,
        args: &[Value],
    ) -> Result<usize, std::fmt::Error> {
        let mut iter = template.chars();
        let mut args_consumed = 0;
        while let Some(c) = iter.next() {
            match c {
                '\\' => match iter.next() {
                    Some('n') => f.write_char('\n')?,
                    Some(c) => f.write_char(c)?,
                    None => f.write_char('\\')?,
                },
                c if c == escape => {
                    let (index, rest) = consume_int(iter.as_str());
                    iter = rest.chars();
                    let Some(arg) = index.checked_sub(1).and_then(|i| args.get(i)) else {
                        continue;
                    };
                    args_consumed = args_consumed.max(index);
                    write!(f, "{}", arg.display(self.options))?;
                }
                c => f.write_char(c)?,
            }
        }
        Ok(args_consumed)
    }
}

fn consume_int(input: &str) -> (usize, &str) {
    let digits = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, rest) = input.split_at(digits);
    (number.parse().unwrap_or(0), rest)
}

/// Splits `input` at the first unescaped `:`, returning the part before it and
/// the part after it.
fn extract_inner_template(input: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ':' => return (&input[..index], &input[index + 1..]),
            _ => (),
        }
    }
    (input, "")
}

fn interpret_show(
    global_show: impl Fn() -> Show,
    table_show: Option<Show>,
    value_show: Option<Show>,
    label: &str,
) -> (bool, Option<&str>) {
    match value_show.or(table_show).unwrap_or_else(global_show) {
        Show::Value => (true, None),
        Show::Label => (false, Some(label)),
        Show::Both => (true, Some(label)),
    }
}

/// Writes the text content of `markup`, dropping its tags.  If `markup` isn't
/// well-formed, writes it unchanged.
fn write_without_markup(f: &mut std::fmt::Formatter<'_>, markup: &str) -> std::fmt::Result {
    fn extract(markup: &str) -> Option<String> {
        let wrapped = format!("<xml>{markup}</xml>");
        let mut reader = Reader::from_str(&wrapped);
        let mut text = String::new();
        loop {
            match reader.read_event().ok()? {
                Event::Text(t) => text.push_str(&t.unescape().ok()?),
                Event::CData(t) => text.push_str(std::str::from_utf8(&t).ok()?),
                Event::Eof => return Some(text),
                _ => (),
            }
        }
    }
    match extract(markup) {
        Some(text) => f.write_str(&text),
        None => f.write_str(markup),
    }
}

impl Display for DisplayValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner {
            ValueInner::Number(NumberValue {
                format,
                honor_small,
                value,
                ..
            }) => {
                if self.show_value {
                    let format = format.unwrap_or(Settings::global().default_format);
                    let format = if format.type_() == Type::F
                        && *honor_small
                        && value.is_some_and(|value| value != 0.0 && value.abs() < self.options.small)
                    {
                        UncheckedFormat::new(Type::E, 40, format.d() as u8).fix()
                    } else {
                        format
                    };
                    write!(
                        f,
                        "{}",
                        Datum::Number(*value)
                            .display(format)
                            .with_settings(self.options.settings)
                            .with_trimming()
                    )?;
                }
                if let Some(label) = self.show_label {
                    if self.show_value {
                        f.write_char(' ')?;
                    }
                    f.write_str(label)?;
                }
                Ok(())
            }

            ValueInner::String(StringValue { s, .. })
            | ValueInner::Variable(VariableValue { var_name: s, .. }) => {
                match (self.show_value, self.show_label) {
                    (true, None) => write!(f, "{s}"),
                    (false, Some(label)) => write!(f, "{label}"),
                    (true, Some(label)) => write!(f, "{s} {label}"),
                    (false, None) => Ok(()),
                }
            }

            ValueInner::Text(text) if self.markup => write_without_markup(f, text.text()),
            ValueInner::Text(text) => f.write_str(text.text()),

            ValueInner::Template(TemplateValue { args, local, .. }) => {
                self.template(f, local, args)
            }

            ValueInner::Empty => Ok(()),
        }?;

        for (subscript, delimiter) in self.subscripts.iter().zip(once('_').chain(repeat(','))) {
            write!(f, "{delimiter}{subscript}")?;
        }

        for marker in self.footnotes() {
            write!(f, "[{marker}]")?;
        }

        Ok(())
    }
}

/// Formats the marker for a footnote: its custom marker if it has one,
/// otherwise a number or letter derived from its index.
pub struct DisplayMarker<'a> {
    pub(super) index: usize,
    pub(super) marker: Option<&'a Value>,
    pub(super) options: ValueOptions<'a>,
}

impl Display for DisplayMarker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(marker) = self.marker {
            write!(f, "{}", marker.display(self.options).without_suffixes())
        } else {
            let i = self.index + 1;
            match self.options.footnote_marker_type {
                FootnoteMarkerType::Alphabetic => write!(f, "{}", Display26Adic(i)),
                FootnoteMarkerType::Numeric => write!(f, "{i}"),
            }
        }
    }
}
