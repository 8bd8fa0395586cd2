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

//! Data for legacy tables.
//!
//! A legacy table keeps its data in a binary member, usually named
//! `*_tableData.bin`, separate from the XML that describes how to arrange it.
//! The data consists of one or more sources, each of which is a set of
//! variables that all have the same number of values.  Every value starts out
//! as a number.  An optional trailing section then replaces some of the
//! numbers by string labels.

use std::fmt::{Display, Formatter};

use displaydoc::Display;
use itertools::Itertools;
use thiserror::Error as ThisError;

pub use crate::data::Datum;

use super::binary::{checked_mul, ErrorDetails as StreamErrorDetails, Stream};

/// An error decoding legacy data.
#[derive(Debug)]
pub struct Error {
    /// Offset where the error occurred, if it is associated with one.
    pub offset: Option<u64>,

    /// Details of the error.
    pub details: ErrorDetails,
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(offset: Option<u64>, details: ErrorDetails) -> Self {
        Self { offset, details }
    }
}

impl From<super::binary::Error> for Error {
    fn from(value: super::binary::Error) -> Self {
        Self::new(Some(value.offset), ErrorDetails::Stream(value.details))
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Self::new(None, details)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(offset) = self.offset {
            write!(f, "at offset {offset:#x}: ")?;
        }
        write!(f, "{}", self.details)
    }
}

/// Details of an [Error].
#[derive(Display, ThisError, Debug)]
pub enum ErrorDetails {
    /// {0}
    Stream(StreamErrorDetails),

    /// Unknown legacy data version {0:#04x} (expected 0xaf or 0xb0).
    UnknownVersion(u8),

    /// Data source "{0}" exceeds supported size.
    SourceTooBig(String),

    /// {size}-byte data source "{source_name}" starting at offset {offset:#x} runs past end of {member_size}-byte ZIP member.
    SourceOverrun {
        size: usize,
        source_name: String,
        offset: usize,
        member_size: usize,
    },

    /// Cannot decode source map for unknown source "{0}".
    UnknownSource(String),

    /// Source map for "{source_name}" has {n_maps} variables but source has only {n_variables}.
    TooManyVariableMaps {
        source_name: String,
        n_maps: usize,
        n_variables: usize,
    },

    /// Source "{source_name}" variable "{variable}" mapping is associated with wrong variable "{mapped}".
    WrongVariable {
        source_name: String,
        variable: String,
        mapped: String,
    },

    /// Source "{source_name}" variable "{variable}" mapping {map_index} attempts to set 0-based value {value_index} but source has only {n_values} values.
    ValueIndexOutOfRange {
        source_name: String,
        variable: String,
        map_index: usize,
        value_index: u32,
        n_values: usize,
    },

    /// Source "{source_name}" variable "{variable}" mapping {map_index} attempts to set value {value_index} to 0-based label {label_index} but only {n_labels} labels are present.
    LabelIndexOutOfRange {
        source_name: String,
        variable: String,
        map_index: usize,
        value_index: u32,
        label_index: u32,
        n_labels: usize,
    },

    /// Source "{source_name}" variable "{variable}" mapping {map_index} attempts to change string value {value_index}.
    StringValueChanged {
        source_name: String,
        variable: String,
        map_index: usize,
        value_index: u32,
    },
}

/// The decoded contents of a legacy data member.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegacyData {
    pub sources: Vec<Source>,
}

/// A set of variables with the same number of values.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    pub name: String,
    pub n_values: usize,
    pub variables: Vec<Variable>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub values: Vec<DataValue>,
}

/// One value of a [Variable].
#[derive(Clone, Debug, PartialEq)]
pub struct DataValue {
    /// For a value that started out as a number and was then relabeled, the
    /// original number.
    pub index: Option<f64>,

    pub datum: Datum,
}

impl DataValue {
    /// Returns the number that identifies this value as a category: the
    /// number itself for a numeric value, otherwise the original number it
    /// replaced.
    pub fn category(&self) -> Option<f64> {
        match &self.datum {
            Datum::Number(number) => *number,
            Datum::String(_) => self.index,
        }
    }
}

const NAME_LEN: usize = 288;
const SOURCE_NAME_LEN: usize = 28;
const EXT_SOURCE_NAME_LEN: usize = 36;

struct Metadata {
    n_values: usize,
    n_variables: usize,
    data_offset: usize,
    name: String,
}

struct SourceMap {
    source_name: String,
    variables: Vec<VariableMap>,
}

struct VariableMap {
    variable_name: String,
    data: Vec<(u32, u32)>,
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl LegacyData {
    /// Parses `input`, the contents of a legacy data member.
    pub fn parse(input: &[u8]) -> Result<Self, Error> {
        let mut stream = Stream::new(input);
        stream.expect_byte(0)?;
        let version_offset = stream.offset();
        let version = stream.u8()?;
        if version != 0xaf && version != 0xb0 {
            return Err(Error::new(
                Some(version_offset),
                ErrorDetails::UnknownVersion(version),
            ));
        }
        let n_sources = stream.u16()?;
        let _member_size = stream.u32()?;

        let mut metadata = Vec::with_capacity(n_sources as usize);
        for _ in 0..n_sources {
            let n_values = stream.u32()? as usize;
            let n_variables = stream.u32()? as usize;
            let data_offset = stream.u32()? as usize;
            let source_name = stream.bytes(SOURCE_NAME_LEN)?;
            let mut name = source_name.to_vec();
            if version == 0xb0 {
                let ext_source_name = stream.fixed_string(EXT_SOURCE_NAME_LEN)?;
                let _x = stream.u32()?;

                // The extension continues the name only if the name fills its
                // whole field.
                if !source_name.contains(&0) {
                    name.extend_from_slice(ext_source_name);
                }
            }
            if let Some(nul) = name.iter().position(|b| *b == 0) {
                name.truncate(nul);
            }
            metadata.push(Metadata {
                n_values,
                n_variables,
                data_offset,
                name: lossy(&name),
            });
        }

        let mut sources = Vec::with_capacity(metadata.len());
        let mut end = stream.position();
        for md in metadata {
            let (source, source_end) = decode_source(input, md)?;
            sources.push(source);
            end = end.max(source_end);
        }
        let mut data = Self { sources };

        stream.seek(end)?;
        if !stream.is_empty() {
            let maps = parse_source_maps(&mut stream)?;
            let labels = parse_labels(&mut stream)?;
            stream.expect_end()?;
            for map in &maps {
                data.apply_source_map(map, &labels)?;
            }
        }
        Ok(data)
    }

    pub fn find_source(&self, source_name: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|source| source.name == source_name)
    }

    pub fn find_variable(&self, source_name: &str, variable_name: &str) -> Option<&Variable> {
        self.find_source(source_name)?
            .find_variable(variable_name)
    }

    fn apply_source_map(&mut self, map: &SourceMap, labels: &[String]) -> Result<(), Error> {
        let source = self
            .sources
            .iter_mut()
            .find(|source| source.name == map.source_name)
            .ok_or_else(|| ErrorDetails::UnknownSource(map.source_name.clone()))?;
        if map.variables.len() > source.variables.len() {
            return Err(ErrorDetails::TooManyVariableMaps {
                source_name: source.name.clone(),
                n_maps: map.variables.len(),
                n_variables: source.variables.len(),
            }
            .into());
        }

        for (variable_map, variable) in map.variables.iter().zip(&mut source.variables) {
            if variable_map.variable_name != variable.name {
                return Err(ErrorDetails::WrongVariable {
                    source_name: source.name.clone(),
                    variable: variable.name.clone(),
                    mapped: variable_map.variable_name.clone(),
                }
                .into());
            }
            for (map_index, &(value_index, label_index)) in variable_map.data.iter().enumerate() {
                let n_values = variable.values.len();
                let Some(value) = variable.values.get_mut(value_index as usize) else {
                    return Err(ErrorDetails::ValueIndexOutOfRange {
                        source_name: source.name.clone(),
                        variable: variable.name.clone(),
                        map_index,
                        value_index,
                        n_values,
                    }
                    .into());
                };
                let Some(label) = labels.get(label_index as usize) else {
                    return Err(ErrorDetails::LabelIndexOutOfRange {
                        source_name: source.name.clone(),
                        variable: variable.name.clone(),
                        map_index,
                        value_index,
                        label_index,
                        n_labels: labels.len(),
                    }
                    .into());
                };
                if matches!(value.datum, Datum::String(_)) {
                    return Err(ErrorDetails::StringValueChanged {
                        source_name: source.name.clone(),
                        variable: variable.name.clone(),
                        map_index,
                        value_index,
                    }
                    .into());
                }

                // TODO: decide whether relabeling a non-missing number should
                // warn; real files do it routinely, so for now it is silent.
                value.datum = Datum::String(label.clone());
            }
        }
        Ok(())
    }
}

impl Source {
    pub fn find_variable(&self, variable_name: &str) -> Option<&Variable> {
        self.variables
            .iter()
            .find(|variable| variable.name == variable_name)
    }
}

fn decode_source(input: &[u8], md: Metadata) -> Result<(Source, usize), Error> {
    let source_size = checked_mul(md.n_values, 8, "variable size")
        .ok()
        .and_then(|values| values.checked_add(NAME_LEN))
        .and_then(|variable_size| variable_size.checked_mul(md.n_variables));
    let Some((source_size, end)) =
        source_size.and_then(|size| Some((size, md.data_offset.checked_add(size)?)))
    else {
        return Err(ErrorDetails::SourceTooBig(md.name).into());
    };
    if end > input.len() {
        return Err(ErrorDetails::SourceOverrun {
            size: source_size,
            source_name: md.name,
            offset: md.data_offset,
            member_size: input.len(),
        }
        .into());
    }

    let mut stream = Stream::new(&input[..end]);
    stream.seek(md.data_offset)?;
    let mut variables = Vec::with_capacity(md.n_variables);
    for _ in 0..md.n_variables {
        let name = lossy(stream.fixed_string(NAME_LEN)?);
        let values = (0..md.n_values)
            .map(|_| {
                let x = stream.f64()?;
                Ok(DataValue {
                    index: None,
                    datum: Datum::Number((x != -f64::MAX).then_some(x)),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        variables.push(Variable { name, values });
    }
    Ok((
        Source {
            name: md.name,
            n_values: md.n_values,
            variables,
        },
        end,
    ))
}

fn string(stream: &mut Stream) -> Result<String, Error> {
    Ok(lossy(stream.string()?))
}

fn parse_source_maps(stream: &mut Stream) -> Result<Vec<SourceMap>, Error> {
    let n_maps = stream.u32()?;
    (0..n_maps)
        .map(|_| {
            let source_name = string(stream)?;
            let n_variables = stream.u32()?;
            let variables = (0..n_variables)
                .map(|_| {
                    let variable_name = string(stream)?;
                    let n_data = stream.u32()?;
                    let data = (0..n_data)
                        .map(|_| Ok((stream.u32()?, stream.u32()?)))
                        .collect::<Result<Vec<_>, Error>>()?;
                    Ok(VariableMap {
                        variable_name,
                        data,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            Ok(SourceMap {
                source_name,
                variables,
            })
        })
        .collect()
}

fn parse_labels(stream: &mut Stream) -> Result<Vec<String>, Error> {
    let n_labels = stream.u32()?;
    (0..n_labels)
        .map(|_| {
            let _frequency = stream.u32()?;
            string(stream)
        })
        .collect()
}

impl Display for LegacyData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sources.iter().format("\n"))
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "source \"{}\" ({} values):", self.name, self.n_values)?;
        for variable in &self.variables {
            writeln!(f, "{variable}")?;
        }
        Ok(())
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "variable \"{}\":", self.name)?;
        if !self.values.is_empty() {
            write!(f, " {}", self.values.iter().format(", "))?;
        }
        Ok(())
    }
}

impl Display for DataValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(index) = self.index {
            write!(f, "{}e-", DisplayG(index))?;
        }
        match &self.datum {
            Datum::String(s) => write!(f, "\"{s}\""),
            Datum::Number(None) => write!(f, "."),
            Datum::Number(Some(number)) => write!(f, "{}", DisplayG(*number)),
        }
    }
}

/// Displays a number with up to 16 significant digits, in the manner of
/// C's `%.16g`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DisplayG(pub f64);

impl DisplayG {
    const PRECISION: usize = 16;
}

impl Display for DisplayG {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let x = self.0;
        if !x.is_finite() {
            return match x {
                x if x.is_nan() => write!(f, "nan"),
                x if x > 0.0 => write!(f, "inf"),
                _ => write!(f, "-inf"),
            };
        }
        if x == 0.0 {
            return write!(f, "{}", if x.is_sign_negative() { "-0" } else { "0" });
        }

        // Round to the target precision first, because rounding can change
        // the exponent.
        let scientific = format!("{:.*e}", Self::PRECISION - 1, x);
        let (mantissa, exponent) = scientific
            .split_once('e')
            .unwrap_or((scientific.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        if exponent < -4 || exponent >= Self::PRECISION as i32 {
            let sign = if exponent < 0 { '-' } else { '+' };
            write!(
                f,
                "{}e{sign}{:02}",
                trim_fraction(mantissa),
                exponent.unsigned_abs()
            )
        } else {
            let decimals = (Self::PRECISION as i32 - 1 - exponent) as usize;
            write!(f, "{}", trim_fraction(&format!("{x:.decimals$}")))
        }
    }
}

/// Removes trailing zeros after a decimal point, and the point itself if
/// nothing follows it.
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::{Datum, DisplayG, ErrorDetails, LegacyData};

    fn name_field(name: &str, width: usize) -> Vec<u8> {
        let mut field = name.as_bytes().to_vec();
        field.resize(width, 0);
        field
    }

    fn string(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    /// Builds version 0xb0 legacy data with one source named `cells`.
    fn legacy_data(variables: &[(&str, &[f64])], strings: Option<&[u8]>) -> Vec<u8> {
        let n_values = variables.first().map_or(0, |(_, values)| values.len());
        let header_len = 8 + 12 + 28 + 36 + 4;
        let mut out = vec![0, 0xb0];
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(n_values as u32).to_le_bytes());
        out.extend_from_slice(&(variables.len() as u32).to_le_bytes());
        out.extend_from_slice(&(header_len as u32).to_le_bytes());
        out.extend(name_field("cells", 28));
        out.extend(name_field("", 36));
        out.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(out.len(), header_len);
        for (name, values) in variables {
            out.extend(name_field(name, 288));
            for value in *values {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        if let Some(strings) = strings {
            out.extend_from_slice(strings);
        }
        out
    }

    #[test]
    fn numbers() {
        let input = legacy_data(
            &[("row", &[0.0, 1.0]), ("cell", &[1.5, -f64::MAX])],
            None,
        );
        let data = LegacyData::parse(&input).unwrap();
        assert_eq!(data.sources.len(), 1);
        let cell = data.find_variable("cells", "cell").unwrap();
        assert_eq!(cell.values[0].datum, Datum::Number(Some(1.5)));
        assert_eq!(cell.values[1].datum, Datum::Number(None));
        assert_eq!(
            data.to_string(),
            "source \"cells\" (2 values):\nvariable \"row\": 0, 1\nvariable \"cell\": 1.5, .\n"
        );
    }

    #[test]
    fn labels() {
        let mut strings = Vec::new();
        strings.extend_from_slice(&1u32.to_le_bytes());
        string(&mut strings, "cells");
        strings.extend_from_slice(&1u32.to_le_bytes());
        string(&mut strings, "row");
        strings.extend_from_slice(&1u32.to_le_bytes());
        strings.extend_from_slice(&1u32.to_le_bytes());
        strings.extend_from_slice(&0u32.to_le_bytes());
        strings.extend_from_slice(&1u32.to_le_bytes());
        strings.extend_from_slice(&3u32.to_le_bytes());
        string(&mut strings, "Male");

        let input = legacy_data(&[("row", &[0.0, 1.0])], Some(&strings));
        let data = LegacyData::parse(&input).unwrap();
        let row = data.find_variable("cells", "row").unwrap();
        assert_eq!(row.values[0].datum, Datum::Number(Some(0.0)));
        assert_eq!(row.values[1].datum, Datum::String(String::from("Male")));
        assert_eq!(row.to_string(), "variable \"row\": 0, \"Male\"");
    }

    #[test]
    fn bad_label_index() {
        let mut strings = Vec::new();
        strings.extend_from_slice(&1u32.to_le_bytes());
        string(&mut strings, "cells");
        strings.extend_from_slice(&1u32.to_le_bytes());
        string(&mut strings, "row");
        strings.extend_from_slice(&1u32.to_le_bytes());
        strings.extend_from_slice(&0u32.to_le_bytes());
        strings.extend_from_slice(&5u32.to_le_bytes());
        strings.extend_from_slice(&0u32.to_le_bytes());

        let input = legacy_data(&[("row", &[0.0])], Some(&strings));
        let error = LegacyData::parse(&input).unwrap_err();
        assert!(matches!(
            error.details,
            ErrorDetails::LabelIndexOutOfRange { label_index: 5, .. }
        ));
    }

    #[test]
    fn overrun() {
        let mut input = legacy_data(&[("row", &[0.0, 1.0])], None);
        input.truncate(input.len() - 4);
        let error = LegacyData::parse(&input).unwrap_err();
        assert!(matches!(error.details, ErrorDetails::SourceOverrun { .. }));
    }

    #[test]
    fn bad_version() {
        let error = LegacyData::parse(&[0, 0xa0, 0, 0]).unwrap_err();
        assert_eq!(error.offset, Some(1));
        assert!(matches!(error.details, ErrorDetails::UnknownVersion(0xa0)));
    }

    #[test]
    fn display_g() {
        assert_eq!(DisplayG(1.0).to_string(), "1");
        assert_eq!(DisplayG(0.1).to_string(), "0.1");
        assert_eq!(DisplayG(-2.5).to_string(), "-2.5");
        assert_eq!(DisplayG(1e20).to_string(), "1e+20");
        assert_eq!(DisplayG(0.00001234).to_string(), "1.234e-05");
        assert_eq!(DisplayG(123456.0).to_string(), "123456");
    }
}
