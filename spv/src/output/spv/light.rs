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

//! Light binary tables.
//!
//! A "light" table is a pivot table stored as a single binary ZIP member,
//! usually named `*_lightTableData.bin`.  This module parses the member into
//! [LightTable], a raw syntax tree that mirrors the on-disk structure.  The
//! [decode] submodule lowers that tree into a [PivotTable](crate::output::pivot::PivotTable).
//!
//! Most of the format is little-endian, but a few sections (borders, print
//! settings, table settings) are big-endian.  Strings are stored as a 32-bit
//! length followed by bytes in an encoding that the table declares only in
//! its trailing format settings, so they stay as bytes here.

use std::{
    fmt::{Debug, Formatter},
    io::{Cursor, Read, Seek, SeekFrom},
};

use binrw::{binread, BinRead, BinResult, Endian, Error as BinError};
use displaydoc::Display;
use thiserror::Error as ThisError;

use super::binary::DisplayBinError;

pub mod decode;

/// An error parsing or decoding a light table.
#[derive(Display, ThisError, Debug)]
pub enum Error {
    /// light table member is empty
    Empty,

    /// unknown version {0} (expected 1 or 3)
    UnknownVersion(u32),

    /// {0}
    BinError(DisplayBinError),

    /// expected end of file at offset {0:#x}
    ExpectedEnd(u64),

    /// bad footnote index: {index} >= {n_footnotes}
    BadFootnoteIndex { index: u16, n_footnotes: usize },

    /// bad color {0:?}
    BadColor(String),

    /// bad cell style halign {0}
    BadHorzAlign(u32),

    /// bad cell style valign {0}
    BadVertAlign(u32),

    /// bad value show {0}
    BadShow(u8),

    /// bad border type {0}
    BadBorderType(u32),

    /// bad stroke {0}
    BadStroke(u32),

    /// leaf_index {leaf_index} >= n_leaves {n_leaves}
    LeafIndexOutOfRange { leaf_index: usize, n_leaves: usize },

    /// two leaves with data_index {0}
    DuplicateLeafIndex(usize),

    /// dimensions do not sum correctly ({n_layers} + {n_rows} + {n_columns} != {n_dimensions})
    BadAxisSum {
        n_layers: usize,
        n_rows: usize,
        n_columns: usize,
        n_dimensions: usize,
    },

    /// bad dimension index {index} >= {n_dimensions}
    BadDimensionIndex { index: u32, n_dimensions: usize },

    /// duplicate dimension {0}
    DuplicateDimension(u32),

    /// out of range layer data index {0}
    BadLayerIndex(u32),

    /// out of range cell data index {0}
    BadCellIndex(u64),
}

impl From<BinError> for Error {
    fn from(value: BinError) -> Self {
        Self::BinError(DisplayBinError(value))
    }
}

/// Parses `input`, the contents of a light table member.
pub fn parse(input: &[u8]) -> Result<LightTable, Error> {
    if input.is_empty() {
        return Err(Error::Empty);
    }
    if let Some(version) = input.get(2..6) {
        match u32::from_le_bytes([version[0], version[1], version[2], version[3]]) {
            1 | 3 => (),
            other if input.starts_with(b"\x01\0") => return Err(Error::UnknownVersion(other)),
            _ => (),
        }
    }

    let mut cursor = Cursor::new(input);
    let table = LightTable::read(&mut cursor)?;
    if input.get(cursor.position() as usize) == Some(&1) {
        cursor.set_position(cursor.position() + 1);
    }
    if cursor.position() != input.len() as u64 {
        return Err(Error::ExpectedEnd(cursor.position()));
    }
    Ok(table)
}

/// Light table format version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Version {
    V1,
    V3,
}

impl BinRead for Version {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        match u32::read_options(reader, endian, ())? {
            1 => Ok(Self::V1),
            3 => Ok(Self::V3),
            other => Err(BinError::AssertFail {
                pos,
                message: format!("unknown version {other} (expected 1 or 3)"),
            }),
        }
    }
}

/// A string as stored in a light table: a 32-bit length and then that many
/// bytes, in the table's encoding.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawString(pub Vec<u8>);

impl RawString {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for RawString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl BinRead for RawString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let len = u32::read_options(reader, endian, ())?;
        let mut bytes = Vec::new();
        reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len as usize {
            return Err(BinError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(Self(bytes))
    }
}

/// Either `58`, meaning absent, or `31` followed by a `T`.
#[derive(Clone, Default, PartialEq)]
pub struct Optional<T>(pub Option<T>);

impl<T> Debug for Optional<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> BinRead for Optional<T>
where
    T: BinRead,
{
    type Args<'a> = T::Args<'a>;

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        match u8::read_options(reader, endian, ())? {
            0x31 => Ok(Self(Some(T::read_options(reader, endian, args)?))),
            0x58 => Ok(Self(None)),
            other => {
                reader.seek(SeekFrom::Start(pos))?;
                Err(BinError::AssertFail {
                    pos,
                    message: format!("expected 0x31 or 0x58, not {other:#04x}"),
                })
            }
        }
    }
}

/// Reads a 32-bit byte count and then calls `f` to parse the data that it
/// covers.  Bytes that `f` leaves unparsed are skipped.
fn read_counted<R, T, F>(reader: &mut R, endian: Endian, f: F) -> BinResult<T>
where
    R: Read + Seek,
    F: FnOnce(&mut R, u32) -> BinResult<T>,
{
    let count = u32::read_options(reader, endian, ())?;
    let start = reader.stream_position()?;
    let end = start + count as u64;
    let inner = f(reader, count)?;
    let pos = reader.stream_position()?;
    if pos > end {
        return Err(BinError::AssertFail {
            pos: start,
            message: format!(
                "{count}-byte counted section overran its end by {} bytes",
                pos - end
            ),
        });
    }
    reader.seek(SeekFrom::Start(end))?;
    Ok(inner)
}

/// A `T` preceded by its length in bytes.
#[derive(Clone, Default, PartialEq)]
pub struct Counted<T>(pub T);

impl<T> Debug for Counted<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> BinRead for Counted<T>
where
    T: BinRead,
{
    type Args<'a> = T::Args<'a>;

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        read_counted(reader, endian, |reader, _| {
            T::read_options(reader, endian, args).map(Self)
        })
    }
}

#[binrw::parser(reader, endian)]
fn parse_bool() -> BinResult<bool> {
    let byte = <u8>::read_options(reader, endian, ())?;
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(BinError::NoVariantMatch {
            pos: reader.stream_position()? - 1,
        }),
    }
}

/// Consumes `byte` if it comes next.
#[binrw::parser(reader, endian)]
fn optional_byte(byte: u8) -> BinResult<bool> {
    let pos = reader.stream_position()?;
    match <u8>::read_options(reader, endian, ()) {
        Ok(b) if b == byte => Ok(true),
        Ok(_) | Err(BinError::Io(_)) => {
            reader.seek(SeekFrom::Start(pos))?;
            Ok(false)
        }
        Err(error) => Err(error),
    }
}

/// Reads a section that only version 3 tables parse.  Version 1 tables still
/// have the byte count, so it is skipped over.
#[binrw::parser(reader, endian)]
fn parse_counted_v3<T>(version: Version) -> BinResult<Option<T>>
where
    for<'a> T: BinRead<Args<'a> = ()>,
{
    read_counted(reader, endian, |reader, count| {
        if version == Version::V3 && count > 0 {
            T::read_options(reader, endian, ()).map(Some)
        } else {
            Ok(None)
        }
    })
}

/// The whole light table.
#[binread]
#[br(little)]
#[derive(Debug)]
pub struct LightTable {
    pub header: Header,
    #[br(args(header.version))]
    pub titles: Titles,
    #[br(args(header.version))]
    pub footnotes: Footnotes,
    #[br(args(header.version))]
    pub areas: Areas,
    pub borders: Counted<Borders>,
    #[br(parse_with = parse_counted_v3, args(header.version))]
    pub print_settings: Option<PrintSettings>,
    #[br(parse_with = parse_counted_v3, args(header.version))]
    pub table_settings: Option<TableSettings>,
    #[br(args(header.version))]
    pub formats: Formats,
    #[br(args(header.version))]
    pub dimensions: Dimensions,
    pub axes: Axes,
    #[br(args(header.version))]
    pub cells: Cells,
}

impl LightTable {
    pub fn version(&self) -> Version {
        self.header.version
    }

    /// Sorts borders by type and cells by index, so that dumps of tables
    /// that differ only in ordering compare equal.
    pub fn sort(&mut self) {
        self.borders.0.borders.sort_by_key(|border| border.border_type);
        self.cells.cells.sort_by_key(|cell| cell.index);
    }
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct Header {
    #[br(magic = b"\x01\0")]
    pub version: Version,
    #[br(parse_with = parse_bool)]
    pub x0: bool,
    #[br(parse_with = parse_bool)]
    pub x1: bool,
    #[br(parse_with = parse_bool)]
    pub rotate_inner_column_labels: bool,
    #[br(parse_with = parse_bool)]
    pub rotate_outer_row_labels: bool,
    #[br(parse_with = parse_bool)]
    pub x2: bool,
    pub x3: u32,
    pub min_column_heading_width: i32,
    pub max_column_heading_width: i32,
    pub min_row_heading_width: i32,
    pub max_row_heading_width: i32,
    pub table_id: i64,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Titles {
    #[br(args(version))]
    pub title: Value,
    #[br(temp, parse_with = optional_byte, args(1))]
    _1: bool,
    #[br(args(version))]
    pub subtype: Value,
    #[br(temp, parse_with = optional_byte, args(1))]
    _2: bool,
    #[br(magic = 0x31u8, args(version))]
    pub user_title: Value,
    #[br(temp, parse_with = optional_byte, args(1))]
    _3: bool,
    #[br(args(version))]
    pub corner_text: Optional<Value>,
    #[br(args(version))]
    pub caption: Optional<Value>,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Footnotes {
    #[br(temp)]
    n_footnotes: u32,
    #[br(args { count: n_footnotes as usize, inner: (version,) })]
    pub footnotes: Vec<Footnote>,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Footnote {
    #[br(args(version))]
    pub text: Value,
    #[br(args(version))]
    pub marker: Optional<Value>,
    pub show: i32,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Areas {
    #[br(temp, parse_with = optional_byte, args(0))]
    _0: bool,
    #[br(args(version))]
    pub areas: [Area; 8],
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Area {
    pub index: u8,
    #[br(magic = 0x31u8)]
    pub typeface: RawString,
    pub size: f32,
    pub style: u32,
    #[br(parse_with = parse_bool)]
    pub underline: bool,
    pub halign: u32,
    pub valign: u32,
    pub fg: RawString,
    pub bg: RawString,
    #[br(parse_with = parse_bool)]
    pub alternate: bool,
    pub alt_fg: RawString,
    pub alt_bg: RawString,

    /// Left, right, top, and bottom margins.
    #[br(if(version == Version::V3))]
    pub margins: Option<[i32; 4]>,
}

#[binread]
#[br(big)]
#[derive(Debug)]
pub struct Borders {
    #[br(magic = 1u32, temp)]
    n_borders: u32,
    #[br(count = n_borders)]
    pub borders: Vec<BorderRecord>,
    #[br(parse_with = parse_bool)]
    pub show_grid_lines: bool,
    #[br(temp, magic = b"\0\0\0")]
    _pad: (),
}

#[binread]
#[br(big)]
#[derive(Debug)]
pub struct BorderRecord {
    pub border_type: u32,
    pub stroke_type: u32,

    /// `0xaarrggbb`.
    pub color: u32,
}

#[binread]
#[br(big)]
#[derive(Debug)]
pub struct PrintSettings {
    #[br(magic = 1u32, parse_with = parse_bool)]
    pub all_layers: bool,
    #[br(parse_with = parse_bool)]
    pub paginate_layers: bool,
    #[br(parse_with = parse_bool)]
    pub fit_width: bool,
    #[br(parse_with = parse_bool)]
    pub fit_length: bool,
    #[br(parse_with = parse_bool)]
    pub top_continuation: bool,
    #[br(parse_with = parse_bool)]
    pub bottom_continuation: bool,
    pub n_orphan_lines: u32,
    pub continuation: RawString,
}

#[binread]
#[br(big)]
#[derive(Debug)]
pub struct TableSettings {
    #[br(magic = 1u32)]
    pub x5: i32,
    pub current_layer: u32,
    #[br(parse_with = parse_bool)]
    pub omit_empty: bool,
    #[br(parse_with = parse_bool)]
    pub row_labels_in_corner: bool,
    #[br(parse_with = parse_bool)]
    pub show_alphabetic_markers: bool,
    #[br(parse_with = parse_bool)]
    pub footnote_marker_superscripts: bool,
    pub x6: u8,
    pub breaks_and_keeps: Counted<BreaksAndKeeps>,
    pub notes: RawString,
    pub table_look: RawString,
}

#[binread]
#[br(big)]
#[derive(Debug, Default)]
pub struct BreaksAndKeeps {
    pub row_breaks: Breakpoints,
    pub column_breaks: Breakpoints,
    pub row_keeps: Keeps,
    pub column_keeps: Keeps,
    pub row_point_keeps: PointKeeps,
    pub column_point_keeps: PointKeeps,
}

#[binread]
#[br(big)]
#[derive(Debug, Default)]
pub struct Breakpoints {
    #[br(temp)]
    n_breaks: u32,
    #[br(count = n_breaks)]
    pub breaks: Vec<u32>,
}

#[binread]
#[br(big)]
#[derive(Debug, Default)]
pub struct Keeps {
    #[br(temp)]
    n_keeps: u32,
    #[br(count = n_keeps)]
    pub keeps: Vec<Keep>,
}

#[binread]
#[br(big)]
#[derive(Debug)]
pub struct Keep {
    pub offset: u32,
    pub n: u32,
}

#[binread]
#[br(big)]
#[derive(Debug, Default)]
pub struct PointKeeps {
    #[br(temp)]
    n_point_keeps: u32,
    #[br(count = n_point_keeps)]
    pub point_keeps: Vec<PointKeep>,
}

#[binread]
#[br(big)]
#[derive(Debug)]
pub struct PointKeep {
    pub offset: u32,
    pub x: u32,
    pub y: u32,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Formats {
    #[br(temp)]
    n_widths: u32,
    #[br(count = n_widths)]
    pub column_widths: Vec<i32>,
    pub locale: RawString,
    pub current_layer: i32,
    #[br(parse_with = parse_bool)]
    pub x7: bool,
    #[br(parse_with = parse_bool)]
    pub x8: bool,
    #[br(parse_with = parse_bool)]
    pub x9: bool,
    pub y0: Y0,
    pub custom_currency: CustomCurrency,
    #[br(args(version))]
    pub extension: FormatsExtension,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct Y0 {
    pub epoch: i32,
    pub decimal: u8,
    pub grouping: u8,
}

#[binread]
#[br(little)]
#[derive(Debug, Default)]
pub struct CustomCurrency {
    #[br(temp)]
    n_ccs: u32,
    #[br(count = n_ccs)]
    pub ccs: Vec<RawString>,
}

/// The counted tail of [Formats], which takes different forms in version 1
/// and version 3.
#[derive(Debug, Default)]
pub struct FormatsExtension {
    pub x0: Option<X0>,
    pub x1: Option<X1>,
    pub x2: Option<X2>,
    pub x3: Option<X3>,
}

impl FormatsExtension {
    /// Returns the [Y1] from whichever version-specific record has one.
    pub fn y1(&self) -> Option<&Y1> {
        self.x0
            .as_ref()
            .map(|x0| &x0.y1)
            .or_else(|| self.x3.as_ref().map(|x3| &x3.y1))
    }

    /// Returns the [Y2] from whichever version-specific record has one.
    pub fn y2(&self) -> Option<&Y2> {
        self.x0
            .as_ref()
            .map(|x0| &x0.y2)
            .or_else(|| self.x3.as_ref().map(|x3| &x3.y2))
    }
}

impl BinRead for FormatsExtension {
    type Args<'a> = (Version,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        (version,): Self::Args<'_>,
    ) -> BinResult<Self> {
        read_counted(reader, endian, |reader, count| {
            if count == 0 {
                return Ok(Self::default());
            }
            match version {
                Version::V1 => Ok(Self {
                    x0: Some(X0::read_options(reader, endian, ())?),
                    ..Self::default()
                }),
                Version::V3 => {
                    let (x1, x2) = read_counted(reader, endian, |reader, _| {
                        let x1 = X1::read_options(reader, endian, ())?;
                        let x2 = Counted::<X2>::read_options(reader, endian, ())?.0;
                        Ok((x1, x2))
                    })?;
                    let x3 = Counted::<X3>::read_options(reader, endian, ())?.0;
                    Ok(Self {
                        x0: None,
                        x1: Some(x1),
                        x2: Some(x2),
                        x3: Some(x3),
                    })
                }
            }
        })
    }
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct X0 {
    #[br(temp)]
    _x: [u8; 14],
    pub y1: Y1,
    pub y2: Y2,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct Y1 {
    pub command: RawString,
    pub command_local: RawString,
    pub language: RawString,
    pub charset: RawString,
    pub locale: RawString,
    #[br(parse_with = parse_bool)]
    pub x10: bool,
    #[br(parse_with = parse_bool)]
    pub include_leading_zero: bool,
    #[br(parse_with = parse_bool)]
    pub x12: bool,
    #[br(parse_with = parse_bool)]
    pub x13: bool,
    pub y0: Y0,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct Y2 {
    pub custom_currency: CustomCurrency,
    pub missing: u8,
    #[br(parse_with = parse_bool)]
    pub x17: bool,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct X1 {
    #[br(parse_with = parse_bool)]
    pub x14: bool,

    /// 10 means to hide the title.
    pub show_title: u8,
    #[br(parse_with = parse_bool)]
    pub x16: bool,
    pub lang: u8,
    pub show_variables: u8,
    pub show_values: u8,
    pub x18: i32,
    pub x19: i32,
    #[br(temp)]
    _zeros: [u8; 17],
    #[br(parse_with = parse_bool)]
    pub x20: bool,
    #[br(parse_with = parse_bool)]
    pub show_caption: bool,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct X2 {
    #[br(temp)]
    n_row_heights: u32,
    #[br(count = n_row_heights)]
    pub row_heights: Vec<i32>,
    #[br(temp)]
    n_style_map: u32,
    #[br(count = n_style_map)]
    pub style_map: Vec<StyleMap>,
    #[br(temp)]
    n_styles: u32,
    #[br(count = n_styles)]
    pub styles: Vec<StylePair>,
    #[br(temp)]
    _tail: Counted<()>,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct StyleMap {
    pub cell_index: i64,
    pub style_index: i16,
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct X3 {
    #[br(magic = b"\x01\0")]
    pub x21: u8,
    #[br(magic = b"\0\0\0")]
    pub y1: Y1,
    pub small: f64,
    #[br(temp, magic = 1u8)]
    _one: (),
    #[br(try)]
    pub source: Option<Source>,
    pub y2: Y2,
    #[br(try)]
    pub x22: Option<X3Tail>,
}

/// Where the data in the table came from.
#[binread]
#[br(little)]
#[derive(Debug)]
pub struct Source {
    pub dataset: RawString,
    pub datafile: RawString,
    #[br(magic = 0u32)]
    pub date: i32,
    #[br(temp, magic = 0u32)]
    _zero: (),
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct X3Tail {
    pub x22: i32,
    #[br(temp, magic = 0u32)]
    _zero: (),
    #[br(temp, parse_with = optional_byte, args(1))]
    _one: bool,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Dimensions {
    #[br(temp)]
    n_dimensions: u32,
    #[br(args { count: n_dimensions as usize, inner: (version,) })]
    pub dimensions: Vec<Dimension>,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Dimension {
    #[br(args(version))]
    pub name: Value,
    pub x1: u8,
    pub x2: u8,
    pub x3: u32,
    #[br(parse_with = parse_bool)]
    pub hide_dim_label: bool,
    #[br(parse_with = parse_bool)]
    pub hide_all_labels: bool,
    #[br(magic = 1u8)]
    pub dim_index: u32,
    #[br(temp)]
    n_categories: u32,
    #[br(args { count: n_categories as usize, inner: (version,) })]
    pub categories: Vec<Category>,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Category {
    #[br(args(version))]
    pub name: Value,
    #[br(args(version))]
    pub child: Child,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub enum Child {
    #[br(magic = b"\0\0\0\x02\0\0\0")]
    Leaf {
        leaf_index: u32,
        #[br(temp, magic = 0u32)]
        _zero: (),
    },
    Group {
        #[br(parse_with = parse_bool)]
        merge: bool,
        #[br(magic = b"\0\x01")]
        x23: u32,
        #[br(magic = 0xffff_ffffu32, temp)]
        n_subcategories: u32,
        #[br(args { count: n_subcategories as usize, inner: (version,) })]
        subcategories: Vec<Category>,
    },
}

#[binread]
#[br(little)]
#[derive(Debug)]
pub struct Axes {
    #[br(temp)]
    n_layers: u32,
    #[br(temp)]
    n_rows: u32,
    #[br(temp)]
    n_columns: u32,
    #[br(count = n_layers)]
    pub layers: Vec<u32>,
    #[br(count = n_rows)]
    pub rows: Vec<u32>,
    #[br(count = n_columns)]
    pub columns: Vec<u32>,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Cells {
    #[br(temp)]
    n_cells: u32,
    #[br(args { count: n_cells as usize, inner: (version,) })]
    pub cells: Vec<Cell>,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Cell {
    pub index: u64,
    #[br(temp, parse_with = optional_byte, args(0), if(version == Version::V1))]
    _zero: bool,
    #[br(args(version))]
    pub value: Value,
}

/// Skips up to four zero bytes that may precede a value.
#[binrw::parser(reader, endian)]
fn skip_value_padding() -> BinResult<()> {
    for _ in 0..4 {
        if !optional_byte(reader, endian, (0,))? {
            break;
        }
    }
    Ok(())
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub struct Value {
    #[br(temp, parse_with = skip_value_padding)]
    _padding: (),
    #[br(args(version))]
    pub inner: ValueInner,
}

#[binread]
#[br(little, import(version: Version))]
#[derive(Debug)]
pub enum ValueInner {
    #[br(magic = 1u8)]
    Number {
        #[br(args(version))]
        mods: Optional<ValueMods>,
        format: u32,
        x: f64,
    },
    #[br(magic = 2u8)]
    VarNumber {
        #[br(args(version))]
        mods: Optional<ValueMods>,
        format: u32,
        x: f64,
        var_name: RawString,
        value_label: RawString,
        show: u8,
    },
    #[br(magic = 3u8)]
    Text {
        local: RawString,
        #[br(args(version))]
        mods: Optional<ValueMods>,
        id: RawString,
        c: RawString,
        #[br(parse_with = parse_bool)]
        fixed: bool,
    },
    #[br(magic = 4u8)]
    String {
        #[br(args(version))]
        mods: Optional<ValueMods>,
        format: u32,
        value_label: RawString,
        var_name: RawString,
        show: u8,
        s: RawString,
    },
    #[br(magic = 5u8)]
    Variable {
        #[br(args(version))]
        mods: Optional<ValueMods>,
        var_name: RawString,
        var_label: RawString,
        show: u8,
    },
    #[br(magic = 6u8)]
    TextNoFixed {
        local: RawString,
        #[br(args(version))]
        mods: Optional<ValueMods>,
        id: RawString,
        c: RawString,
    },
    Template {
        #[br(args(version))]
        mods: Optional<ValueMods>,
        template: RawString,
        #[br(temp)]
        n_args: u32,
        #[br(args { count: n_args as usize, inner: (version,) })]
        args: Vec<Argument>,
    },
}

impl ValueInner {
    pub fn mods(&self) -> Option<&ValueMods> {
        match self {
            ValueInner::Number { mods, .. }
            | ValueInner::VarNumber { mods, .. }
            | ValueInner::Text { mods, .. }
            | ValueInner::String { mods, .. }
            | ValueInner::Variable { mods, .. }
            | ValueInner::TextNoFixed { mods, .. }
            | ValueInner::Template { mods, .. } => mods.0.as_ref(),
        }
    }
}

/// One argument to a template: a single value, or a list of them.
#[derive(Debug)]
pub struct Argument(pub Vec<Value>);

impl BinRead for Argument {
    type Args<'a> = (Version,);

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let n = u32::read_options(reader, endian, ())?;
        if n == 0 {
            return Ok(Self(vec![Value::read_options(reader, endian, args)?]));
        }
        let pos = reader.stream_position()?;
        let zero = u32::read_options(reader, endian, ())?;
        if zero != 0 {
            return Err(BinError::AssertFail {
                pos,
                message: format!("expected 0 after argument count, not {zero}"),
            });
        }
        let values = (0..n)
            .map(|_| Value::read_options(reader, endian, args))
            .collect::<BinResult<Vec<_>>>()?;
        Ok(Self(values))
    }
}

/// Modifiers that can be attached to any value.
#[binread]
#[br(little, import(version: Version))]
#[derive(Debug, Default)]
pub struct ValueMods {
    #[br(temp)]
    n_refs: u32,

    /// Footnote references.
    #[br(count = n_refs)]
    pub refs: Vec<u16>,
    #[br(temp)]
    n_subscripts: u32,
    #[br(count = n_subscripts)]
    pub subscripts: Vec<RawString>,
    #[br(temp, parse_with = skip_v1_mods, args(version))]
    _v1: (),
    #[br(if(version == Version::V3))]
    pub v3: Option<Counted<ValueModsV3>>,
}

impl ValueMods {
    pub fn style_pair(&self) -> Option<&StylePair> {
        self.v3.as_ref().map(|v3| &v3.0.style_pair)
    }

    pub fn template_id(&self) -> Option<&RawString> {
        self.v3.as_ref().and_then(|v3| v3.0.template_string.id.as_ref())
    }
}

#[binrw::parser(reader, endian)]
fn skip_v1_mods(version: Version) -> BinResult<()> {
    if version == Version::V1 {
        let pos = reader.stream_position()?;
        let zero = u8::read_options(reader, endian, ())?;
        let one_or_two = u32::read_options(reader, endian, ())?;
        if zero != 0 || !(1..=2).contains(&one_or_two) {
            return Err(BinError::AssertFail {
                pos,
                message: "bad version 1 value modifier".into(),
            });
        }
        optional_byte(reader, endian, (0,))?;
        optional_byte(reader, endian, (0,))?;
        u32::read_options(reader, endian, ())?;
        optional_byte(reader, endian, (0,))?;
        optional_byte(reader, endian, (0,))?;
    }
    Ok(())
}

#[binread]
#[br(little)]
#[derive(Debug, Default)]
pub struct ValueModsV3 {
    pub template_string: TemplateString,
    pub style_pair: StylePair,
}

/// A template string reference, which is usually empty.
#[derive(Debug, Default)]
pub struct TemplateString {
    pub id: Option<RawString>,
}

impl BinRead for TemplateString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        read_counted(reader, endian, |reader, count| {
            if count == 0 {
                return Ok(Self::default());
            }
            read_counted(reader, endian, |reader, count| {
                if count > 0 {
                    let pos = reader.stream_position()?;
                    let zero = u32::read_options(reader, endian, ())?;
                    let marker = u8::read_options(reader, endian, ())?;
                    let ok = zero == 0
                        && match marker {
                            0x58 => true,
                            0x31 => u8::read_options(reader, endian, ())? == 0x55,
                            _ => false,
                        };
                    if !ok {
                        return Err(BinError::AssertFail {
                            pos,
                            message: "bad template string".into(),
                        });
                    }
                }
                Ok(())
            })?;
            let id = Optional::<RawString>::read_options(reader, endian, ())?;
            Ok(Self { id: id.0 })
        })
    }
}

#[binread]
#[br(little)]
#[derive(Clone, Debug, Default)]
pub struct StylePair {
    pub font_style: Optional<FontStyle>,
    pub cell_style: Optional<CellStyle>,
}

#[binread]
#[br(little)]
#[derive(Clone, Debug, Default)]
pub struct FontStyle {
    #[br(parse_with = parse_bool)]
    pub bold: bool,
    #[br(parse_with = parse_bool)]
    pub italic: bool,
    #[br(parse_with = parse_bool)]
    pub underline: bool,
    #[br(parse_with = parse_bool)]
    pub show: bool,
    pub fg: RawString,
    pub bg: RawString,
    pub typeface: RawString,
    pub size: u8,
}

#[binread]
#[br(little)]
#[derive(Clone, Debug, Default)]
pub struct CellStyle {
    pub halign: u32,
    pub valign: u32,
    pub decimal_offset: f64,
    pub left_margin: i16,
    pub right_margin: i16,
    pub top_margin: i16,
    pub bottom_margin: i16,
}

#[cfg(test)]
mod tests;
