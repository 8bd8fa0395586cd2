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
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::{Not, RangeInclusive},
    str::{Chars, FromStr},
    sync::LazyLock,
};

use chrono::{Datelike, Local};
use enum_iterator::Sequence;
use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use unicode_width::UnicodeWidthStr;

use crate::util::ToSmallString;

mod display;
pub use display::DisplayDatum;

#[derive(Clone, ThisError, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown format type {value}.")]
    UnknownFormat { value: u16 },

    #[error("Output format {0} specifies width {}, but {} requires a width between {} and {}.", .0.w, .0.type_, .0.type_.min_width(), .0.type_.max_width())]
    BadWidth(UncheckedFormat),

    #[error("Output format {0} specifies decimal places, but {} format does not allow any decimals.", .0.type_)]
    DecimalsNotAllowedForFormat(UncheckedFormat),

    #[error("Output format {0} specifies {} decimal places, but with a width of {}, {} does not allow any decimal places.", .0.d, .0.w, .0.type_)]
    DecimalsNotAllowedForWidth(UncheckedFormat),

    #[error("Output format {spec} specifies {} decimal places but, with a width of {}, {} allows at most {max_d} decimal places.", .spec.d, .spec.w, .spec.type_)]
    TooManyDecimalsForWidth {
        spec: UncheckedFormat,
        max_d: Decimals,
    },

    #[error("String format type {0} cannot be used for numeric table data.")]
    StringFormat(u16),
}

/// Broad groups of [Type]s that format numbers the same way.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Basic,
    Custom,
    Legacy,
    Date,
    Time,
    DateComponent,
}

impl From<Type> for Category {
    fn from(source: Type) -> Self {
        match source {
            Type::F | Type::Comma | Type::Dot | Type::Dollar | Type::Pct | Type::E => Self::Basic,
            Type::CC(_) => Self::Custom,
            Type::N | Type::Z => Self::Legacy,
            Type::Date
            | Type::ADate
            | Type::EDate
            | Type::JDate
            | Type::SDate
            | Type::QYr
            | Type::MoYr
            | Type::WkYr
            | Type::DateTime
            | Type::YmdHms => Self::Date,
            Type::MTime | Type::Time | Type::DTime => Self::Time,
            Type::WkDay | Type::Month => Self::DateComponent,
        }
    }
}

/// A custom currency.
#[derive(Copy, Clone, Debug, Enum, PartialEq, Eq, Hash, Sequence, Serialize)]
pub enum CC {
    A,
    B,
    C,
    D,
    E,
}

impl Display for CC {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let s = match self {
            CC::A => "A",
            CC::B => "B",
            CC::C => "C",
            CC::D => "D",
            CC::E => "E",
        };
        f.write_str(s)
    }
}

/// The type of a numeric output format.
///
/// Table data is always numeric and always displayed, so the string formats
/// and the binary input formats have no counterpart here.  [Format::from_u32]
/// rejects the former and reads the latter as `F`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    // Basic numeric formats.
    F,
    Comma,
    Dot,
    Dollar,
    Pct,
    E,

    // Custom currency formats.
    CC(CC),

    // Legacy numeric formats.
    N,
    Z,

    // Time and date formats.
    Date,
    ADate,
    EDate,
    JDate,
    SDate,
    QYr,
    MoYr,
    WkYr,
    DateTime,
    YmdHms,
    MTime,
    Time,
    DTime,

    // Date component formats.
    WkDay,
    Month,
}

pub type Width = u16;
pub type SignedWidth = i16;

pub type Decimals = u8;

impl Type {
    pub fn max_width(self) -> Width {
        40
    }

    pub fn min_width(self) -> Width {
        match self {
            Self::F | Self::Comma | Self::Dot | Self::N | Self::Z => 1,
            Self::Dollar | Self::Pct | Self::CC(_) | Self::WkDay => 2,
            Self::Month => 3,
            Self::E => 6,
            Self::JDate | Self::MTime | Self::Time => 5,
            Self::QYr | Self::MoYr => 6,
            Self::ADate | Self::EDate | Self::SDate | Self::WkYr | Self::DTime => 8,
            Self::Date => 9,
            Self::YmdHms => 16,
            Self::DateTime => 17,
        }
    }

    pub fn width_range(self) -> RangeInclusive<Width> {
        self.min_width()..=self.max_width()
    }

    pub fn max_decimals(self, width: Width) -> Decimals {
        let width = width.clamp(1, 40) as SignedWidth;
        let max = match self {
            Self::F | Self::Comma | Self::Dot | Self::CC(_) => width - 1,
            Self::Dollar | Self::Pct => width - 2,
            Self::E => width - 7,
            Self::N | Self::Z => width,
            Self::DateTime => width - 21,
            Self::YmdHms => width - 20,
            Self::MTime => width - 6,
            Self::Time => width - 9,
            Self::DTime => width - 12,
            Self::Date
            | Self::ADate
            | Self::EDate
            | Self::JDate
            | Self::SDate
            | Self::QYr
            | Self::MoYr
            | Self::WkYr
            | Self::WkDay
            | Self::Month => 0,
        };
        max.clamp(0, 16) as Decimals
    }

    pub fn takes_decimals(self) -> bool {
        self.max_decimals(Width::MAX) > 0
    }

    pub fn category(self) -> Category {
        self.into()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F => "F",
            Self::Comma => "COMMA",
            Self::Dot => "DOT",
            Self::Dollar => "DOLLAR",
            Self::Pct => "PCT",
            Self::E => "E",
            Self::CC(CC::A) => "CCA",
            Self::CC(CC::B) => "CCB",
            Self::CC(CC::C) => "CCC",
            Self::CC(CC::D) => "CCD",
            Self::CC(CC::E) => "CCE",
            Self::N => "N",
            Self::Z => "Z",
            Self::Date => "DATE",
            Self::ADate => "ADATE",
            Self::EDate => "EDATE",
            Self::JDate => "JDATE",
            Self::SDate => "SDATE",
            Self::QYr => "QYR",
            Self::MoYr => "MOYR",
            Self::WkYr => "WKYR",
            Self::DateTime => "DATETIME",
            Self::YmdHms => "YMDHMS",
            Self::MTime => "MTIME",
            Self::Time => "TIME",
            Self::DTime => "DTIME",
            Self::WkDay => "WKDAY",
            Self::Month => "MONTH",
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Format {
    type_: Type,
    w: Width,
    d: Decimals,
}

impl Serialize for Format {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_small_string::<16>().serialize(serializer)
    }
}

impl Format {
    pub const F40: Format = Format {
        type_: Type::F,
        w: 40,
        d: 0,
    };

    pub const F40_1: Format = Format {
        type_: Type::F,
        w: 40,
        d: 1,
    };

    pub const F40_2: Format = Format {
        type_: Type::F,
        w: 40,
        d: 2,
    };

    pub const F40_3: Format = Format {
        type_: Type::F,
        w: 40,
        d: 3,
    };

    pub const PCT40_1: Format = Format {
        type_: Type::Pct,
        w: 40,
        d: 1,
    };

    pub const F8_2: Format = Format {
        type_: Type::F,
        w: 8,
        d: 2,
    };

    pub const DATETIME40_0: Format = Format {
        type_: Type::DateTime,
        w: 40,
        d: 0,
    };

    pub fn type_(self) -> Type {
        self.type_
    }
    pub fn w(self) -> usize {
        self.w as usize
    }
    pub fn d(self) -> usize {
        self.d as usize
    }

    pub fn new(type_: Type, w: Width, d: Decimals) -> Option<Self> {
        UncheckedFormat { type_, w, d }.try_into().ok()
    }

    pub fn fixed_from(source: &UncheckedFormat) -> Self {
        let UncheckedFormat {
            type_: format,
            w,
            d,
        } = *source;
        let (min, max) = format.width_range().into_inner();
        let mut w = w.clamp(min, max);
        if d <= format.max_decimals(Width::MAX) {
            while d > format.max_decimals(w) && w < 40 {
                w += 1;
            }
        }
        let d = d.clamp(0, format.max_decimals(w));
        Self {
            type_: format,
            w,
            d,
        }
    }

    /// Returns this format with its type changed to `type_`, fixing up the
    /// width and decimals as needed.
    pub fn with_type(self, type_: Type) -> Self {
        UncheckedFormat::new(type_, self.w, self.d).fix()
    }

    pub fn with_width(self, w: Width) -> Self {
        UncheckedFormat::new(self.type_, w, self.d).fix()
    }

    /// Decodes a format from the 32-bit form used in SPV files and SPSS
    /// system files: the type in bits 16 through 23, the width in bits 8
    /// through 15, and the number of decimals in bits 0 through 7.
    ///
    /// The values 0, 1, and 0x10000 all mean the default `F40.2`.  Types 40
    /// and above are treated as `F`.  Only numeric formats are accepted, and
    /// the width and decimals are adjusted to be valid for the type.
    pub fn from_u32(raw: u32) -> Result<Self, Error> {
        if raw == 0 || raw == 1 || raw == 0x10000 {
            return Ok(Self::F40_2);
        }
        let raw_type = ((raw >> 16) & 0xff) as u16;
        let type_ = if raw_type >= 40 {
            Type::F
        } else {
            raw_type.try_into()?
        };
        let w = ((raw >> 8) & 0xff) as Width;
        let d = (raw & 0xff) as Decimals;
        Ok(UncheckedFormat::new(type_, w, d).fix())
    }
}

impl Debug for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{self}")
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}{}", self.type_, self.w)?;
        if self.type_.takes_decimals() || self.d > 0 {
            write!(f, ".{}", self.d)?;
        }
        Ok(())
    }
}

impl TryFrom<UncheckedFormat> for Format {
    type Error = Error;

    fn try_from(source: UncheckedFormat) -> Result<Self, Self::Error> {
        let UncheckedFormat {
            type_: format,
            w,
            d,
        } = source;
        let max_d = format.max_decimals(w);
        if !format.width_range().contains(&w) {
            Err(Error::BadWidth(source))
        } else if d > max_d {
            if !format.takes_decimals() {
                Err(Error::DecimalsNotAllowedForFormat(source))
            } else if max_d > 0 {
                Err(Error::TooManyDecimalsForWidth {
                    spec: source,
                    max_d,
                })
            } else {
                Err(Error::DecimalsNotAllowedForWidth(source))
            }
        } else {
            Ok(Format {
                type_: format,
                w,
                d,
            })
        }
    }
}

/// Maps format type codes from SPV and system files.  Codes 1 and 2 are the
/// string formats `A` and `AHEX`.  The binary formats, codes 6 through 12,
/// come back as `F`.
impl TryFrom<u16> for Type {
    type Error = Error;

    fn try_from(source: u16) -> Result<Self, Self::Error> {
        match source {
            1 | 2 => Err(Error::StringFormat(source)),
            3 => Ok(Self::Comma),
            4 => Ok(Self::Dollar),
            5..=12 => Ok(Self::F),
            15 => Ok(Self::Z),
            16 => Ok(Self::N),
            17 => Ok(Self::E),
            20 => Ok(Self::Date),
            21 => Ok(Self::Time),
            22 => Ok(Self::DateTime),
            23 => Ok(Self::ADate),
            24 => Ok(Self::JDate),
            25 => Ok(Self::DTime),
            26 => Ok(Self::WkDay),
            27 => Ok(Self::Month),
            28 => Ok(Self::MoYr),
            29 => Ok(Self::QYr),
            30 => Ok(Self::WkYr),
            31 => Ok(Self::Pct),
            32 => Ok(Self::Dot),
            33 => Ok(Self::CC(CC::A)),
            34 => Ok(Self::CC(CC::B)),
            35 => Ok(Self::CC(CC::C)),
            36 => Ok(Self::CC(CC::D)),
            37 => Ok(Self::CC(CC::E)),
            38 => Ok(Self::EDate),
            39 => Ok(Self::SDate),
            40 => Ok(Self::MTime),
            41 => Ok(Self::YmdHms),
            _ => Err(Error::UnknownFormat { value: source }),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UncheckedFormat {
    pub type_: Type,

    pub w: Width,

    pub d: Decimals,
}

impl UncheckedFormat {
    pub fn new(type_: Type, w: Width, d: Decimals) -> Self {
        Self { type_, w, d }
    }
    pub fn fix(&self) -> Format {
        Format::fixed_from(self)
    }
}

impl Display for UncheckedFormat {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}{}", self.type_, self.w)?;
        if self.type_.takes_decimals() || self.d > 0 {
            write!(f, ".{}", self.d)?;
        }
        Ok(())
    }
}
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Enum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decimal {
    #[default]
    Dot,
    Comma,
}

impl From<Decimal> for char {
    fn from(value: Decimal) -> Self {
        u8::from(value).into()
    }
}

impl From<Decimal> for u8 {
    fn from(value: Decimal) -> Self {
        match value {
            Decimal::Dot => b'.',
            Decimal::Comma => b',',
        }
    }
}

impl TryFrom<char> for Decimal {
    type Error = ();

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c {
            '.' => Ok(Self::Dot),
            ',' => Ok(Self::Comma),
            _ => Err(()),
        }
    }
}

impl Not for Decimal {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Dot => Self::Comma,
            Self::Comma => Self::Dot,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Epoch(pub i32);

impl Default for Epoch {
    fn default() -> Self {
        static DEFAULT: LazyLock<Epoch> = LazyLock::new(|| Epoch(Local::now().year() - 69));
        *DEFAULT
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Settings {
    pub epoch: Epoch,

    /// Either `'.'` or `','`.
    pub decimal: Decimal,

    /// Format `F`, `E`, `COMMA`, and `DOT` with leading zero (e.g. `0.5`
    /// instead of `.5`)?
    pub leading_zero: bool,

    /// Custom currency styles.
    pub ccs: EnumMap<CC, Option<Box<NumberStyle>>>,
}

#[derive(Copy, Clone, Enum)]
struct StyleParams {
    decimal: Decimal,
    leading_zero: bool,
}
impl From<&Settings> for StyleParams {
    fn from(value: &Settings) -> Self {
        Self {
            decimal: value.decimal,
            leading_zero: value.leading_zero,
        }
    }
}

struct StyleSet(EnumMap<StyleParams, NumberStyle>);

impl StyleSet {
    fn new(f: impl Fn(StyleParams) -> NumberStyle) -> Self {
        Self(EnumMap::from_fn(f))
    }
    fn get(&self, settings: &Settings) -> &NumberStyle {
        &self.0[settings.into()]
    }
}

impl Settings {
    pub fn with_cc(mut self, cc: CC, style: NumberStyle) -> Self {
        self.ccs[cc] = Some(Box::new(style));
        self
    }
    pub fn with_leading_zero(self, leading_zero: bool) -> Self {
        Self {
            leading_zero,
            ..self
        }
    }
    pub fn with_epoch(self, epoch: Epoch) -> Self {
        Self { epoch, ..self }
    }
    pub fn with_decimal(self, decimal: Decimal) -> Self {
        Self { decimal, ..self }
    }
    pub fn number_style(&self, type_: Type) -> &NumberStyle {
        static DEFAULT: LazyLock<NumberStyle> =
            LazyLock::new(|| NumberStyle::new("", "", Decimal::Dot, None, false));

        match type_ {
            Type::F | Type::E => {
                static F: LazyLock<StyleSet> = LazyLock::new(|| {
                    StyleSet::new(|p| NumberStyle::new("", "", p.decimal, None, p.leading_zero))
                });
                F.get(self)
            }
            Type::Comma => {
                static COMMA: LazyLock<StyleSet> = LazyLock::new(|| {
                    StyleSet::new(|p| {
                        NumberStyle::new("", "", p.decimal, Some(!p.decimal), p.leading_zero)
                    })
                });
                COMMA.get(self)
            }
            Type::Dot => {
                static DOT: LazyLock<StyleSet> = LazyLock::new(|| {
                    StyleSet::new(|p| {
                        NumberStyle::new("", "", !p.decimal, Some(p.decimal), p.leading_zero)
                    })
                });
                DOT.get(self)
            }
            Type::Dollar => {
                static DOLLAR: LazyLock<StyleSet> = LazyLock::new(|| {
                    StyleSet::new(|p| NumberStyle::new("$", "", p.decimal, Some(!p.decimal), false))
                });
                DOLLAR.get(self)
            }
            Type::Pct => {
                static PCT: LazyLock<StyleSet> = LazyLock::new(|| {
                    StyleSet::new(|p| NumberStyle::new("", "%", p.decimal, None, false))
                });
                PCT.get(self)
            }
            Type::CC(cc) => self.ccs[cc].as_deref().unwrap_or(&DEFAULT),
            _ => &DEFAULT,
        }
    }
}

/// A numeric output style.  This can express numeric formats in
/// [Category::Basic] and [Category::Custom].
#[derive(Clone, Debug, Serialize)]
pub struct NumberStyle {
    pub neg_prefix: Affix,
    pub prefix: Affix,
    pub suffix: Affix,
    pub neg_suffix: Affix,

    /// Decimal point.
    pub decimal: Decimal,

    /// Grouping character.
    pub grouping: Option<Decimal>,

    /// Format as `.5` or `0.5`?
    pub leading_zero: bool,

    /// An `Affix` may require more bytes than its display width; for example,
    /// U+00A5 (Â¥) is 2 bytes in UTF-8 but occupies only one display column.
    /// This member is the sum of the number of bytes required by all of the
    /// `Affix` members in this struct, minus their display widths.  Thus, it
    /// can be used to size memory allocations: for example, the formatted
    /// result of `CCA20.5` requires no more than `(20 + extra_bytes)` bytes in
    /// UTF-8.
    #[serde(skip)]
    pub extra_bytes: usize,
}

impl NumberStyle {
    fn new(
        prefix: &str,
        suffix: &str,
        decimal: Decimal,
        grouping: Option<Decimal>,
        leading_zero: bool,
    ) -> Self {
        // These assertions ensure that zero is correct for `extra_bytes`.
        debug_assert!(prefix.is_ascii());
        debug_assert!(suffix.is_ascii());

        Self {
            neg_prefix: Affix::new("-"),
            prefix: Affix::new(prefix),
            suffix: Affix::new(suffix),
            neg_suffix: Affix::new(""),
            decimal,
            grouping,
            leading_zero,
            extra_bytes: 0,
        }
    }

    fn affix_width(&self) -> usize {
        self.prefix.width + self.suffix.width
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Affix {
    /// String contents of affix.
    pub s: String,

    #[serde(skip)]
    /// Display width in columns (see [unicode_width])
    pub width: usize,
}

impl Affix {
    fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        Self {
            width: s.width(),
            s,
        }
    }

    fn extra_bytes(&self) -> usize {
        self.s.len().saturating_sub(self.width)
    }
}

impl FromStr for NumberStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn find_separator(s: &str) -> Option<char> {
            // Count commas and periods.  There must be exactly three of one or
            // the other, except that an apostrophe escapes a following comma or
            // period.
            let mut n_commas = 0;
            let mut n_periods = 0;
            let s = s.as_bytes();
            for i in 0..s.len() {
                if i > 0 && s[i - 1] == b'\'' {
                } else if s[i] == b',' {
                    n_commas += 1;
                } else if s[i] == b'.' {
                    n_periods += 1;
                }
            }

            if n_commas == 3 && n_periods != 3 {
                Some(',')
            } else if n_periods == 3 && n_commas != 3 {
                Some('.')
            } else {
                None
            }
        }

        fn take_cc_token(iter: &mut Chars<'_>, grouping: char) -> Affix {
            let mut s = String::new();
            let mut quote = false;
            for c in iter {
                if c == '\'' && !quote {
                    quote = true;
                } else if c == grouping && !quote {
                    break;
                } else {
                    s.push(c);
                    quote = false;
                }
            }
            Affix::new(s)
        }

        let Some(grouping) = find_separator(s) else {
            return Err(());
        };
        let mut iter = s.chars();
        let neg_prefix = take_cc_token(&mut iter, grouping);
        let prefix = take_cc_token(&mut iter, grouping);
        let suffix = take_cc_token(&mut iter, grouping);
        let neg_suffix = take_cc_token(&mut iter, grouping);
        let grouping = if grouping == ',' {
            Decimal::Comma
        } else {
            Decimal::Dot
        };
        let decimal = !grouping;
        let extra_bytes = neg_prefix.extra_bytes()
            + prefix.extra_bytes()
            + suffix.extra_bytes()
            + neg_suffix.extra_bytes();
        Ok(Self {
            neg_prefix,
            prefix,
            suffix,
            neg_suffix,
            decimal,
            grouping: Some(grouping),
            leading_zero: false,
            extra_bytes,
        })
    }
}

/// An item within a [DateTemplate].
pub struct TemplateItem {
    /// Character in the template.
    pub c: char,

    /// Number of repetitions of the character.
    pub n: usize,
}

/// A template for date and time formats.
#[derive(Clone)]
pub struct DateTemplate(&'static str);

impl DateTemplate {
    /// Returns a [DateTemplate] used for date and time input and output in a
    /// field of the given `type_` and `width`.
    ///
    /// `width` only affects whether a 2-digit year or a 4-digit year is used,
    /// that is, whether the returned string contains `yy` or `yyyy`, and
    /// whether seconds are included, that is, whether the returned string
    /// contains `:SS`.  A caller that doesn't care whether the returned string
    /// contains `yy` or `yyyy` or `:SS` can just specify 0 to omit them.
    pub fn new(type_: Type, width: usize) -> Option<Self> {
        let (short, long) = match type_ {
            Type::F
            | Type::Comma
            | Type::Dot
            | Type::Dollar
            | Type::Pct
            | Type::E
            | Type::CC(_)
            | Type::N
            | Type::Z
            | Type::WkDay
            | Type::Month => return None,
            Type::Date => ("dd-mmm-yy", "dd-mmm-yyyy"),
            Type::ADate => ("mm/dd/yy", "mm/dd/yyyy"),
            Type::EDate => ("dd.mm.yy", "dd.mm.yyyy"),
            Type::JDate => ("yyddd", "yyyyddd"),
            Type::SDate => ("yy/mm/dd", "yyyy/mm/dd"),
            Type::QYr => ("q Q yy", "q Q yyyy"),
            Type::MoYr => ("mmm yy", "mmm yyyy"),
            Type::WkYr => ("ww WK yy", "ww WK yyyy"),
            Type::DateTime => ("dd-mmm-yyyy HH:MM", "dd-mmm-yyyy HH:MM:SS"),
            Type::YmdHms => ("yyyy-mm-dd HH:MM", "yyyy-mm-dd HH:MM:SS"),
            Type::MTime => ("MM", "MM:SS"),
            Type::Time => ("HH:MM", "HH:MM:SS"),
            Type::DTime => ("D HH:MM", "D HH:MM:SS"),
        };
        if width >= long.len() {
            Some(DateTemplate(long))
        } else {
            Some(DateTemplate(short))
        }
    }

    pub fn for_format(format: Format) -> Option<Self> {
        Self::new(format.type_(), format.w())
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Iterator for DateTemplate {
    type Item = TemplateItem;

    fn next(&mut self) -> Option<Self::Item> {
        let mut iter = self.0.chars();
        let c = iter.next()?;
        self.0 = iter.as_str();
        let mut n = 1;
        while iter.next() == Some(c) {
            self.0 = iter.as_str();
            n += 1;
        }
        Some(TemplateItem { c, n })
    }
}


#[cfg(test)]
mod tests {
    use crate::format::{Decimal, Error, Format, NumberStyle, Type, UncheckedFormat, CC};

    #[test]
    fn from_u32() {
        assert_eq!(Format::from_u32(0), Ok(Format::F40_2));
        assert_eq!(Format::from_u32(1), Ok(Format::F40_2));
        assert_eq!(Format::from_u32(0x10000), Ok(Format::F40_2));
        assert_eq!(
            Format::from_u32(0x050802),
            Ok(Format::new(Type::F, 8, 2).unwrap())
        );
        assert_eq!(
            Format::from_u32(0x1f0501),
            Ok(Format::new(Type::Pct, 5, 1).unwrap())
        );

        // Types 40 and above are treated as F.
        assert_eq!(
            Format::from_u32(0x280a00),
            Ok(Format::new(Type::F, 10, 0).unwrap())
        );

        // Widths and decimals get fixed up.
        assert_eq!(
            Format::from_u32(0x140000),
            Ok(Format::new(Type::Date, 9, 0).unwrap())
        );

        assert_eq!(
            Format::from_u32(0x0d0800),
            Err(Error::UnknownFormat { value: 13 })
        );
        assert_eq!(Format::from_u32(0x010800), Err(Error::StringFormat(1)));

        // Binary formats read as F.
        assert_eq!(
            Format::from_u32(0x090401),
            Ok(Format::new(Type::F, 4, 1).unwrap())
        );
    }

    #[test]
    fn fix() {
        assert_eq!(
            UncheckedFormat::new(Type::E, 1, 3).fix(),
            Format::new(Type::E, 10, 3).unwrap()
        );
        assert_eq!(
            Format::F40_2.with_type(Type::Dollar),
            Format::new(Type::Dollar, 40, 2).unwrap()
        );
        assert_eq!(Format::F40.to_string(), "F40.0");
        assert_eq!(Format::DATETIME40_0.to_string(), "DATETIME40.0");
    }

    #[test]
    fn custom_currency() {
        let style: NumberStyle = "-,$,,".parse().unwrap();
        assert_eq!(style.neg_prefix.s, "-");
        assert_eq!(style.prefix.s, "$");
        assert_eq!(style.suffix.s, "");
        assert_eq!(style.decimal, Decimal::Dot);
        assert_eq!(style.grouping, Some(Decimal::Comma));
        assert!("xyz".parse::<NumberStyle>().is_err());
        assert_eq!(CC::C.to_string(), "C");
    }
}
