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

//! Positional reading of little-endian binary data.
//!
//! [Stream] is a cursor over a byte slice.  Every read either succeeds and
//! advances the cursor or fails with an [Error] that records the offset where
//! the read was attempted, so that decoders can simply propagate failures with
//! `?`.

use std::fmt::{Display, Formatter};

use binrw::Error as BinError;
use displaydoc::Display;
use thiserror::Error as ThisError;

/// An error reading from a [Stream].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    /// Offset where the failing read started.
    pub offset: u64,

    /// Details of the error.
    pub details: ErrorDetails,
}

impl std::error::Error for Error {}

impl Error {
    /// Constructs an error from `offset` and `details`.
    pub fn new(offset: u64, details: ErrorDetails) -> Self {
        Self { offset, details }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "at offset {:#x}: {}", self.offset, self.details)
    }
}

/// Details of an [Error].
#[derive(Clone, Display, ThisError, Debug, PartialEq, Eq)]
pub enum ErrorDetails {
    /// unexpected end of input reading {needed} bytes ({available} remain)
    UnexpectedEof { needed: usize, available: usize },

    /// expected end of input but {extra} bytes remain
    ExpectedEnd { extra: usize },

    /// bad boolean value {0:#04x} (expected 0 or 1)
    BadBool(u8),

    /// expected byte {expected:#04x} but found {actual:#04x}
    UnexpectedByte { expected: u8, actual: u8 },

    /// size calculation {0} overflows
    Overflow(&'static str),
}

/// A cursor over a byte slice.
///
/// Offsets reported in errors are relative to the start of the outermost
/// stream, even for streams created with [Stream::substream].
#[derive(Clone, Debug)]
pub struct Stream<'a> {
    data: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> Stream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Returns the absolute offset of the next byte to be read.
    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Returns the position of the next byte relative to the start of this
    /// stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Returns an error positioned at the current offset.
    pub fn error(&self, details: ErrorDetails) -> Error {
        Error::new(self.offset(), details)
    }

    /// Reads `n` bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(self.error(ErrorDetails::UnexpectedEof {
                needed: n,
                available,
            }));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads exactly `N` bytes into an array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut array = [0; N];
        array.copy_from_slice(self.bytes(N)?);
        Ok(array)
    }

    pub fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Reads a byte that must be 0 or 1.
    pub fn bool(&mut self) -> Result<bool, Error> {
        let offset = self.offset();
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::new(offset, ErrorDetails::BadBool(other))),
        }
    }

    /// Reads a byte that must equal `expected`.
    pub fn expect_byte(&mut self, expected: u8) -> Result<(), Error> {
        let offset = self.offset();
        match self.u8()? {
            actual if actual == expected => Ok(()),
            actual => Err(Error::new(
                offset,
                ErrorDetails::UnexpectedByte { expected, actual },
            )),
        }
    }

    /// Consumes `byte` if it is next in the stream and returns whether it
    /// did.
    pub fn optional_byte(&mut self, byte: u8) -> bool {
        if self.data.get(self.pos) == Some(&byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads a `width`-byte field that holds a string terminated by the first
    /// null byte, if any.  Bytes after the terminator are discarded.
    pub fn fixed_string(&mut self, width: usize) -> Result<&'a [u8], Error> {
        let field = self.bytes(width)?;
        let len = field.iter().position(|b| *b == 0).unwrap_or(width);
        Ok(&field[..len])
    }

    /// Reads a string preceded by its length as a 32-bit integer.
    pub fn string(&mut self) -> Result<&'a [u8], Error> {
        let start = self.pos;
        let len = self.u32()? as usize;
        self.bytes(len).inspect_err(|_| self.pos = start)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.bytes(n).map(|_| ())
    }

    /// Skips forward to the next multiple of `alignment` within this stream.
    pub fn align(&mut self, alignment: usize) -> Result<(), Error> {
        match self.pos % alignment {
            0 => Ok(()),
            misalignment => self.skip(alignment - misalignment),
        }
    }

    /// Moves to absolute `position` within this stream.
    pub fn seek(&mut self, position: usize) -> Result<(), Error> {
        if position > self.data.len() {
            return Err(self.error(ErrorDetails::UnexpectedEof {
                needed: position - self.pos.min(position),
                available: self.data.len() - self.pos,
            }));
        }
        self.pos = position;
        Ok(())
    }

    /// Returns a stream over the next `n` bytes and advances past them.
    pub fn substream(&mut self, n: usize) -> Result<Stream<'a>, Error> {
        let base = self.offset();
        let data = self.bytes(n)?;
        Ok(Stream { data, pos: 0, base })
    }

    /// Fails unless every byte has been consumed.
    pub fn expect_end(&self) -> Result<(), Error> {
        match self.data.len() - self.pos {
            0 => Ok(()),
            extra => Err(self.error(ErrorDetails::ExpectedEnd { extra })),
        }
    }
}

/// Multiplies `a` by `b`, failing with an error that names `what` on
/// overflow.
pub fn checked_mul(a: usize, b: usize, what: &'static str) -> Result<usize, ErrorDetails> {
    a.checked_mul(b).ok_or(ErrorDetails::Overflow(what))
}

/// Newtype that implements [Display] for [BinError].
#[derive(Debug)]
pub struct DisplayBinError(pub BinError);

impl Display for DisplayBinError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_eof() {
            write!(f, "unexpected end of file reading {}", self.0)
        } else {
            write!(f, "{}", self.0.root_cause())
        }
    }
}

impl From<BinError> for DisplayBinError {
    fn from(value: BinError) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorDetails, Stream};

    #[test]
    fn integers() {
        let data = [
            0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff,
        ];
        let mut stream = Stream::new(&data);
        assert_eq!(stream.u8(), Ok(1));
        assert_eq!(stream.u16(), Ok(0x1234));
        assert_eq!(stream.u32(), Ok(0x12345678));
        assert_eq!(stream.i32(), Ok(-1));
        assert!(stream.is_empty());
        assert_eq!(stream.expect_end(), Ok(()));
    }

    #[test]
    fn floats() {
        let mut data = 1.5f64.to_le_bytes().to_vec();
        data.extend_from_slice(&(-f64::MAX).to_le_bytes());
        let mut stream = Stream::new(&data);
        assert_eq!(stream.f64(), Ok(1.5));
        assert_eq!(stream.f64(), Ok(-f64::MAX));
    }

    #[test]
    fn underflow_reports_offset() {
        let data = [1, 2, 3];
        let mut stream = Stream::new(&data);
        stream.skip(1).unwrap();
        let error = stream.u32().unwrap_err();
        assert_eq!(error.offset, 1);
        assert_eq!(
            error.details,
            ErrorDetails::UnexpectedEof {
                needed: 4,
                available: 2
            }
        );

        // A failed read does not consume anything.
        assert_eq!(stream.u16(), Ok(0x0302));
    }

    #[test]
    fn strings() {
        let data = b"ab\0cd\x03\0\0\0xyz!";
        let mut stream = Stream::new(data);
        assert_eq!(stream.fixed_string(5), Ok(&b"ab"[..]));
        assert_eq!(stream.string(), Ok(&b"xyz"[..]));
        assert_eq!(stream.remaining(), b"!");

        let error = Stream::new(b"\x09\0\0\0abc").string().unwrap_err();
        assert_eq!(error.offset, 4);
    }

    #[test]
    fn booleans() {
        let mut stream = Stream::new(&[0, 1, 2]);
        assert_eq!(stream.bool(), Ok(false));
        assert_eq!(stream.bool(), Ok(true));
        assert_eq!(
            stream.bool().unwrap_err().details,
            ErrorDetails::BadBool(2)
        );
    }

    #[test]
    fn substreams_keep_absolute_offsets() {
        let data = [0, 0, 1, 2, 3, 4, 5];
        let mut stream = Stream::new(&data);
        stream.skip(2).unwrap();
        let mut sub = stream.substream(3).unwrap();
        assert_eq!(stream.offset(), 5);
        assert_eq!(sub.u16(), Ok(0x0201));
        let error = sub.u16().unwrap_err();
        assert_eq!(error.offset, 4);
        assert_eq!(
            sub.expect_end().unwrap_err().details,
            ErrorDetails::ExpectedEnd { extra: 1 }
        );
    }

    #[test]
    fn optional_bytes_and_alignment() {
        let mut stream = Stream::new(&[0x31, 0x58, 0, 0, 9]);
        assert!(stream.optional_byte(0x31));
        assert!(!stream.optional_byte(0x31));
        stream.skip(1).unwrap();
        stream.align(4).unwrap();
        assert_eq!(stream.position(), 4);
        assert_eq!(stream.u8(), Ok(9));
    }
}
