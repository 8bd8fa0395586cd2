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

//! Reading ZIP archives.
//!
//! SPV files are ZIP archives.  This module supports just what SPV files
//! need: a central directory without ZIP64 extensions, and members that are
//! either stored or compressed with raw deflate.

use std::{
    cell::RefCell,
    fmt::Debug,
    io::{Cursor, Error as IoError, ErrorKind, Read, Seek, SeekFrom},
};

use displaydoc::Display;
use flate2::{read::DeflateDecoder, Crc};
use indexmap::IndexMap;
use log::debug;
use thiserror::Error as ThisError;

use super::binary::{Error as StreamError, Stream};

const LOCAL_HEADER_MAGIC: u32 = 0x04034b50;
const CENTRAL_DIRECTORY_MAGIC: u32 = 0x02014b50;
const END_OF_CENTRAL_DIRECTORY_MAGIC: u32 = 0x06054b50;

/// Size of the end-of-central-directory record without its comment.
const EOCD_SIZE: u64 = 22;

/// Size of a local file header without its name and extra field.
const LOCAL_HEADER_SIZE: usize = 30;

/// An error reading a ZIP archive.
#[derive(Display, ThisError, Debug)]
pub enum Error {
    /// I/O error ({0})
    Io(#[from] IoError),

    /// unexpected end of file
    UnexpectedEof,

    /// corrupt archive at {offset:#x}: expected {expected:#x} but got {actual:#x}
    BadMagic {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// cannot find central directory
    NoCentralDirectory,

    /// corrupt central directory: {0}
    CorruptCentralDirectory(StreamError),

    /// archive uses ZIP64 extensions, which are not supported
    Zip64,

    /// unknown member "{0}"
    UnknownMember(String),

    /// member "{member}" has unknown compression type {method}
    UnknownCompression { member: String, method: u16 },

    /// name mismatch between central directory ({central}) and local file header ({local})
    NameMismatch { central: String, local: String },

    /// member "{member}" has CRC {actual:#010x} but the central directory says {expected:#010x}
    BadCrc {
        member: String,
        expected: u32,
        actual: u32,
    },

    /// member "{member}" inflates to {actual} bytes but the central directory says {expected}
    SizeMismatch {
        member: String,
        expected: u64,
        actual: u64,
    },
}

impl Error {
    fn from_read(error: IoError) -> Self {
        match error.kind() {
            ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Io(error),
        }
    }
}

/// A member of a [ZipArchive], as described by its central directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub method: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub offset: u32,
}

/// A ZIP archive opened for reading.
///
/// The archive reads members on demand through a shared reference, so that
/// lazily decoded items can hold a plain `&ZipArchive`.
pub struct ZipArchive<R> {
    reader: RefCell<R>,
    entries: IndexMap<String, ZipEntry>,
}

impl<R> Debug for ZipArchive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn read_exact_at<R>(reader: &mut R, offset: u64, n: usize) -> Result<Vec<u8>, Error>
where
    R: Read + Seek,
{
    reader.seek(SeekFrom::Start(offset))?;
    let mut buffer = vec![0; n];
    reader.read_exact(&mut buffer).map_err(Error::from_read)?;
    Ok(buffer)
}

fn check_magic(stream: &mut Stream, expected: u32) -> Result<(), Error> {
    let offset = stream.offset();
    let actual = stream.u32().map_err(|_| Error::UnexpectedEof)?;
    if actual != expected {
        return Err(Error::BadMagic {
            offset,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Searches `tail`, the final bytes of a file, for the end-of-central-directory
/// record, scanning backward from the last position where one could start.
fn find_eocd(tail: &[u8]) -> Option<usize> {
    let magic = END_OF_CENTRAL_DIRECTORY_MAGIC.to_le_bytes();
    let last = tail.len().checked_sub(EOCD_SIZE as usize)?;
    (0..=last).rev().find(|&i| tail[i..i + 4] == magic)
}

impl<R> ZipArchive<R>
where
    R: Read + Seek,
{
    /// Opens `reader` as a ZIP archive and reads its central directory.
    pub fn new(mut reader: R) -> Result<Self, Error> {
        let header = read_exact_at(&mut reader, 0, 4)?;
        check_magic(&mut Stream::new(&header), LOCAL_HEADER_MAGIC)?;

        // The end-of-central-directory record is at the very end of the file,
        // except for a comment of up to 65535 bytes.
        let file_size = reader.seek(SeekFrom::End(0))?;
        if file_size < EOCD_SIZE {
            return Err(Error::NoCentralDirectory);
        }
        let tail_start = file_size.saturating_sub(EOCD_SIZE + u16::MAX as u64);
        let tail = read_exact_at(&mut reader, tail_start, (file_size - tail_start) as usize)?;
        let eocd_pos = find_eocd(&tail).ok_or(Error::NoCentralDirectory)?;

        let mut eocd = Stream::new(&tail[eocd_pos..]);
        let parse_eocd = |eocd: &mut Stream| -> Result<(u16, u32, u32), StreamError> {
            eocd.skip(4)?;
            let _disk_number = eocd.u16()?;
            let _cd_disk_number = eocd.u16()?;
            let _n_disk_entries = eocd.u16()?;
            let n_entries = eocd.u16()?;
            let cd_size = eocd.u32()?;
            let cd_offset = eocd.u32()?;
            Ok((n_entries, cd_size, cd_offset))
        };
        let (n_entries, cd_size, cd_offset) =
            parse_eocd(&mut eocd).map_err(Error::CorruptCentralDirectory)?;
        if n_entries == u16::MAX || cd_size == u32::MAX || cd_offset == u32::MAX {
            return Err(Error::Zip64);
        }

        let directory = read_exact_at(&mut reader, cd_offset as u64, cd_size as usize)?;
        let mut stream = Stream::new(&directory);
        let mut entries = IndexMap::with_capacity(n_entries as usize);
        for _ in 0..n_entries {
            let entry = Self::read_central_entry(&mut stream, cd_offset as u64)?;
            entries.insert(entry.name.clone(), entry);
        }
        debug!("ZIP archive has {} members", entries.len());

        Ok(Self {
            reader: RefCell::new(reader),
            entries,
        })
    }

    fn read_central_entry(stream: &mut Stream, base: u64) -> Result<ZipEntry, Error> {
        let offset = base + stream.offset();
        let magic = stream.u32().map_err(Error::CorruptCentralDirectory)?;
        if magic != CENTRAL_DIRECTORY_MAGIC {
            return Err(Error::BadMagic {
                offset,
                expected: CENTRAL_DIRECTORY_MAGIC,
                actual: magic,
            });
        }
        let parse = |stream: &mut Stream| -> Result<ZipEntry, StreamError> {
            let _version_made_by = stream.u16()?;
            let _version_needed = stream.u16()?;
            let _flags = stream.u16()?;
            let method = stream.u16()?;
            let _time = stream.u16()?;
            let _date = stream.u16()?;
            let crc32 = stream.u32()?;
            let compressed_size = stream.u32()?;
            let uncompressed_size = stream.u32()?;
            let name_len = stream.u16()? as usize;
            let extra_len = stream.u16()? as usize;
            let comment_len = stream.u16()? as usize;
            let _disk_start = stream.u16()?;
            let _internal_attributes = stream.u16()?;
            let _external_attributes = stream.u32()?;
            let offset = stream.u32()?;
            let name = String::from_utf8_lossy(stream.bytes(name_len)?).into_owned();
            stream.skip(extra_len)?;
            stream.skip(comment_len)?;
            Ok(ZipEntry {
                name,
                method,
                crc32,
                compressed_size,
                uncompressed_size,
                offset,
            })
        };
        parse(stream).map_err(Error::CorruptCentralDirectory)
    }
}

impl<R> ZipArchive<R> {
    /// Returns true if the archive has a member named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the names of the archive's members in central directory
    /// order.
    pub fn list(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R> ZipArchive<R>
where
    R: Read + Seek,
{
    /// Opens the member named `name` for reading its uncompressed contents.
    pub fn open(&self, name: &str) -> Result<ZipMember, Error> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownMember(name.into()))?;
        let mut reader = self.reader.borrow_mut();
        let header = read_exact_at(&mut *reader, entry.offset as u64, LOCAL_HEADER_SIZE)?;
        let mut stream = Stream::new(&header);
        check_magic(&mut stream, LOCAL_HEADER_MAGIC).map_err(|error| match error {
            Error::BadMagic {
                expected, actual, ..
            } => Error::BadMagic {
                offset: entry.offset as u64,
                expected,
                actual,
            },
            other => other,
        })?;
        let parse = |stream: &mut Stream| -> Result<(u16, usize, usize), StreamError> {
            let _version = stream.u16()?;
            let _flags = stream.u16()?;
            let method = stream.u16()?;
            let _time = stream.u16()?;
            let _date = stream.u16()?;
            let _crc32 = stream.u32()?;
            let _compressed_size = stream.u32()?;
            let _uncompressed_size = stream.u32()?;
            let name_len = stream.u16()? as usize;
            let extra_len = stream.u16()? as usize;
            Ok((method, name_len, extra_len))
        };
        let (method, name_len, extra_len) = parse(&mut stream).map_err(|_| Error::UnexpectedEof)?;

        let mut local_name = vec![0; name_len];
        reader
            .read_exact(&mut local_name)
            .map_err(Error::from_read)?;
        let local_name = String::from_utf8_lossy(&local_name);
        if local_name != entry.name {
            return Err(Error::NameMismatch {
                central: entry.name.clone(),
                local: local_name.into_owned(),
            });
        }
        reader.seek(SeekFrom::Current(extra_len as i64))?;
        if method != entry.method {
            debug!(
                "{name}: local header says compression method {method} but central directory says {}",
                entry.method
            );
        }

        let mut compressed = vec![0; entry.compressed_size as usize];
        reader
            .read_exact(&mut compressed)
            .map_err(Error::from_read)?;
        let inner = match entry.method {
            0 => MemberInner::Stored(Cursor::new(compressed)),
            8 => MemberInner::Deflate(DeflateDecoder::new(Cursor::new(compressed))),
            method => {
                return Err(Error::UnknownCompression {
                    member: entry.name.clone(),
                    method,
                })
            }
        };
        debug!("opened ZIP member {name} (method {})", entry.method);
        Ok(ZipMember {
            inner,
            entry: entry.clone(),
        })
    }

    /// Reads and returns the entire contents of the member named `name`,
    /// verifying its size and CRC against the central directory.
    pub fn read_all(&self, name: &str) -> Result<Vec<u8>, Error> {
        let mut member = self.open(name)?;
        let mut data = Vec::with_capacity(member.entry.uncompressed_size as usize);
        member.read_to_end(&mut data)?;
        let entry = &member.entry;
        if data.len() as u64 != entry.uncompressed_size as u64 {
            return Err(Error::SizeMismatch {
                member: entry.name.clone(),
                expected: entry.uncompressed_size as u64,
                actual: data.len() as u64,
            });
        }
        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(Error::BadCrc {
                member: entry.name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }
        Ok(data)
    }
}

enum MemberInner {
    Stored(Cursor<Vec<u8>>),
    Deflate(DeflateDecoder<Cursor<Vec<u8>>>),
}

/// A readable stream of the uncompressed contents of a ZIP member.
pub struct ZipMember {
    inner: MemberInner,
    entry: ZipEntry,
}

impl ZipMember {
    pub fn entry(&self) -> &ZipEntry {
        &self.entry
    }
}

impl Read for ZipMember {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            MemberInner::Stored(cursor) => cursor.read(buf),
            MemberInner::Deflate(decoder) => decoder.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Write};

    use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

    use super::{find_eocd, Error, ZipArchive};

    fn build(members: &[(&str, &[u8], CompressionMethod)], comment: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents, method) in members {
            writer
                .start_file(*name, SimpleFileOptions::default().compression_method(*method))
                .unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.set_comment(comment);
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn stored_and_deflated() {
        let text = b"allowPivoting=true";
        let long = "The quick brown fox jumps over the lazy dog. ".repeat(50);
        let bytes = build(
            &[
                ("META-INF/MANIFEST.MF", text, CompressionMethod::Stored),
                ("big.txt", long.as_bytes(), CompressionMethod::Deflated),
            ],
            "",
        );
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(
            archive.list().collect::<Vec<_>>(),
            vec!["META-INF/MANIFEST.MF", "big.txt"]
        );
        assert!(archive.contains("big.txt"));
        assert!(!archive.contains("BIG.TXT"));
        assert_eq!(archive.read_all("META-INF/MANIFEST.MF").unwrap(), text);
        assert_eq!(archive.read_all("big.txt").unwrap(), long.as_bytes());

        // Members can be opened more than once, in any order.
        let mut s = String::new();
        archive
            .open("big.txt")
            .unwrap()
            .read_to_string(&mut s)
            .unwrap();
        assert_eq!(s, long);
        assert_eq!(archive.read_all("META-INF/MANIFEST.MF").unwrap(), text);
    }

    #[test]
    fn archive_comment() {
        let bytes = build(
            &[("a", b"xyzzy", CompressionMethod::Stored)],
            &"comment ".repeat(100),
        );
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.read_all("a").unwrap(), b"xyzzy");
    }

    #[test]
    fn unknown_member() {
        let bytes = build(&[("a", b"xyzzy", CompressionMethod::Stored)], "");
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let error = archive.read_all("b").unwrap_err();
        assert_eq!(error.to_string(), "unknown member \"b\"");
    }

    #[test]
    fn not_a_zip() {
        let text = vec![b'x'; 100];
        let error = ZipArchive::new(Cursor::new(text)).unwrap_err();
        assert!(matches!(
            error,
            Error::BadMagic {
                offset: 0,
                expected: 0x04034b50,
                actual: 0x78787878
            }
        ));
        assert!(ZipArchive::new(Cursor::new(b"PK".to_vec())).is_err());
    }

    #[test]
    fn truncated() {
        let mut bytes = build(&[("a", b"xyzzy", CompressionMethod::Stored)], "");
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            ZipArchive::new(Cursor::new(bytes)),
            Err(Error::NoCentralDirectory)
        ));
    }

    #[test]
    fn corrupt_data() {
        let mut bytes = build(&[("a", b"xyzzy", CompressionMethod::Stored)], "");
        let position = bytes.windows(5).position(|w| w == b"xyzzy").unwrap();
        bytes[position] = b'X';
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            archive.read_all("a"),
            Err(Error::BadCrc { .. })
        ));
    }

    #[test]
    fn eocd_search() {
        let mut tail = vec![0; 30];
        tail[3..7].copy_from_slice(b"PK\x05\x06");
        assert_eq!(find_eocd(&tail), Some(3));
        assert_eq!(find_eocd(&tail[4..]), None);
        assert_eq!(find_eocd(&[0; 10]), None);
    }
}
