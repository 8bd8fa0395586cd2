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

//! Reading SPSS Viewer (`.spv`) output archives.
//!
//! [output::spv::SpvFile] opens an archive and builds an [output::Item]
//! tree from its structure members.  Pivot tables inside the archive are
//! decoded on first use, from either the "light" binary form or the
//! "legacy" XML-plus-binary form, into [output::pivot::PivotTable].

pub mod calendar;
pub mod data;
pub mod format;
pub mod message;
pub mod output;
pub mod settings;
mod util;
