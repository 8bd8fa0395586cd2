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


use std::fmt::{Display, Write};

use smallstr::SmallString;

pub trait ToSmallString {
    fn to_small_string<const N: usize>(&self) -> SmallString<[u8; N]>;
}

impl<T> ToSmallString for T
where
    T: Display,
{
    fn to_small_string<const N: usize>(&self) -> SmallString<[u8; N]> {
        let mut s = SmallString::new();
        write!(&mut s, "{}", self).unwrap();
        s
    }
}
