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

//! Individual pieces of data.
//!
//! [Datum] is the value of one variable in one row of a legacy table's data
//! source.  Strings are always UTF-8 here, because every string in an SPV file
//! is transcoded when it is read.

use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    hash::Hash,
};

use ordered_float::OrderedFloat;

/// A number or a string.
#[derive(Clone)]
pub enum Datum {
    /// A numeric value.
    Number(
        /// A number, or `None` for the system-missing value.
        Option<f64>,
    ),
    /// A string value.
    String(String),
}

impl Debug for Datum {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Datum::Number(Some(number)) => write!(f, "{number:?}"),
            Datum::Number(None) => write!(f, "SYSMIS"),
            Datum::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Datum::Number(Some(number)) => write!(f, "{number}"),
            Datum::Number(None) => write!(f, "."),
            Datum::String(s) => write!(f, "{s}"),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(Some(l0)), Self::Number(Some(r0))) => {
                OrderedFloat(*l0) == OrderedFloat(*r0)
            }
            (Self::Number(None), Self::Number(None)) => true,
            (Self::String(l0), Self::String(r0)) => l0 == r0,
            _ => false,
        }
    }
}

impl Eq for Datum {}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Number(a), Datum::Number(b)) => match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.total_cmp(b),
            },
            (Datum::Number(_), Datum::String(_)) => Ordering::Less,
            (Datum::String(_), Datum::Number(_)) => Ordering::Greater,
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
        }
    }
}

impl Hash for Datum {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Datum::Number(number) => number.map(OrderedFloat).hash(state),
            Datum::String(string) => string.hash(state),
        }
    }
}

impl Datum {
    /// Constructs a new numerical [Datum] for the system-missing value.
    pub const fn sysmis() -> Self {
        Self::Number(None)
    }
}

impl From<f64> for Datum {
    fn from(number: f64) -> Self {
        Some(number).into()
    }
}

impl From<Option<f64>> for Datum {
    fn from(value: Option<f64>) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
