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

//! Page setup recorded in an SPV file's structure members.

use enum_map::{enum_map, EnumMap};

use super::pivot::{Axis2, HorzAlign};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

/// How big to make charts relative to the page.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ChartSize {
    #[default]
    AsIs,
    FullHeight,
    HalfHeight,
    QuarterHeight,
}

impl ChartSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartSize::AsIs => "as-is",
            ChartSize::FullHeight => "full-height",
            ChartSize::HalfHeight => "half-height",
            ChartSize::QuarterHeight => "quarter-height",
        }
    }
}

/// One paragraph of a page header or footer.
#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    /// Pango-style markup, as extracted from the paragraph's HTML.
    pub markup: String,
    pub horz_align: HorzAlign,
}

impl Default for Paragraph {
    fn default() -> Self {
        Self {
            markup: String::new(),
            horz_align: HorzAlign::Left,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Heading(pub Vec<Paragraph>);

#[derive(Clone, Debug, PartialEq)]
pub struct Setup {
    pub initial_page_number: i32,

    /// Paper size in inches.
    pub paper: EnumMap<Axis2, f64>,

    /// Margin widths in inches, as `[left, right]` for [Axis2::X] and
    /// `[top, bottom]` for [Axis2::Y].
    pub margins: EnumMap<Axis2, [f64; 2]>,

    pub orientation: Orientation,

    /// Space between items, in inches.
    pub object_spacing: f64,

    pub chart_size: ChartSize,

    /// Header and footer, in that order.
    pub headings: [Heading; 2],
}

impl Default for Setup {
    /// US letter paper with half-inch margins.
    fn default() -> Self {
        Self {
            initial_page_number: 1,
            paper: enum_map! { Axis2::X => 8.5, Axis2::Y => 11.0 },
            margins: enum_map! { Axis2::X => [0.5, 0.5], Axis2::Y => [0.5, 0.5] },
            orientation: Orientation::default(),
            object_spacing: 12.0 / 72.0,
            chart_size: ChartSize::default(),
            headings: Default::default(),
        }
    }
}

impl Setup {
    pub fn header(&self) -> &Heading {
        &self.headings[0]
    }

    pub fn footer(&self) -> &Heading {
        &self.headings[1]
    }
}
