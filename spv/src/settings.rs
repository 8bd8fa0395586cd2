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

use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::{
    format::{Format, Settings as FormatSettings},
    output::pivot::Look,
};

/// Whether to show variable or value labels or the underlying value or variable
/// name.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Show {
    /// Value (or variable name) only.
    Value,

    /// Label only.
    ///
    /// The value will be shown if no label is available.
    #[default]
    Label,

    /// Value (or variable name) and label.
    ///
    /// Just the value will be shown, if no label is available.
    Both,
}

impl Show {
    pub fn show_value(&self) -> bool {
        *self != Self::Label
    }

    pub fn show_label(&self) -> bool {
        *self != Self::Value
    }
}

/// Process-wide defaults for values that an SPV file leaves unspecified.
pub struct Settings {
    /// Look for tables that do not supply their own.
    pub look: Arc<Look>,

    /// Format for numbers in the "other" result class.
    pub default_format: Format,

    pub formats: FormatSettings,

    /// Numbers with smaller magnitude than this are displayed in scientific
    /// notation, if the category they belong to honors it.
    pub small: f64,

    pub show_values: Show,
    pub show_variables: Show,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            look: Arc::new(Look::default()),
            default_format: Format::F8_2,
            formats: FormatSettings::default(),
            small: 0.0001,
            show_values: Show::default(),
            show_variables: Show::default(),
        }
    }
}

impl Settings {
    pub fn global() -> &'static Settings {
        static GLOBAL: OnceLock<Settings> = OnceLock::new();
        GLOBAL.get_or_init(Settings::default)
    }
}
