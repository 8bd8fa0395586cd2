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

//! Diagnostics and the process-wide diagnostic sink.
//!
//! Decoders in this crate report problems through callbacks, so that they can
//! be tested in isolation.  The SPV reader forwards everything it receives to
//! [emit], which counts diagnostics by [Severity] and passes them along to
//! the installed handler (by default, the `log` crate).

use std::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::{Mutex, MutexGuard},
};

use enum_map::{Enum, EnumMap};

/// Where a diagnostic applies within an SPV file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// Name of the SPV file, if known.
    pub file_name: Option<String>,

    /// Path to the item within the item tree, e.g. `/Frequencies/Statistics`.
    pub path: Option<String>,

    /// Name of the ZIP member responsible for the problem.
    pub member: Option<String>,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut first = true;
        if let Some(file_name) = &self.file_name {
            write!(f, "{file_name}")?;
            first = false;
        }
        if let Some(path) = &self.path {
            if !first {
                write!(f, ":")?;
            }
            write!(f, "{path}")?;
            first = false;
        }
        if let Some(member) = &self.member {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "({member})")?;
        }
        Ok(())
    }
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none() && self.path.is_none() && self.member.is_none()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub text: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            location: Location::default(),
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn with_location(self, location: Location) -> Self {
        Self { location, ..self }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if !self.location.is_empty() {
            write!(f, "{}: ", self.location)?;
        }
        write!(f, "{}: {}", self.severity, self.text)
    }
}

impl Debug for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self, f)
    }
}

type Handler = Box<dyn Fn(&Diagnostic) + Send>;

struct Sink {
    handler: Option<Handler>,
    counts: EnumMap<Severity, usize>,
}

static SINK: Mutex<Sink> = Mutex::new(Sink {
    handler: None,
    counts: EnumMap::from_array([0; 3]),
});

fn sink() -> MutexGuard<'static, Sink> {
    SINK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Installs `handler` as the destination for diagnostics passed to [emit],
/// replacing the default of logging them.
pub fn set_handler(handler: impl Fn(&Diagnostic) + Send + 'static) {
    sink().handler = Some(Box::new(handler));
}

/// Delivers `diagnostic` to the process-wide sink.
pub fn emit(diagnostic: Diagnostic) {
    let mut sink = sink();
    sink.counts[diagnostic.severity] += 1;
    match &sink.handler {
        Some(handler) => handler(&diagnostic),
        None => match diagnostic.severity {
            Severity::Error => log::error!("{diagnostic}"),
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Note => log::info!("{diagnostic}"),
        },
    }
}

/// Returns the number of diagnostics emitted so far with the given `severity`.
pub fn count(severity: Severity) -> usize {
    sink().counts[severity]
}

#[cfg(test)]
mod tests {
    use super::{Diagnostic, Location};

    #[test]
    fn display() {
        let diagnostic = Diagnostic::warning("bad format 0x123").with_location(Location {
            file_name: Some("x.spv".into()),
            path: Some("/Frequencies/Statistics".into()),
            member: Some("0000_lightTableData.bin".into()),
        });
        assert_eq!(
            diagnostic.to_string(),
            "x.spv:/Frequencies/Statistics (0000_lightTableData.bin): warning: bad format 0x123"
        );
        assert_eq!(
            Diagnostic::error("oops").to_string(),
            "error: oops"
        );
    }
}
