//! Dump identifiers: the `(test, date, type)` triple encoded in a dump's file name.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator between the three name segments.
pub const DELIMITER: char = '.';

/// A file name that does not split into exactly three non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name:?} is not a valid dump name: expected \"test.date.type\", found {segments} segment(s)")]
pub struct FormatError {
    pub name: String,
    pub segments: usize,
}

/// Identifies one dump file. Segments never contain [`DELIMITER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpId {
    pub test: String,
    pub date: String,
    pub kind: String,
}

impl DumpId {
    pub fn new(test: impl Into<String>, date: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            date: date.into(),
            kind: kind.into(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, FormatError> {
        let parts: Vec<&str> = name.split(DELIMITER).collect();
        match parts.as_slice() {
            [test, date, kind] if !test.is_empty() && !date.is_empty() && !kind.is_empty() => {
                Ok(Self::new(*test, *date, *kind))
            }
            _ => Err(FormatError {
                name: name.to_string(),
                segments: parts.len(),
            }),
        }
    }

    /// On-disk file name, `test.date.type`.
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{d}{}{d}{}", self.test, self.date, self.kind, d = DELIMITER)
    }
}

impl FromStr for DumpId {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
