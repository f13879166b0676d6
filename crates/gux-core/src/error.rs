//! Error taxonomy for the verification engine.
//!
//! Parse errors are fatal for a run; technique errors are isolated to a
//! single (zone, technique) pair and surface as unverified checks.

use serde::{Deserialize, Serialize};

/// Position of a parse error inside the source text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Location {
    /// Byte offset into the source text.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column (in characters).
    pub column: usize,
}

impl Location {
    /// Compute line and column for a byte offset into `source`.
    pub fn at(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..floor_char_boundary(source, offset)];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        Self {
            offset,
            line,
            column,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Classification of spec parse failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    MissingPage,
    InvalidBounds,
    UnknownColour,
    UnbalancedDelimiters,
    InvalidArguments,
    DuplicateZone,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPage => "missing_page",
            Self::InvalidBounds => "invalid_bounds",
            Self::UnknownColour => "unknown_colour",
            Self::UnbalancedDelimiters => "unbalanced_delimiters",
            Self::InvalidArguments => "invalid_arguments",
            Self::DuplicateZone => "duplicate_zone",
        }
    }
}

/// A spec that could not be turned into a [`crate::SpecTree`].
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{} at {location}: {message}", kind.as_str())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub location: Location,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }
}

/// Failure of one technique on one zone.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TechniqueError {
    #[error("unknown technique: {name}")]
    UnknownTechnique { name: String },

    #[error("zone crop is empty")]
    EmptyZone,

    #[error("technique requires a reference image")]
    MissingReference,

    #[error(
        "dimension mismatch: current {}x{}, reference {}x{}",
        current.0, current.1, reference.0, reference.1
    )]
    DimensionMismatch {
        current: (u32, u32),
        reference: (u32, u32),
    },
}

/// Umbrella error for engine entry points.
#[derive(Debug, thiserror::Error)]
pub enum GuxError {
    #[error("spec parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("technique error: {0}")]
    Technique(#[from] TechniqueError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, GuxError>;
