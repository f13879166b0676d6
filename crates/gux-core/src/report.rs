//! Structured verification report.
//!
//! The report is the terminal artifact of a run. It is built once by
//! [`crate::score`] and never mutated afterwards; the text form in
//! [`crate::render`] is derived from it.

use serde::{Deserialize, Serialize};

use crate::error::TechniqueError;
use crate::extract::ExtractionWarning;
use crate::spec::Bounds;
use crate::techniques::MetricsRecord;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    /// No check could be evaluated. Distinct from pass and from fail.
    Unverified,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Unverified => "UNVERIFIED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Declared colour vs. dominant cluster (ΔE).
    Colour,
    /// `Assert(...)` thresholds.
    Structural,
    /// Pixel mismatch against the reference.
    Diff,
    /// Census distribution distance against the reference.
    CensusShift,
    /// Pre-resolved finding from an outside source.
    External,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Colour => "colour",
            Self::Structural => "structural",
            Self::Diff => "diff",
            Self::CensusShift => "census_shift",
            Self::External => "external",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AtMost,
    AtLeast,
}

impl Comparison {
    pub fn holds(&self, measured: f64, threshold: f64) -> bool {
        match self {
            Self::AtMost => measured <= threshold,
            Self::AtLeast => measured >= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::AtMost => "<=",
            Self::AtLeast => ">=",
        }
    }
}

/// One evaluated threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Check {
    pub kind: CheckKind,
    pub subject: String,
    pub measured: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    pub fn new(
        kind: CheckKind,
        subject: impl Into<String>,
        measured: f64,
        threshold: f64,
        comparison: Comparison,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            measured,
            threshold,
            comparison,
            passed: comparison.holds(measured, threshold),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A technique that could not run on a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechniqueFailure {
    pub technique: String,
    pub error: TechniqueError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneEntry {
    pub name: String,
    pub path: String,
    pub doc: Option<String>,
    /// Declared bounds.
    pub bounds: Option<Bounds>,
    /// Bounds actually analysed, after clamping to the image.
    pub clamped: Option<Bounds>,
    pub metrics: Vec<MetricsRecord>,
    pub checks: Vec<Check>,
    pub errors: Vec<TechniqueFailure>,
    /// Declared expectations nothing measured.
    pub unmeasured: Vec<String>,
    pub notes: Vec<String>,
    pub warnings: Vec<ExtractionWarning>,
    pub required: bool,
    pub verdict: Verdict,
}

impl ZoneEntry {
    pub fn failed_checks(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn record(&self, technique: &str) -> Option<&MetricsRecord> {
        self.metrics.iter().find(|m| m.technique() == technique)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub unverified: usize,
    /// Unverified zones the gate counts against the run.
    pub required_unverified: usize,
    /// Failed colour checks across all zones.
    pub colour_failures: usize,
    /// Failed structural checks across all zones.
    pub structural_failures: usize,
    pub exit_code: i32,
}

impl Summary {
    pub fn gate_passed(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub schema_version: String,
    pub page: String,
    pub spec_digest: String,
    pub palette_version: u32,
    pub image: Dimensions,
    pub reference: Option<Dimensions>,
    pub techniques: Vec<String>,
    /// Declaration order.
    pub zones: Vec<ZoneEntry>,
    pub summary: Summary,
}

impl Report {
    pub fn zone(&self, path: &str) -> Option<&ZoneEntry> {
        self.zones.iter().find(|z| z.path == path)
    }

    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
