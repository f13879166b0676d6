//! GUX visual-contract verification engine.
//!
//! Parses a GUX spec into a zone tree, crops each zone out of a screenshot,
//! turns the crops into pixel metrics and scores them against the declared
//! expectations into a deterministic [`Report`].

pub mod config;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod obs;
pub mod palette;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod score;
pub mod spec;
pub mod techniques;
pub mod telemetry;

pub use config::{GatePolicy, VerifyOptions};
pub use error::{GuxError, Location, ParseError, ParseErrorKind, Result, TechniqueError};
pub use extract::{
    extract_zones, extract_zones_with_reference, Extraction, ExtractionWarning, WarningKind,
    ZoneImage,
};
pub use palette::{Rgb, PALETTE_VERSION};
pub use pipeline::{selected_techniques, verify, Verification, ZoneArtifact};
pub use render::render_text;
pub use report::{Check, CheckKind, Comparison, Report, Summary, Verdict, ZoneEntry};
pub use score::{score, ExternalFinding, FindingOutcome, RunMetrics, ZoneMetrics};
pub use spec::{parse, parse_file, Bounds, SpecTree, ZoneSpec};
pub use techniques::{registry, run_technique, MetricsRecord, TechniqueEntry};
pub use telemetry::init_tracing;
