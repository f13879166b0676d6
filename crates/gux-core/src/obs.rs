//! Structured observability hooks for the verification lifecycle.
//!
//! - `RunSpan` RAII guard scoping every event of one run to its page
//! - `emit_*` functions for start, extraction warnings, technique
//!   failures, zone verdicts and finish
//!
//! Events go out at `info!` (warnings at `warn!`); filtering and JSON output
//! are configured by [`crate::telemetry::init_tracing`].

use tracing::info;

use crate::extract::ExtractionWarning;
use crate::report::{Summary, Verdict};

/// RAII guard that enters a run-scoped span for the duration of a run.
///
/// ```ignore
/// let _span = RunSpan::enter("dashboard");
/// // every event below carries page = "dashboard"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(page: &str) -> Self {
        let span = tracing::info_span!("gux.run", page = %page);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_run_started(page: &str, zones: usize, techniques: &[String]) {
    info!(
        event = "run.started",
        page = %page,
        zones = zones,
        techniques = %techniques.join(","),
    );
}

pub fn emit_extraction_warning(warning: &ExtractionWarning) {
    tracing::warn!(event = "zone.extraction_warning", zone = %warning.zone, warning = %warning);
}

pub fn emit_technique_failed(zone: &str, technique: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "technique.failed",
        zone = %zone,
        technique = %technique,
        error = %error,
    );
}

pub fn emit_zone_scored(zone: &str, verdict: Verdict, checks: usize) {
    info!(
        event = "zone.scored",
        zone = %zone,
        verdict = verdict.label(),
        checks = checks,
    );
}

/// Emit event: run finished with the gate outcome.
pub fn emit_run_finished(page: &str, duration_ms: u64, summary: &Summary) {
    info!(
        event = "run.finished",
        page = %page,
        duration_ms = duration_ms,
        passed = summary.passed,
        failed = summary.failed,
        unverified = summary.unverified,
        exit_code = summary.exit_code,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let _span = RunSpan::enter("test-page");
        emit_zone_scored("header", Verdict::Pass, 1);
    }
}
