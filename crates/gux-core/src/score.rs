//! Score engine: technique metrics + spec expectations -> [`Report`].
//!
//! Every zone verdict is the AND of the checks that could be evaluated.
//! Anything declared but not measured, and any technique or external
//! failure, keeps a zone from passing. Scoring itself never fails.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::VerifyOptions;
use crate::extract::ExtractionWarning;
use crate::obs;
use crate::palette::PALETTE_VERSION;
use crate::report::{
    Check, CheckKind, Comparison, Dimensions, Report, Summary, TechniqueFailure, Verdict,
    ZoneEntry, REPORT_SCHEMA_VERSION,
};
use crate::spec::{Bounds, ColourExpectation, SpecTree, ZoneSpec};
use crate::techniques::MetricsRecord;

/// Outcome of a check performed outside the engine (OCR, narrated verdicts).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FindingOutcome {
    Pass,
    Fail { reason: String },
    /// The outside check could not complete. The zone fails closed.
    Error { message: String },
    /// Informational text attached to the zone.
    Note { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalFinding {
    /// Zone path.
    pub zone: String,
    pub source: String,
    #[serde(flatten)]
    pub outcome: FindingOutcome,
}

/// Technique output for one extracted zone.
#[derive(Debug, Clone, Default)]
pub struct ZoneMetrics {
    pub path: String,
    pub clamped: Option<Bounds>,
    pub records: Vec<MetricsRecord>,
    pub errors: Vec<TechniqueFailure>,
}

/// Everything the analysis stage hands to scoring.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub image: (u32, u32),
    pub reference: Option<(u32, u32)>,
    pub techniques: Vec<String>,
    pub zones: Vec<ZoneMetrics>,
    pub warnings: Vec<ExtractionWarning>,
    pub findings: Vec<ExternalFinding>,
}

pub fn score(metrics: &RunMetrics, spec: &SpecTree, options: &VerifyOptions) -> Report {
    let by_path: HashMap<&str, &ZoneMetrics> =
        metrics.zones.iter().map(|z| (z.path.as_str(), z)).collect();

    let declared = spec.zones();
    for finding in &metrics.findings {
        if !declared.iter().any(|(path, _)| *path == finding.zone) {
            tracing::warn!(zone = %finding.zone, source = %finding.source, "finding for unknown zone ignored");
        }
    }

    let zones: Vec<ZoneEntry> = declared
        .into_iter()
        .map(|(path, zone)| {
            let measured = by_path.get(path.as_str()).copied();
            let entry = score_zone(path, zone, measured, metrics, options);
            obs::emit_zone_scored(&entry.path, entry.verdict, entry.checks.len());
            entry
        })
        .collect();

    let summary = summarise(&zones, options);
    Report {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        page: spec.page.name.clone(),
        spec_digest: spec.digest.clone(),
        palette_version: PALETTE_VERSION,
        image: Dimensions {
            width: metrics.image.0,
            height: metrics.image.1,
        },
        reference: metrics.reference.map(|(width, height)| Dimensions { width, height }),
        techniques: metrics.techniques.clone(),
        zones,
        summary,
    }
}

fn score_zone(
    path: String,
    zone: &ZoneSpec,
    measured: Option<&ZoneMetrics>,
    run: &RunMetrics,
    options: &VerifyOptions,
) -> ZoneEntry {
    let records: &[MetricsRecord] = measured.map(|m| m.records.as_slice()).unwrap_or(&[]);
    let mut checks = Vec::new();
    let mut unmeasured = Vec::new();

    colour_checks(zone, records, options, &mut checks, &mut unmeasured);
    structural_checks(zone, records, &mut checks, &mut unmeasured);
    reference_checks(records, options, &mut checks);

    let mut notes = Vec::new();
    let mut external_error = false;
    for finding in run.findings.iter().filter(|f| f.zone == path) {
        match &finding.outcome {
            FindingOutcome::Pass => checks.push(external(&finding.source, true)),
            FindingOutcome::Fail { reason } => {
                checks.push(external(&finding.source, false).with_detail(reason.clone()))
            }
            FindingOutcome::Error { message } => {
                external_error = true;
                notes.push(format!("{}: error: {message}", finding.source));
            }
            FindingOutcome::Note { text } => notes.push(format!("{}: {text}", finding.source)),
        }
    }

    let errors = measured.map(|m| m.errors.clone()).unwrap_or_default();
    let verdict = if checks.iter().any(|c| !c.passed) {
        Verdict::Fail
    } else if external_error || !errors.is_empty() || !unmeasured.is_empty() || checks.is_empty() {
        Verdict::Unverified
    } else {
        Verdict::Pass
    };

    ZoneEntry {
        name: zone.name.clone(),
        doc: zone.doc.clone(),
        bounds: zone.bounds,
        clamped: measured.and_then(|m| m.clamped),
        metrics: records.to_vec(),
        checks,
        errors,
        unmeasured,
        notes,
        warnings: run.warnings.iter().filter(|w| w.zone == path).cloned().collect(),
        required: zone.is_required(),
        verdict,
        path,
    }
}

fn colour_checks(
    zone: &ZoneSpec,
    records: &[MetricsRecord],
    options: &VerifyOptions,
    checks: &mut Vec<Check>,
    unmeasured: &mut Vec<String>,
) {
    let expectations = zone.colour_expectations();
    if expectations.is_empty() {
        return;
    }
    let Some(colours) = records.iter().find_map(|r| match r {
        MetricsRecord::Colours(m) => Some(m),
        _ => None,
    }) else {
        unmeasured.extend(expectations.iter().map(|(p, _)| p.to_string()));
        return;
    };

    for (property, expectation) in expectations {
        match expectation {
            ColourExpectation::Exact(_) => {
                match colours.matches.iter().find(|m| m.property == property) {
                    Some(m) => checks.push(
                        Check::new(
                            CheckKind::Colour,
                            property,
                            m.delta_e,
                            options.colour_threshold,
                            Comparison::AtMost,
                        )
                        .with_detail(format!(
                            "expected {} nearest {}",
                            m.expected, m.actual
                        )),
                    ),
                    None => unmeasured.push(property.to_string()),
                }
            }
            ColourExpectation::Dynamic => checks.push(
                Check::new(
                    CheckKind::Colour,
                    property,
                    colours.dominant.len() as f64,
                    1.0,
                    Comparison::AtLeast,
                )
                .with_detail("dynamic: any colour present"),
            ),
        }
    }
}

fn structural_checks(
    zone: &ZoneSpec,
    records: &[MetricsRecord],
    checks: &mut Vec<Check>,
    unmeasured: &mut Vec<String>,
) {
    let Some(assertions) = zone.assertions.as_ref() else {
        return;
    };
    let lines = records.iter().find_map(|r| match r {
        MetricsRecord::Lines(m) => Some(m),
        _ => None,
    });
    let regions = records.iter().find_map(|r| match r {
        MetricsRecord::Regions(m) => Some(m),
        _ => None,
    });

    let transition_thresholds = [
        ("min_transitions_v", assertions.vertical_threshold(), true),
        ("min_transitions_h", assertions.min_transitions_h, false),
    ];
    for (subject, threshold, vertical) in transition_thresholds {
        let Some(threshold) = threshold else { continue };
        match lines {
            Some(m) => {
                let mean = if vertical {
                    m.vertical.mean
                } else {
                    m.horizontal.mean
                };
                checks.push(Check::new(
                    CheckKind::Structural,
                    subject,
                    mean,
                    threshold,
                    Comparison::AtLeast,
                ));
            }
            None => unmeasured.push(subject.to_string()),
        }
    }

    if let Some(min) = assertions.min_regions {
        match regions {
            Some(m) => checks.push(Check::new(
                CheckKind::Structural,
                "min_regions",
                f64::from(m.count),
                f64::from(min),
                Comparison::AtLeast,
            )),
            None => unmeasured.push("min_regions".to_string()),
        }
    }
}

fn reference_checks(records: &[MetricsRecord], options: &VerifyOptions, checks: &mut Vec<Check>) {
    for record in records {
        match record {
            MetricsRecord::Compare(m) => checks.push(
                Check::new(
                    CheckKind::Diff,
                    "mismatch_pct",
                    m.mismatch_pct,
                    options.max_mismatch_pct,
                    Comparison::AtMost,
                )
                .with_detail(format!("{} of {} pixels differ", m.mismatched, m.pixels)),
            ),
            MetricsRecord::CensusDiff(m) => {
                let mut check = Check::new(
                    CheckKind::CensusShift,
                    "census_distance",
                    m.distance,
                    options.census_shift_threshold,
                    Comparison::AtMost,
                );
                if m.dominant_changed {
                    check = check.with_detail(format!(
                        "dominant colour changed: {} -> {}",
                        m.reference.dominant().unwrap_or("-"),
                        m.current.dominant().unwrap_or("-")
                    ));
                }
                checks.push(check);
            }
            _ => {}
        }
    }
}

fn external(source: &str, passed: bool) -> Check {
    Check::new(
        CheckKind::External,
        source,
        if passed { 1.0 } else { 0.0 },
        1.0,
        Comparison::AtLeast,
    )
}

fn summarise(zones: &[ZoneEntry], options: &VerifyOptions) -> Summary {
    let mut summary = Summary {
        total: zones.len(),
        ..Summary::default()
    };
    for zone in zones {
        match zone.verdict {
            Verdict::Pass => summary.passed += 1,
            Verdict::Fail => summary.failed += 1,
            Verdict::Unverified => {
                summary.unverified += 1;
                if zone.required || options.policy.fail_on_unverified {
                    summary.required_unverified += 1;
                }
            }
        }
        for check in zone.failed_checks() {
            match check.kind {
                CheckKind::Colour => summary.colour_failures += 1,
                CheckKind::Structural => summary.structural_failures += 1,
                _ => {}
            }
        }
    }
    summary.exit_code = i32::from(summary.failed > 0 || summary.required_unverified > 0);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TechniqueError;
    use crate::palette::Rgb;
    use crate::spec::parse;
    use crate::techniques::colours::{ColourMatch, ColourMetrics, DominantColour};
    use crate::techniques::lines::{AxisScan, LineMetrics};

    fn colours(delta_e: f64) -> MetricsRecord {
        MetricsRecord::Colours(ColourMetrics {
            samples: 100,
            dominant: vec![DominantColour {
                colour: Rgb::WHITE,
                percentage: 100.0,
                name: Some("white".into()),
            }],
            matches: vec![ColourMatch {
                property: "bg".into(),
                expected: Rgb::WHITE,
                actual: Rgb::WHITE,
                delta_e,
            }],
        })
    }

    fn lines(v: f64) -> MetricsRecord {
        let axis = |mean| AxisScan {
            lines: 5,
            mean,
            min: 0,
            max: 0,
        };
        MetricsRecord::Lines(LineMetrics {
            horizontal: axis(0.0),
            vertical: axis(v),
        })
    }

    fn run(path: &str, records: Vec<MetricsRecord>) -> RunMetrics {
        RunMetrics {
            image: (100, 100),
            zones: vec![ZoneMetrics {
                path: path.into(),
                clamped: None,
                records,
                errors: vec![],
            }],
            ..RunMetrics::default()
        }
    }

    const HEADER: &str = "Page('p', Zone('header', Bounds(0, 0, 100, 50), Style(bg: '#ffffff')))";
    const CHART: &str = "Page('p', Zone('chart', Bounds(0, 0, 100, 50), Style(bg: '#ffffff'), \
                         assert: Assert(min_transitions_v: 10)))";

    #[test]
    fn test_colour_pass_and_fail() {
        let spec = parse(HEADER).unwrap();
        let options = VerifyOptions::default();
        let report = score(&run("header", vec![colours(0.0)]), &spec, &options);
        assert_eq!(report.zones[0].verdict, Verdict::Pass);
        assert_eq!(report.exit_code(), 0);

        let report = score(&run("header", vec![colours(6.2)]), &spec, &options);
        assert_eq!(report.zones[0].verdict, Verdict::Fail);
        assert_eq!(report.summary.colour_failures, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_structural_failure_is_independent_of_colour() {
        let spec = parse(CHART).unwrap();
        let report = score(
            &run("chart", vec![colours(0.0), lines(0.0)]),
            &spec,
            &VerifyOptions::default(),
        );
        let zone = &report.zones[0];
        assert_eq!(zone.verdict, Verdict::Fail);
        assert!(zone.checks.iter().any(|c| c.kind == CheckKind::Colour && c.passed));
        assert!(zone
            .checks
            .iter()
            .any(|c| c.kind == CheckKind::Structural && !c.passed));
        assert_eq!(report.summary.structural_failures, 1);
        assert_eq!(report.summary.colour_failures, 0);
    }

    #[test]
    fn test_missing_technique_leaves_zone_unverified() {
        let spec = parse(CHART).unwrap();
        let report = score(&run("chart", vec![colours(0.0)]), &spec, &VerifyOptions::default());
        let zone = &report.zones[0];
        assert_eq!(zone.verdict, Verdict::Unverified);
        assert_eq!(zone.unmeasured, vec!["min_transitions_v"]);
        assert_eq!(report.summary.required_unverified, 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_zone_without_checks_is_unverified_not_required() {
        let spec = parse("Page('p', Zone('plain', Bounds(0, 0, 10, 10)))").unwrap();
        let report = score(&run("plain", vec![lines(3.0)]), &spec, &VerifyOptions::default());
        assert_eq!(report.zones[0].verdict, Verdict::Unverified);
        assert_eq!(report.exit_code(), 0);

        let mut strict = VerifyOptions::default();
        strict.policy.fail_on_unverified = true;
        let report = score(&run("plain", vec![lines(3.0)]), &spec, &strict);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_technique_error_fails_closed() {
        let spec = parse(HEADER).unwrap();
        let mut metrics = run("header", vec![colours(0.0)]);
        metrics.zones[0].errors.push(TechniqueFailure {
            technique: "compare".into(),
            error: TechniqueError::DimensionMismatch {
                current: (100, 50),
                reference: (90, 50),
            },
        });
        let report = score(&metrics, &spec, &VerifyOptions::default());
        assert_eq!(report.zones[0].verdict, Verdict::Unverified);
    }

    #[test]
    fn test_external_findings() {
        let spec = parse(HEADER).unwrap();
        let mut metrics = run("header", vec![colours(0.0)]);
        metrics.findings.push(ExternalFinding {
            zone: "header".into(),
            source: "ocr".into(),
            outcome: FindingOutcome::Note {
                text: "Dashboard".into(),
            },
        });
        let report = score(&metrics, &spec, &VerifyOptions::default());
        assert_eq!(report.zones[0].verdict, Verdict::Pass);
        assert_eq!(report.zones[0].notes, vec!["ocr: Dashboard"]);

        metrics.findings.push(ExternalFinding {
            zone: "header".into(),
            source: "llm".into(),
            outcome: FindingOutcome::Error {
                message: "timeout".into(),
            },
        });
        let report = score(&metrics, &spec, &VerifyOptions::default());
        assert_eq!(report.zones[0].verdict, Verdict::Unverified);

        metrics.findings.push(ExternalFinding {
            zone: "header".into(),
            source: "llm".into(),
            outcome: FindingOutcome::Fail {
                reason: "logo missing".into(),
            },
        });
        let report = score(&metrics, &spec, &VerifyOptions::default());
        assert_eq!(report.zones[0].verdict, Verdict::Fail);
    }

    #[test]
    fn test_finding_json_shape() {
        let json = r#"{"zone": "header", "source": "ocr", "outcome": "fail", "reason": "no title"}"#;
        let finding: ExternalFinding = serde_json::from_str(json).unwrap();
        assert_eq!(
            finding.outcome,
            FindingOutcome::Fail {
                reason: "no title".into()
            }
        );
    }

    #[test]
    fn test_zones_follow_declaration_order() {
        let spec = parse("Page('p', Zone('b', Bounds(0,0,5,5)), Zone('a', Bounds(5,5,9,9)))").unwrap();
        let mut metrics = RunMetrics::default();
        for path in ["a", "b"] {
            metrics.zones.push(ZoneMetrics {
                path: path.into(),
                ..ZoneMetrics::default()
            });
        }
        let report = score(&metrics, &spec, &VerifyOptions::default());
        let order: Vec<&str> = report.zones.iter().map(|z| z.path.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }
}
