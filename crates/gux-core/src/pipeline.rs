//! One verification run: extract -> analyse -> score.
//!
//! (zone × technique) pairs are independent and run on the rayon pool. The
//! indexed collect is the only merge point, so the report does not depend
//! on scheduling.

use std::collections::HashMap;
use std::time::Instant;

use image::RgbImage;
use rayon::prelude::*;

use crate::config::VerifyOptions;
use crate::error::Result;
use crate::extract::extract_zones_with_reference;
use crate::metrics::METRICS;
use crate::obs::{self, RunSpan};
use crate::report::{Report, TechniqueFailure};
use crate::score::{score, ExternalFinding, RunMetrics, ZoneMetrics};
use crate::spec::{SpecTree, ZoneSpec};
use crate::techniques::{self, MetricsRecord};

/// Pixel output a caller may persist.
#[derive(Debug, Clone)]
pub struct ZoneArtifact {
    pub path: String,
    pub crop: RgbImage,
    pub diff: Option<RgbImage>,
}

#[derive(Debug, Clone)]
pub struct Verification {
    pub report: Report,
    pub artifacts: Vec<ZoneArtifact>,
}

/// Techniques the run will use: the explicit list, or the defaults.
pub fn selected_techniques(options: &VerifyOptions, has_reference: bool) -> Vec<String> {
    match &options.techniques {
        Some(names) => names.clone(),
        None => techniques::default_selection(has_reference)
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

/// Run every selected technique over every zone and score the result.
///
/// Fails only when `options` do not validate.
pub fn verify(
    spec: &SpecTree,
    image: &RgbImage,
    reference: Option<&RgbImage>,
    findings: &[ExternalFinding],
    options: &VerifyOptions,
) -> Result<Verification> {
    options.validate()?;
    let started = Instant::now();
    let _span = RunSpan::enter(&spec.page.name);

    let selected = selected_techniques(options, reference.is_some());
    let zone_specs: HashMap<String, &ZoneSpec> = spec.zones().into_iter().collect();
    obs::emit_run_started(&spec.page.name, zone_specs.len(), &selected);

    let extraction = extract_zones_with_reference(image, spec, reference);

    let tasks: Vec<(usize, &str)> = (0..extraction.zones.len())
        .flat_map(|z| selected.iter().map(move |t| (z, t.as_str())))
        .collect();

    let results: Vec<(usize, &str, std::result::Result<MetricsRecord, _>)> = tasks
        .par_iter()
        .filter_map(|&(z, technique)| {
            let zone = &extraction.zones[z];
            let zone_spec = zone_specs.get(&zone.path)?;
            METRICS.inc_techniques_run();
            Some((
                z,
                technique,
                techniques::run_technique(technique, zone, zone_spec, options),
            ))
        })
        .collect();

    let mut zones: Vec<ZoneMetrics> = extraction
        .zones
        .iter()
        .map(|z| ZoneMetrics {
            path: z.path.clone(),
            clamped: Some(z.clamped),
            ..ZoneMetrics::default()
        })
        .collect();
    let mut diffs: Vec<Option<RgbImage>> = vec![None; zones.len()];

    for (z, technique, result) in results {
        let entry = &mut zones[z];
        match result {
            Ok(MetricsRecord::Compare(mut m)) => {
                diffs[z] = m.diff.take();
                entry.records.push(MetricsRecord::Compare(m));
            }
            Ok(record) => entry.records.push(record),
            Err(error) => {
                METRICS.inc_technique_errors();
                obs::emit_technique_failed(&entry.path, technique, &error);
                entry.errors.push(TechniqueFailure {
                    technique: technique.to_string(),
                    error,
                });
            }
        }
    }

    let run = RunMetrics {
        image: image.dimensions(),
        reference: reference.map(|r| r.dimensions()),
        techniques: selected,
        zones,
        warnings: extraction.warnings,
        findings: findings.to_vec(),
    };
    let report = score(&run, spec, options);

    let artifacts = extraction
        .zones
        .into_iter()
        .zip(diffs)
        .map(|(zone, diff)| ZoneArtifact {
            path: zone.path,
            crop: zone.image,
            diff,
        })
        .collect();

    obs::emit_run_finished(
        &spec.page.name,
        started.elapsed().as_millis() as u64,
        &report.summary,
    );
    METRICS.flush();

    Ok(Verification { report, artifacts })
}
