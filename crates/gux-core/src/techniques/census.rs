//! Named-colour census of a zone.
//!
//! Unlike `colours`, which clusters, the census maps each sampled pixel to a
//! known palette entry and reports the share of each name.

use std::collections::BTreeMap;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{round1, MetricsRecord, TechniqueInput};
use crate::error::TechniqueError;
use crate::palette::{self, Rgb};

pub const MAX_SAMPLES: u64 = 10_000;
/// Pixels farther than this (RGB) from every palette entry are `(other)`.
pub const OTHER_DISTANCE: f64 = 50.0;
pub const OTHER: &str = "(other)";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CensusEntry {
    pub name: String,
    /// Samples mapped to this name.
    pub count: u64,
    /// Share of samples, one decimal.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CensusMetrics {
    pub samples: u64,
    pub stride: u64,
    /// Sorted by share, then name.
    pub entries: Vec<CensusEntry>,
}

impl CensusMetrics {
    pub fn dominant(&self) -> Option<&str> {
        self.entries.first().map(|e| e.name.as_str())
    }

    pub fn share(&self, name: &str) -> f64 {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map_or(0.0, |e| e.percentage)
    }

    /// Unrounded share in percent.
    pub fn exact_share(&self, name: &str) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map_or(0.0, |e| e.count as f64 / self.samples as f64 * 100.0)
    }
}

pub(crate) fn run(input: &TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError> {
    histogram(&input.zone.image).map(MetricsRecord::Census)
}

pub fn histogram(image: &RgbImage) -> Result<CensusMetrics, TechniqueError> {
    let (w, h) = image.dimensions();
    let area = u64::from(w) * u64::from(h);
    if area == 0 {
        return Err(TechniqueError::EmptyZone);
    }
    let stride = area.div_ceil(MAX_SAMPLES).max(1);

    let mut counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut samples = 0u64;
    let mut i = 0u64;
    while i < area {
        let x = (i % u64::from(w)) as u32;
        let y = (i / u64::from(w)) as u32;
        let rgb = Rgb::from(*image.get_pixel(x, y));
        let name = palette::nearest_within(rgb, OTHER_DISTANCE).map_or(OTHER, |(n, _)| n);
        *counts.entry(name).or_default() += 1;
        samples += 1;
        i += stride;
    }

    let mut entries: Vec<CensusEntry> = counts
        .into_iter()
        .map(|(name, count)| CensusEntry {
            name: name.to_string(),
            count,
            percentage: round1(count as f64 / samples as f64 * 100.0),
        })
        .collect();
    entries.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(CensusMetrics {
        samples,
        stride,
        entries,
    })
}
