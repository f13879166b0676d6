//! Pixel feature extractors and their registration table.
//!
//! Each technique is a pure function of one zone crop (plus the zone's
//! spec and the run options) returning a [`MetricsRecord`]. Techniques never
//! see each other's output and never mutate shared input.

pub mod census;
pub mod census_diff;
pub mod colours;
pub mod compare;
pub mod lines;
pub mod regions;

use serde::{Deserialize, Serialize};

use crate::config::VerifyOptions;
use crate::error::TechniqueError;
use crate::extract::ZoneImage;
use crate::spec::ZoneSpec;

pub use census::CensusMetrics;
pub use census_diff::CensusDiffMetrics;
pub use colours::ColourMetrics;
pub use compare::CompareMetrics;
pub use lines::LineMetrics;
pub use regions::RegionMetrics;

/// Everything a technique may read.
#[derive(Debug, Clone, Copy)]
pub struct TechniqueInput<'a> {
    pub zone: &'a ZoneImage,
    pub spec: &'a ZoneSpec,
    pub options: &'a VerifyOptions,
}

pub type TechniqueFn = fn(&TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError>;

/// Metrics produced by one technique for one zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "technique", rename_all = "kebab-case")]
pub enum MetricsRecord {
    Colours(ColourMetrics),
    Lines(LineMetrics),
    Census(CensusMetrics),
    Regions(RegionMetrics),
    Compare(CompareMetrics),
    CensusDiff(CensusDiffMetrics),
}

impl MetricsRecord {
    pub fn technique(&self) -> &'static str {
        match self {
            Self::Colours(_) => "colours",
            Self::Lines(_) => "lines",
            Self::Census(_) => "census",
            Self::Regions(_) => "regions",
            Self::Compare(_) => "compare",
            Self::CensusDiff(_) => "census-diff",
        }
    }
}

pub struct TechniqueEntry {
    pub name: &'static str,
    pub help: &'static str,
    /// Only selected by default when a reference image is present.
    pub needs_reference: bool,
    run: TechniqueFn,
}

impl std::fmt::Debug for TechniqueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TechniqueEntry")
            .field("name", &self.name)
            .field("needs_reference", &self.needs_reference)
            .finish()
    }
}

static REGISTRY: [TechniqueEntry; 6] = [
    TechniqueEntry {
        name: "colours",
        help: "Dominant colours per zone (k-means); compares declared bg/text/colour by ΔE.",
        needs_reference: false,
        run: colours::run,
    },
    TechniqueEntry {
        name: "lines",
        help: "Colour transition scanning along rows and columns; checks Assert thresholds.",
        needs_reference: false,
        run: lines::run,
    },
    TechniqueEntry {
        name: "census",
        help: "Map sampled pixels to the nearest named palette colour; percentages per zone.",
        needs_reference: false,
        run: census::run,
    },
    TechniqueEntry {
        name: "regions",
        help: "Subdivide zones into sub-regions by colour boundaries (tiles, cards, cells).",
        needs_reference: false,
        run: regions::run,
    },
    TechniqueEntry {
        name: "compare",
        help: "Pixel diff against the reference image; mismatch percentage per zone.",
        needs_reference: true,
        run: compare::run,
    },
    TechniqueEntry {
        name: "census-diff",
        help: "Named colour shifts between reference and current census.",
        needs_reference: true,
        run: census_diff::run,
    },
];

pub fn registry() -> &'static [TechniqueEntry] {
    &REGISTRY
}

pub fn lookup(name: &str) -> Option<&'static TechniqueEntry> {
    REGISTRY.iter().find(|entry| entry.name == name)
}

/// Technique names to run when the caller picked none.
pub fn default_selection(has_reference: bool) -> Vec<&'static str> {
    REGISTRY
        .iter()
        .filter(|entry| has_reference || !entry.needs_reference)
        .map(|entry| entry.name)
        .collect()
}

/// Run one named technique on one zone.
pub fn run_technique(
    name: &str,
    zone: &ZoneImage,
    spec: &ZoneSpec,
    options: &VerifyOptions,
) -> Result<MetricsRecord, TechniqueError> {
    let entry = lookup(name).ok_or_else(|| TechniqueError::UnknownTechnique {
        name: name.to_string(),
    })?;
    if zone.is_empty() {
        return Err(TechniqueError::EmptyZone);
    }
    if entry.needs_reference && zone.reference.is_none() {
        return Err(TechniqueError::MissingReference);
    }
    (entry.run)(&TechniqueInput {
        zone,
        spec,
        options,
    })
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use image::{Rgb, RgbImage};

    use crate::extract::ZoneImage;
    use crate::spec::Bounds;

    pub fn zone(image: RgbImage) -> ZoneImage {
        let bounds = Bounds::new(0, 0, image.width().max(1), image.height().max(1));
        ZoneImage {
            name: "z".into(),
            path: "z".into(),
            bounds,
            clamped: bounds,
            image,
            reference: None,
        }
    }

    pub fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(rgb))
    }

    /// Alternating 1px black/white columns.
    pub fn vertical_stripes(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if x % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }
}
