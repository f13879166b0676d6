//! Per-pixel diff against the reference crop.

use image::{Rgb as Px, RgbImage};
use serde::{Deserialize, Serialize};

use super::{round2, MetricsRecord, TechniqueInput};
use crate::error::TechniqueError;
use crate::palette::{rgb_distance, Rgb};

/// RGB delta above which a pixel pair is a mismatch.
pub const DIFF_THRESHOLD: f64 = 20.0;
const MATCH: Px<u8> = Px([0, 200, 0]);
const MISMATCH: Px<u8> = Px([200, 0, 0]);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompareMetrics {
    pub pixels: u64,
    pub mismatched: u64,
    pub mismatch_pct: f64,
    /// Green where pixels match, red where they differ. Written out by the
    /// caller, never serialized.
    #[serde(skip)]
    pub diff: Option<RgbImage>,
}

pub(crate) fn run(input: &TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError> {
    let reference = input
        .zone
        .reference
        .as_ref()
        .ok_or(TechniqueError::MissingReference)?;
    compare(reference, &input.zone.image, input.options.diff_artifacts).map(MetricsRecord::Compare)
}

/// Diff two crops of identical size. Sizes are never reconciled by resampling.
pub fn compare(
    reference: &RgbImage,
    current: &RgbImage,
    with_artifact: bool,
) -> Result<CompareMetrics, TechniqueError> {
    if reference.dimensions() != current.dimensions() {
        return Err(TechniqueError::DimensionMismatch {
            current: current.dimensions(),
            reference: reference.dimensions(),
        });
    }
    let (w, h) = current.dimensions();
    let pixels = u64::from(w) * u64::from(h);
    if pixels == 0 {
        return Err(TechniqueError::EmptyZone);
    }

    let mut diff = with_artifact.then(|| RgbImage::new(w, h));
    let mut mismatched = 0u64;
    for (x, y, cur) in current.enumerate_pixels() {
        let differs = rgb_distance(Rgb::from(*cur), Rgb::from(*reference.get_pixel(x, y)))
            > DIFF_THRESHOLD;
        if differs {
            mismatched += 1;
        }
        if let Some(diff) = diff.as_mut() {
            diff.put_pixel(x, y, if differs { MISMATCH } else { MATCH });
        }
    }

    Ok(CompareMetrics {
        pixels,
        mismatched,
        mismatch_pct: round2(mismatched as f64 / pixels as f64 * 100.0),
        diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::techniques::fixtures;

    #[test]
    fn test_identical_images() {
        let img = fixtures::vertical_stripes(30, 30);
        let m = compare(&img, &img, false).unwrap();
        assert_eq!(m.mismatched, 0);
        assert_eq!(m.mismatch_pct, 0.0);
        assert!(m.diff.is_none());
    }

    #[test]
    fn test_perturbed_pixels_and_artifact() {
        let reference = fixtures::solid(10, 10, [255, 255, 255]);
        let mut current = reference.clone();
        for x in 0..10 {
            current.put_pixel(x, 0, Px([0, 0, 0]));
        }
        let m = compare(&reference, &current, true).unwrap();
        assert_eq!(m.mismatched, 10);
        assert_eq!(m.mismatch_pct, 10.0);
        let diff = m.diff.unwrap();
        assert_eq!(*diff.get_pixel(3, 0), MISMATCH);
        assert_eq!(*diff.get_pixel(3, 5), MATCH);
    }

    #[test]
    fn test_noise_below_threshold_matches() {
        let reference = fixtures::solid(4, 4, [100, 100, 100]);
        let current = fixtures::solid(4, 4, [108, 108, 108]);
        assert_eq!(compare(&reference, &current, false).unwrap().mismatched, 0);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let err = compare(
            &fixtures::solid(10, 10, [0, 0, 0]),
            &fixtures::solid(10, 8, [0, 0, 0]),
            false,
        )
        .unwrap_err();
        assert_eq!(
            err,
            TechniqueError::DimensionMismatch {
                current: (10, 8),
                reference: (10, 10)
            }
        );
    }
}
