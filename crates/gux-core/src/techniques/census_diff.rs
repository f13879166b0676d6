//! Census shift between the reference and the current crop.
//!
//! Catches structural absence without clustering: a chart that went blank
//! moves most of its share from chart colours to the background colour.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::census::{histogram, CensusMetrics};
use super::{round1, MetricsRecord, TechniqueInput};
use crate::error::TechniqueError;

/// Shifts smaller than this (percentage points) are not listed.
pub const LISTED_SHIFT: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColourShift {
    pub name: String,
    pub reference_pct: f64,
    pub current_pct: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CensusDiffMetrics {
    pub reference: CensusMetrics,
    pub current: CensusMetrics,
    /// Sum of absolute share differences over every name seen in either.
    pub distance: f64,
    pub shifts: Vec<ColourShift>,
    pub dominant_changed: bool,
}

pub(crate) fn run(input: &TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError> {
    let reference = input
        .zone
        .reference
        .as_ref()
        .ok_or(TechniqueError::MissingReference)?;
    let reference = histogram(reference)?;
    let current = histogram(&input.zone.image)?;
    Ok(MetricsRecord::CensusDiff(diff(reference, current)))
}

pub fn diff(reference: CensusMetrics, current: CensusMetrics) -> CensusDiffMetrics {
    let names: BTreeSet<&str> = reference
        .entries
        .iter()
        .chain(&current.entries)
        .map(|e| e.name.as_str())
        .collect();

    let mut distance = 0.0;
    let mut shifts = Vec::new();
    for name in names {
        let reference_pct = reference.exact_share(name);
        let current_pct = current.exact_share(name);
        let delta = current_pct - reference_pct;
        distance += delta.abs();
        if delta.abs() >= LISTED_SHIFT {
            shifts.push(ColourShift {
                name: name.to_string(),
                reference_pct: round1(reference_pct),
                current_pct: round1(current_pct),
                delta: round1(delta),
            });
        }
    }
    shifts.sort_by(|a, b| {
        b.delta
            .abs()
            .total_cmp(&a.delta.abs())
            .then_with(|| a.name.cmp(&b.name))
    });

    let dominant_changed = reference.dominant() != current.dominant();
    CensusDiffMetrics {
        distance: round1(distance),
        shifts,
        dominant_changed,
        reference,
        current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::techniques::census::CensusEntry;
    use crate::techniques::fixtures;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_identical_crops_have_zero_distance() {
        let a = histogram(&fixtures::vertical_stripes(20, 20)).unwrap();
        let d = diff(a.clone(), a);
        assert_eq!(d.distance, 0.0);
        assert!(d.shifts.is_empty());
        assert!(!d.dominant_changed);
    }

    #[test]
    fn test_blanked_chart_shifts_share() {
        let chart = RgbImage::from_fn(50, 50, |x, _| {
            if x < 20 {
                Rgb([59, 130, 246])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let blank = fixtures::solid(50, 50, [255, 255, 255]);
        let d = diff(histogram(&chart).unwrap(), histogram(&blank).unwrap());
        assert_eq!(d.distance, 80.0);
        assert_eq!(d.shifts.len(), 2);
        assert_eq!(d.shifts[0].delta.abs(), 40.0);
        assert!(!d.dominant_changed);
    }

    fn census(samples: u64, counts: &[(&str, u64)]) -> CensusMetrics {
        CensusMetrics {
            samples,
            stride: 1,
            entries: counts
                .iter()
                .map(|&(name, count)| CensusEntry {
                    name: name.to_string(),
                    count,
                    percentage: round1(count as f64 / samples as f64 * 100.0),
                })
                .collect(),
        }
    }

    #[test]
    fn test_distance_uses_unrounded_shares() {
        // thirty names at 0.03% each round to 0.0 but still add up to 1%
        let names: Vec<String> = (0..30).map(|i| format!("c{i:02}")).collect();
        let mut counts: Vec<(&str, u64)> = vec![("white", 2970)];
        counts.extend(names.iter().map(|n| (n.as_str(), 1)));
        let reference = census(3000, &counts);
        let current = census(3000, &[("white", 3000)]);

        let d = diff(reference, current);
        assert_eq!(d.distance, 2.0);
    }

    #[test]
    fn test_dominant_change_detected() {
        let a = histogram(&fixtures::solid(10, 10, [0, 0, 0])).unwrap();
        let b = histogram(&fixtures::solid(10, 10, [255, 255, 255])).unwrap();
        let d = diff(a, b);
        assert!(d.dominant_changed);
        assert_eq!(d.distance, 200.0);
    }
}
