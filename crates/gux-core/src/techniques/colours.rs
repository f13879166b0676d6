//! Dominant colour extraction by k-means.
//!
//! Up to [`MAX_SAMPLES`] pixels are drawn with a fixed seed, clustered with
//! k-means++ initialisation and at most [`MAX_ITERATIONS`] Lloyd steps.
//! Clusters are ordered by population, ties broken by RGB value, so the
//! same crop always yields the same list.
//!
//! For every declared colour property the nearest cluster (by ΔE) is taken
//! as the actual colour.

use std::collections::BTreeMap;

use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{round1, round2, MetricsRecord, TechniqueInput};
use crate::error::TechniqueError;
use crate::palette::{self, Rgb};
use crate::spec::ColourExpectation;

pub const MAX_SAMPLES: usize = 5000;
pub const SEED: u64 = 42;
pub const MAX_ITERATIONS: usize = 20;
/// RGB radius within which a cluster gets a palette name.
pub const NAME_DISTANCE: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DominantColour {
    pub colour: Rgb,
    /// Share of sampled pixels, one decimal.
    pub percentage: f64,
    pub name: Option<String>,
}

/// Declared colour vs. nearest dominant cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColourMatch {
    pub property: String,
    pub expected: Rgb,
    pub actual: Rgb,
    pub delta_e: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColourMetrics {
    pub samples: usize,
    pub dominant: Vec<DominantColour>,
    pub matches: Vec<ColourMatch>,
}

pub(crate) fn run(input: &TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError> {
    let pixels = sample_pixels(&input.zone.image, MAX_SAMPLES);
    if pixels.is_empty() {
        return Err(TechniqueError::EmptyZone);
    }
    let dominant = dominant_colours(&pixels, input.options.clusters);

    let matches = input
        .spec
        .colour_expectations()
        .into_iter()
        .filter_map(|(property, expectation)| match expectation {
            ColourExpectation::Exact(token) => {
                closest_cluster(&dominant, token.rgb).map(|(actual, delta_e)| ColourMatch {
                    property: property.to_string(),
                    expected: token.rgb,
                    actual,
                    delta_e: round2(delta_e),
                })
            }
            ColourExpectation::Dynamic => None,
        })
        .collect();

    Ok(MetricsRecord::Colours(ColourMetrics {
        samples: pixels.len(),
        dominant,
        matches,
    }))
}

fn closest_cluster(dominant: &[DominantColour], target: Rgb) -> Option<(Rgb, f64)> {
    dominant
        .iter()
        .map(|d| (d.colour, palette::distance(d.colour, target)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Seeded sample without replacement, kept in pixel order.
pub fn sample_pixels(image: &RgbImage, max: usize) -> Vec<[u8; 3]> {
    let all: Vec<[u8; 3]> = image.pixels().map(|p| p.0).collect();
    if all.len() <= max {
        return all;
    }
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut picked = index::sample(&mut rng, all.len(), max).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| all[i]).collect()
}

/// Cluster `pixels` into at most `k` dominant colours.
pub fn dominant_colours(pixels: &[[u8; 3]], k: usize) -> Vec<DominantColour> {
    let k = k.max(1);
    let mut distinct: BTreeMap<[u8; 3], usize> = BTreeMap::new();
    for p in pixels {
        *distinct.entry(*p).or_default() += 1;
    }

    let mut clusters: Vec<([u8; 3], usize)> = if distinct.len() <= k {
        distinct.into_iter().collect()
    } else {
        kmeans(pixels, k)
    };
    clusters.retain(|(_, count)| *count > 0);
    clusters.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let total = pixels.len() as f64;
    clusters
        .into_iter()
        .map(|(rgb, count)| {
            let colour = Rgb::from(rgb);
            DominantColour {
                colour,
                percentage: round1(count as f64 / total * 100.0),
                name: palette::nearest_within(colour, NAME_DISTANCE).map(|(n, _)| n.to_string()),
            }
        })
        .collect()
}

fn sq_dist(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
}

fn nearest_centre(p: &[f64; 3], centres: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centres.iter().enumerate() {
        let d = sq_dist(p, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

fn kmeans(pixels: &[[u8; 3]], k: usize) -> Vec<([u8; 3], usize)> {
    let points: Vec<[f64; 3]> = pixels
        .iter()
        .map(|p| [f64::from(p[0]), f64::from(p[1]), f64::from(p[2])])
        .collect();
    let mut rng = StdRng::seed_from_u64(SEED);

    // k-means++ seeding
    let mut centres = vec![points[rng.gen_range(0..points.len())]];
    let mut d2: Vec<f64> = points.iter().map(|p| sq_dist(p, &centres[0])).collect();
    while centres.len() < k {
        let total: f64 = d2.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.gen::<f64>() * total;
        let mut chosen = None;
        for (i, d) in d2.iter().enumerate() {
            if *d > 0.0 {
                chosen = Some(i);
                if target < *d {
                    break;
                }
                target -= d;
            }
        }
        let Some(chosen) = chosen else { break };
        let centre = points[chosen];
        for (d, p) in d2.iter_mut().zip(&points) {
            *d = d.min(sq_dist(p, &centre));
        }
        centres.push(centre);
    }

    let mut labels = vec![usize::MAX; points.len()];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(&points) {
            let best = nearest_centre(p, &centres);
            if *label != best {
                *label = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
        let mut sums = vec![[0.0f64; 3]; centres.len()];
        let mut counts = vec![0usize; centres.len()];
        for (label, p) in labels.iter().zip(&points) {
            counts[*label] += 1;
            for c in 0..3 {
                sums[*label][c] += p[c];
            }
        }
        for ((centre, sum), count) in centres.iter_mut().zip(&sums).zip(&counts) {
            if *count > 0 {
                *centre = sum.map(|s| s / *count as f64);
            }
        }
    }

    let mut counts = vec![0usize; centres.len()];
    for label in &labels {
        if let Some(count) = counts.get_mut(*label) {
            *count += 1;
        }
    }
    centres
        .iter()
        .zip(counts)
        .map(|(c, count)| (c.map(|v| v.round().clamp(0.0, 255.0) as u8), count))
        .collect()
}
