//! Transition scanning along evenly spaced rows and columns.
//!
//! `horizontal` scans walk rows (counting changes along x), `vertical` scans
//! walk columns (counting changes along y). A blank zone scores ~0 on both;
//! a chart or a table scores high on at least one axis.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{round1, MetricsRecord, TechniqueInput};
use crate::error::TechniqueError;
use crate::palette::{rgb_distance, Rgb};

/// RGB delta above which adjacent pixels count as a transition.
pub const TRANSITION_THRESHOLD: f64 = 30.0;
pub const PIXELS_PER_LINE: u32 = 10;
pub const MAX_LINES: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisScan {
    pub lines: u32,
    /// Mean transitions per line, one decimal.
    pub mean: f64,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineMetrics {
    pub horizontal: AxisScan,
    pub vertical: AxisScan,
}

pub(crate) fn run(input: &TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError> {
    let image = &input.zone.image;
    if image.width() == 0 || image.height() == 0 {
        return Err(TechniqueError::EmptyZone);
    }
    Ok(MetricsRecord::Lines(scan(image)))
}

pub fn scan(image: &RgbImage) -> LineMetrics {
    let (w, h) = image.dimensions();
    let px = |x: u32, y: u32| Rgb::from(*image.get_pixel(x, y));

    let horizontal: Vec<u32> = line_positions(h)
        .into_iter()
        .map(|y| count_transitions((0..w).map(|x| px(x, y))))
        .collect();
    let vertical: Vec<u32> = line_positions(w)
        .into_iter()
        .map(|x| count_transitions((0..h).map(|y| px(x, y))))
        .collect();

    LineMetrics {
        horizontal: summarise(&horizontal),
        vertical: summarise(&vertical),
    }
}

/// Scan positions across an extent: one per [`PIXELS_PER_LINE`], clamped to
/// `1..=MAX_LINES`, spread evenly from the first to the last pixel.
pub fn line_positions(extent: u32) -> Vec<u32> {
    if extent == 0 {
        return Vec::new();
    }
    let count = (extent / PIXELS_PER_LINE).clamp(1, MAX_LINES).min(extent);
    if count == 1 {
        return vec![0];
    }
    let last = f64::from(extent - 1);
    (0..count)
        .map(|i| (f64::from(i) * last / f64::from(count - 1)) as u32)
        .collect()
}

fn count_transitions(line: impl Iterator<Item = Rgb>) -> u32 {
    let mut prev: Option<Rgb> = None;
    let mut count = 0;
    for current in line {
        if let Some(p) = prev {
            if rgb_distance(p, current) > TRANSITION_THRESHOLD {
                count += 1;
            }
        }
        prev = Some(current);
    }
    count
}

fn summarise(counts: &[u32]) -> AxisScan {
    let lines = counts.len() as u32;
    let total: u64 = counts.iter().map(|c| u64::from(*c)).sum();
    AxisScan {
        lines,
        mean: if lines == 0 {
            0.0
        } else {
            round1(total as f64 / f64::from(lines))
        },
        min: counts.iter().copied().min().unwrap_or(0),
        max: counts.iter().copied().max().unwrap_or(0),
    }
}
