//! Sub-region detection by colour boundary scanning.
//!
//! Rows and columns are scanned for runs of similar colour. Run boundaries
//! that recur on enough scan lines become grid edges, and the grid cells
//! are the regions. This is a heuristic: irregular layouts undercount.

use std::collections::BTreeMap;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{MetricsRecord, TechniqueInput};
use crate::error::TechniqueError;
use crate::palette::{self, rgb_distance, Rgb};

pub const COLOUR_THRESHOLD: f64 = 30.0;
pub const MAX_SCANS: u32 = 20;
pub const MIN_RUN: u32 = 6;
pub const BUCKET: u32 = 10;
/// Fraction of scan lines a bucket must appear on to count as an edge.
pub const EDGE_QUORUM: f64 = 0.4;
pub const MIN_CELL: u32 = 20;
/// Zones narrower or shorter than this report no regions.
pub const MIN_ZONE: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    /// Palette name of the centre pixel.
    pub colour: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegionMetrics {
    pub count: u32,
    pub columns: u32,
    pub rows: u32,
    pub regions: Vec<Region>,
}

pub(crate) fn run(input: &TechniqueInput<'_>) -> Result<MetricsRecord, TechniqueError> {
    let image = &input.zone.image;
    if image.width() == 0 || image.height() == 0 {
        return Err(TechniqueError::EmptyZone);
    }
    Ok(MetricsRecord::Regions(detect(image)))
}

pub fn detect(image: &RgbImage) -> RegionMetrics {
    let (w, h) = image.dimensions();
    if w < MIN_ZONE || h < MIN_ZONE {
        return RegionMetrics {
            count: 0,
            columns: 0,
            rows: 0,
            regions: Vec::new(),
        };
    }
    let px = |x: u32, y: u32| Rgb::from(*image.get_pixel(x, y));

    let row_scans: Vec<Vec<Rgb>> = scan_positions(h)
        .into_iter()
        .map(|y| (0..w).map(|x| px(x, y)).collect())
        .collect();
    let column_scans: Vec<Vec<Rgb>> = scan_positions(w)
        .into_iter()
        .map(|x| (0..h).map(|y| px(x, y)).collect())
        .collect();

    let columns = intervals(&edges(&row_scans), w);
    let rows = intervals(&edges(&column_scans), h);

    let count = match (columns.len(), rows.len()) {
        (0, 0) => 0,
        (c, r) => c.max(1) * r.max(1),
    };

    let mut regions = Vec::with_capacity(count);
    if count > 0 {
        let col_spans = if columns.is_empty() { vec![(0, w)] } else { columns.clone() };
        let row_spans = if rows.is_empty() { vec![(0, h)] } else { rows.clone() };
        for &(y1, y2) in &row_spans {
            for &(x1, x2) in &col_spans {
                let cx = ((x1 + x2) / 2).min(w - 1);
                let cy = ((y1 + y2) / 2).min(h - 1);
                regions.push(Region {
                    x1,
                    y1,
                    x2,
                    y2,
                    colour: palette::nearest_name(px(cx, cy)).to_string(),
                });
            }
        }
    }

    RegionMetrics {
        count: count as u32,
        columns: columns.len() as u32,
        rows: rows.len() as u32,
        regions,
    }
}

fn scan_positions(extent: u32) -> Vec<u32> {
    let count = MAX_SCANS.min(extent);
    if count <= 1 {
        return vec![0];
    }
    let last = f64::from(extent - 1);
    (0..count)
        .map(|i| (f64::from(i) * last / f64::from(count - 1)) as u32)
        .collect()
}

/// `(start, end)` of every run of similar colour at least [`MIN_RUN`] long;
/// `end` is the last pixel of the run.
fn runs(line: &[Rgb]) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for i in 1..=line.len() {
        let boundary = i == line.len() || rgb_distance(line[i - 1], line[i]) > COLOUR_THRESHOLD;
        if boundary {
            if i - start >= MIN_RUN as usize {
                out.push((start as u32, (i - 1) as u32));
            }
            start = i;
        }
    }
    out
}

fn bucket(pos: u32) -> u32 {
    pos / BUCKET * BUCKET
}

/// Buckets holding a run boundary on at least [`EDGE_QUORUM`] of the scans.
fn edges(scans: &[Vec<Rgb>]) -> Vec<u32> {
    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    for line in scans {
        let mut buckets: Vec<u32> = runs(line)
            .into_iter()
            .flat_map(|(s, e)| [bucket(s), bucket(e)])
            .collect();
        buckets.sort_unstable();
        buckets.dedup();
        for b in buckets {
            *seen.entry(b).or_default() += 1;
        }
    }
    let quorum = (scans.len() as f64 * EDGE_QUORUM).max(1.0);
    seen.into_iter()
        .filter(|(_, n)| *n as f64 >= quorum)
        .map(|(b, _)| b)
        .collect()
}

/// Consecutive edge pairs at least [`MIN_CELL`] apart. The bucket holding
/// the last pixel stands for the far side of the zone.
fn intervals(edges: &[u32], extent: u32) -> Vec<(u32, u32)> {
    let far = bucket(extent - 1);
    edges
        .windows(2)
        .map(|pair| (pair[0], if pair[1] == far { extent } else { pair[1] }))
        .filter(|(a, b)| b - a >= MIN_CELL)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::techniques::fixtures;
    use image::Rgb as Px;

    /// `cols` x `rows` tiles of alternating colours.
    fn tiles(w: u32, h: u32, cols: u32, rows: u32) -> RgbImage {
        let tw = w / cols;
        let th = h / rows;
        RgbImage::from_fn(w, h, |x, y| {
            if ((x / tw) + (y / th)) % 2 == 0 {
                Px([255, 255, 255])
            } else {
                Px([59, 130, 246])
            }
        })
    }

    #[test]
    fn test_tiny_zone_reports_zero() {
        let m = detect(&fixtures::solid(8, 100, [0, 0, 0]));
        assert_eq!(m.count, 0);
        assert!(m.regions.is_empty());
    }

    #[test]
    fn test_uniform_zone_is_one_region() {
        let m = detect(&fixtures::solid(100, 60, [255, 255, 255]));
        assert_eq!(m.count, 1);
        assert_eq!(
            m.regions[0],
            Region {
                x1: 0,
                y1: 0,
                x2: 100,
                y2: 60,
                colour: "white".into()
            }
        );
    }

    #[test]
    fn test_tile_row() {
        let m = detect(&tiles(300, 60, 3, 1));
        assert_eq!(m.columns, 3);
        assert_eq!(m.rows, 1);
        assert_eq!(m.count, 3);
        assert_eq!(m.regions[1].colour, "blue500");
    }

    #[test]
    fn test_grid_counts_cells() {
        let m = detect(&tiles(200, 200, 2, 2));
        assert_eq!(m.count, 4);
        assert_eq!(m.regions.len(), 4);
    }

    #[test]
    fn test_fine_stripes_are_not_regions() {
        let m = detect(&fixtures::vertical_stripes(100, 100));
        assert_eq!(m.columns, 0);
        assert!(m.count <= 1);
    }

    #[test]
    fn test_runs_ignore_short_segments() {
        let mut line = vec![Rgb::WHITE; 10];
        line.extend(vec![Rgb::BLACK; 3]);
        line.extend(vec![Rgb::WHITE; 10]);
        assert_eq!(runs(&line), vec![(0, 9), (13, 22)]);
    }
}
