//! Zone extraction: crop every bounded zone out of the screenshot.

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::metrics::METRICS;
use crate::obs;
use crate::spec::{Bounds, SpecTree, ZoneSpec};

/// A zone crop owned by one verification run.
#[derive(Debug, Clone)]
pub struct ZoneImage {
    pub name: String,
    /// Slash-joined path from the page root.
    pub path: String,
    /// Bounds as declared.
    pub bounds: Bounds,
    /// Bounds after intersecting with the image. May be empty.
    pub clamped: Bounds,
    pub image: RgbImage,
    /// Same rectangle cut from the reference image, when one was supplied.
    pub reference: Option<RgbImage>,
}

impl ZoneImage {
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// Declared bounds extended past the image and were clipped.
    Clamped { declared: Bounds, clamped: Bounds },
    /// Nothing of the zone lies inside the image.
    ZeroArea { declared: Bounds },
    /// The zone has no bounds, so no pixel technique can run on it.
    NoBounds,
}

/// Non-fatal extraction problem attached to one zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionWarning {
    pub zone: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl std::fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            WarningKind::Clamped { declared, clamped } => {
                write!(f, "bounds {declared} clamped to {clamped}")
            }
            WarningKind::ZeroArea { declared } => {
                write!(f, "bounds {declared} lie outside the image")
            }
            WarningKind::NoBounds => write!(f, "no bounds declared, unverifiable"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Crops in declaration order.
    pub zones: Vec<ZoneImage>,
    pub warnings: Vec<ExtractionWarning>,
}

impl Extraction {
    pub fn warnings_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ExtractionWarning> {
        self.warnings.iter().filter(move |w| w.zone == path)
    }
}

pub fn extract_zones(image: &RgbImage, spec: &SpecTree) -> Extraction {
    extract_zones_with_reference(image, spec, None)
}

/// Crop every zone, and the matching rectangle of `reference` if given.
pub fn extract_zones_with_reference(
    image: &RgbImage,
    spec: &SpecTree,
    reference: Option<&RgbImage>,
) -> Extraction {
    let (width, height) = image.dimensions();
    if let Some(viewport) = spec.page.viewport {
        if (viewport.width, viewport.height) != (width, height) {
            tracing::warn!(
                viewport = %format!("{}x{}", viewport.width, viewport.height),
                image = %format!("{width}x{height}"),
                "screenshot size differs from declared viewport"
            );
        }
    }

    let mut out = Extraction::default();
    for (path, zone) in spec.zones() {
        match crop_zone(image, reference, &path, zone) {
            Ok((crop, warning)) => {
                if let Some(warning) = warning {
                    obs::emit_extraction_warning(&warning);
                    out.warnings.push(warning);
                }
                METRICS.inc_zones_extracted();
                out.zones.push(crop);
            }
            Err(warning) => {
                obs::emit_extraction_warning(&warning);
                out.warnings.push(warning);
            }
        }
    }
    out
}

fn crop_zone(
    image: &RgbImage,
    reference: Option<&RgbImage>,
    path: &str,
    zone: &ZoneSpec,
) -> Result<(ZoneImage, Option<ExtractionWarning>), ExtractionWarning> {
    let Some(declared) = zone.bounds else {
        return Err(ExtractionWarning {
            zone: path.to_string(),
            kind: WarningKind::NoBounds,
        });
    };

    let (width, height) = image.dimensions();
    let clamped = declared.clamp_to(width, height);
    let warning = if clamped.is_empty() {
        Some(WarningKind::ZeroArea { declared })
    } else if clamped != declared {
        Some(WarningKind::Clamped { declared, clamped })
    } else {
        None
    };

    let crop = ZoneImage {
        name: zone.name.clone(),
        path: path.to_string(),
        bounds: declared,
        clamped,
        image: crop(image, &clamped),
        reference: reference.map(|r| crop(r, &declared.clamp_to(r.width(), r.height()))),
    };
    Ok((
        crop,
        warning.map(|kind| ExtractionWarning {
            zone: path.to_string(),
            kind,
        }),
    ))
}

fn crop(image: &RgbImage, bounds: &Bounds) -> RgbImage {
    if bounds.is_empty() {
        return RgbImage::new(0, 0);
    }
    imageops::crop_imm(image, bounds.x1, bounds.y1, bounds.width(), bounds.height()).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse;
    use image::Rgb;

    fn image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_crop_matches_bounds() {
        let tree = parse("Page('p', Zone('left', Bounds(0, 0, 50, 40)))").unwrap();
        let ex = extract_zones(&image(100, 40), &tree);
        assert!(ex.warnings.is_empty());
        let z = &ex.zones[0];
        assert_eq!(z.image.dimensions(), (50, 40));
        assert!(z.image.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_out_of_range_bounds_are_clamped() {
        let tree = parse("Page('p', Zone('wide', Bounds(60, 10, 400, 300)))").unwrap();
        let ex = extract_zones(&image(100, 40), &tree);
        assert_eq!(ex.zones[0].image.dimensions(), (40, 30));
        assert_eq!(
            ex.warnings[0].kind,
            WarningKind::Clamped {
                declared: Bounds::new(60, 10, 400, 300),
                clamped: Bounds::new(60, 10, 100, 40),
            }
        );
    }

    #[test]
    fn test_zone_outside_image_has_empty_crop() {
        let tree = parse("Page('p', Zone('gone', Bounds(500, 500, 600, 600)))").unwrap();
        let ex = extract_zones(&image(100, 40), &tree);
        assert!(ex.zones[0].is_empty());
        assert!(matches!(ex.warnings[0].kind, WarningKind::ZeroArea { .. }));
    }

    #[test]
    fn test_unbounded_zone_is_skipped_with_warning() {
        let tree = parse("Page('p', Zone('a', Bounds(0, 0, 10, 10)), Zone('b'))").unwrap();
        let ex = extract_zones(&image(100, 40), &tree);
        assert_eq!(ex.zones.len(), 1);
        assert_eq!(ex.warnings_for("b").count(), 1);
        assert_eq!(ex.warnings[0].kind, WarningKind::NoBounds);
    }

    #[test]
    fn test_declaration_order_and_reference_crop() {
        let tree = parse(
            "Page('p', Zone('z2', Bounds(50, 0, 100, 40)), Zone('z1', Bounds(0, 0, 50, 40)))",
        )
        .unwrap();
        let reference = image(100, 40);
        let ex = extract_zones_with_reference(&image(100, 40), &tree, Some(&reference));
        let names: Vec<&str> = ex.zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["z2", "z1"]);
        assert_eq!(
            ex.zones[0].reference.as_ref().map(|r| r.dimensions()),
            Some((50, 40))
        );
    }
}
