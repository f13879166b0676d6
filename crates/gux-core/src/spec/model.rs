//! Typed spec tree produced by the parser.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::palette::Rgb;

/// Style properties that carry a colour expectation.
pub const COLOUR_PROPERTIES: [&str; 3] = ["bg", "text", "colour"];

/// Rectangular pixel bounds, `x1 < x2` and `y1 < y2`; the far edges are
/// exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Bounds {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Intersect with an image of `width` x `height`.
    pub fn clamp_to(&self, width: u32, height: u32) -> Bounds {
        let x1 = self.x1.min(width);
        let y1 = self.y1.min(height);
        Bounds {
            x1,
            y1,
            x2: self.x2.min(width).max(x1),
            y2: self.y2.min(height).max(y1),
        }
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}→{},{}]", self.x1, self.y1, self.x2, self.y2)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A colour resolved at parse time, with the token it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColourToken {
    pub raw: String,
    pub rgb: Rgb,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StyleValue {
    Colour(ColourToken),
    /// Runtime-variable value, exempt from exact matching.
    Dynamic { name: String },
    Literal { raw: String },
}

pub type StyleMap = BTreeMap<String, StyleValue>;

/// Structural presence thresholds from `Assert(...)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Assertions {
    pub min_transitions_v: Option<f64>,
    pub min_transitions_h: Option<f64>,
    pub min_regions: Option<u32>,
    pub non_blank: bool,
}

impl Assertions {
    /// Vertical threshold, with `non_blank` meaning at least one.
    pub fn vertical_threshold(&self) -> Option<f64> {
        match self.min_transitions_v {
            Some(v) => Some(v),
            None if self.non_blank => Some(1.0),
            None => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_transitions_v.is_none()
            && self.min_transitions_h.is_none()
            && self.min_regions.is_none()
            && !self.non_blank
    }
}

/// Any construct outside the structural vocabulary. Kept for documentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetNode {
    pub name: String,
    pub raw: String,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Zone(ZoneSpec),
    Widget(WidgetNode),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneSpec {
    pub name: String,
    pub doc: Option<String>,
    pub bounds: Option<Bounds>,
    pub style: StyleMap,
    pub assertions: Option<Assertions>,
    /// Style properties marked `Dynamic(...)`.
    pub dynamic: BTreeSet<String>,
    pub children: Vec<Node>,
}

/// A declared colour expectation for one style property.
#[derive(Debug, Clone, PartialEq)]
pub enum ColourExpectation<'a> {
    Exact(&'a ColourToken),
    Dynamic,
}

impl ZoneSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            bounds: None,
            style: StyleMap::new(),
            assertions: None,
            dynamic: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    /// Colour expectations in `COLOUR_PROPERTIES` order.
    pub fn colour_expectations(&self) -> Vec<(&'static str, ColourExpectation<'_>)> {
        COLOUR_PROPERTIES
            .iter()
            .filter_map(|prop| match self.style.get(*prop) {
                Some(StyleValue::Colour(token)) if !self.dynamic.contains(*prop) => {
                    Some((*prop, ColourExpectation::Exact(token)))
                }
                Some(StyleValue::Dynamic { .. }) => Some((*prop, ColourExpectation::Dynamic)),
                _ => None,
            })
            .collect()
    }

    /// Whether the zone declares anything the gate must be able to verify.
    pub fn is_required(&self) -> bool {
        !self.colour_expectations().is_empty()
            || self.assertions.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn child_zones(&self) -> impl Iterator<Item = &ZoneSpec> {
        self.children.iter().filter_map(|n| match n {
            Node::Zone(z) => Some(z),
            Node::Widget(_) => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageSpec {
    pub name: String,
    pub doc: Option<String>,
    pub viewport: Option<Viewport>,
    pub style: StyleMap,
    pub children: Vec<Node>,
}

/// A parsed spec document. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecTree {
    pub page: PageSpec,
    /// SHA-256 of the source text.
    pub digest: String,
}

impl SpecTree {
    /// Every zone, depth-first in declaration order, with its path.
    pub fn zones(&self) -> Vec<(String, &ZoneSpec)> {
        let mut out = Vec::new();
        collect_zones(&self.page.children, "", &mut out);
        out
    }

    /// Look up a zone by slash-joined path.
    pub fn zone(&self, path: &str) -> Option<&ZoneSpec> {
        self.zones()
            .into_iter()
            .find(|(p, _)| p == path)
            .map(|(_, z)| z)
    }
}

fn collect_zones<'a>(nodes: &'a [Node], prefix: &str, out: &mut Vec<(String, &'a ZoneSpec)>) {
    for node in nodes {
        if let Node::Zone(zone) = node {
            let path = if prefix.is_empty() {
                zone.name.clone()
            } else {
                format!("{prefix}/{}", zone.name)
            };
            out.push((path.clone(), zone));
            collect_zones(&zone.children, &path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_clamp() {
        let b = Bounds::new(10, 10, 200, 80);
        assert_eq!(b.clamp_to(100, 100), Bounds::new(10, 10, 100, 80));
        let outside = Bounds::new(150, 0, 300, 50);
        let clamped = outside.clamp_to(100, 100);
        assert!(clamped.is_empty());
        assert_eq!(clamped.x1, 100);
    }

    #[test]
    fn test_non_blank_threshold() {
        let a = Assertions {
            non_blank: true,
            ..Default::default()
        };
        assert_eq!(a.vertical_threshold(), Some(1.0));
        let b = Assertions {
            min_transitions_v: Some(4.0),
            non_blank: true,
            ..Default::default()
        };
        assert_eq!(b.vertical_threshold(), Some(4.0));
        assert_eq!(Assertions::default().vertical_threshold(), None);
    }

    #[test]
    fn test_dynamic_property_is_not_exact() {
        let mut zone = ZoneSpec::new("user");
        zone.style.insert(
            "text".into(),
            StyleValue::Dynamic {
                name: "username".into(),
            },
        );
        zone.dynamic.insert("text".into());
        let exp = zone.colour_expectations();
        assert_eq!(exp, vec![("text", ColourExpectation::Dynamic)]);
        assert!(zone.is_required());
    }
}
