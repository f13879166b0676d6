//! Canonical colour names, hex resolution and colour distance.
//!
//! The table is append-only: new entries go at the end and existing
//! coordinates never move, so nearest-name lookups stay stable across
//! [`PALETTE_VERSION`] bumps.

use std::fmt;
use std::sync::OnceLock;

use palette::{FromColor, Lab, Srgb};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Version of the canonical table; bump on every addition.
pub const PALETTE_VERSION: u32 = 1;

/// An sRGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    const fn from_u32(v: u32) -> Self {
        Self::new((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Parse `#rgb` / `#rrggbb` (case-insensitive).
    pub fn from_hex(literal: &str) -> Option<Self> {
        if !hex_pattern().is_some_and(|re| re.is_match(literal)) {
            return None;
        }
        let digits = &literal[1..];
        let expanded: String = if digits.len() == 3 {
            digits.chars().flat_map(|c| [c, c]).collect()
        } else {
            digits.to_string()
        };
        let value = u32::from_str_radix(&expanded, 16).ok()?;
        Some(Self::from_u32(value))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(c: [u8; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(px: image::Rgb<u8>) -> Self {
        Self::new(px.0[0], px.0[1], px.0[2])
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = UnknownColour;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::from_hex(&value).ok_or(UnknownColour(value))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A token that is neither a hex literal nor a canonical name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown colour: {0}")]
pub struct UnknownColour(pub String);

/// One named colour in the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: &'static str,
    pub rgb: Rgb,
}

const fn entry(name: &'static str, value: u32) -> PaletteEntry {
    PaletteEntry {
        name,
        rgb: Rgb::from_u32(value),
    }
}

fn hex_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").ok())
        .as_ref()
}

/// The canonical table, in tie-break order.
pub fn entries() -> &'static [PaletteEntry] {
    TABLE
}

/// Look up a canonical name. `-` and `_` are ignored, matching is
/// case-insensitive.
pub fn lookup(name: &str) -> Option<Rgb> {
    let normalised: String = name
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    TABLE
        .iter()
        .find(|e| e.name == normalised)
        .map(|e| e.rgb)
}

/// Resolve a hex literal, bare name or dotted reference (`tw.slate50`).
pub fn resolve(token: &str) -> Result<Rgb, UnknownColour> {
    let token = token.trim();
    if token.starts_with('#') {
        return Rgb::from_hex(token).ok_or_else(|| UnknownColour(token.to_string()));
    }
    let name = token.rsplit('.').next().unwrap_or(token);
    lookup(name).ok_or_else(|| UnknownColour(token.to_string()))
}

/// Euclidean distance in raw RGB space.
pub fn rgb_distance(a: Rgb, b: Rgb) -> f64 {
    let dr = f64::from(a.r) - f64::from(b.r);
    let dg = f64::from(a.g) - f64::from(b.g);
    let db = f64::from(a.b) - f64::from(b.b);
    (dr * dr + dg * dg + db * db).sqrt()
}

fn to_lab(c: Rgb) -> Lab {
    let srgb = Srgb::new(
        f32::from(c.r) / 255.0,
        f32::from(c.g) / 255.0,
        f32::from(c.b) / 255.0,
    );
    Lab::from_color(srgb)
}

/// Perceptual (CIE76 ΔE) distance: Euclidean separation in CIELAB.
pub fn distance(a: Rgb, b: Rgb) -> f64 {
    if a == b {
        return 0.0;
    }
    let la = to_lab(a);
    let lb = to_lab(b);
    let dl = f64::from(la.l) - f64::from(lb.l);
    let da = f64::from(la.a) - f64::from(lb.a);
    let db = f64::from(la.b) - f64::from(lb.b);
    (dl * dl + da * da + db * db).sqrt()
}

/// Nearest canonical entry by RGB distance; ties go to the earlier entry.
pub fn nearest(rgb: Rgb) -> (&'static PaletteEntry, f64) {
    let mut best = &TABLE[0];
    let mut best_dist = rgb_distance(rgb, best.rgb);
    for candidate in &TABLE[1..] {
        let d = rgb_distance(rgb, candidate.rgb);
        if d < best_dist {
            best = candidate;
            best_dist = d;
        }
    }
    (best, best_dist)
}

pub fn nearest_name(rgb: Rgb) -> &'static str {
    nearest(rgb).0.name
}

/// Nearest name, or `None` when even the nearest entry is farther than
/// `max_distance` (RGB).
pub fn nearest_within(rgb: Rgb, max_distance: f64) -> Option<(&'static str, f64)> {
    let (entry, dist) = nearest(rgb);
    (dist <= max_distance).then_some((entry.name, dist))
}

static TABLE: &[PaletteEntry] = &[
    entry("white", 0xffffff),
    entry("black", 0x000000),
    entry("slate50", 0xf8fafc),
    entry("slate100", 0xf1f5f9),
    entry("slate200", 0xe2e8f0),
    entry("slate300", 0xcbd5e1),
    entry("slate400", 0x94a3b8),
    entry("slate500", 0x64748b),
    entry("slate600", 0x475569),
    entry("slate700", 0x334155),
    entry("slate800", 0x1e293b),
    entry("slate900", 0x0f172a),
    entry("slate950", 0x020617),
    entry("gray50", 0xf9fafb),
    entry("gray100", 0xf3f4f6),
    entry("gray200", 0xe5e7eb),
    entry("gray300", 0xd1d5db),
    entry("gray400", 0x9ca3af),
    entry("gray500", 0x6b7280),
    entry("gray600", 0x4b5563),
    entry("gray700", 0x374151),
    entry("gray800", 0x1f2937),
    entry("gray900", 0x111827),
    entry("gray950", 0x030712),
    entry("zinc50", 0xfafafa),
    entry("zinc100", 0xf4f4f5),
    entry("zinc200", 0xe4e4e7),
    entry("zinc300", 0xd4d4d8),
    entry("zinc400", 0xa1a1aa),
    entry("zinc500", 0x71717a),
    entry("zinc600", 0x52525b),
    entry("zinc700", 0x3f3f46),
    entry("zinc800", 0x27272a),
    entry("zinc900", 0x18181b),
    entry("zinc950", 0x09090b),
    entry("stone50", 0xfafaf9),
    entry("stone100", 0xf5f5f4),
    entry("stone200", 0xe7e5e4),
    entry("stone300", 0xd6d3d1),
    entry("stone400", 0xa8a29e),
    entry("stone500", 0x78716c),
    entry("stone600", 0x57534e),
    entry("stone700", 0x44403c),
    entry("stone800", 0x292524),
    entry("stone900", 0x1c1917),
    entry("stone950", 0x0c0a09),
    entry("red50", 0xfef2f2),
    entry("red100", 0xfee2e2),
    entry("red200", 0xfecaca),
    entry("red300", 0xfca5a5),
    entry("red400", 0xf87171),
    entry("red500", 0xef4444),
    entry("red600", 0xdc2626),
    entry("red700", 0xb91c1c),
    entry("red800", 0x991b1b),
    entry("red900", 0x7f1d1d),
    entry("red950", 0x450a0a),
    entry("orange50", 0xfff7ed),
    entry("orange100", 0xffedd5),
    entry("orange200", 0xfed7aa),
    entry("orange300", 0xfdba74),
    entry("orange400", 0xfb923c),
    entry("orange500", 0xf97316),
    entry("orange600", 0xea580c),
    entry("orange700", 0xc2410c),
    entry("orange800", 0x9a3412),
    entry("orange900", 0x7c2d12),
    entry("orange950", 0x431407),
    entry("amber50", 0xfffbeb),
    entry("amber100", 0xfef3c7),
    entry("amber200", 0xfde68a),
    entry("amber300", 0xfcd34d),
    entry("amber400", 0xfbbf24),
    entry("amber500", 0xf59e0b),
    entry("amber600", 0xd97706),
    entry("amber700", 0xb45309),
    entry("amber800", 0x92400e),
    entry("amber900", 0x78350f),
    entry("amber950", 0x451a03),
    entry("yellow50", 0xfefce8),
    entry("yellow100", 0xfef9c3),
    entry("yellow200", 0xfef08a),
    entry("yellow300", 0xfde047),
    entry("yellow400", 0xfacc15),
    entry("yellow500", 0xeab308),
    entry("yellow600", 0xca8a04),
    entry("yellow700", 0xa16207),
    entry("yellow800", 0x854d0e),
    entry("yellow900", 0x713f12),
    entry("yellow950", 0x422006),
    entry("lime50", 0xf7fee7),
    entry("lime100", 0xecfccb),
    entry("lime200", 0xd9f99d),
    entry("lime300", 0xbef264),
    entry("lime400", 0xa3e635),
    entry("lime500", 0x84cc16),
    entry("lime600", 0x65a30d),
    entry("lime700", 0x4d7c0f),
    entry("lime800", 0x3f6212),
    entry("lime900", 0x365314),
    entry("lime950", 0x1a2e05),
    entry("green50", 0xf0fdf4),
    entry("green100", 0xdcfce7),
    entry("green200", 0xbbf7d0),
    entry("green300", 0x86efac),
    entry("green400", 0x4ade80),
    entry("green500", 0x22c55e),
    entry("green600", 0x16a34a),
    entry("green700", 0x15803d),
    entry("green800", 0x166534),
    entry("green900", 0x14532d),
    entry("green950", 0x052e16),
    entry("emerald50", 0xecfdf5),
    entry("emerald100", 0xd1fae5),
    entry("emerald200", 0xa7f3d0),
    entry("emerald300", 0x6ee7b7),
    entry("emerald400", 0x34d399),
    entry("emerald500", 0x10b981),
    entry("emerald600", 0x059669),
    entry("emerald700", 0x047857),
    entry("emerald800", 0x065f46),
    entry("emerald900", 0x064e3b),
    entry("emerald950", 0x022c22),
    entry("teal50", 0xf0fdfa),
    entry("teal100", 0xccfbf1),
    entry("teal200", 0x99f6e4),
    entry("teal300", 0x5eead4),
    entry("teal400", 0x2dd4bf),
    entry("teal500", 0x14b8a6),
    entry("teal600", 0x0d9488),
    entry("teal700", 0x0f766e),
    entry("teal800", 0x115e59),
    entry("teal900", 0x134e4a),
    entry("teal950", 0x042f2e),
    entry("cyan50", 0xecfeff),
    entry("cyan100", 0xcffafe),
    entry("cyan200", 0xa5f3fc),
    entry("cyan300", 0x67e8f9),
    entry("cyan400", 0x22d3ee),
    entry("cyan500", 0x06b6d4),
    entry("cyan600", 0x0891b2),
    entry("cyan700", 0x0e7490),
    entry("cyan800", 0x155e75),
    entry("cyan900", 0x164e63),
    entry("cyan950", 0x083344),
    entry("sky50", 0xf0f9ff),
    entry("sky100", 0xe0f2fe),
    entry("sky200", 0xbae6fd),
    entry("sky300", 0x7dd3fc),
    entry("sky400", 0x38bdf8),
    entry("sky500", 0x0ea5e9),
    entry("sky600", 0x0284c7),
    entry("sky700", 0x0369a1),
    entry("sky800", 0x075985),
    entry("sky900", 0x0c4a6e),
    entry("sky950", 0x082f49),
    entry("blue50", 0xeff6ff),
    entry("blue100", 0xdbeafe),
    entry("blue200", 0xbfdbfe),
    entry("blue300", 0x93c5fd),
    entry("blue400", 0x60a5fa),
    entry("blue500", 0x3b82f6),
    entry("blue600", 0x2563eb),
    entry("blue700", 0x1d4ed8),
    entry("blue800", 0x1e40af),
    entry("blue900", 0x1e3a8a),
    entry("blue950", 0x172554),
    entry("indigo50", 0xeef2ff),
    entry("indigo100", 0xe0e7ff),
    entry("indigo200", 0xc7d2fe),
    entry("indigo300", 0xa5b4fc),
    entry("indigo400", 0x818cf8),
    entry("indigo500", 0x6366f1),
    entry("indigo600", 0x4f46e5),
    entry("indigo700", 0x4338ca),
    entry("indigo800", 0x3730a3),
    entry("indigo900", 0x312e81),
    entry("indigo950", 0x1e1b4b),
    entry("violet50", 0xf5f3ff),
    entry("violet100", 0xede9fe),
    entry("violet200", 0xddd6fe),
    entry("violet300", 0xc4b5fd),
    entry("violet400", 0xa78bfa),
    entry("violet500", 0x8b5cf6),
    entry("violet600", 0x7c3aed),
    entry("violet700", 0x6d28d9),
    entry("violet800", 0x5b21b6),
    entry("violet900", 0x4c1d95),
    entry("violet950", 0x2e1065),
    entry("purple50", 0xfaf5ff),
    entry("purple100", 0xf3e8ff),
    entry("purple200", 0xe9d5ff),
    entry("purple300", 0xd8b4fe),
    entry("purple400", 0xc084fc),
    entry("purple500", 0xa855f7),
    entry("purple600", 0x9333ea),
    entry("purple700", 0x7e22ce),
    entry("purple800", 0x6b21a8),
    entry("purple900", 0x581c87),
    entry("purple950", 0x3b0764),
    entry("fuchsia50", 0xfdf4ff),
    entry("fuchsia100", 0xfae8ff),
    entry("fuchsia200", 0xf5d0fe),
    entry("fuchsia300", 0xf0abfc),
    entry("fuchsia400", 0xe879f9),
    entry("fuchsia500", 0xd946ef),
    entry("fuchsia600", 0xc026d3),
    entry("fuchsia700", 0xa21caf),
    entry("fuchsia800", 0x86198f),
    entry("fuchsia900", 0x701a75),
    entry("fuchsia950", 0x4a044e),
    entry("pink50", 0xfdf2f8),
    entry("pink100", 0xfce7f3),
    entry("pink200", 0xfbcfe8),
    entry("pink300", 0xf9a8d4),
    entry("pink400", 0xf472b6),
    entry("pink500", 0xec4899),
    entry("pink600", 0xdb2777),
    entry("pink700", 0xbe185d),
    entry("pink800", 0x9d174d),
    entry("pink900", 0x831843),
    entry("pink950", 0x500724),
    entry("rose50", 0xfff1f2),
    entry("rose100", 0xffe4e6),
    entry("rose200", 0xfecdd3),
    entry("rose300", 0xfda4af),
    entry("rose400", 0xfb7185),
    entry("rose500", 0xf43f5e),
    entry("rose600", 0xe11d48),
    entry("rose700", 0xbe123c),
    entry("rose800", 0x9f1239),
    entry("rose900", 0x881337),
    entry("rose950", 0x4c0519),
];
