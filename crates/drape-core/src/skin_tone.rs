//! Skin-tone bucketing by hue.
//!
//! The average face color is converted to 8-bit HSV (hue in half-degrees,
//! `[0, 180)`) and the hue picks one of 17 ten-wide buckets. The undertone
//! is derived from the same raw hue, not from the bucket.

use crate::types::AverageColorSample;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

const BUCKET_WIDTH: u8 = 10;
/// Exclusive upper bound of the hue domain.
pub const HUE_MAX: u8 = 180;
const COOL_ABOVE: u8 = 170;
const COOL_BELOW: u8 = 30;

/// Named skin-tone bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkinTone {
    #[serde(rename = "Porcelain (Very Fair)")]
    Porcelain,
    #[serde(rename = "Alabaster (Fair)")]
    Alabaster,
    #[serde(rename = "Ivory (Light Fair)")]
    Ivory,
    #[serde(rename = "Cream (Light)")]
    Cream,
    #[serde(rename = "Beige (Light-Medium)")]
    Beige,
    #[serde(rename = "Golden Beige (Medium)")]
    GoldenBeige,
    #[serde(rename = "Honey (Medium-Warm)")]
    Honey,
    #[serde(rename = "Tan (Medium-Dark)")]
    Tan,
    #[serde(rename = "Caramel (Dark)")]
    Caramel,
    #[serde(rename = "Honey Brown (Dark-Warm)")]
    HoneyBrown,
    #[serde(rename = "Walnut (Deep Brown)")]
    Walnut,
    #[serde(rename = "Espresso (Very Deep Brown)")]
    Espresso,
    #[serde(rename = "Chestnut (Very Deep Brown-Cool)")]
    Chestnut,
    #[serde(rename = "Mocha (Deep Brown-Warm)")]
    Mocha,
    #[serde(rename = "Mahogany (Very Deep Brown-Warm)")]
    Mahogany,
    #[serde(rename = "Sable (Almost Black)")]
    Sable,
    #[serde(rename = "Ebony (Black)")]
    Ebony,
    #[serde(rename = "Unknown Skin Tone")]
    Unknown,
}

impl SkinTone {
    /// Hue-ordered buckets; bucket `i` covers `[10 * i, 10 * i + 10)`.
    pub const BUCKETS: [SkinTone; 17] = [
        SkinTone::Porcelain,
        SkinTone::Alabaster,
        SkinTone::Ivory,
        SkinTone::Cream,
        SkinTone::Beige,
        SkinTone::GoldenBeige,
        SkinTone::Honey,
        SkinTone::Tan,
        SkinTone::Caramel,
        SkinTone::HoneyBrown,
        SkinTone::Walnut,
        SkinTone::Espresso,
        SkinTone::Chestnut,
        SkinTone::Mocha,
        SkinTone::Mahogany,
        SkinTone::Sable,
        SkinTone::Ebony,
    ];

    /// Bucket containing `hue`, or `Unknown` outside `[0, 170)`.
    pub fn from_hue(hue: u8) -> SkinTone {
        Self::BUCKETS
            .get((hue / BUCKET_WIDTH) as usize)
            .copied()
            .unwrap_or(SkinTone::Unknown)
    }

    /// Half-open hue range covered by this bucket. `None` for `Unknown`.
    pub fn hue_range(self) -> Option<Range<u8>> {
        let idx = Self::BUCKETS.iter().position(|&t| t == self)? as u8;
        let start = idx * BUCKET_WIDTH;
        Some(start..start + BUCKET_WIDTH)
    }

    /// Full bucket label, e.g. `"Golden Beige (Medium)"`.
    pub fn label(self) -> &'static str {
        match self {
            SkinTone::Porcelain => "Porcelain (Very Fair)",
            SkinTone::Alabaster => "Alabaster (Fair)",
            SkinTone::Ivory => "Ivory (Light Fair)",
            SkinTone::Cream => "Cream (Light)",
            SkinTone::Beige => "Beige (Light-Medium)",
            SkinTone::GoldenBeige => "Golden Beige (Medium)",
            SkinTone::Honey => "Honey (Medium-Warm)",
            SkinTone::Tan => "Tan (Medium-Dark)",
            SkinTone::Caramel => "Caramel (Dark)",
            SkinTone::HoneyBrown => "Honey Brown (Dark-Warm)",
            SkinTone::Walnut => "Walnut (Deep Brown)",
            SkinTone::Espresso => "Espresso (Very Deep Brown)",
            SkinTone::Chestnut => "Chestnut (Very Deep Brown-Cool)",
            SkinTone::Mocha => "Mocha (Deep Brown-Warm)",
            SkinTone::Mahogany => "Mahogany (Very Deep Brown-Warm)",
            SkinTone::Sable => "Sable (Almost Black)",
            SkinTone::Ebony => "Ebony (Black)",
            SkinTone::Unknown => "Unknown Skin Tone",
        }
    }
}

impl fmt::Display for SkinTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Undertone {
    Cool,
    Warm,
}

impl Undertone {
    /// Cool above 170 or below 30, warm otherwise.
    ///
    /// The cool band crosses the bucket edges at 30 and 170 (e.g. hue 170
    /// is an `Unknown` bucket with a warm undertone). This is kept as is.
    pub fn from_hue(hue: u8) -> Undertone {
        if hue > COOL_ABOVE || hue < COOL_BELOW {
            Undertone::Cool
        } else {
            Undertone::Warm
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Undertone::Cool => "Cool",
            Undertone::Warm => "Warm",
        }
    }
}

/// Bucket and undertone for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinToneResult {
    pub tone: SkinTone,
    pub undertone: Undertone,
    /// Raw hue in half-degrees.
    pub hue: u8,
}

impl SkinToneResult {
    /// Catalog key: the bucket label without the undertone suffix.
    pub fn bucket_name(&self) -> &'static str {
        self.tone.label()
    }
}

impl fmt::Display for SkinToneResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} Undertone", self.tone.label(), self.undertone.as_str())
    }
}

/// Fixed-point precision of the 8-bit HSV conversion.
const HSV_SHIFT: u32 = 12;

/// Convert one BGR pixel to 8-bit HSV.
///
/// Hue is in half-degrees `[0, 180)`, saturation and value in `[0, 255]`.
/// Uses the same fixed-point reciprocal tables as OpenCV's 8-bit
/// `COLOR_BGR2HSV`, so ties resolve exactly as they do there rather than
/// as a float `round` would.
pub fn bgr_to_hsv(bgr: [u8; 3]) -> (u8, u8, u8) {
    let [b, g, r] = bgr.map(i32::from);
    let v = b.max(g).max(r);
    let diff = v - b.min(g).min(r);
    let half = 1 << (HSV_SHIFT - 1);

    let s = (diff * sat_divisor(v) + half) >> HSV_SHIFT;

    let numerator = if v == r {
        g - b
    } else if v == g {
        b - r + 2 * diff
    } else {
        r - g + 4 * diff
    };
    // Arithmetic shift floors negative hues before the wrap.
    let mut h = (numerator * hue_divisor(diff) + half) >> HSV_SHIFT;
    if h < 0 {
        h += HUE_MAX as i32;
    }

    (h as u8, s as u8, v as u8)
}

/// `round((255 << 12) / v)`, 0 for black.
fn sat_divisor(v: i32) -> i32 {
    if v == 0 {
        return 0;
    }
    round_half_even((255 << HSV_SHIFT) as f64 / v as f64)
}

/// `round((180 << 12) / (6 * diff))`, 0 for gray.
fn hue_divisor(diff: i32) -> i32 {
    if diff == 0 {
        return 0;
    }
    round_half_even(((HUE_MAX as i32) << HSV_SHIFT) as f64 / (6.0 * diff as f64))
}

fn round_half_even(x: f64) -> i32 {
    let floor = x.floor();
    let frac = x - floor;
    let n = floor as i32;
    if frac > 0.5 || (frac == 0.5 && n % 2 != 0) {
        n + 1
    } else {
        n
    }
}

/// Maps an average face color to a [`SkinToneResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SkinToneClassifier;

impl SkinToneClassifier {
    pub fn classify(&self, sample: &AverageColorSample) -> SkinToneResult {
        let (hue, _, _) = bgr_to_hsv(sample.to_bgr_u8());
        self.classify_hue(hue)
    }

    pub fn classify_hue(&self, hue: u8) -> SkinToneResult {
        SkinToneResult {
            tone: SkinTone::from_hue(hue),
            undertone: Undertone::from_hue(hue),
            hue,
        }
    }
}
