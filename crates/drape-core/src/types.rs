use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::skin_tone::SkinToneResult;

/// Face rectangle in source-image pixel coordinates.
///
/// Always lies inside the image it was detected in:
/// `x + width <= image width` and `y + height <= image height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

impl FaceBox {
    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the box lies entirely inside a `width` × `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.checked_add(self.width).is_some_and(|r| r <= width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= height)
    }
}

/// Per-channel means over a region, in the image's B, G, R channel order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageColorSample {
    pub b: f64,
    pub g: f64,
    pub r: f64,
}

impl AverageColorSample {
    pub fn new(b: f64, g: f64, r: f64) -> Self {
        Self { b, g, r }
    }

    /// Quantize to 8-bit BGR. Fractions are truncated, matching an
    /// unsigned 8-bit cast of the float means.
    pub fn to_bgr_u8(&self) -> [u8; 3] {
        let q = |v: f64| v.clamp(0.0, 255.0) as u8;
        [q(self.b), q(self.g), q(self.r)]
    }
}

/// Binary gender label produced by the gender classifier.
///
/// `Unknown` only appears when no gender model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Label used as the catalog's second-level key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal value of one pipeline run.
///
/// A run that found no face carries no box, no classification and an empty
/// style list. A run that found a face always carries at least one style
/// entry (the catalog sentinel when nothing matched).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub face: Option<FaceBox>,
    pub gender: Option<Gender>,
    pub skin_tone: Option<SkinToneResult>,
    pub styles: Vec<String>,
    /// Copy of the input with the chosen face outlined. Only present when
    /// annotation was requested.
    #[serde(skip)]
    pub annotated: Option<RgbImage>,
}

impl RecommendationResult {
    /// Result for an image in which no face passed the confidence threshold.
    pub fn no_face() -> Self {
        Self {
            face: None,
            gender: None,
            skin_tone: None,
            styles: Vec::new(),
            annotated: None,
        }
    }

    pub fn face_detected(&self) -> bool {
        self.face.is_some()
    }
}
