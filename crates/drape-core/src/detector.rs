//! Face localization on top of an SSD face predictor.
//!
//! Builds the 300x300 mean-subtracted BGR blob, runs the predictor once,
//! drops low-confidence rows and maps the survivors back to source pixels.

use crate::frame::BgrImage;
use crate::onnx::OnnxFaceDetector;
use crate::predictor::{FacePredictor, PredictorError, RawDetection};
use crate::types::FaceBox;
use ndarray::Array4;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
pub const DETECTOR_INPUT_SIZE: u32 = 300;
/// Per-channel means in B, G, R order.
pub const DETECTOR_MEAN_BGR: [f32; 3] = [104.0, 177.0, 123.0];
const DETECTOR_SCALE: f32 = 1.0;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("face predictor unavailable: {0}")]
    PredictorUnavailable(String),
    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

/// Finds faces in an image.
///
/// A locator without a predictor is still constructible so the process can
/// start; every [`locate`](Self::locate) call then fails with
/// [`LocateError::PredictorUnavailable`]. That keeps "no face in this
/// picture" distinct from "cannot look for faces at all".
pub struct FaceLocator {
    predictor: Option<Box<dyn FacePredictor>>,
    unavailable_reason: String,
    confidence_threshold: f32,
}

impl FaceLocator {
    pub fn new(predictor: Box<dyn FacePredictor>, confidence_threshold: f32) -> Self {
        Self {
            predictor: Some(predictor),
            unavailable_reason: String::new(),
            confidence_threshold,
        }
    }

    /// A locator whose predictor failed to initialize.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            predictor: None,
            unavailable_reason: reason.into(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Load the ONNX SSD model. A load failure is logged and yields an
    /// unavailable locator rather than an error.
    pub fn load(model_path: &str, confidence_threshold: f32, intra_threads: usize) -> Self {
        match OnnxFaceDetector::load(model_path, intra_threads) {
            Ok(detector) => {
                tracing::info!(path = model_path, threshold = confidence_threshold, "face detector loaded");
                Self::new(Box::new(detector), confidence_threshold)
            }
            Err(e) => {
                tracing::error!(path = model_path, error = %e, "face detector failed to load");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Detect faces, returning boxes sorted by descending confidence.
    ///
    /// Ties keep the predictor's output order.
    pub fn locate(&self, image: &BgrImage) -> Result<Vec<FaceBox>, LocateError> {
        let predictor = self
            .predictor
            .as_deref()
            .ok_or_else(|| LocateError::PredictorUnavailable(self.unavailable_reason.clone()))?;

        let blob = build_blob(image);
        let raw = predictor.detect_faces(&blob)?;
        let total = raw.len();

        let mut faces: Vec<FaceBox> = raw
            .iter()
            .filter(|d| d.confidence > self.confidence_threshold)
            .filter_map(|d| denormalize(d, image.width(), image.height()))
            .collect();

        faces.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            raw = total,
            kept = faces.len(),
            threshold = self.confidence_threshold,
            "face detection complete"
        );

        Ok(faces)
    }

    /// The face used downstream: the single highest-confidence box.
    ///
    /// Additional faces are discarded; the pipeline assumes one subject.
    pub fn primary(faces: &[FaceBox]) -> Option<&FaceBox> {
        faces.first()
    }
}

/// Resize to the detector input and build a NCHW blob with per-channel mean
/// subtraction. Channel order stays B, G, R.
pub fn build_blob(image: &BgrImage) -> Array4<f32> {
    let size = DETECTOR_INPUT_SIZE as usize;
    let resized = image.resize_bilinear(DETECTOR_INPUT_SIZE, DETECTOR_INPUT_SIZE);
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let px = resized.pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] as f32 - DETECTOR_MEAN_BGR[c]) * DETECTOR_SCALE;
            }
        }
    }

    tensor
}

/// Map a normalized detection onto the original `width` × `height` image.
///
/// Corners are scaled and truncated to integers, then clipped to the image.
/// Returns `None` when nothing of the box is left inside the image.
fn denormalize(det: &RawDetection, width: u32, height: u32) -> Option<FaceBox> {
    let scale = [width, height, width, height];
    let [x1, y1, x2, y2] = std::array::from_fn::<i64, 4, _>(|i| {
        (det.bbox[i] * scale[i] as f32) as i64
    });

    let x1 = x1.clamp(0, width as i64);
    let x2 = x2.clamp(0, width as i64);
    let y1 = y1.clamp(0, height as i64);
    let y2 = y2.clamp(0, height as i64);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(FaceBox {
        x: x1 as u32,
        y: y1 as u32,
        width: (x2 - x1) as u32,
        height: (y2 - y1) as u32,
        confidence: det.confidence,
    })
}
