//! Binary gender classification of a face crop.

use crate::frame::{BgrImage, CHANNELS};
use crate::onnx::OnnxGenderModel;
use crate::predictor::{GenderPredictor, PredictorError};
use crate::types::Gender;
use ndarray::Array4;
use std::path::PathBuf;

pub const GENDER_INPUT_SIZE: u32 = 128;
/// Scores strictly above this are `Male`. Calibrated for the shipped model;
/// not 0.5.
pub const DEFAULT_GENDER_THRESHOLD: f32 = 0.4;

/// Wraps an optional gender model.
///
/// With no model loaded every call yields [`Gender::Unknown`], so the rest
/// of the pipeline still produces a (degraded) recommendation.
pub struct GenderClassifier {
    predictor: Option<Box<dyn GenderPredictor>>,
    threshold: f32,
}

impl GenderClassifier {
    pub fn new(predictor: Box<dyn GenderPredictor>, threshold: f32) -> Self {
        Self {
            predictor: Some(predictor),
            threshold,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            predictor: None,
            threshold: DEFAULT_GENDER_THRESHOLD,
        }
    }

    /// Load the first candidate model that opens. Logs and degrades to
    /// [`unavailable`](Self::unavailable) when none do.
    pub fn load(candidates: &[PathBuf], threshold: f32, intra_threads: usize) -> Self {
        for path in candidates {
            let path_str = path.to_string_lossy();
            match OnnxGenderModel::load(&path_str, intra_threads) {
                Ok(model) => {
                    tracing::info!(path = %path_str, threshold, "gender model loaded");
                    return Self::new(Box::new(model), threshold);
                }
                Err(e) => {
                    tracing::warn!(path = %path_str, error = %e, "gender model candidate failed");
                }
            }
        }
        tracing::warn!("no gender model loaded; gender will be reported as Unknown");
        Self::unavailable()
    }

    pub fn is_available(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn classify(&self, crop: &BgrImage) -> Result<Gender, PredictorError> {
        let Some(predictor) = self.predictor.as_deref() else {
            return Ok(Gender::Unknown);
        };

        let batch = preprocess(crop);
        let score = predictor.predict_gender(&batch)?;
        let gender = decide(score, self.threshold);
        tracing::debug!(score, threshold = self.threshold, %gender, "gender classified");
        Ok(gender)
    }
}

fn decide(score: f32, threshold: f32) -> Gender {
    if score > threshold {
        Gender::Male
    } else {
        Gender::Female
    }
}

/// Resize to 128x128 and scale to [0, 1] as a `(1, 128, 128, 3)` NHWC batch.
/// Channels stay in B, G, R order.
pub fn preprocess(crop: &BgrImage) -> Array4<f32> {
    let size = GENDER_INPUT_SIZE as usize;
    let resized = crop.resize_bilinear(GENDER_INPUT_SIZE, GENDER_INPUT_SIZE);
    let mut tensor = Array4::<f32>::zeros((1, size, size, CHANNELS));

    for y in 0..size {
        for x in 0..size {
            let px = resized.pixel(x as u32, y as u32);
            for c in 0..CHANNELS {
                tensor[[0, y, x, c]] = px[c] as f32 / 255.0;
            }
        }
    }

    tensor
}
