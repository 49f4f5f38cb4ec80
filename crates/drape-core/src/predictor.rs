//! Capability traits for the opaque face and gender predictors.
//!
//! The pipeline only sees these traits. [`crate::onnx`] provides the ONNX
//! Runtime implementations; tests plug in deterministic stubs.

use ndarray::Array4;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("model file not found: {0}; place the exported ONNX model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("unexpected model output: {0}")]
    BadOutput(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// One row of SSD detector output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: f32,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` as fractions of the input width/height.
    pub bbox: [f32; 4],
}

/// Face detector taking a `(1, 3, 300, 300)` mean-subtracted BGR blob.
pub trait FacePredictor: Send + Sync {
    fn detect_faces(&self, blob: &Array4<f32>) -> Result<Vec<RawDetection>, PredictorError>;
}

/// Binary gender model taking a `(1, 128, 128, 3)` batch scaled to [0, 1].
///
/// Returns a single score in [0, 1]; higher means male.
pub trait GenderPredictor: Send + Sync {
    fn predict_gender(&self, batch: &Array4<f32>) -> Result<f32, PredictorError>;
}
