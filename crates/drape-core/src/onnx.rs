//! ONNX Runtime adapters for the face detector and gender model.
//!
//! `Session::run` needs `&mut`, so each adapter keeps its session behind a
//! mutex. Concurrent pipeline runs serialize only on the inference call.

use crate::predictor::{FacePredictor, GenderPredictor, PredictorError, RawDetection};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

/// Values per SSD detection row: [image_id, class_id, confidence, x1, y1, x2, y2].
const SSD_ROW_LEN: usize = 7;

fn open_session(model_path: &str, intra_threads: usize) -> Result<Session, PredictorError> {
    if !Path::new(model_path).exists() {
        return Err(PredictorError::ModelNotFound(model_path.to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(intra_threads)
        .map_err(ort::Error::from)?
        .commit_from_file(model_path)?;

    tracing::info!(
        path = model_path,
        inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded ONNX model"
    );

    Ok(session)
}

fn lock(session: &Mutex<Session>) -> Result<std::sync::MutexGuard<'_, Session>, PredictorError> {
    session
        .lock()
        .map_err(|_| PredictorError::InferenceFailed("session lock poisoned".into()))
}

/// res10 300x300 SSD face detector exported to ONNX.
pub struct OnnxFaceDetector {
    session: Mutex<Session>,
}

impl OnnxFaceDetector {
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self, PredictorError> {
        let session = open_session(model_path, intra_threads)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl FacePredictor for OnnxFaceDetector {
    fn detect_faces(&self, blob: &Array4<f32>) -> Result<Vec<RawDetection>, PredictorError> {
        let mut session = lock(&self.session)?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(blob.view())?])?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictorError::InferenceFailed(format!("detections: {e}")))?;

        let detections = parse_ssd_rows(data)?;
        Ok(detections)
    }
}

/// Split a flat `[1, 1, N, 7]` SSD output into detections.
fn parse_ssd_rows(data: &[f32]) -> Result<Vec<RawDetection>, PredictorError> {
    if data.len() % SSD_ROW_LEN != 0 {
        return Err(PredictorError::BadOutput(format!(
            "SSD output length {} is not a multiple of {SSD_ROW_LEN}",
            data.len()
        )));
    }

    Ok(data
        .chunks_exact(SSD_ROW_LEN)
        .map(|row| RawDetection {
            class_id: row[1],
            confidence: row[2],
            bbox: [row[3], row[4], row[5], row[6]],
        })
        .collect())
}

/// Sigmoid-output gender CNN exported to ONNX (NHWC input).
pub struct OnnxGenderModel {
    session: Mutex<Session>,
}

impl OnnxGenderModel {
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self, PredictorError> {
        let session = open_session(model_path, intra_threads)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl GenderPredictor for OnnxGenderModel {
    fn predict_gender(&self, batch: &Array4<f32>) -> Result<f32, PredictorError> {
        let mut session = lock(&self.session)?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(batch.view())?])?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictorError::InferenceFailed(format!("gender score: {e}")))?;

        let score = data
            .first()
            .copied()
            .ok_or_else(|| PredictorError::BadOutput("empty gender output".into()))?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssd_rows() {
        let data = [
            0.0, 1.0, 0.95, 0.1, 0.2, 0.3, 0.4, //
            0.0, 1.0, 0.10, 0.5, 0.5, 0.6, 0.6,
        ];
        let rows = parse_ssd_rows(&data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].class_id, 1.0);
        assert_eq!(rows[0].confidence, 0.95);
        assert_eq!(rows[0].bbox, [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(rows[1].confidence, 0.10);
    }

    #[test]
    fn test_parse_ssd_rows_empty() {
        assert!(parse_ssd_rows(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_ssd_rows_ragged() {
        let result = parse_ssd_rows(&[0.0; 10]);
        assert!(matches!(result, Err(PredictorError::BadOutput(_))));
    }

    #[test]
    fn test_load_missing_model() {
        let result = OnnxFaceDetector::load("/nonexistent/res10.onnx", 1);
        assert!(matches!(result, Err(PredictorError::ModelNotFound(_))));
        let result = OnnxGenderModel::load("/nonexistent/gender.onnx", 1);
        assert!(matches!(result, Err(PredictorError::ModelNotFound(_))));
    }
}
