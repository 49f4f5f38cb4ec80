use drape_core::detector::DEFAULT_CONFIDENCE_THRESHOLD;
use drape_core::gender::DEFAULT_GENDER_THRESHOLD;
use drape_core::PipelineSettings;
use std::path::PathBuf;

const FACE_MODEL_FILE: &str = "res10_300x300_ssd.onnx";
const GENDER_MODEL_FILE: &str = "gender_prediction.onnx";
const GENDER_MODEL_FALLBACK_FILE: &str = "gender_prediction_alt.onnx";
const CATALOG_FILE: &str = "clothing_styles.json";

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory holding `clothing_styles.json`.
    pub data_dir: PathBuf,
    /// Explicit catalog file; skips the default search when set.
    pub catalog_path: Option<PathBuf>,
    /// Minimum (exclusive) detector confidence for a face.
    pub face_confidence: f32,
    /// Gender score above which a face is classified as male.
    pub gender_threshold: f32,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
}

impl Config {
    /// Load configuration from `DRAPE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            model_dir: std::env::var("DRAPE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            data_dir: std::env::var("DRAPE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            catalog_path: std::env::var("DRAPE_CATALOG_PATH").ok().map(PathBuf::from),
            face_confidence: env_f32("DRAPE_FACE_CONFIDENCE", DEFAULT_CONFIDENCE_THRESHOLD),
            gender_threshold: env_f32("DRAPE_GENDER_THRESHOLD", DEFAULT_GENDER_THRESHOLD),
            intra_threads: env_usize("DRAPE_INTRA_THREADS", 2),
        }
    }

    /// Path to the SSD face detection model.
    pub fn face_model_path(&self) -> PathBuf {
        self.model_dir.join(FACE_MODEL_FILE)
    }

    /// Gender models in load order: primary first, then the alternate export.
    pub fn gender_model_paths(&self) -> Vec<PathBuf> {
        vec![
            self.model_dir.join(GENDER_MODEL_FILE),
            self.model_dir.join(GENDER_MODEL_FALLBACK_FILE),
        ]
    }

    /// Catalog files in load order: the explicit path if set, otherwise
    /// the data directory and then the working directory.
    pub fn catalog_paths(&self) -> Vec<PathBuf> {
        match &self.catalog_path {
            Some(path) => vec![path.clone()],
            None => vec![self.data_dir.join(CATALOG_FILE), PathBuf::from(CATALOG_FILE)],
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            face_model: self.face_model_path(),
            gender_models: self.gender_model_paths(),
            catalog_paths: self.catalog_paths(),
            face_confidence: self.face_confidence,
            gender_threshold: self.gender_threshold,
            intra_threads: self.intra_threads,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
