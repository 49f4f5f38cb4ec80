//! Image-to-recommendation pipeline.
//!
//! `decode → locate → crop → {gender, skin tone} → catalog → result`.
//! Each stage runs behind a panic guard so a misbehaving predictor turns
//! into a [`PipelineFailure`] naming the stage instead of unwinding into
//! the caller.

use crate::annotate::annotate_face;
use crate::catalog::StyleCatalog;
use crate::detector::{FaceLocator, LocateError, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::frame::{BgrImage, ImageError};
use crate::gender::{GenderClassifier, DEFAULT_GENDER_THRESHOLD};
use crate::predictor::PredictorError;
use crate::skin_tone::{SkinToneClassifier, SkinToneResult};
use crate::types::{AverageColorSample, Gender, RecommendationResult};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage, reported on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    FaceDetection,
    CropExtraction,
    GenderClassification,
    SkinToneClassification,
    CatalogLookup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::FaceDetection => "face_detection",
            Stage::CropExtraction => "crop_extraction",
            Stage::GenderClassification => "gender_classification",
            Stage::SkinToneClassification => "skin_tone_classification",
            Stage::CatalogLookup => "catalog_lookup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage failed.
///
/// `PredictorUnavailable` (never loaded) and `PredictorFailed` (errored
/// while running) are both predictor faults; callers mapping to a status
/// should treat them alike. See [`FailureKind::is_predictor_fault`].
#[derive(Error, Debug)]
pub enum FailureKind {
    #[error("predictor unavailable: {0}")]
    PredictorUnavailable(String),
    #[error("predictor failed: {0}")]
    PredictorFailed(#[from] PredictorError),
    #[error("malformed input: {0}")]
    MalformedInput(#[from] ImageError),
    #[error("panicked: {0}")]
    Panicked(String),
}

impl FailureKind {
    /// The face or gender predictor is missing or errored.
    pub fn is_predictor_fault(&self) -> bool {
        matches!(
            self,
            FailureKind::PredictorUnavailable(_) | FailureKind::PredictorFailed(_)
        )
    }
}

impl From<LocateError> for FailureKind {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::PredictorUnavailable(reason) => FailureKind::PredictorUnavailable(reason),
            LocateError::Predictor(e) => FailureKind::PredictorFailed(e),
        }
    }
}

/// A run that could not produce a result.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {kind}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub kind: FailureKind,
}

/// Per-run switches.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Produce an annotated copy of the input.
    pub annotate: bool,
    /// Run gender and skin-tone classification on separate threads.
    pub parallel: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            annotate: false,
            parallel: true,
        }
    }
}

/// Everything needed to build the process-wide pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub face_model: PathBuf,
    /// Tried in order; the first that loads wins.
    pub gender_models: Vec<PathBuf>,
    /// Tried in order; the first that parses wins.
    pub catalog_paths: Vec<PathBuf>,
    pub face_confidence: f32,
    pub gender_threshold: f32,
    pub intra_threads: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            face_model: PathBuf::from("models/res10_300x300_ssd.onnx"),
            gender_models: vec![PathBuf::from("models/gender_prediction.onnx")],
            catalog_paths: vec![PathBuf::from("data/clothing_styles.json")],
            face_confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            gender_threshold: DEFAULT_GENDER_THRESHOLD,
            intra_threads: 2,
        }
    }
}

/// The four-stage recommendation pipeline.
///
/// Immutable after construction and `Send + Sync`; share one instance
/// (e.g. behind an `Arc`) across any number of concurrent runs.
pub struct RecommendationPipeline {
    locator: FaceLocator,
    skin_tone: SkinToneClassifier,
    gender: GenderClassifier,
    catalog: StyleCatalog,
}

impl RecommendationPipeline {
    pub fn new(locator: FaceLocator, gender: GenderClassifier, catalog: StyleCatalog) -> Self {
        Self {
            locator,
            skin_tone: SkinToneClassifier,
            gender,
            catalog,
        }
    }

    /// Load models and catalog once at process start.
    ///
    /// Never fails: a missing face model makes every run fail with
    /// `PredictorUnavailable`, a missing gender model yields `Unknown`, and
    /// a missing catalog yields the fallback entry for every lookup.
    pub fn initialize(settings: &PipelineSettings) -> Self {
        let locator = FaceLocator::load(
            &settings.face_model.to_string_lossy(),
            settings.face_confidence,
            settings.intra_threads,
        );
        let gender = GenderClassifier::load(
            &settings.gender_models,
            settings.gender_threshold,
            settings.intra_threads,
        );
        let catalog = StyleCatalog::load_first(&settings.catalog_paths);

        tracing::info!(
            face_detector = locator.is_available(),
            gender_model = gender.is_available(),
            catalog_buckets = catalog.len(),
            "pipeline initialized"
        );

        Self::new(locator, gender, catalog)
    }

    pub fn locator(&self) -> &FaceLocator {
        &self.locator
    }

    pub fn gender_classifier(&self) -> &GenderClassifier {
        &self.gender
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    /// Decode encoded image bytes, then [`run`](Self::run).
    pub fn run_bytes(
        &self,
        bytes: &[u8],
        options: &RunOptions,
    ) -> Result<RecommendationResult, PipelineFailure> {
        let image = guarded(Stage::Decode, || Ok(BgrImage::decode(bytes)?))?;
        self.run(&image, options)
    }

    pub fn run(
        &self,
        image: &BgrImage,
        options: &RunOptions,
    ) -> Result<RecommendationResult, PipelineFailure> {
        let faces = guarded(Stage::FaceDetection, || Ok(self.locator.locate(image)?))?;

        let Some(face) = FaceLocator::primary(&faces).copied() else {
            tracing::info!(width = image.width(), height = image.height(), "no face detected");
            return Ok(RecommendationResult::no_face());
        };
        if faces.len() > 1 {
            tracing::debug!(
                discarded = faces.len() - 1,
                "multiple faces detected; using the most confident"
            );
        }

        let (crop, sample) = guarded(Stage::CropExtraction, || {
            let crop = image.crop(&face)?;
            let sample = crop.channel_means();
            Ok((crop, sample))
        })?;

        let (gender, skin_tone) = if options.parallel {
            std::thread::scope(|s| {
                let gender_task = s.spawn(|| self.classify_gender(&crop));
                let skin_tone = self.classify_skin_tone(&sample);
                let gender = gender_task.join().unwrap_or_else(|payload| {
                    Err(PipelineFailure {
                        stage: Stage::GenderClassification,
                        kind: FailureKind::Panicked(panic_message(payload.as_ref())),
                    })
                });
                (gender, skin_tone)
            })
        } else {
            (self.classify_gender(&crop), self.classify_skin_tone(&sample))
        };
        let (gender, skin_tone) = (gender?, skin_tone?);

        let styles = guarded(Stage::CatalogLookup, || {
            Ok(self.catalog.lookup(skin_tone.bucket_name(), gender.as_str()))
        })?;

        tracing::info!(
            confidence = face.confidence,
            %gender,
            skin_tone = %skin_tone,
            styles = styles.len(),
            "recommendation ready"
        );

        Ok(RecommendationResult {
            face: Some(face),
            gender: Some(gender),
            skin_tone: Some(skin_tone),
            styles,
            annotated: options.annotate.then(|| annotate_face(image, &face)),
        })
    }

    fn classify_gender(&self, crop: &BgrImage) -> Result<Gender, PipelineFailure> {
        guarded(Stage::GenderClassification, || Ok(self.gender.classify(crop)?))
    }

    fn classify_skin_tone(
        &self,
        sample: &AverageColorSample,
    ) -> Result<SkinToneResult, PipelineFailure> {
        guarded(Stage::SkinToneClassification, || Ok(self.skin_tone.classify(sample)))
    }
}

/// Run one stage, mapping both errors and panics to a [`PipelineFailure`].
fn guarded<T>(
    stage: Stage,
    f: impl FnOnce() -> Result<T, FailureKind>,
) -> Result<T, PipelineFailure> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(kind)) => {
            tracing::warn!(%stage, error = %kind, "pipeline stage failed");
            Err(PipelineFailure { stage, kind })
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(%stage, panic = %message, "pipeline stage panicked");
            Err(PipelineFailure {
                stage,
                kind: FailureKind::Panicked(message),
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_passes_value_through() {
        let result = guarded(Stage::CatalogLookup, || Ok(7));
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_guarded_tags_errors_with_stage() {
        let result: Result<(), _> = guarded(Stage::CropExtraction, || {
            Err(FailureKind::MalformedInput(ImageError::ZeroDimensions))
        });
        let failure = result.unwrap_err();
        assert_eq!(failure.stage, Stage::CropExtraction);
        assert!(matches!(failure.kind, FailureKind::MalformedInput(_)));
    }

    #[test]
    fn test_guarded_catches_panics() {
        let result: Result<(), _> = guarded(Stage::GenderClassification, || panic!("model exploded"));
        let failure = result.unwrap_err();
        assert_eq!(failure.stage, Stage::GenderClassification);
        assert!(matches!(failure.kind, FailureKind::Panicked(ref m) if m == "model exploded"));
    }

    #[test]
    fn test_failure_display_names_stage() {
        let failure = PipelineFailure {
            stage: Stage::FaceDetection,
            kind: FailureKind::PredictorUnavailable("model missing".into()),
        };
        assert_eq!(
            failure.to_string(),
            "face_detection stage failed: predictor unavailable: model missing"
        );
    }

    #[test]
    fn test_locate_error_maps_to_failure_kind() {
        let kind: FailureKind = LocateError::PredictorUnavailable("gone".into()).into();
        assert!(matches!(kind, FailureKind::PredictorUnavailable(ref r) if r == "gone"));
    }

    #[test]
    fn test_predictor_faults_group_together() {
        let failed: FailureKind =
            LocateError::Predictor(PredictorError::InferenceFailed("nan".into())).into();
        assert!(matches!(failed, FailureKind::PredictorFailed(_)));
        assert!(failed.is_predictor_fault());
        assert!(FailureKind::PredictorUnavailable("gone".into()).is_predictor_fault());
        assert!(!FailureKind::MalformedInput(ImageError::ZeroDimensions).is_predictor_fault());
        assert!(!FailureKind::Panicked("boom".into()).is_predictor_fault());
    }

    #[test]
    fn test_run_bytes_rejects_garbage() {
        let pipeline = RecommendationPipeline::new(
            FaceLocator::unavailable("unused"),
            GenderClassifier::unavailable(),
            StyleCatalog::empty(),
        );
        let failure = pipeline.run_bytes(b"not an image", &RunOptions::default()).unwrap_err();
        assert_eq!(failure.stage, Stage::Decode);
        assert!(matches!(failure.kind, FailureKind::MalformedInput(ImageError::Decode(_))));
    }

    #[test]
    fn test_pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecommendationPipeline>();
    }
}
