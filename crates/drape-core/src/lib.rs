//! drape-core: photo-to-outfit recommendation engine.
//!
//! Locates the face with an SSD detector, buckets the skin tone by hue,
//! classifies gender with a small CNN (both via ONNX Runtime), and looks
//! the pair up in a clothing-style catalog.

pub mod annotate;
pub mod catalog;
pub mod detector;
pub mod frame;
pub mod gender;
pub mod onnx;
pub mod pipeline;
pub mod predictor;
pub mod skin_tone;
pub mod types;

pub use catalog::{StyleCatalog, NO_STYLES_FOUND};
pub use detector::FaceLocator;
pub use frame::BgrImage;
pub use gender::GenderClassifier;
pub use pipeline::{PipelineFailure, PipelineSettings, RecommendationPipeline, RunOptions, Stage};
pub use predictor::{FacePredictor, GenderPredictor, PredictorError, RawDetection};
pub use skin_tone::{SkinTone, SkinToneClassifier, SkinToneResult, Undertone};
pub use types::{AverageColorSample, FaceBox, Gender, RecommendationResult};
