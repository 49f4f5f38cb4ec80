mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use drape_core::{
    AverageColorSample, RecommendationPipeline, RecommendationResult, RunOptions,
    SkinToneClassifier, StyleCatalog,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "drape", about = "Clothing-style recommendations from a face photo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend clothing styles for one or more photos
    Recommend {
        /// Image files (any format the `image` crate decodes)
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Write a copy of each photo with the detected face outlined
        #[arg(long)]
        annotate_dir: Option<PathBuf>,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
        /// Classify gender and skin tone one after the other
        #[arg(long)]
        sequential: bool,
    },
    /// Classify a raw average face color given as B G R
    Tone { b: u8, g: u8, r: u8 },
    /// Look up catalog styles for a skin tone and gender
    Styles {
        /// Bucket label, optionally with its " - ... Undertone" suffix
        skin_tone: String,
        /// "Male" or "Female"
        gender: String,
    },
    /// Show which models and catalog entries load
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Recommend {
            images,
            annotate_dir,
            json,
            sequential,
        } => {
            let options = RunOptions {
                annotate: annotate_dir.is_some(),
                parallel: !sequential,
            };
            recommend(&config, images, annotate_dir, json, options).await?;
        }
        Commands::Tone { b, g, r } => {
            let sample = AverageColorSample::new(b as f64, g as f64, r as f64);
            let result = SkinToneClassifier.classify(&sample);
            println!("{result} (hue {})", result.hue);
        }
        Commands::Styles { skin_tone, gender } => {
            let catalog = StyleCatalog::load_first(&config.catalog_paths());
            let bucket = strip_undertone(&skin_tone);
            for style in catalog.lookup(bucket, &gender) {
                println!("{style}");
            }
        }
        Commands::Status => {
            let pipeline = RecommendationPipeline::initialize(&config.pipeline_settings());
            let status = json!({
                "face_detector": {
                    "path": config.face_model_path(),
                    "loaded": pipeline.locator().is_available(),
                    "confidence_threshold": pipeline.locator().confidence_threshold(),
                },
                "gender_model": {
                    "candidates": config.gender_model_paths(),
                    "loaded": pipeline.gender_classifier().is_available(),
                    "threshold": pipeline.gender_classifier().threshold(),
                },
                "catalog": {
                    "candidates": config.catalog_paths(),
                    "buckets": pipeline.catalog().buckets().collect::<Vec<_>>(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn recommend(
    config: &Config,
    images: Vec<PathBuf>,
    annotate_dir: Option<PathBuf>,
    json: bool,
    options: RunOptions,
) -> Result<()> {
    let settings = config.pipeline_settings();
    let pipeline = Arc::new(
        tokio::task::spawn_blocking(move || RecommendationPipeline::initialize(&settings)).await?,
    );

    if let Some(dir) = &annotate_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let tasks: Vec<_> = images
        .into_iter()
        .map(|path| {
            let pipeline = Arc::clone(&pipeline);
            tokio::task::spawn_blocking(move || {
                let outcome = std::fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))
                    .and_then(|bytes| Ok(pipeline.run_bytes(&bytes, &options)?));
                (path, outcome)
            })
        })
        .collect();

    let mut failed = 0usize;
    for task in tasks {
        let (path, outcome) = task.await?;
        if !report(&path, outcome, annotate_dir.as_deref(), json) {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} image(s) could not be processed");
    }
    Ok(())
}

/// Print one image's outcome and write its annotated copy.
/// Returns `false` when the image counts as failed.
fn report(
    path: &Path,
    outcome: Result<RecommendationResult>,
    annotate_dir: Option<&Path>,
    json: bool,
) -> bool {
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            print_error(path, &e, json);
            return false;
        }
    };

    if json {
        println!("{}", result_json(path, &result));
    } else {
        print_result(path, &result);
    }

    if let (Some(dir), Some(annotated)) = (annotate_dir, &result.annotated) {
        let out = annotated_path(dir, path);
        if let Err(e) = annotated
            .save(&out)
            .with_context(|| format!("failed to write {}", out.display()))
        {
            print_error(path, &e, json);
            return false;
        }
        tracing::info!(path = %out.display(), "annotated image written");
    }
    true
}

fn print_error(path: &Path, error: &anyhow::Error, json: bool) {
    if json {
        println!("{}", error_json(path, error));
    } else {
        eprintln!("{}: {error:#}", path.display());
    }
}

fn print_result(path: &Path, result: &RecommendationResult) {
    println!("{}", path.display());
    let (Some(gender), Some(skin_tone)) = (result.gender, result.skin_tone) else {
        println!("  no face detected");
        return;
    };
    println!("  gender:    {gender}");
    println!("  skin tone: {skin_tone}");
    println!("  styles:");
    for style in &result.styles {
        println!("    - {style}");
    }
}

fn result_json(path: &Path, result: &RecommendationResult) -> serde_json::Value {
    json!({
        "image": path,
        "face_detected": result.face_detected(),
        "face": result.face,
        "gender": result.gender,
        "skin_tone": result.skin_tone.map(|t| t.to_string()),
        "clothing_styles": result.styles,
    })
}

fn error_json(path: &Path, error: &anyhow::Error) -> serde_json::Value {
    let failure = error.downcast_ref::<drape_core::PipelineFailure>();
    json!({
        "image": path,
        "error": format!("{error:#}"),
        "stage": failure.map(|f| f.stage),
        "predictor_fault": failure.is_some_and(|f| f.kind.is_predictor_fault()),
    })
}

/// `photo.jpg` → `<dir>/photo_annotated.png`
fn annotated_path(dir: &Path, image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{stem}_annotated.png"))
}

/// Catalog key from a full skin-tone string: `"X - Warm Undertone"` → `"X"`.
fn strip_undertone(skin_tone: &str) -> &str {
    skin_tone
        .split_once(" -")
        .map_or(skin_tone, |(bucket, _)| bucket)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drape_core::{FaceBox, Gender, SkinTone, SkinToneResult, Stage, Undertone};

    #[test]
    fn test_strip_undertone() {
        assert_eq!(
            strip_undertone("Golden Beige (Medium) - Warm Undertone"),
            "Golden Beige (Medium)"
        );
        assert_eq!(strip_undertone("Espresso (Dark)"), "Espresso (Dark)");
        assert_eq!(strip_undertone("  Ivory  "), "Ivory");
    }

    #[test]
    fn test_annotated_path() {
        assert_eq!(
            annotated_path(Path::new("out"), Path::new("/photos/me.jpg")),
            PathBuf::from("out/me_annotated.png")
        );
    }

    #[test]
    fn test_result_json_fields() {
        let result = RecommendationResult {
            face: Some(FaceBox { x: 1, y: 2, width: 3, height: 4, confidence: 0.9 }),
            gender: Some(Gender::Female),
            skin_tone: Some(SkinToneResult {
                tone: SkinTone::GoldenBeige,
                undertone: Undertone::Warm,
                hue: 55,
            }),
            styles: vec!["Coral wrap dress".into()],
            annotated: None,
        };
        let value = result_json(Path::new("a.jpg"), &result);
        assert_eq!(value["image"], "a.jpg");
        assert_eq!(value["face_detected"], true);
        assert_eq!(value["gender"], "Female");
        assert_eq!(value["skin_tone"], "Golden Beige (Medium) - Warm Undertone");
        assert_eq!(value["clothing_styles"][0], "Coral wrap dress");
    }

    #[test]
    fn test_no_face_json() {
        let value = result_json(Path::new("b.png"), &RecommendationResult::no_face());
        assert_eq!(value["face_detected"], false);
        assert!(value["gender"].is_null());
        assert_eq!(value["clothing_styles"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_error_json_reports_stage() {
        let failure = drape_core::PipelineFailure {
            stage: Stage::Decode,
            kind: drape_core::pipeline::FailureKind::Panicked("boom".into()),
        };
        let value = error_json(Path::new("c.jpg"), &anyhow::Error::new(failure));
        assert_eq!(value["stage"], "decode");
        assert_eq!(value["predictor_fault"], false);

        let io = anyhow::anyhow!("failed to read c.jpg");
        assert!(error_json(Path::new("c.jpg"), &io)["stage"].is_null());
    }

    #[test]
    fn test_annotation_write_failure_counts_as_failed() {
        let annotated_result = || RecommendationResult {
            face: Some(FaceBox { x: 0, y: 0, width: 2, height: 2, confidence: 0.9 }),
            gender: Some(Gender::Male),
            skin_tone: None,
            styles: vec!["Navy peacoat".into()],
            annotated: Some(image::RgbImage::new(4, 4)),
        };
        let missing = std::env::temp_dir()
            .join(format!("drape-missing-{}", std::process::id()))
            .join("nested");

        assert!(!report(Path::new("a.jpg"), Ok(annotated_result()), Some(&missing), true));
        // Later images still report normally
        assert!(report(Path::new("b.jpg"), Ok(annotated_result()), None, true));
        assert!(!report(Path::new("c.jpg"), Err(anyhow::anyhow!("unreadable")), None, true));
    }

    #[test]
    fn test_annotation_written_to_dir() {
        let dir = std::env::temp_dir().join(format!("drape-annotate-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let result = RecommendationResult {
            annotated: Some(image::RgbImage::new(4, 4)),
            ..RecommendationResult::no_face()
        };

        assert!(report(Path::new("/photos/me.jpg"), Ok(result), Some(&dir), true));
        assert!(dir.join("me_annotated.png").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
