use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facerec_core::{
    load_image, DetectorModel, EuclideanMatcher, Extraction, ExtractorOptions, FaceExtractor,
    KnownDescriptor, Matcher, OnnxExtractor, DEFAULT_MAX_DIMENSION, DEFAULT_TOLERANCE,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "facerec", about = "facerec face descriptor tools", version)]
struct Cli {
    #[command(flatten)]
    models: ModelArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArgs {
    /// Directory containing the ONNX model files
    #[arg(long, global = true, default_value = "models")]
    model_dir: PathBuf,
    /// Detector variant: "fast" or "accurate"
    #[arg(long, global = true, default_value = "accurate")]
    detector: DetectorModel,
    /// Times to double the detector canvas (0-2)
    #[arg(long, global = true, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=2))]
    upsample: u32,
    /// Jittered samples averaged per descriptor
    #[arg(long, global = true, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    jitters: u32,
    /// Downscale images larger than this on either side
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DIMENSION)]
    max_dimension: u32,
}

impl ModelArgs {
    fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            model_dir: self.model_dir.clone(),
            detector: self.detector,
            upsample: self.upsample,
            jitters: self.jitters,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the face descriptor of an image
    Descriptor {
        /// Image file
        image: PathBuf,
    },
    /// Find the closest known descriptor for the face in an image
    Search {
        /// Image file
        image: PathBuf,
        /// JSON file with an array of {"userId", "descriptor"} entries
        #[arg(short, long)]
        known: PathBuf,
        /// Maximum distance accepted as a match
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f32,
    },
    /// Check that the model files are present
    Models,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Descriptor { image } => {
            let mut extractor = load_extractor(&cli.models)?;
            let descriptor = extract(&mut extractor, &image, cli.models.max_dimension)?;
            println!("{}", json!({ "descriptor": descriptor }));
        }
        Commands::Search { image, known, tolerance } => {
            let candidates = read_known(&known)?;
            let mut extractor = load_extractor(&cli.models)?;
            let query = extract(&mut extractor, &image, cli.models.max_dimension)?;

            match EuclideanMatcher.best_match(Some(&query), &candidates, tolerance) {
                Some(m) => println!("{}", json!({ "matchedUserId": m.user_id, "distance": m.distance })),
                None => {
                    println!("No match within tolerance {tolerance} ({} candidates)", candidates.len());
                    std::process::exit(1);
                }
            }
        }
        Commands::Models => {
            let opts = cli.models.extractor_options();
            let mut missing = false;
            for path in [opts.detector_model_path(), opts.recognizer_model_path()] {
                let present = path.exists();
                missing |= !present;
                println!("{:<8} {}", if present { "ok" } else { "missing" }, path.display());
            }
            if missing {
                bail!("model files missing in {}", opts.model_dir.display());
            }
        }
    }

    Ok(())
}

fn load_extractor(models: &ModelArgs) -> Result<OnnxExtractor> {
    OnnxExtractor::load(&models.extractor_options()).context("failed to load face models")
}

fn extract(extractor: &mut OnnxExtractor, image: &Path, max_dimension: u32) -> Result<facerec_core::Descriptor> {
    let bytes = std::fs::read(image).with_context(|| format!("failed to read {}", image.display()))?;
    let pixels = load_image(&bytes, max_dimension).with_context(|| format!("failed to load {}", image.display()))?;

    match extractor.extract(&pixels) {
        Extraction::Descriptor(d) => Ok(d),
        Extraction::NoFace => bail!("no face detected in {}", image.display()),
        Extraction::Fault(reason) => bail!("face extraction failed: {reason}"),
    }
}

fn read_known(path: &Path) -> Result<Vec<KnownDescriptor>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))?;
    let Value::Array(items) = value else {
        bail!("{} must contain a JSON array", path.display());
    };
    Ok(KnownDescriptor::parse_list(&items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_args() {
        let cli = Cli::try_parse_from([
            "facerec", "--detector", "fast", "--jitters", "3", "search", "face.jpg", "--known", "known.json", "-t", "0.6",
        ])
        .unwrap();
        assert_eq!(cli.models.detector, DetectorModel::Fast);
        assert_eq!(cli.models.jitters, 3);
        match cli.command {
            Commands::Search { image, known, tolerance } => {
                assert_eq!(image, PathBuf::from("face.jpg"));
                assert_eq!(known, PathBuf::from("known.json"));
                assert!((tolerance - 0.6).abs() < 1e-6);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_search_default_tolerance() {
        let cli = Cli::try_parse_from(["facerec", "search", "face.jpg", "-k", "known.json"]).unwrap();
        match cli.command {
            Commands::Search { tolerance, .. } => assert_eq!(tolerance, DEFAULT_TOLERANCE),
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_rejects_zero_jitters() {
        assert!(Cli::try_parse_from(["facerec", "--jitters", "0", "models"]).is_err());
    }
}
