use facerec_core::{DetectorModel, ExtractorOptions, DEFAULT_MAX_DIMENSION, DEFAULT_TOLERANCE};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on (default: 3002).
    pub port: u16,
    /// Prefix for photo URLs that are not absolute (default: empty).
    pub public_api_url: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Detector variant: fast or accurate.
    pub detector: DetectorModel,
    /// Detector upsample factor, clamped to 0..=2.
    pub upsample: u32,
    /// Number of jittered samples averaged per descriptor.
    pub jitters: u32,
    /// Maximum Euclidean distance for a search match (default: 1.05).
    pub tolerance: f32,
    /// Images larger than this on either side are downscaled.
    pub max_dimension: u32,
    /// Timeout for downloading a photo.
    pub fetch_timeout: Duration,
    /// Upload and photo download limit in megabytes.
    pub body_limit_mb: usize,
}

impl Config {
    /// Load configuration from `PORT`, `PUBLIC_API_URL` and `FACEREC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Missing or
    /// unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let detector = match lookup("FACEREC_DETECTOR") {
            Some(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "invalid FACEREC_DETECTOR, using default");
                DetectorModel::default()
            }),
            None => DetectorModel::default(),
        };

        Self {
            port: parse_or(&lookup, "PORT", 3002),
            public_api_url: lookup("PUBLIC_API_URL").unwrap_or_default(),
            model_dir: lookup("FACEREC_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("models")),
            detector,
            upsample: parse_or(&lookup, "FACEREC_UPSAMPLE", 0u32)
                .min(facerec_core::detector::MAX_UPSAMPLE),
            jitters: parse_or(&lookup, "FACEREC_JITTERS", 1u32).max(1),
            tolerance: parse_or(&lookup, "FACEREC_TOLERANCE", DEFAULT_TOLERANCE),
            max_dimension: parse_or(&lookup, "FACEREC_MAX_DIMENSION", DEFAULT_MAX_DIMENSION).max(1),
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FACEREC_FETCH_TIMEOUT_SECS", 30u64)),
            body_limit_mb: parse_or(&lookup, "FACEREC_BODY_LIMIT_MB", 10usize),
        }
    }

    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            model_dir: self.model_dir.clone(),
            detector: self.detector,
            upsample: self.upsample,
            jitters: self.jitters,
        }
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
