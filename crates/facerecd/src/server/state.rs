use std::sync::Arc;

use facerec_core::{ExtractorOptions, FaceExtractor, OnnxExtractor};

use super::error::ApiError;
use crate::config::Config;
use crate::engine::{spawn_engine, EngineHandle};
use crate::fetch::{FetchError, PhotoFetcher};

/// Whether the face models came up at startup.
///
/// Decided once by [`Readiness::initialize`] and never re-probed.
pub enum Readiness {
    Ready(EngineHandle),
    Unavailable { reason: String },
}

impl Readiness {
    /// Load the ONNX models and start the engine thread.
    pub fn initialize(options: &ExtractorOptions) -> Self {
        match OnnxExtractor::load(options) {
            Ok(extractor) => Self::with_extractor(extractor),
            Err(e) => {
                tracing::error!(error = %e, model_dir = %options.model_dir.display(), "face models failed to load");
                Readiness::Unavailable { reason: e.to_string() }
            }
        }
    }

    /// Start the engine thread around an already constructed extractor.
    pub fn with_extractor<E>(extractor: E) -> Self
    where
        E: FaceExtractor + Send + 'static,
    {
        match spawn_engine(extractor) {
            Ok(engine) => Readiness::Ready(engine),
            Err(e) => {
                tracing::error!(error = %e, "engine failed to start");
                Readiness::Unavailable { reason: e.to_string() }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }
}

/// Shared application state.
pub struct AppState {
    pub readiness: Readiness,
    pub fetcher: PhotoFetcher,
    /// Maximum distance for a search match.
    pub tolerance: f32,
    /// Bound on image sides after loading.
    pub max_dimension: u32,
}

impl AppState {
    pub fn new(readiness: Readiness, config: &Config) -> Result<Arc<Self>, FetchError> {
        Ok(Arc::new(AppState {
            readiness,
            fetcher: PhotoFetcher::new(
                config.public_api_url.clone(),
                config.fetch_timeout,
                config.body_limit_bytes(),
            )?,
            tolerance: config.tolerance,
            max_dimension: config.max_dimension,
        }))
    }

    /// The engine, or 503 when the models never loaded.
    pub fn engine(&self) -> Result<&EngineHandle, ApiError> {
        match &self.readiness {
            Readiness::Ready(engine) => Ok(engine),
            Readiness::Unavailable { .. } => Err(ApiError::ServiceUnavailable),
        }
    }
}
