//! Descriptor extraction: detection followed by recognition on one face.

use crate::detector::{DetectorError, DetectorModel, FaceDetector};
use crate::loader::PixelArray;
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_MODEL_FILE};
use crate::types::{BoundingBox, Descriptor};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Outcome of running the extractor on one image.
///
/// `NoFace` and `Fault` are kept apart so a runtime failure is never reported
/// as a missing face.
#[derive(Debug, Clone)]
pub enum Extraction {
    Descriptor(Descriptor),
    NoFace,
    Fault(String),
}

/// Anything that turns an image into at most one face descriptor.
pub trait FaceExtractor {
    fn extract(&mut self, pixels: &PixelArray) -> Extraction;
}

/// Model selection and sampling knobs for [`OnnxExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub model_dir: PathBuf,
    pub detector: DetectorModel,
    /// Number of times the detector canvas is doubled.
    pub upsample: u32,
    /// Number of samples averaged per descriptor (at least 1).
    pub jitters: u32,
}

impl ExtractorOptions {
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(self.detector.file_name())
    }

    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join(ARCFACE_MODEL_FILE)
    }
}

/// SCRFD + ArcFace extractor.
pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    jitters: u32,
}

impl OnnxExtractor {
    /// Load both models. Fails fast if either file is missing or invalid.
    pub fn load(options: &ExtractorOptions) -> Result<Self, ExtractorError> {
        let detector = FaceDetector::load(&path_str(&options.detector_model_path()), options.upsample)?;
        let recognizer = FaceRecognizer::load(&path_str(&options.recognizer_model_path()))?;

        Ok(Self {
            detector,
            recognizer,
            jitters: options.jitters.max(1),
        })
    }

    fn try_extract(&mut self, pixels: &PixelArray) -> Result<Option<Descriptor>, ExtractorError> {
        let faces = self.detector.detect(pixels)?;
        if faces.is_empty() {
            tracing::info!(width = pixels.width(), height = pixels.height(), "no face found in image");
        }

        let (recognizer, jitters) = (&mut self.recognizer, self.jitters);
        describe_first_face(&faces, |face| recognizer.extract(pixels, face, jitters))
    }
}

impl FaceExtractor for OnnxExtractor {
    fn extract(&mut self, pixels: &PixelArray) -> Extraction {
        classify(self.try_extract(pixels))
    }
}

/// Detector order is by descending confidence; the first face wins.
fn select_face(faces: &[BoundingBox]) -> Option<&BoundingBox> {
    if faces.len() > 1 {
        tracing::info!(count = faces.len(), "multiple faces found, using the first");
    }
    faces.first()
}

/// Describe the selected face. A face the recognizer cannot align counts as
/// no face; any other recognizer error is passed through.
fn describe_first_face<F>(faces: &[BoundingBox], describe: F) -> Result<Option<Descriptor>, ExtractorError>
where
    F: FnOnce(&BoundingBox) -> Result<Descriptor, RecognizerError>,
{
    let Some(face) = select_face(faces) else {
        return Ok(None);
    };

    match describe(face) {
        Ok(descriptor) => Ok(Some(descriptor)),
        Err(RecognizerError::NoLandmarks) => {
            tracing::info!("selected face has no landmarks, descriptor not computed");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn classify(result: Result<Option<Descriptor>, ExtractorError>) -> Extraction {
    match result {
        Ok(Some(descriptor)) => Extraction::Descriptor(descriptor),
        Ok(None) => Extraction::NoFace,
        Err(e) => {
            tracing::error!(error = %e, "face extraction failed");
            Extraction::Fault(e.to_string())
        }
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
