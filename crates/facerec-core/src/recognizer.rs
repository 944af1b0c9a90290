//! ArcFace face recognizer via ONNX Runtime.
//!
//! Extracts 512-dimensional face descriptors from aligned face crops,
//! using the w600k_r50 ArcFace model.

use crate::alignment;
use crate::loader::PixelArray;
use crate::types::{BoundingBox, Descriptor};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use thiserror::Error;

// --- Named constants (different from SCRFD!) ---
const ARCFACE_INPUT_SIZE: usize = alignment::ALIGNED_SIZE as usize;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // NOT 128.0, ArcFace uses symmetric normalization
pub const ARCFACE_EMBEDDING_DIM: usize = 512;
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Max landmark shift for a jittered sample, as a fraction of the eye distance.
const JITTER_SHIFT: f32 = 0.04;
/// Max relative scale change for a jittered sample.
const JITTER_SCALE: f32 = 0.05;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}; download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks; detector must return landmarks for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Compute the descriptor of a detected face.
    ///
    /// The face must carry landmarks. With `jitters > 1`, additional samples
    /// are taken from slightly shifted and scaled alignments and the
    /// normalized embeddings are averaged. Jitter offsets are seeded by sample
    /// index, so the same input always gives the same descriptor.
    pub fn extract(
        &mut self,
        pixels: &PixelArray,
        face: &BoundingBox,
        jitters: u32,
    ) -> Result<Descriptor, RecognizerError> {
        let landmarks = face_landmarks(face)?;

        let mut sum = vec![0.0f32; ARCFACE_EMBEDDING_DIM];
        for sample in 0..jitters.max(1) {
            let points = if sample == 0 {
                *landmarks
            } else {
                jitter_landmarks(landmarks, sample)
            };
            let aligned = alignment::align_face(pixels, &points);
            let embedding = self.embed(&aligned)?;
            for (acc, v) in sum.iter_mut().zip(embedding) {
                *acc += v;
            }
        }

        Ok(Descriptor::new(l2_normalize(sum)))
    }

    /// Run the model on one aligned crop, returning an L2-normalized embedding.
    fn embed(&mut self, aligned: &RgbImage) -> Result<Vec<f32>, RecognizerError> {
        let input = preprocess(aligned);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw_data.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw_data.len()
            )));
        }

        Ok(l2_normalize(raw_data.to_vec()))
    }
}

/// The five alignment points of a detected face.
pub fn face_landmarks(face: &BoundingBox) -> Result<&[(f32, f32); 5], RecognizerError> {
    face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)
}

/// Preprocess a 112x112 RGB aligned face crop into a NCHW float tensor.
fn preprocess(aligned_face: &RgbImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in aligned_face.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel.0[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }

    tensor
}

/// Shift and scale landmarks around their centroid for one jitter sample.
fn jitter_landmarks(landmarks: &[(f32, f32); 5], sample: u32) -> [(f32, f32); 5] {
    let mut rng = StdRng::seed_from_u64(u64::from(sample));

    let eye_dist = ((landmarks[1].0 - landmarks[0].0).powi(2) + (landmarks[1].1 - landmarks[0].1).powi(2)).sqrt();
    let max_shift = eye_dist * JITTER_SHIFT;
    let shift_x = rng.gen_range(-1.0f32..=1.0) * max_shift;
    let shift_y = rng.gen_range(-1.0f32..=1.0) * max_shift;
    let scale = 1.0 + rng.gen_range(-JITTER_SCALE..=JITTER_SCALE);

    let cx = landmarks.iter().map(|p| p.0).sum::<f32>() / 5.0;
    let cy = landmarks.iter().map(|p| p.1).sum::<f32>() / 5.0;

    landmarks.map(|(x, y)| (cx + (x - cx) * scale + shift_x, cy + (y - cy) * scale + shift_y))
}

fn l2_normalize(values: Vec<f32>) -> Vec<f32> {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.into_iter().map(|x| x / norm).collect()
    } else {
        values
    }
}
