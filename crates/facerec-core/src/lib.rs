//! facerec-core: Face descriptor extraction and matching.
//!
//! Uses SCRFD for face detection and ArcFace for face descriptors, both
//! running via ONNX Runtime for CPU inference. Images are decoded and
//! normalized by [`loader`]; descriptors are compared by [`EuclideanMatcher`].

pub mod alignment;
pub mod detector;
pub mod extractor;
pub mod loader;
pub mod recognizer;
pub mod types;

pub use detector::DetectorModel;
pub use extractor::{Extraction, ExtractorOptions, FaceExtractor, OnnxExtractor};
pub use loader::{load_image, LoadError, PixelArray, DEFAULT_MAX_DIMENSION};
pub use types::{BoundingBox, Descriptor, EuclideanMatcher, KnownDescriptor, MatchResult, Matcher, DEFAULT_TOLERANCE};
