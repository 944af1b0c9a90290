//! Image loader: decode, orientation correction, downscaling.
//!
//! Every image handed to the detector goes through [`load_image`], so the
//! rest of the pipeline only ever sees upright 8-bit RGB of bounded size.

use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::io::Cursor;
use thiserror::Error;

/// Default bound on either image side after loading.
pub const DEFAULT_MAX_DIMENSION: u32 = 1000;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("image buffer is empty")]
    Empty,
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// An upright RGB raster, row-major, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct PixelArray(RgbImage);

impl PixelArray {
    /// Wrap raw RGB bytes. Returns `None` if `data` is not `width * height * 3` long.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Raw RGB bytes.
    pub fn data(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.0
    }
}

impl From<RgbImage> for PixelArray {
    fn from(image: RgbImage) -> Self {
        Self(image)
    }
}

/// Decode an encoded image (JPEG, PNG, WebP, ...) into a normalized [`PixelArray`].
///
/// The format is guessed from the content. EXIF orientation is applied, and
/// images larger than `max_dimension` on either side are downscaled with a
/// Lanczos filter, preserving the aspect ratio.
pub fn load_image(bytes: &[u8], max_dimension: u32) -> Result<PixelArray, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let image = DynamicImage::from_decoder(decoder)?;

    let (src_w, src_h) = (image.width(), image.height());
    let pixels = normalize(image, orientation, max_dimension);

    tracing::debug!(
        src_width = src_w,
        src_height = src_h,
        ?orientation,
        width = pixels.width(),
        height = pixels.height(),
        "image loaded"
    );

    Ok(pixels)
}

/// Apply orientation, bound the size and convert to RGB.
fn normalize(mut image: DynamicImage, orientation: Orientation, max_dimension: u32) -> PixelArray {
    image.apply_orientation(orientation);

    let max_dimension = max_dimension.max(1);
    if image.width() > max_dimension || image.height() > max_dimension {
        image = image.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    PixelArray(image.into_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_load_png_rgb() {
        let img = RgbImage::from_pixel(20, 10, Rgb([10, 20, 30]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let pixels = load_image(&bytes, DEFAULT_MAX_DIMENSION).unwrap();
        assert_eq!((pixels.width(), pixels.height()), (20, 10));
        assert_eq!(pixels.data().len(), 20 * 10 * 3);
        assert_eq!(&pixels.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_load_converts_grayscale_and_alpha_to_rgb() {
        let gray = GrayImage::from_pixel(4, 4, Luma([77]));
        let pixels = load_image(&encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png), 1000).unwrap();
        assert_eq!(pixels.data().len(), 4 * 4 * 3);
        assert!(pixels.data().iter().all(|&v| v == 77));

        let rgba = RgbaImage::from_pixel(3, 3, image::Rgba([1, 2, 3, 128]));
        let pixels = load_image(&encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png), 1000).unwrap();
        assert_eq!(pixels.data().len(), 3 * 3 * 3);
    }

    #[test]
    fn test_load_downscales_preserving_aspect() {
        let img = RgbImage::from_pixel(2000, 1000, Rgb([128, 128, 128]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let pixels = load_image(&bytes, 1000).unwrap();
        assert_eq!((pixels.width(), pixels.height()), (1000, 500));
    }

    #[test]
    fn test_load_keeps_small_images() {
        let img = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let pixels = load_image(&bytes, 1000).unwrap();
        assert_eq!((pixels.width(), pixels.height()), (640, 480));
    }

    #[test]
    fn test_load_rejects_empty_and_garbage() {
        assert!(matches!(load_image(&[], 1000), Err(LoadError::Empty)));
        assert!(load_image(b"definitely not an image", 1000).is_err());
    }

    #[test]
    fn test_normalize_applies_orientation() {
        let mut img = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let pixels = normalize(DynamicImage::ImageRgb8(img), Orientation::Rotate90, 1000);
        assert_eq!((pixels.width(), pixels.height()), (2, 4));
        // Top-left pixel moves to the top-right corner after a clockwise turn.
        assert_eq!(pixels.image().get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_pixel_array_from_raw_checks_length() {
        assert!(PixelArray::from_raw(2, 2, vec![0; 12]).is_some());
        assert!(PixelArray::from_raw(2, 2, vec![0; 11]).is_none());
    }
}
