//! Image acquisition: decoding uploads and files, working-size
//! normalization, and JPEG encoding for handoff to the workflows.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;
use std::path::Path;

use crate::inference::InferenceError;

/// File extensions accepted by both entry points.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const MAX_IMAGE_SIDE: u32 = 20_000;
const JPEG_QUALITY: u8 = 90;

/// True when `name` ends in one of [`SUPPORTED_EXTENSIONS`] (case-insensitive).
pub fn is_supported_image(name: &Path) -> bool {
    name.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Decode an uploaded image buffer to RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes).context("decode image")?;
    check_dimensions(image.width(), image.height())?;
    Ok(image.into_rgb8())
}

/// Open an image file at native resolution as RGB.
pub fn open_image(path: &Path) -> Result<RgbImage> {
    let image =
        image::open(path).with_context(|| format!("failed to open image {}", path.display()))?;
    check_dimensions(image.width(), image.height())?;
    Ok(image.into_rgb8())
}

/// Resize to the fixed square working resolution used by the interactive
/// path. Aspect ratio is not preserved.
pub fn resize_to_working(image: &RgbImage, size: u32) -> RgbImage {
    if image.dimensions() == (size, size) {
        return image.clone();
    }
    image::imageops::resize(image, size, size, FilterType::CatmullRom)
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, InferenceError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|e| InferenceError::Encode(e.to_string()))?;
    Ok(bytes)
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(anyhow!("image has zero dimensions"));
    }
    if width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
        return Err(anyhow!(
            "image {}x{} exceeds the {} pixel side limit",
            width,
            height,
            MAX_IMAGE_SIDE
        ));
    }
    Ok(())
}
