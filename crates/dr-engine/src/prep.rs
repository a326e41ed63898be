use dr_core::{Error, Result};
use image::{DynamicImage, RgbImage};

/// Decode raw upload bytes into an image, format sniffed from the bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::InvalidInput(format!("invalid image: {e}")))
}

/// Normalize to the three-channel full-range color model the edit model
/// expects. Alpha is dropped, grayscale and paletted inputs are expanded.
pub fn normalize(image: &DynamicImage) -> RgbImage {
    image.to_rgb8()
}
