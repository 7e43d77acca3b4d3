//! Image decoding for uploaded photos
//!
//! Photos arrive as encoded bytes in any common container (JPEG, PNG, WebP,
//! BMP, GIF). The format is sniffed from the magic bytes, never from a file
//! name, and the result is always a 3-channel RGB buffer.

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during image I/O operations
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Empty image payload")]
    Empty,
}

/// Decode encoded image bytes into an RGB image
///
/// # Example
/// ```no_run
/// use checkfood_core::image_io::decode_image;
/// let bytes = std::fs::read("lunch.jpg")?;
/// let img = decode_image(&bytes)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let format = image::guess_format(bytes)
        .map_err(|e| ImageError::DecodeError(format!("Unrecognized image format: {e}")))?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeError(format!("Failed to decode {format:?}: {e}")))?;

    debug!(
        "Decoded {:?} image ({}x{})",
        format,
        img.width(),
        img.height()
    );

    Ok(img.to_rgb8())
}
