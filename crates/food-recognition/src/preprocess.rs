//! Photo → model input tensor
//!
//! decode → RGB → resize to a fixed square (no aspect preservation) →
//! per-channel normalization on the 0-255 scale → NCHW with batch size 1.

use checkfood_core::image_io::{decode_image, ImageError};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use thiserror::Error;

/// Default square input edge of the food model
pub const DEFAULT_INPUT_SIZE: u32 = 384;

/// ImageNet channel means scaled to 0-255
pub const CHANNEL_MEAN: [f32; 3] = [0.485 * 255.0, 0.456 * 255.0, 0.406 * 255.0];
/// ImageNet channel standard deviations scaled to 0-255
pub const CHANNEL_STD: [f32; 3] = [0.229 * 255.0, 0.224 * 255.0, 0.225 * 255.0];

/// Preprocessing failures; only decoding can fail
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] ImageError),
}

/// Turns encoded photos into `[1, 3, S, S]` float tensors
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

impl Preprocessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            mean: CHANNEL_MEAN,
            std: CHANNEL_STD,
            // Bicubic, the resampling the model was trained with
            filter: FilterType::CatmullRom,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Decode and preprocess encoded image bytes
    ///
    /// # Errors
    /// Returns [`PreprocessError::Decode`] for bytes that are not a decodable image.
    pub fn preprocess(&self, image_bytes: &[u8]) -> Result<Array4<f32>, PreprocessError> {
        let image = decode_image(image_bytes)?;
        Ok(self.preprocess_image(&image))
    }

    /// Preprocess an already decoded RGB image
    pub fn preprocess_image(&self, image: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = if image.dimensions() == (size, size) {
            image.clone()
        } else {
            image::imageops::resize(image, size, size, self.filter)
        };

        let mut input = Array4::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                input[[0, c, y, x]] = (f32::from(pixel[c]) - self.mean[c]) / self.std[c];
            }
        }
        input
    }
}
