//! CheckFood Core - shared runtime plumbing for the recognition pipeline
//!
//! Model session construction, image decoding and runtime configuration used
//! by the recognition and service crates.

pub mod config;
pub mod image_io;
pub mod onnx_utils;

pub use config::{ConfigError, ModelCandidate, ModelFormat, RecognitionConfig};
pub use image_io::{decode_image, ImageError};
pub use onnx_utils::{create_optimized_session, OnnxError};
