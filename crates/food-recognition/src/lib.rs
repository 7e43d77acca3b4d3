//! Food recognition from a single meal photo
//!
//! This crate turns encoded photo bytes into up to three ranked food
//! candidates, each with an optional calorie estimate from the model's
//! regression head.
//!
//! # Features
//! - Backend probing in priority order: multi-task ONNX, legacy ONNX,
//!   TorchScript (`pytorch` feature)
//! - Bicubic resize + ImageNet normalization to a `[1, 3, 384, 384]` tensor
//! - Class index → name mapping from `idx_to_class.json`
//! - Fixed dummy result when no model is usable or inference fails
//!
//! # Example
//! ```no_run
//! use checkfood_core::RecognitionConfig;
//! use checkfood_recognition::{InferenceEngine, LabelTable, Predictor, Preprocessor};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = RecognitionConfig::default();
//! let engine = InferenceEngine::probe(&config.model_candidates(), config.threads());
//! let labels = LabelTable::discover(&config.label_candidates());
//! let predictor = Predictor::new(
//!     Arc::new(engine),
//!     Arc::new(labels),
//!     Preprocessor::new(config.input_size),
//! );
//!
//! let bytes = std::fs::read("lunch.jpg")?;
//! for entry in predictor.predict(&bytes, 3)?.entries {
//!     println!("{}: {:.1}%", entry.name, entry.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod labels;
pub mod predictor;
pub mod preprocess;

#[cfg(feature = "pytorch")]
pub mod torchscript;

pub use engine::{
    BackendState, EngineStatus, InferenceEngine, InferenceError, ModelOutput, ModelRunner,
    OnnxRunner, ProbeFailure, ProbeFailureReason,
};
pub use labels::{LabelError, LabelTable};
pub use predictor::{dummy_prediction, rank_top_k, Predictor, DUMMY_FOODS};
pub use preprocess::{PreprocessError, Preprocessor, DEFAULT_INPUT_SIZE};
