//! ONNX Runtime utilities for optimized model loading
//!
//! Session construction with graph optimizations, execution providers and
//! thread tuning, plus a small helper to describe the model's input binding.

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Error type for ONNX operations
#[derive(Debug, thiserror::Error)]
pub enum OnnxError {
    #[error("Failed to create session builder: {0}")]
    SessionBuilderError(String),

    #[error("Failed to load ONNX model from {path}: {error}")]
    ModelLoadError { path: String, error: String },

    #[error("Model file not found: {0}")]
    ModelNotFound(String),
}

/// Get the cache directory for compiled CoreML models
///
/// Cache location priority:
/// 1. `CHECKFOOD_COREML_CACHE_DIR` (if set)
/// 2. `$HOME/.cache/checkfood/coreml`
/// 3. `$TMPDIR/checkfood-coreml`
fn get_coreml_cache_dir() -> String {
    let dir = if let Ok(dir) = std::env::var("CHECKFOOD_COREML_CACHE_DIR") {
        dir
    } else if let Ok(home) = std::env::var("HOME") {
        format!("{}/.cache/checkfood/coreml", home)
    } else {
        let temp_dir = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
        format!("{}/checkfood-coreml", temp_dir)
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("Failed to create CoreML cache directory {}: {}", dir, e);
    }
    dir
}

/// Create an optimized ONNX Runtime session
///
/// Execution providers are tried in order of performance:
/// 1. **CoreML** (macOS): Apple Neural Engine + GPU
/// 2. **CUDA** (NVIDIA GPUs)
/// 3. **CPU** (fallback): always available
///
/// If CoreML fails to compile the model the session is rebuilt with CUDA/CPU only.
///
/// # Arguments
/// * `model_path` - Path to the ONNX model file
/// * `intra_threads` - Intra-op thread count
pub fn create_optimized_session(
    model_path: &Path,
    intra_threads: usize,
) -> Result<Session, OnnxError> {
    if !model_path.exists() {
        return Err(OnnxError::ModelNotFound(model_path.display().to_string()));
    }

    let cache_dir = get_coreml_cache_dir();
    let start = Instant::now();

    let session = Session::builder()
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_intra_threads(intra_threads)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_memory_pattern(true)
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .with_execution_providers([
            CoreMLExecutionProvider::default()
                .with_subgraphs(true)
                .with_model_cache_dir(cache_dir.clone())
                .build(),
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ])
        .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
        .commit_from_file(model_path);

    match session {
        Ok(s) => {
            debug!(
                "Session created for model {} in {:.3}s (CoreML cache: {})",
                model_path.display(),
                start.elapsed().as_secs_f64(),
                cache_dir
            );
            Ok(s)
        }
        Err(e) => {
            let error_msg = e.to_string();
            if error_msg.contains("CoreML") || error_msg.contains("MLModel") {
                warn!(
                    "CoreML failed for {}: {}; retrying with CUDA/CPU only",
                    model_path.display(),
                    error_msg
                );

                Session::builder()
                    .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
                    .with_optimization_level(GraphOptimizationLevel::Level3)
                    .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
                    .with_intra_threads(intra_threads)
                    .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
                    .with_memory_pattern(true)
                    .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
                    .with_execution_providers([
                        CUDAExecutionProvider::default().build(),
                        CPUExecutionProvider::default().build(),
                    ])
                    .map_err(|e| OnnxError::SessionBuilderError(e.to_string()))?
                    .commit_from_file(model_path)
                    .map_err(|e| OnnxError::ModelLoadError {
                        path: model_path.display().to_string(),
                        error: format!("CoreML failed, CPU/CUDA also failed: {}", e),
                    })
            } else {
                Err(OnnxError::ModelLoadError {
                    path: model_path.display().to_string(),
                    error: error_msg,
                })
            }
        }
    }
}

/// Name and type of the first model input, for startup logging
pub fn describe_first_input(session: &Session) -> Option<(String, String)> {
    session
        .inputs
        .first()
        .map(|input| (input.name.clone(), format!("{:?}", input.input_type)))
}

/// Number of outputs the model graph declares
pub fn output_count(session: &Session) -> usize {
    session.outputs.len()
}
