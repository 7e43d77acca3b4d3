//! Model backend discovery and raw inference
//!
//! At startup the engine walks the model candidates in priority order
//! (multi-task ONNX, legacy ONNX, TorchScript). The first candidate that
//! exists *and* loads becomes the active backend; every rejected candidate is
//! recorded with its reason. If nothing loads the engine stays
//! [`BackendState::Unavailable`] for the life of the process.
//!
//! Backends sit behind the [`ModelRunner`] trait so the predictor can be
//! exercised with in-memory fakes.

use checkfood_core::config::{ModelCandidate, ModelFormat};
use checkfood_core::onnx_utils::{create_optimized_session, describe_first_input, output_count};
use ndarray::ArrayView4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by a single inference call
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("No model backend is available")]
    Unavailable,

    #[error("ONNX Runtime error: {0}")]
    OrtError(#[from] ort::Error),

    #[error("Backend runtime error: {0}")]
    Runtime(String),

    #[error("Model produced no outputs")]
    EmptyOutput,

    #[error("Invalid classification output shape: {0:?}")]
    InvalidOutputShape(Vec<i64>),
}

/// What one forward pass returned
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Class scores only
    Classification { scores: Vec<f32> },
    /// Class scores plus a calorie regression vector indexed by rank position
    WithCalories { scores: Vec<f32>, calories: Vec<f32> },
}

impl ModelOutput {
    /// Build from raw output arrays: `[0]` is the class-score vector, `[1]`
    /// (optional) the calorie vector; any further outputs are ignored
    pub fn from_arrays(arrays: Vec<Vec<f32>>) -> Result<Self, InferenceError> {
        let mut arrays = arrays.into_iter();
        let scores = arrays.next().ok_or(InferenceError::EmptyOutput)?;
        Ok(match arrays.next() {
            Some(calories) => ModelOutput::WithCalories { scores, calories },
            None => ModelOutput::Classification { scores },
        })
    }

    pub fn scores(&self) -> &[f32] {
        match self {
            ModelOutput::Classification { scores } | ModelOutput::WithCalories { scores, .. } => {
                scores
            }
        }
    }

    pub fn calories(&self) -> Option<&[f32]> {
        match self {
            ModelOutput::Classification { .. } => None,
            ModelOutput::WithCalories { calories, .. } => Some(calories),
        }
    }
}

/// A loaded model that can run one forward pass
///
/// Implementations serialize access internally if their runtime requires it.
pub trait ModelRunner: Send + Sync {
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError>;
}

/// ONNX Runtime backend
///
/// `Session::run` needs exclusive access, so the session sits in a mutex and
/// concurrent requests queue on it.
pub struct OnnxRunner {
    session: Mutex<Session>,
}

impl OnnxRunner {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, ProbeFailureReason> {
        let session = create_optimized_session(model_path, intra_threads)
            .map_err(|e| ProbeFailureReason::LoadFailed(e.to_string()))?;

        if let Some((name, input_type)) = describe_first_input(&session) {
            info!("ONNX input: {} ({})", name, input_type);
        }
        debug!("ONNX model declares {} outputs", output_count(&session));

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl ModelRunner for OnnxRunner {
    fn run(&self, input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
        // A panic in an earlier run must not disable the backend
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        let input_tensor = TensorRef::from_array_view(input)?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        // Only the first two outputs carry meaning: class scores, then calories
        let mut arrays = Vec::with_capacity(2);
        for idx in 0..outputs.len().min(2) {
            let (shape, data) = outputs[idx].try_extract_tensor::<f32>()?;
            if idx == 0 && !is_single_row(shape) {
                return Err(InferenceError::InvalidOutputShape(shape.to_vec()));
            }
            arrays.push(data.to_vec());
        }

        ModelOutput::from_arrays(arrays)
    }
}

/// `[C]` or `[1, C]`
fn is_single_row(shape: &[i64]) -> bool {
    match shape {
        [_] => true,
        [1, _] => true,
        _ => false,
    }
}

/// Why a model candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailureReason {
    /// The file does not exist
    NotFound,
    /// The runtime for this format is not part of this build
    RuntimeMissing(String),
    /// The file exists but could not be loaded (corrupt, incompatible, ...)
    LoadFailed(String),
}

impl std::fmt::Display for ProbeFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailureReason::NotFound => write!(f, "not found"),
            ProbeFailureReason::RuntimeMissing(msg) => write!(f, "runtime missing: {}", msg),
            ProbeFailureReason::LoadFailed(msg) => write!(f, "load failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub format: ModelFormat,
    pub path: PathBuf,
    pub reason: ProbeFailureReason,
}

/// Selected once at startup, fixed afterwards
pub enum BackendState {
    Ready {
        format: ModelFormat,
        path: PathBuf,
        runner: Box<dyn ModelRunner>,
    },
    Unavailable {
        failures: Vec<ProbeFailure>,
    },
}

/// Serializable snapshot of the engine state
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub available: bool,
    pub format: Option<ModelFormat>,
    pub model_path: Option<PathBuf>,
    pub probe_failures: Vec<String>,
}

/// Owns the active model backend
pub struct InferenceEngine {
    state: BackendState,
}

impl InferenceEngine {
    /// Probe candidates with the built-in loaders
    pub fn probe(candidates: &[ModelCandidate], intra_threads: usize) -> Self {
        Self::probe_with(candidates, |candidate| {
            load_candidate(candidate, intra_threads)
        })
    }

    /// Probe candidates in order with a custom loader; first success wins
    pub fn probe_with<F>(candidates: &[ModelCandidate], mut loader: F) -> Self
    where
        F: FnMut(&ModelCandidate) -> Result<Box<dyn ModelRunner>, ProbeFailureReason>,
    {
        let mut failures = Vec::new();

        for candidate in candidates {
            if !candidate.path.exists() {
                info!(
                    "Model candidate {} not found: {}",
                    candidate.format,
                    candidate.path.display()
                );
                failures.push(ProbeFailure {
                    format: candidate.format,
                    path: candidate.path.clone(),
                    reason: ProbeFailureReason::NotFound,
                });
                continue;
            }

            info!(
                "Loading {} model: {}",
                candidate.format,
                candidate.path.display()
            );
            match loader(candidate) {
                Ok(runner) => {
                    info!(
                        "Model backend ready: {} ({})",
                        candidate.format,
                        candidate.path.display()
                    );
                    return Self {
                        state: BackendState::Ready {
                            format: candidate.format,
                            path: candidate.path.clone(),
                            runner,
                        },
                    };
                }
                Err(reason) => {
                    warn!(
                        "Model candidate {} rejected ({}): {}",
                        candidate.format,
                        candidate.path.display(),
                        reason
                    );
                    failures.push(ProbeFailure {
                        format: candidate.format,
                        path: candidate.path.clone(),
                        reason,
                    });
                }
            }
        }

        warn!("No usable model found; running in dummy mode");
        Self {
            state: BackendState::Unavailable { failures },
        }
    }

    /// Wrap an already loaded runner
    pub fn with_runner(format: ModelFormat, path: impl Into<PathBuf>, runner: Box<dyn ModelRunner>) -> Self {
        Self {
            state: BackendState::Ready {
                format,
                path: path.into(),
                runner,
            },
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            state: BackendState::Unavailable {
                failures: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self.state, BackendState::Ready { .. })
    }

    pub fn format(&self) -> Option<ModelFormat> {
        match &self.state {
            BackendState::Ready { format, .. } => Some(*format),
            BackendState::Unavailable { .. } => None,
        }
    }

    pub fn state(&self) -> &BackendState {
        &self.state
    }

    pub fn status(&self) -> EngineStatus {
        match &self.state {
            BackendState::Ready { format, path, .. } => EngineStatus {
                available: true,
                format: Some(*format),
                model_path: Some(path.clone()),
                probe_failures: Vec::new(),
            },
            BackendState::Unavailable { failures } => EngineStatus {
                available: false,
                format: None,
                model_path: None,
                probe_failures: failures
                    .iter()
                    .map(|f| format!("{} ({}): {}", f.format, f.path.display(), f.reason))
                    .collect(),
            },
        }
    }

    /// Run one forward pass
    ///
    /// Callers check [`is_available`](Self::is_available) first; an
    /// unavailable engine answers with [`InferenceError::Unavailable`].
    pub fn predict(&self, input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
        match &self.state {
            BackendState::Ready { runner, .. } => runner.run(input),
            BackendState::Unavailable { .. } => Err(InferenceError::Unavailable),
        }
    }
}

/// Built-in loader for each model format
pub fn load_candidate(
    candidate: &ModelCandidate,
    intra_threads: usize,
) -> Result<Box<dyn ModelRunner>, ProbeFailureReason> {
    match candidate.format {
        ModelFormat::OnnxMultiTask | ModelFormat::OnnxLegacy => {
            let runner = OnnxRunner::load(&candidate.path, intra_threads)?;
            Ok(Box::new(runner))
        }
        ModelFormat::TorchScript => load_torchscript(&candidate.path),
    }
}

#[cfg(feature = "pytorch")]
fn load_torchscript(path: &Path) -> Result<Box<dyn ModelRunner>, ProbeFailureReason> {
    let runner = crate::torchscript::TorchScriptRunner::load(path)?;
    Ok(Box::new(runner))
}

#[cfg(not(feature = "pytorch"))]
fn load_torchscript(_path: &Path) -> Result<Box<dyn ModelRunner>, ProbeFailureReason> {
    Err(ProbeFailureReason::RuntimeMissing(
        "built without the `pytorch` feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRunner(Vec<f32>);

    impl ModelRunner for FixedRunner {
        fn run(&self, _input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
            Ok(ModelOutput::Classification {
                scores: self.0.clone(),
            })
        }
    }

    fn candidates(dir: &Path) -> Vec<ModelCandidate> {
        vec![
            ModelCandidate {
                format: ModelFormat::OnnxMultiTask,
                path: dir.join("food_model_v2.onnx"),
            },
            ModelCandidate {
                format: ModelFormat::OnnxLegacy,
                path: dir.join("food_recognition_model.onnx"),
            },
            ModelCandidate {
                format: ModelFormat::TorchScript,
                path: dir.join("food_recognition_model.pt"),
            },
        ]
    }

    #[test]
    fn test_from_arrays_tags_outputs() {
        let single = ModelOutput::from_arrays(vec![vec![0.1, 0.9]]).unwrap();
        assert_eq!(single.calories(), None);

        let multi = ModelOutput::from_arrays(vec![vec![0.1, 0.9], vec![250.0]]).unwrap();
        assert_eq!(multi.scores(), &[0.1, 0.9]);
        assert_eq!(multi.calories(), Some(&[250.0][..]));

        assert!(matches!(
            ModelOutput::from_arrays(Vec::new()),
            Err(InferenceError::EmptyOutput)
        ));
    }

    #[test]
    fn test_no_files_means_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InferenceEngine::probe(&candidates(dir.path()), 1);

        assert!(!engine.is_available());
        let status = engine.status();
        assert!(!status.available);
        assert_eq!(status.probe_failures.len(), 3);
    }

    #[test]
    fn test_first_loadable_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let list = candidates(dir.path());
        for c in &list {
            std::fs::write(&c.path, b"model").unwrap();
        }

        let mut attempted = Vec::new();
        let engine = InferenceEngine::probe_with(&list, |candidate| {
            attempted.push(candidate.format);
            match candidate.format {
                ModelFormat::OnnxMultiTask => {
                    Err(ProbeFailureReason::LoadFailed("corrupt".to_string()))
                }
                _ => Ok(Box::new(FixedRunner(vec![1.0])) as Box<dyn ModelRunner>),
            }
        });

        assert_eq!(engine.format(), Some(ModelFormat::OnnxLegacy));
        assert_eq!(
            attempted,
            vec![ModelFormat::OnnxMultiTask, ModelFormat::OnnxLegacy]
        );
    }

    #[test]
    fn test_missing_files_are_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let list = candidates(dir.path());
        std::fs::write(&list[2].path, b"torchscript").unwrap();

        let mut attempted = Vec::new();
        let engine = InferenceEngine::probe_with(&list, |candidate| {
            attempted.push(candidate.format);
            Ok(Box::new(FixedRunner(vec![1.0])) as Box<dyn ModelRunner>)
        });

        assert_eq!(attempted, vec![ModelFormat::TorchScript]);
        assert_eq!(engine.format(), Some(ModelFormat::TorchScript));
    }

    #[test]
    fn test_garbage_onnx_file_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let list = candidates(dir.path());
        std::fs::write(&list[0].path, b"this is not a protobuf graph").unwrap();

        let engine = InferenceEngine::probe(&list, 1);
        assert!(!engine.is_available());
        match engine.state() {
            BackendState::Unavailable { failures } => {
                assert_eq!(failures.len(), 3);
                assert!(matches!(
                    failures[0].reason,
                    ProbeFailureReason::LoadFailed(_)
                ));
                assert_eq!(failures[1].reason, ProbeFailureReason::NotFound);
            }
            BackendState::Ready { .. } => panic!("a garbage model must not load"),
        }
    }

    #[cfg(not(feature = "pytorch"))]
    #[test]
    fn test_torchscript_without_feature_is_runtime_missing() {
        let dir = tempfile::tempdir().unwrap();
        let list = candidates(dir.path());
        std::fs::write(&list[2].path, b"torchscript").unwrap();

        let engine = InferenceEngine::probe(&list, 1);
        assert!(!engine.is_available());
        match engine.state() {
            BackendState::Unavailable { failures } => {
                assert!(matches!(
                    failures[2].reason,
                    ProbeFailureReason::RuntimeMissing(_)
                ));
            }
            BackendState::Ready { .. } => panic!("engine should be unavailable"),
        }
    }

    #[test]
    fn test_unavailable_predict_is_error() {
        let engine = InferenceEngine::unavailable();
        let input = ndarray::Array4::<f32>::zeros((1, 3, 2, 2));
        assert!(matches!(
            engine.predict(input.view()),
            Err(InferenceError::Unavailable)
        ));
    }

    #[test]
    fn test_single_row_shapes() {
        assert!(is_single_row(&[5]));
        assert!(is_single_row(&[1, 5]));
        assert!(!is_single_row(&[2, 5]));
        assert!(!is_single_row(&[1, 5, 5]));
    }
}
