//! Runtime configuration for the recognition service
//!
//! Defaults match the on-disk layout the service ships with (`models/`,
//! `config/`, `foodKcalList.csv`). A YAML file can override any field and
//! `CHECKFOOD_*` environment variables win over both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Multi-task model (classification + calorie regression)
pub const MODEL_FILE_V2: &str = "food_model_v2.onnx";
/// Legacy classification-only ONNX model
pub const MODEL_FILE_LEGACY: &str = "food_recognition_model.onnx";
/// Legacy TorchScript model
pub const MODEL_FILE_TORCHSCRIPT: &str = "food_recognition_model.pt";

pub const LABEL_FILE: &str = "idx_to_class.json";
pub const LABEL_FILE_FALLBACK: &str = "class_labels.json";

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// ONNX graph with a classification head and a calorie regression head
    OnnxMultiTask,
    /// ONNX graph with a classification head only
    OnnxLegacy,
    /// TorchScript module
    TorchScript,
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFormat::OnnxMultiTask => write!(f, "onnx_multi_task"),
            ModelFormat::OnnxLegacy => write!(f, "onnx_legacy"),
            ModelFormat::TorchScript => write!(f, "torchscript"),
        }
    }
}

/// A model file to try at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidate {
    pub format: ModelFormat,
    pub path: PathBuf,
}

/// Configuration for the recognition pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Directory holding model artifacts (and usually the label file)
    pub model_dir: PathBuf,
    /// Secondary directory searched for the label file
    pub config_dir: PathBuf,
    /// Nutrition CSV
    pub nutrition_path: PathBuf,
    /// Requested number of ranked foods (the pipeline never reports more than 3)
    pub top_k: usize,
    /// Square model input edge in pixels
    pub input_size: u32,
    /// Deadline covering preprocessing + inference for one request
    pub request_timeout_ms: u64,
    /// Intra-op threads for the inference runtime (None = physical cores)
    pub intra_threads: Option<usize>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            config_dir: PathBuf::from("config"),
            nutrition_path: PathBuf::from("foodKcalList.csv"),
            top_k: 3,
            input_size: 384,
            request_timeout_ms: 30_000,
            intra_threads: None,
        }
    }
}

impl RecognitionConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml(yaml_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = yaml_path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: RecognitionConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, optionally overlaid by a YAML file, then by the environment
    pub fn load(yaml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match yaml_path {
            Some(path) => Self::from_yaml(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHECKFOOD_*` environment overrides
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("CHECKFOOD_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CHECKFOOD_CONFIG_DIR") {
            self.config_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("CHECKFOOD_NUTRITION_PATH") {
            self.nutrition_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("CHECKFOOD_TOP_K") {
            match value.parse() {
                Ok(top_k) => self.top_k = top_k,
                Err(_) => warn!("Ignoring CHECKFOOD_TOP_K={:?}: not an integer", value),
            }
        }
        if let Some(value) = lookup("CHECKFOOD_TIMEOUT_MS") {
            match value.parse() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => warn!("Ignoring CHECKFOOD_TIMEOUT_MS={:?}: not an integer", value),
            }
        }
        if let Some(value) = lookup("CHECKFOOD_THREADS") {
            match value.parse() {
                Ok(threads) => self.intra_threads = Some(threads),
                Err(_) => warn!("Ignoring CHECKFOOD_THREADS={:?}: not an integer", value),
            }
        }
        self
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".to_string()));
        }
        if self.input_size == 0 {
            return Err(ConfigError::Invalid("input_size must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.intra_threads == Some(0) {
            return Err(ConfigError::Invalid(
                "intra_threads must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Model files in probe order: multi-task ONNX, legacy ONNX, TorchScript
    pub fn model_candidates(&self) -> Vec<ModelCandidate> {
        vec![
            ModelCandidate {
                format: ModelFormat::OnnxMultiTask,
                path: self.model_dir.join(MODEL_FILE_V2),
            },
            ModelCandidate {
                format: ModelFormat::OnnxLegacy,
                path: self.model_dir.join(MODEL_FILE_LEGACY),
            },
            ModelCandidate {
                format: ModelFormat::TorchScript,
                path: self.model_dir.join(MODEL_FILE_TORCHSCRIPT),
            },
        ]
    }

    /// Label files in lookup order
    pub fn label_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.model_dir.join(LABEL_FILE),
            self.config_dir.join(LABEL_FILE),
            self.config_dir.join(LABEL_FILE_FALLBACK),
        ]
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolved intra-op thread count
    pub fn threads(&self) -> usize {
        self.intra_threads.unwrap_or_else(num_cpus::get_physical)
    }
}
