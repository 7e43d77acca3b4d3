//! Class index → food name mapping
//!
//! Produced alongside the trained model as a JSON object keyed by the class
//! index in string form (`{"0": "쌀밥", "1": "된장찌개", "_version": "2"}`).
//! Keys starting with `_` carry metadata and are not classes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Failed to read label file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse label JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Label file must be a JSON object of index -> name")]
    NotAnObject,
}

/// Immutable class index → food name table
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    names: HashMap<usize, String>,
    source: Option<PathBuf>,
}

impl LabelTable {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from in-memory `(index, name)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(i, n)| (i, n.into())).collect(),
            source: None,
        }
    }

    /// Parse the label JSON
    pub fn from_json_str(json: &str) -> Result<Self, LabelError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value.as_object().ok_or(LabelError::NotAnObject)?;

        let mut names = HashMap::with_capacity(object.len());
        for (key, name) in object {
            if key.starts_with('_') {
                continue;
            }
            let Ok(index) = key.trim().parse::<usize>() else {
                warn!("Skipping label entry with non-integer key {:?}", key);
                continue;
            };
            let name = match name {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if name.trim().is_empty() {
                warn!("Skipping label entry {} with an empty name", index);
                continue;
            }
            names.insert(index, name);
        }

        Ok(Self {
            names,
            source: None,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut table = Self::from_json_str(&contents)?;
        table.source = Some(path.to_path_buf());
        Ok(table)
    }

    /// Load the first existing candidate; an empty table if none is usable
    pub fn discover(candidates: &[PathBuf]) -> Self {
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            warn!(
                "No label file found (checked: {}); every class will be reported as Unknown_<index>",
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Self::empty();
        };

        match Self::from_path(path) {
            Ok(table) => {
                info!(
                    "Label mapping loaded: {} classes (path: {})",
                    table.len(),
                    path.display()
                );
                table
            }
            Err(e) => {
                error!("Failed to load label file {}: {}", path.display(), e);
                Self::empty()
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    /// Name for `index`, or the `Unknown_<index>` placeholder
    pub fn name_for(&self, index: usize) -> String {
        self.get(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown_{}", index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}
