//! Nutrition table: authoritative food name → kcal lookup
//!
//! The table is built once from the nutrition CSV (one row per food, a food
//! name column and an energy column in kilocalories) and is read-only after
//! construction, so it can be shared across request threads behind an `Arc`
//! without locking.
//!
//! # Example
//! ```no_run
//! use checkfood_nutrition::{CsvColumns, NutritionTable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = NutritionTable::from_path("foodKcalList.csv", &CsvColumns::default())?;
//!
//! if let Some(kcal) = table.resolve("쌀밥") {
//!     println!("쌀밥: {kcal} kcal");
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Food name column of the bundled nutrition CSV
pub const FOOD_NAME_COLUMN: &str = "음 식 명";
/// Energy (kcal) column of the bundled nutrition CSV
pub const ENERGY_COLUMN: &str = "에너지(kcal)";

const UTF8_BOM: char = '\u{feff}';

/// Column names to read from the CSV header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvColumns {
    pub food_name: String,
    pub energy_kcal: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            food_name: FOOD_NAME_COLUMN.to_string(),
            energy_kcal: ENERGY_COLUMN.to_string(),
        }
    }
}

/// Errors that can occur while loading the nutrition table
#[derive(Error, Debug)]
pub enum NutritionError {
    #[error("Nutrition file not found: {0}")]
    NotFound(String),

    #[error("Failed to open nutrition file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column {0:?} in nutrition header")]
    MissingColumn(String),
}

/// Immutable food name → calories mapping
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    calories: HashMap<String, f64>,
    /// Keys in first-insertion order, for the trimmed-name scan
    order: Vec<String>,
    loaded: bool,
    skipped_rows: usize,
    source: Option<PathBuf>,
}

impl NutritionTable {
    /// A table that was never loaded; every lookup is unresolved
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a loaded table from in-memory entries
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut table = Self {
            loaded: true,
            ..Self::default()
        };
        for (name, kcal) in entries {
            table.insert(name.into(), kcal);
        }
        table
    }

    /// A repeated name updates the value but keeps its original position
    fn insert(&mut self, name: String, kcal: f64) {
        if self.calories.insert(name.clone(), kcal).is_none() {
            self.order.push(name);
        }
    }

    /// Parse a nutrition CSV from any reader
    ///
    /// Rows with an empty name or empty energy field are ignored; rows whose
    /// energy field is not a non-negative number are skipped with a warning.
    pub fn from_reader<R: Read>(reader: R, columns: &CsvColumns) -> Result<Self, NutritionError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let name_idx = find_column(&headers, &columns.food_name)?;
        let energy_idx = find_column(&headers, &columns.energy_kcal)?;

        let mut table = Self {
            loaded: true,
            ..Self::default()
        };

        for (row_idx, record) in csv_reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable nutrition row {}: {}", row_idx + 1, e);
                    table.skipped_rows += 1;
                    continue;
                }
            };

            let food_name = record.get(name_idx).unwrap_or("").trim();
            let energy = record.get(energy_idx).unwrap_or("").trim();
            if food_name.is_empty() || energy.is_empty() {
                continue;
            }

            match parse_kcal(energy) {
                Some(kcal) => {
                    table.insert(food_name.to_string(), kcal);
                }
                None => {
                    warn!("Failed to parse calories: {} -> {:?}", food_name, energy);
                    table.skipped_rows += 1;
                }
            }
        }

        Ok(table)
    }

    /// Load the nutrition CSV at `path`
    pub fn from_path(path: impl AsRef<Path>, columns: &CsvColumns) -> Result<Self, NutritionError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NutritionError::NotFound(path.display().to_string()));
        }

        let file = File::open(path).map_err(|source| NutritionError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut table = Self::from_reader(file, columns)?;
        table.source = Some(path.to_path_buf());

        info!(
            "Nutrition table loaded: {} foods ({} rows skipped) from {}",
            table.len(),
            table.skipped_rows,
            path.display()
        );

        Ok(table)
    }

    /// Load the table, degrading to an unloaded table on any failure
    ///
    /// A missing or unreadable nutrition file never stops the service; the
    /// hybrid merge then falls back to model estimates.
    pub fn load_or_empty(path: impl AsRef<Path>, columns: &CsvColumns) -> Self {
        let path = path.as_ref();
        match Self::from_path(path, columns) {
            Ok(table) => table,
            Err(NutritionError::NotFound(p)) => {
                warn!("Nutrition file not found: {}", p);
                Self::empty()
            }
            Err(e) => {
                error!("Failed to load nutrition table from {}: {}", path.display(), e);
                Self::empty()
            }
        }
    }

    /// Look up the calories of a food
    ///
    /// Tries, in order: the exact name, the name with surrounding whitespace
    /// trimmed, then every stored key compared in trimmed form.
    pub fn resolve(&self, food_name: &str) -> Option<f64> {
        if !self.loaded {
            debug!("Nutrition table not loaded; {:?} unresolved", food_name);
            return None;
        }

        if let Some(&kcal) = self.calories.get(food_name) {
            return Some(kcal);
        }

        let trimmed = food_name.trim();
        if let Some(&kcal) = self.calories.get(trimmed) {
            return Some(kcal);
        }

        let found = self
            .order
            .iter()
            .find(|key| key.trim() == trimmed)
            .and_then(|key| self.calories.get(key).copied());

        if found.is_none() {
            debug!("Food not found in nutrition table: {:?}", food_name);
        }
        found
    }

    /// Resolve several names at once; empty names are skipped
    pub fn resolve_many<'a>(&self, food_names: &[&'a str]) -> Vec<(&'a str, Option<f64>)> {
        food_names
            .iter()
            .filter(|name| !name.is_empty())
            .map(|&name| (name, self.resolve(name)))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calories.is_empty()
    }

    /// Whether the table was built from real data
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Rows rejected at load time because their energy value was unusable
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

fn find_column(headers: &csv::StringRecord, wanted: &str) -> Result<usize, NutritionError> {
    headers
        .iter()
        .position(|h| h.trim_start_matches(UTF8_BOM).trim() == wanted)
        .ok_or_else(|| NutritionError::MissingColumn(wanted.to_string()))
}

fn parse_kcal(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|kcal| kcal.is_finite() && *kcal >= 0.0)
}
