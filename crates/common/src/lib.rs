/// Common types and utilities for food recognition
use serde::{Deserialize, Serialize};

/// Hard cap on the number of food items reported for one photo
pub const MAX_FOOD_ITEMS: usize = 3;

/// Which path produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducedBy {
    /// Model inference ran and its output was ranked
    Real,
    /// Fixed placeholder result (model unavailable or the request failed)
    Dummy,
}

/// One ranked food candidate produced by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub name: String,
    /// Calorie estimate from the model's regression head, if it has one
    pub model_calories: Option<u32>,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl FoodEntry {
    pub fn new(name: impl Into<String>, model_calories: Option<u32>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            model_calories,
            confidence,
        }
    }
}

/// Ranked prediction for one photo (at most [`MAX_FOOD_ITEMS`] entries,
/// confidence non-increasing)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub entries: Vec<FoodEntry>,
    pub produced_by: ProducedBy,
}

impl PredictionResult {
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        self.produced_by == ProducedBy::Dummy
    }
}

/// Where the final calorie value of an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalorieSource {
    /// Nutrition table (authoritative)
    Table,
    /// Model regression estimate
    Model,
    /// Neither source had a value
    None,
}

impl std::fmt::Display for CalorieSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalorieSource::Table => write!(f, "table"),
            CalorieSource::Model => write!(f, "model"),
            CalorieSource::None => write!(f, "none"),
        }
    }
}

/// A food entry after hybrid calorie resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEntry {
    pub name: String,
    #[serde(rename = "calories")]
    pub final_calories: Option<u32>,
    pub source: CalorieSource,
}

/// Merged entries plus the calorie total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedResult {
    pub entries: Vec<MergedEntry>,
    /// Sum of every non-null `final_calories`
    pub total_calories: u32,
}

/// Outward payload of a recognition request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    pub food_count: usize,
    pub entries: Vec<MergedEntry>,
    pub total_calories: u32,
    pub produced_by: ProducedBy,
}

impl RecognitionResponse {
    pub fn new(merged: MergedResult, produced_by: ProducedBy) -> Self {
        Self {
            food_count: merged.entries.len(),
            entries: merged.entries,
            total_calories: merged.total_calories,
            produced_by,
        }
    }
}

/// Result of a direct nutrition lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodLookup {
    pub food_name: String,
    pub calories: u32,
}
