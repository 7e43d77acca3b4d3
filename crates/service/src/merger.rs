//! Hybrid calorie resolution
//!
//! The nutrition table is authoritative: a table hit always wins over the
//! model's own estimate. Entries that resolve nowhere keep a null value and
//! are never dropped.

use checkfood_common::{CalorieSource, MergedEntry, MergedResult, PredictionResult};
use checkfood_nutrition::NutritionTable;
use tracing::{info, warn};

/// Table value → whole kcal
fn table_kcal(value: f64) -> u32 {
    // Table values are validated non-negative at load time
    value.round().max(0.0) as u32
}

/// Combines a prediction with nutrition table lookups
#[derive(Debug, Default, Clone, Copy)]
pub struct HybridMerger;

impl HybridMerger {
    /// Decide final calories per entry (order preserved) and total them
    pub fn merge(prediction: &PredictionResult, table: &NutritionTable) -> MergedResult {
        let entries: Vec<MergedEntry> = prediction
            .entries
            .iter()
            .map(|entry| {
                let (final_calories, source) = match (table.resolve(&entry.name), entry.model_calories) {
                    (Some(kcal), _) => {
                        let kcal = table_kcal(kcal);
                        info!("Nutrition table match: {} = {}kcal (table)", entry.name, kcal);
                        (Some(kcal), CalorieSource::Table)
                    }
                    (None, Some(kcal)) => {
                        info!("No table match: {} = {}kcal (model)", entry.name, kcal);
                        (Some(kcal), CalorieSource::Model)
                    }
                    (None, None) => {
                        warn!("No calorie information for {}", entry.name);
                        (None, CalorieSource::None)
                    }
                };

                MergedEntry {
                    name: entry.name.clone(),
                    final_calories,
                    source,
                }
            })
            .collect();

        let total_calories = entries
            .iter()
            .filter_map(|e| e.final_calories)
            .fold(0u32, u32::saturating_add);

        info!("Hybrid merge complete: total {}kcal", total_calories);

        MergedResult {
            entries,
            total_calories,
        }
    }
}
