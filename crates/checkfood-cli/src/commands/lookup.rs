//! `checkfood lookup` - direct nutrition table query

use anyhow::Result;
use checkfood_core::RecognitionConfig;
use checkfood_nutrition::{CsvColumns, NutritionTable};
use checkfood_service::lookup_in;
use clap::Args;

#[derive(Args)]
pub struct LookupCommand {
    /// Food name as it appears in the nutrition table
    #[arg(value_name = "NAME")]
    name: String,
}

impl LookupCommand {
    pub fn execute(self, config: &RecognitionConfig) -> Result<()> {
        // The model and labels are never touched here
        let table = NutritionTable::load_or_empty(&config.nutrition_path, &CsvColumns::default());
        let found = lookup_in(&table, &self.name)?;
        println!("{}", serde_json::to_string_pretty(&found)?);
        Ok(())
    }
}
