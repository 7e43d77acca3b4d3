//! `checkfood recognize` - run the full pipeline on one photo

use anyhow::{Context as _, Result};
use checkfood_core::RecognitionConfig;
use checkfood_service::FoodRecognizer;
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Args)]
pub struct RecognizeCommand {
    /// Meal photo (JPEG, PNG, WebP, BMP or GIF)
    #[arg(value_name = "IMAGE")]
    input: PathBuf,

    /// Number of ranked foods to report (capped at 3)
    #[arg(long)]
    top_k: Option<usize>,

    /// Per-request deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl RecognizeCommand {
    pub async fn execute(self, mut config: RecognitionConfig) -> Result<()> {
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(ms) = self.timeout_ms {
            config.request_timeout_ms = ms;
        }
        config.validate().context("Invalid recognition options")?;

        let image_bytes = std::fs::read(&self.input)
            .with_context(|| format!("Failed to read image {}", self.input.display()))?;

        let recognizer = FoodRecognizer::from_config(&config);

        let start = Instant::now();
        let response = recognizer
            .recognize_with_deadline(image_bytes)
            .await
            .with_context(|| format!("Failed to recognize {}", self.input.display()))?;
        info!(
            "Recognized {} foods ({} kcal) in {:.3}s",
            response.food_count,
            response.total_calories,
            start.elapsed().as_secs_f64()
        );

        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}
