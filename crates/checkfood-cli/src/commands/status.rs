use anyhow::Result;
use checkfood_core::RecognitionConfig;
use checkfood_service::FoodRecognizer;

pub fn print_status(config: &RecognitionConfig) -> Result<()> {
    let status = FoodRecognizer::from_config(config).status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
