//! CheckFood service layer
//!
//! Wires the recognition pipeline to the nutrition table and exposes the two
//! outward operations: `recognize(image_bytes)` and `lookup(food_name)`.
//!
//! # Example
//! ```no_run
//! use checkfood_core::RecognitionConfig;
//! use checkfood_service::FoodRecognizer;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = RecognitionConfig::load(None)?;
//! let recognizer = FoodRecognizer::from_config(&config);
//!
//! let response = recognizer.recognize(&std::fs::read("dinner.jpg")?)?;
//! println!("{} foods, {} kcal", response.food_count, response.total_calories);
//! # Ok(())
//! # }
//! ```

pub mod merger;
pub mod recognizer;

pub use merger::HybridMerger;
pub use recognizer::{lookup_in, FoodRecognizer, LookupError, RecognitionError, ServiceStatus};
