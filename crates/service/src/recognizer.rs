//! `FoodRecognizer`: the two outward operations, `recognize` and `lookup`
//!
//! Every shared resource (labels, nutrition table, model backend) is built
//! once in [`FoodRecognizer::from_config`] and only read afterwards.

use crate::merger::HybridMerger;
use checkfood_common::{FoodLookup, PredictionResult, RecognitionResponse};
use checkfood_core::RecognitionConfig;
use checkfood_nutrition::{CsvColumns, NutritionTable};
use checkfood_recognition::{
    dummy_prediction, EngineStatus, InferenceEngine, LabelTable, PreprocessError, Predictor,
    Preprocessor,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Caller-visible failure of `recognize`
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The uploaded bytes are not a decodable image
    #[error("Invalid image: {0}")]
    Decode(#[from] PreprocessError),
}

/// Miss signal of `lookup`
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LookupError {
    #[error("Food not found in nutrition table: {name}")]
    NotFound { name: String },
}

/// Startup state of the shared resources
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub engine: EngineStatus,
    pub label_count: usize,
    pub nutrition_loaded: bool,
    pub nutrition_rows: usize,
    pub nutrition_skipped_rows: usize,
}

#[derive(Clone)]
pub struct FoodRecognizer {
    predictor: Arc<Predictor>,
    nutrition: Arc<NutritionTable>,
    top_k: usize,
    request_timeout: Duration,
}

impl FoodRecognizer {
    /// Load labels, nutrition table and model backend
    ///
    /// Never fails: missing resources degrade (empty labels, unloaded table,
    /// unavailable engine) and are logged.
    pub fn from_config(config: &RecognitionConfig) -> Self {
        let start = Instant::now();

        let labels = LabelTable::discover(&config.label_candidates());
        let nutrition = NutritionTable::load_or_empty(&config.nutrition_path, &CsvColumns::default());
        let engine = InferenceEngine::probe(&config.model_candidates(), config.threads());

        info!(
            "Recognizer ready in {:.2}s (model: {}, labels: {}, nutrition rows: {})",
            start.elapsed().as_secs_f64(),
            engine
                .format()
                .map_or_else(|| "unavailable".to_string(), |f| f.to_string()),
            labels.len(),
            nutrition.len()
        );

        let predictor = Predictor::new(
            Arc::new(engine),
            Arc::new(labels),
            Preprocessor::new(config.input_size),
        );
        Self::new(predictor, nutrition, config.top_k, config.request_timeout())
    }

    /// Assemble from already built parts
    pub fn new(
        predictor: Predictor,
        nutrition: NutritionTable,
        top_k: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            predictor: Arc::new(predictor),
            nutrition: Arc::new(nutrition),
            top_k,
            request_timeout,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn nutrition(&self) -> &NutritionTable {
        &self.nutrition
    }

    /// Recognize the foods in a photo and resolve their calories
    ///
    /// # Errors
    /// [`RecognitionError::Decode`] when a model is loaded and the bytes are
    /// not an image. All other failures produce the dummy result.
    pub fn recognize(&self, image_bytes: &[u8]) -> Result<RecognitionResponse, RecognitionError> {
        recognize_blocking(&self.predictor, &self.nutrition, image_bytes, self.top_k)
    }

    /// [`recognize`](Self::recognize) on the blocking pool, bounded by the
    /// request timeout
    ///
    /// An expired deadline yields the dummy result; the abandoned inference
    /// finishes in the background and its result is discarded.
    pub async fn recognize_with_deadline(
        &self,
        image_bytes: Vec<u8>,
    ) -> Result<RecognitionResponse, RecognitionError> {
        let predictor = Arc::clone(&self.predictor);
        let nutrition = Arc::clone(&self.nutrition);
        let top_k = self.top_k;

        let task = tokio::task::spawn_blocking(move || {
            recognize_blocking(&predictor, &nutrition, &image_bytes, top_k)
        });

        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Recognition task failed: {}; returning dummy result", e);
                Ok(self.respond(&dummy_prediction()))
            }
            Err(_) => {
                warn!(
                    "Recognition timed out after {}ms; returning dummy result",
                    self.request_timeout.as_millis()
                );
                Ok(self.respond(&dummy_prediction()))
            }
        }
    }

    /// Direct nutrition table lookup
    pub fn lookup(&self, food_name: &str) -> Result<FoodLookup, LookupError> {
        lookup_in(&self.nutrition, food_name)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            engine: self.predictor.engine().status(),
            label_count: self.predictor.labels().len(),
            nutrition_loaded: self.nutrition.is_loaded(),
            nutrition_rows: self.nutrition.len(),
            nutrition_skipped_rows: self.nutrition.skipped_rows(),
        }
    }

    fn respond(&self, prediction: &PredictionResult) -> RecognitionResponse {
        let merged = HybridMerger::merge(prediction, &self.nutrition);
        RecognitionResponse::new(merged, prediction.produced_by)
    }
}

/// Resolve a food name against a table, without any model backend
pub fn lookup_in(table: &NutritionTable, food_name: &str) -> Result<FoodLookup, LookupError> {
    match table.resolve(food_name) {
        Some(kcal) => Ok(FoodLookup {
            food_name: food_name.to_string(),
            calories: kcal.round().max(0.0) as u32,
        }),
        None => Err(LookupError::NotFound {
            name: food_name.to_string(),
        }),
    }
}

fn recognize_blocking(
    predictor: &Predictor,
    nutrition: &NutritionTable,
    image_bytes: &[u8],
    top_k: usize,
) -> Result<RecognitionResponse, RecognitionError> {
    let start = Instant::now();
    let prediction = predictor.predict(image_bytes, top_k)?;
    let merged = HybridMerger::merge(&prediction, nutrition);

    debug!(
        "Recognition finished in {:.1}ms ({} entries, {:?})",
        start.elapsed().as_secs_f64() * 1000.0,
        merged.entries.len(),
        prediction.produced_by
    );

    Ok(RecognitionResponse::new(merged, prediction.produced_by))
}
