//! Ranked, named food predictions
//!
//! Turns raw model output into at most three `FoodEntry` values. When the
//! model is unavailable, or a forward pass fails, the fixed dummy result is
//! returned instead; only an undecodable photo is reported to the caller.

use crate::engine::{InferenceEngine, InferenceError, ModelOutput};
use crate::labels::LabelTable;
use crate::preprocess::{PreprocessError, Preprocessor};
use checkfood_common::{FoodEntry, PredictionResult, ProducedBy, MAX_FOOD_ITEMS};
use ndarray::ArrayView4;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Placeholder foods reported in dummy mode: (name, kcal, confidence)
pub const DUMMY_FOODS: [(&str, u32, f32); 2] = [("쌀밥", 310, 0.85), ("된장찌개", 140, 0.72)];

/// The fixed dummy prediction
pub fn dummy_prediction() -> PredictionResult {
    PredictionResult {
        entries: DUMMY_FOODS
            .iter()
            .map(|&(name, kcal, confidence)| FoodEntry::new(name, Some(kcal), confidence))
            .collect(),
        produced_by: ProducedBy::Dummy,
    }
}

/// Indices of the `min(top_k, 3, scores.len())` best scores
///
/// Ordered by descending score, ties broken by ascending class index. NaN
/// ranks below every other value.
pub fn rank_top_k(scores: &[f32], top_k: usize) -> Vec<usize> {
    let k = top_k.min(MAX_FOOD_ITEMS).min(scores.len());
    let key = |i: usize| {
        let s = scores[i];
        if s.is_nan() {
            f32::NEG_INFINITY
        } else {
            s
        }
    };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Per-class confidence in [0, 1]
///
/// Scores that already look like probabilities are kept; anything else is
/// treated as logits and softmaxed.
pub fn confidences(scores: &[f32]) -> Vec<f32> {
    let is_probability = scores
        .iter()
        .all(|s| s.is_nan() || (0.0..=1.0).contains(s));
    if is_probability {
        return scores
            .iter()
            .map(|&s| if s.is_nan() { 0.0 } else { s })
            .collect();
    }

    let max = scores
        .iter()
        .copied()
        .filter(|s| !s.is_nan())
        .fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores
        .iter()
        .map(|&s| if s.is_nan() { 0.0 } else { (s - max).exp() })
        .collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; scores.len()]
    }
}

/// Round a regression estimate to whole kcal; negatives clamp to zero
fn to_kcal(estimate: f32) -> Option<u32> {
    if estimate.is_finite() {
        Some(estimate.round().max(0.0) as u32)
    } else {
        None
    }
}

/// Preprocessor + engine + labels → ranked prediction
pub struct Predictor {
    engine: Arc<InferenceEngine>,
    labels: Arc<LabelTable>,
    preprocessor: Preprocessor,
}

impl Predictor {
    pub fn new(
        engine: Arc<InferenceEngine>,
        labels: Arc<LabelTable>,
        preprocessor: Preprocessor,
    ) -> Self {
        Self {
            engine,
            labels,
            preprocessor,
        }
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Predict the foods in an encoded photo
    ///
    /// # Errors
    /// Only [`PreprocessError::Decode`], when a model is loaded and the bytes
    /// are not a decodable image. Every other failure yields the dummy result.
    pub fn predict(
        &self,
        image_bytes: &[u8],
        top_k: usize,
    ) -> Result<PredictionResult, PreprocessError> {
        if !self.engine.is_available() {
            warn!("Model not loaded; returning dummy prediction");
            return Ok(dummy_prediction());
        }

        let input = self.preprocessor.preprocess(image_bytes)?;
        Ok(self.predict_tensor(input.view(), top_k))
    }

    /// Predict from an already preprocessed tensor; never fails
    pub fn predict_tensor(&self, input: ArrayView4<'_, f32>, top_k: usize) -> PredictionResult {
        let output = match catch_unwind(AssertUnwindSafe(|| self.engine.predict(input))) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!("Inference failed: {}; falling back to dummy prediction", e);
                return dummy_prediction();
            }
            Err(_) => {
                error!("Model backend panicked; falling back to dummy prediction");
                return dummy_prediction();
            }
        };

        match self.format_output(&output, top_k) {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("Could not format model output: {}; falling back to dummy prediction", e);
                dummy_prediction()
            }
        }
    }

    /// Rank, name and attach calorie estimates
    ///
    /// The calorie vector is indexed by rank position, not by class index.
    pub fn format_output(
        &self,
        output: &ModelOutput,
        top_k: usize,
    ) -> Result<PredictionResult, InferenceError> {
        let scores = output.scores();
        if scores.is_empty() {
            return Err(InferenceError::EmptyOutput);
        }

        let confidence = confidences(scores);
        let calories = output.calories();

        let entries: Vec<FoodEntry> = rank_top_k(scores, top_k)
            .into_iter()
            .enumerate()
            .map(|(rank, class_idx)| {
                let model_calories = calories
                    .and_then(|c| c.get(rank))
                    .and_then(|&estimate| to_kcal(estimate));
                FoodEntry::new(
                    self.labels.name_for(class_idx),
                    model_calories,
                    confidence[class_idx],
                )
            })
            .take(MAX_FOOD_ITEMS)
            .collect();

        debug!("Prediction: {:?}", entries);

        Ok(PredictionResult {
            entries,
            produced_by: ProducedBy::Real,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ModelRunner;
    use checkfood_core::config::ModelFormat;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::PoisonError;

    struct FakeRunner(ModelOutput);

    impl ModelRunner for FakeRunner {
        fn run(&self, _input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingRunner;

    impl ModelRunner for FailingRunner {
        fn run(&self, _input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
            Err(InferenceError::Runtime("device lost".to_string()))
        }
    }

    /// Panics on the first call while holding its session lock
    struct PanicsOnceRunner {
        session: std::sync::Mutex<()>,
        panicked: AtomicBool,
    }

    impl ModelRunner for PanicsOnceRunner {
        fn run(&self, _input: ArrayView4<'_, f32>) -> Result<ModelOutput, InferenceError> {
            let _guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("native backend aborted");
            }
            Ok(ModelOutput::Classification {
                scores: vec![0.10, 0.85, 0.05],
            })
        }
    }

    fn predictor_with(runner: Box<dyn ModelRunner>, labels: LabelTable) -> Predictor {
        let engine = InferenceEngine::with_runner(ModelFormat::OnnxMultiTask, "fake.onnx", runner);
        Predictor::new(Arc::new(engine), Arc::new(labels), Preprocessor::new(8))
    }

    fn kimchi_labels() -> LabelTable {
        LabelTable::from_pairs([(0, "kimchi"), (1, "rice"), (2, "soup")])
    }

    fn photo() -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 80, 40]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_rank_top_k_orders_by_score() {
        assert_eq!(rank_top_k(&[0.10, 0.85, 0.05], 3), vec![1, 0, 2]);
    }

    #[test]
    fn test_rank_top_k_ties_by_index() {
        assert_eq!(rank_top_k(&[0.3, 0.4, 0.4, 0.4], 3), vec![1, 2, 3]);
        assert_eq!(rank_top_k(&[0.5, 0.5], 3), vec![0, 1]);
    }

    #[test]
    fn test_rank_top_k_bounds() {
        let scores = [0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(rank_top_k(&scores, 10).len(), 3);
        assert_eq!(rank_top_k(&scores, 1), vec![4]);
        assert_eq!(rank_top_k(&[0.9, 0.1], 3).len(), 2);
        assert!(rank_top_k(&scores, 0).is_empty());
    }

    #[test]
    fn test_rank_top_k_nan_last() {
        assert_eq!(rank_top_k(&[f32::NAN, 0.2, 0.1], 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_confidences_keep_probabilities() {
        assert_eq!(confidences(&[0.1, 0.85, 0.05]), vec![0.1, 0.85, 0.05]);
    }

    #[test]
    fn test_confidences_softmax_logits() {
        let conf = confidences(&[2.0, 0.0, -1.0]);
        let sum: f32 = conf.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(conf[0] > conf[1] && conf[1] > conf[2]);
        assert!(conf.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn test_to_kcal_rounding() {
        assert_eq!(to_kcal(249.5), Some(250));
        assert_eq!(to_kcal(249.4), Some(249));
        assert_eq!(to_kcal(-12.0), Some(0));
        assert_eq!(to_kcal(f32::NAN), None);
    }

    #[test]
    fn test_format_output_names_and_ranks() {
        let predictor = predictor_with(
            Box::new(FakeRunner(ModelOutput::Classification { scores: vec![] })),
            kimchi_labels(),
        );
        let output = ModelOutput::Classification {
            scores: vec![0.10, 0.85, 0.05],
        };

        let prediction = predictor.format_output(&output, 3).unwrap();
        let names: Vec<_> = prediction.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["rice", "kimchi", "soup"]);
        assert!(prediction.entries.iter().all(|e| e.model_calories.is_none()));
        assert_eq!(prediction.produced_by, ProducedBy::Real);
    }

    #[test]
    fn test_format_output_unknown_label() {
        let predictor = predictor_with(
            Box::new(FakeRunner(ModelOutput::Classification { scores: vec![] })),
            LabelTable::from_pairs([(0, "kimchi")]),
        );
        let output = ModelOutput::Classification {
            scores: vec![0.1, 0.9],
        };

        let prediction = predictor.format_output(&output, 1).unwrap();
        assert_eq!(prediction.entries[0].name, "Unknown_1");
    }

    #[test]
    fn test_calories_indexed_by_rank() {
        let predictor = predictor_with(
            Box::new(FakeRunner(ModelOutput::Classification { scores: vec![] })),
            kimchi_labels(),
        );
        // Rank 0 is class 2, but takes calories[0]
        let output = ModelOutput::WithCalories {
            scores: vec![0.2, 0.1, 0.7],
            calories: vec![450.6, 120.2],
        };

        let prediction = predictor.format_output(&output, 3).unwrap();
        assert_eq!(prediction.entries[0].name, "soup");
        assert_eq!(prediction.entries[0].model_calories, Some(451));
        assert_eq!(prediction.entries[1].model_calories, Some(120));
        assert_eq!(prediction.entries[2].model_calories, None);
    }

    #[test]
    fn test_predict_end_to_end_with_fake_runner() {
        let predictor = predictor_with(
            Box::new(FakeRunner(ModelOutput::Classification {
                scores: vec![0.10, 0.85, 0.05],
            })),
            kimchi_labels(),
        );

        let prediction = predictor.predict(&photo(), 2).unwrap();
        assert_eq!(prediction.entries.len(), 2);
        assert_eq!(prediction.entries[0].name, "rice");
        assert!((prediction.entries[0].confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_unavailable_engine_returns_dummy_without_decoding() {
        let predictor = Predictor::new(
            Arc::new(InferenceEngine::unavailable()),
            Arc::new(kimchi_labels()),
            Preprocessor::default(),
        );

        let prediction = predictor.predict(b"not an image", 3).unwrap();
        assert_eq!(prediction, dummy_prediction());
    }

    #[test]
    fn test_inference_failure_degrades_to_dummy() {
        let predictor = predictor_with(Box::new(FailingRunner), kimchi_labels());
        let prediction = predictor.predict(&photo(), 3).unwrap();

        assert!(prediction.is_dummy());
        assert_eq!(prediction.entries.len(), 2);
        // the engine itself stays available
        assert!(predictor.engine().is_available());
    }

    #[test]
    fn test_backend_panic_degrades_single_request() {
        let predictor = predictor_with(
            Box::new(PanicsOnceRunner {
                session: std::sync::Mutex::new(()),
                panicked: AtomicBool::new(false),
            }),
            kimchi_labels(),
        );

        let first = predictor.predict(&photo(), 3).unwrap();
        assert_eq!(first, dummy_prediction());

        // the poisoned lock is recovered and the next request is served
        let second = predictor.predict(&photo(), 3).unwrap();
        assert_eq!(second.produced_by, ProducedBy::Real);
        assert_eq!(second.entries[0].name, "rice");
        assert!(predictor.engine().is_available());
    }

    #[test]
    fn test_empty_scores_degrade_to_dummy() {
        let predictor = predictor_with(
            Box::new(FakeRunner(ModelOutput::Classification { scores: vec![] })),
            kimchi_labels(),
        );
        assert!(predictor.predict(&photo(), 3).unwrap().is_dummy());
    }

    #[test]
    fn test_decode_error_propagates_when_available() {
        let predictor = predictor_with(
            Box::new(FakeRunner(ModelOutput::Classification {
                scores: vec![0.5],
            })),
            kimchi_labels(),
        );
        let result = predictor.predict(b"definitely not a photo", 3);
        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }

    #[test]
    fn test_dummy_prediction_contents() {
        let dummy = dummy_prediction();
        assert_eq!(dummy.entries.len(), 2);
        assert_eq!(dummy.entries[0].model_calories, Some(310));
        assert_eq!(dummy.entries[1].model_calories, Some(140));
        assert_eq!(dummy.produced_by, ProducedBy::Dummy);
    }
}
