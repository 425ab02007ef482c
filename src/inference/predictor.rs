//! Classifier Adapter
//!
//! Turns a decoded RGB raster into a labeled, ranked probability
//! distribution:
//!
//! 1. resize to the model's square input size,
//! 2. lay out as a `[1, size, size, 3]` tensor with raw 0-255 pixel values
//!    (no normalization; the deployed model was trained on raw pixels),
//! 3. run the model once,
//! 4. map output position *i* to label *i*, pick the arg-max and attach the
//!    knowledge-base record.
//!
//! The model handle is shared and read-only. Whether concurrent `predict`
//! calls are safe is the handle's business: implementations that cannot run
//! concurrently must serialize internally (see `model::BurnModel`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{imageops::FilterType, DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::knowledge::{DiseaseRecord, KnowledgeBase};
use crate::labels::LabelSet;
use crate::utils::error::{Result, RiceLeafError};
use crate::utils::{format_millis, to_percentage};

/// Slack allowed on each probability outside [0, 1]
const PROBABILITY_TOLERANCE: f32 = 1e-4;

/// Slack allowed on the sum of the distribution
const DISTRIBUTION_SUM_TOLERANCE: f32 = 1e-3;

/// Input tensor in NHWC layout with a batch dimension of 1
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    size: usize,
}

impl InputTensor {
    /// Build from an RGB raster that is already `size`×`size`
    pub fn from_rgb(image: &RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width != height {
            return Err(RiceLeafError::Inference(format!(
                "model input must be square, got {}x{}",
                width, height
            )));
        }

        // RgbImage is stored row-major with interleaved channels, which is HWC
        let data = image.as_raw().iter().map(|&v| v as f32).collect();

        Ok(Self {
            data,
            size: width as usize,
        })
    }

    /// Tensor shape as `[batch, height, width, channels]`
    pub fn shape(&self) -> [usize; 4] {
        [1, self.size, self.size, 3]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Resize a raster to the model's square input and lay it out as a tensor
pub fn preprocess(image: &DynamicImage, size: u32) -> Result<InputTensor> {
    if image.width() == 0 || image.height() == 0 {
        return Err(RiceLeafError::Inference(format!(
            "cannot classify an empty {}x{} image",
            image.width(),
            image.height()
        )));
    }
    let resized = image.resize_exact(size, size, FilterType::CatmullRom);
    InputTensor::from_rgb(&resized.to_rgb8())
}

/// A loaded inference model.
///
/// `predict` receives one preprocessed image and returns one probability per
/// class, in the order the model was trained with.
pub trait InferenceModel: Send + Sync {
    /// Square spatial input size the model expects
    fn input_size(&self) -> u32;

    /// Width of the output vector
    fn num_classes(&self) -> usize;

    /// Run a single forward pass
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>>;

    /// Short description for logs
    fn name(&self) -> String {
        "model".to_string()
    }
}

/// Probability assigned to one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    /// Percentage in [0, 100], rounded to 2 decimals
    pub percentage: f64,
}

/// Result of classifying one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    /// Predicted class name
    pub predicted_label: String,

    /// Output position of the predicted class
    pub predicted_index: usize,

    /// Probability of the predicted class as a percentage, rounded to 2 decimals
    pub confidence: f64,

    /// Every class with its percentage, in label-set order
    pub probabilities: Vec<ClassProbability>,

    /// Knowledge-base entry for the predicted class
    pub disease_info: DiseaseRecord,

    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl ClassificationOutcome {
    /// Build an outcome from raw model probabilities.
    ///
    /// Ties for the maximum go to the lowest index.
    pub fn from_probabilities(
        probabilities: &[f32],
        labels: &LabelSet,
        knowledge: &KnowledgeBase,
        inference_time: Duration,
    ) -> Result<Self> {
        labels.ensure_width(probabilities.len())?;

        if let Some(bad) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(RiceLeafError::Inference(format!(
                "model produced a non-finite probability at index {}",
                bad
            )));
        }

        if let Some(bad) = probabilities
            .iter()
            .position(|&p| !(-PROBABILITY_TOLERANCE..=1.0 + PROBABILITY_TOLERANCE).contains(&p))
        {
            return Err(RiceLeafError::Inference(format!(
                "model output {} at index {} is not a probability",
                probabilities[bad], bad
            )));
        }

        let total: f32 = probabilities.iter().sum();
        if (total - 1.0).abs() > DISTRIBUTION_SUM_TOLERANCE {
            return Err(RiceLeafError::Inference(format!(
                "model output sums to {} instead of 1",
                total
            )));
        }

        let mut predicted_index = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[predicted_index] {
                predicted_index = i;
            }
        }

        let predicted_label = labels
            .get(predicted_index)
            .ok_or_else(|| RiceLeafError::Inference(format!("no label at index {}", predicted_index)))?
            .to_string();

        let probabilities = labels
            .iter()
            .zip(probabilities)
            .map(|(label, &p)| ClassProbability {
                label: label.to_string(),
                percentage: to_percentage(p),
            })
            .collect::<Vec<_>>();

        Ok(Self {
            confidence: probabilities[predicted_index].percentage,
            disease_info: knowledge.lookup(&predicted_label),
            predicted_label,
            predicted_index,
            probabilities,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// Percentage for a label, if it is part of the distribution
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.percentage)
    }

    /// The `k` most likely classes, highest first (stable for equal values)
    pub fn top_k(&self, k: usize) -> Vec<&ClassProbability> {
        let mut ranked: Vec<&ClassProbability> = self.probabilities.iter().collect();
        ranked.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
        ranked.truncate(k);
        ranked
    }

    /// Sum of all percentages (100 up to rounding)
    pub fn total_percentage(&self) -> f64 {
        self.probabilities.iter().map(|p| p.percentage).sum()
    }

    /// Check if the prediction meets a confidence threshold (percent)
    pub fn is_high_confidence(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }

    pub fn is_healthy(&self) -> bool {
        self.disease_info.is_healthy()
    }

    /// Pretty print the outcome
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Prediction: {}\n", self.predicted_label));
        if let Some(scientific) = self.disease_info.scientific_name() {
            output.push_str(&format!("Pathogen: {}\n", scientific));
        }
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence));
        output.push_str(&format!("Inference time: {}\n", format_millis(self.inference_time_ms)));

        output.push_str("\nClass probabilities:\n");
        for (i, class) in self.top_k(self.probabilities.len()).iter().enumerate() {
            output.push_str(&format!("  {}. {} - {:.2}%\n", i + 1, class.label, class.percentage));
        }

        output
    }
}

/// Classifier: label set + optional model handle + knowledge base
#[derive(Clone)]
pub struct Classifier {
    labels: LabelSet,
    model: Option<Arc<dyn InferenceModel>>,
    knowledge: Arc<KnowledgeBase>,
    unavailable_reason: String,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("labels", &self.labels)
            .field("model", &self.model.as_ref().map(|m| m.name()))
            .field("knowledge_entries", &self.knowledge.len())
            .finish()
    }
}

impl Classifier {
    /// Create a classifier around a loaded model.
    ///
    /// Fails if the model's output width differs from the label count.
    pub fn new(
        labels: LabelSet,
        model: Arc<dyn InferenceModel>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Result<Self> {
        labels.ensure_width(model.num_classes())?;
        knowledge.missing_labels(&labels);

        info!(
            "Classifier ready: {} ({} classes, {}x{} input)",
            model.name(),
            labels.len(),
            model.input_size(),
            model.input_size()
        );

        Ok(Self {
            labels,
            model: Some(model),
            knowledge,
            unavailable_reason: String::new(),
        })
    }

    /// Create a classifier without a model; every classification fails with
    /// `ModelUnavailable`
    pub fn unavailable(labels: LabelSet, knowledge: Arc<KnowledgeBase>, reason: impl Into<String>) -> Self {
        Self {
            labels,
            model: None,
            knowledge,
            unavailable_reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Classify one image. Runs the model exactly once; failures are not retried.
    pub fn classify_image(&self, image: &DynamicImage) -> Result<ClassificationOutcome> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RiceLeafError::ModelUnavailable(self.unavailable_reason.clone()))?;

        let input = preprocess(image, model.input_size())?;

        let start = Instant::now();
        let probabilities = model.predict(&input)?;
        let inference_time = start.elapsed();

        debug!("Raw predictions: {:?}", probabilities);

        let outcome = ClassificationOutcome::from_probabilities(
            &probabilities,
            &self.labels,
            &self.knowledge,
            inference_time,
        )?;

        info!(
            label = %outcome.predicted_label,
            confidence = outcome.confidence,
            "Classified image in {}",
            format_millis(outcome.inference_time_ms)
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed vector and records what it was given
    struct FixedModel {
        output: Vec<f32>,
        size: u32,
        calls: AtomicUsize,
        last_shape: Mutex<Option<[usize; 4]>>,
    }

    impl FixedModel {
        fn new(output: Vec<f32>) -> Self {
            Self {
                output,
                size: 256,
                calls: AtomicUsize::new(0),
                last_shape: Mutex::new(None),
            }
        }
    }

    impl InferenceModel for FixedModel {
        fn input_size(&self) -> u32 {
            self.size
        }

        fn num_classes(&self) -> usize {
            self.output.len()
        }

        fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_shape.lock().unwrap() = Some(input.shape());
            Ok(self.output.clone())
        }
    }

    fn knowledge() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::embedded().unwrap())
    }

    fn green_leaf() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(256, 256, Rgb([0, 255, 0])))
    }

    #[test]
    fn test_preprocess_shape_and_raw_values() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([10, 200, 30])));
        let tensor = preprocess(&image, 256).unwrap();

        assert_eq!(tensor.shape(), [1, 256, 256, 3]);
        assert_eq!(tensor.as_slice().len(), 256 * 256 * 3);
        // no normalization: channels keep their 0-255 values, interleaved
        assert_eq!(&tensor.as_slice()[..3], &[10.0, 200.0, 30.0]);
    }

    #[test]
    fn test_preprocess_rejects_empty_image() {
        assert!(matches!(
            preprocess(&DynamicImage::new_rgb8(0, 0), 256),
            Err(RiceLeafError::Inference(_))
        ));
    }

    #[test]
    fn test_input_tensor_rejects_non_square() {
        assert!(InputTensor::from_rgb(&RgbImage::new(10, 20)).is_err());
    }

    #[test]
    fn test_healthy_prediction() {
        let model = Arc::new(FixedModel::new(vec![0.05, 0.05, 0.85, 0.03, 0.02]));
        let classifier = Classifier::new(LabelSet::rice(), model.clone(), knowledge()).unwrap();

        let outcome = classifier.classify_image(&green_leaf()).unwrap();

        assert_eq!(outcome.predicted_label, "Healthy Rice Leaf");
        assert_eq!(outcome.predicted_index, 2);
        assert_eq!(outcome.confidence, 85.0);
        assert_eq!(outcome.probabilities.len(), 5);
        assert!((outcome.total_percentage() - 100.0).abs() < 0.1);
        assert!(outcome.is_healthy());
        assert_eq!(outcome.disease_info.disease_name(), Some("Healthy Rice Leaf"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*model.last_shape.lock().unwrap(), Some([1, 256, 256, 3]));
    }

    #[test]
    fn test_distribution_in_label_order() {
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.1, 0.2, 0.3, 0.15, 0.25],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::from_millis(3),
        )
        .unwrap();

        let labels: Vec<&str> = outcome.probabilities.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, crate::labels::CLASS_NAMES.to_vec());
        assert_eq!(outcome.probability_of("Sheath Blight"), Some(25.0));
        assert_eq!(outcome.probability_of("Rice Tungro"), None);
    }

    #[test]
    fn test_predicted_label_is_distribution_max() {
        let cases: [[f32; 5]; 4] = [
            [0.9, 0.025, 0.025, 0.025, 0.025],
            [0.01, 0.01, 0.01, 0.01, 0.96],
            [0.2, 0.2, 0.2, 0.2, 0.2],
            [0.123_456, 0.234_567, 0.345_678, 0.196_299, 0.1],
        ];
        let kb = KnowledgeBase::embedded().unwrap();

        for probs in cases {
            let outcome =
                ClassificationOutcome::from_probabilities(&probs, &LabelSet::rice(), &kb, Duration::ZERO).unwrap();
            let max = outcome
                .probabilities
                .iter()
                .map(|p| p.percentage)
                .fold(f64::MIN, f64::max);

            assert_eq!(outcome.confidence, max);
            assert_eq!(outcome.probability_of(&outcome.predicted_label), Some(max));
            assert!(outcome.probabilities.iter().all(|p| (0.0..=100.0).contains(&p.percentage)));
            assert!((outcome.total_percentage() - 100.0).abs() <= 0.1);
        }
    }

    #[test]
    fn test_ties_break_on_lowest_index() {
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.1, 0.4, 0.1, 0.4, 0.0],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(outcome.predicted_index, 1);
        assert_eq!(outcome.predicted_label, "Brown Spot");

        let uniform = ClassificationOutcome::from_probabilities(
            &[0.2; 5],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(uniform.predicted_index, 0);
    }

    #[test]
    fn test_rounding_to_two_decimals() {
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.123_456, 0.876_544, 0.0, 0.0, 0.0],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(outcome.confidence, 87.65);
        assert_eq!(outcome.probability_of("Bacterial Leaf Blight"), Some(12.35));
    }

    #[test]
    fn test_model_unavailable() {
        let classifier = Classifier::unavailable(LabelSet::rice(), knowledge(), "weights not found");
        assert!(!classifier.is_available());

        let err = classifier.classify_image(&green_leaf()).unwrap_err();
        assert!(matches!(err, RiceLeafError::ModelUnavailable(ref reason) if reason == "weights not found"));
    }

    #[test]
    fn test_width_mismatch_rejected_at_construction() {
        let model = Arc::new(FixedModel::new(vec![0.5, 0.5]));
        let err = Classifier::new(LabelSet::rice(), model, knowledge()).unwrap_err();
        assert!(matches!(err, RiceLeafError::LabelMismatch { expected: 5, actual: 2 }));
    }

    #[test]
    fn test_non_finite_output_rejected() {
        let err = ClassificationOutcome::from_probabilities(
            &[0.1, f32::NAN, 0.3, 0.3, 0.3],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, RiceLeafError::Inference(_)));
    }

    #[test]
    fn test_logits_rejected() {
        let knowledge = KnowledgeBase::embedded().unwrap();

        for output in [
            [3.5, -1.0, 0.2, 0.1, 0.0],
            [0.5, 0.5, 0.5, 0.0, 0.0],
            [0.1, 0.1, 0.1, 0.1, 0.1],
        ] {
            let err = ClassificationOutcome::from_probabilities(
                &output,
                &LabelSet::rice(),
                &knowledge,
                Duration::ZERO,
            )
            .unwrap_err();
            assert!(matches!(err, RiceLeafError::Inference(_)), "accepted {:?}", output);
        }
    }

    #[test]
    fn test_float_noise_in_distribution_accepted() {
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.2000004, 0.2, 0.2, 0.2, 0.1999996],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(outcome.predicted_index, 0);
    }

    #[test]
    fn test_unknown_label_gets_empty_record() {
        let labels = LabelSet::new(["Bacterial Leaf Blight", "Rice Tungro"]).unwrap();
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.3, 0.7],
            &labels,
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(outcome.predicted_label, "Rice Tungro");
        assert!(outcome.disease_info.is_empty());
    }

    #[test]
    fn test_top_k_and_display() {
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.05, 0.6, 0.05, 0.25, 0.05],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::from_millis(12),
        )
        .unwrap();

        let top = outcome.top_k(2);
        assert_eq!(top[0].label, "Brown Spot");
        assert_eq!(top[1].label, "Leaf Blast");
        assert!(outcome.is_high_confidence(50.0));

        let text = outcome.display();
        assert!(text.contains("Prediction: Brown Spot"));
        assert!(text.contains("Cochliobolus miyabeanus"));
        assert!(text.contains("60.00%"));
    }

    #[test]
    fn test_outcome_serializes_with_record() {
        let outcome = ClassificationOutcome::from_probabilities(
            &[0.7, 0.1, 0.1, 0.05, 0.05],
            &LabelSet::rice(),
            &KnowledgeBase::embedded().unwrap(),
            Duration::ZERO,
        )
        .unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["predicted_label"], "Bacterial Leaf Blight");
        assert_eq!(json["disease_info"]["scientific_name"], "Xanthomonas oryzae pv. oryzae");
        assert_eq!(json["probabilities"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_classifier_is_shareable_across_threads() {
        let model = Arc::new(FixedModel::new(vec![0.1, 0.1, 0.1, 0.6, 0.1]));
        let classifier = Arc::new(Classifier::new(LabelSet::rice(), model.clone(), knowledge()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let classifier = Arc::clone(&classifier);
                std::thread::spawn(move || classifier.classify_image(&green_leaf()).unwrap().predicted_label)
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "Leaf Blast");
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 4);
    }
}
