//! Inference module: leaf validation, classification and the pipeline that
//! combines them
//!
//! This module provides:
//! - A colour-space leaf check that runs before the model
//! - The classifier adapter around a pre-loaded model handle
//! - The diagnosis pipeline used by callers
//!
//! ## Control flow
//!
//! image → [`LeafValidator`] (reject or continue) → [`Classifier`] (predict)
//! → knowledge-base lookup → [`ClassificationOutcome`]

pub mod pipeline;
pub mod predictor;
pub mod validator;

// Re-export main types for convenience
pub use pipeline::{Diagnosis, DiagnosisPipeline};
pub use predictor::{
    preprocess, ClassProbability, ClassificationOutcome, Classifier, InferenceModel, InputTensor,
};
pub use validator::{
    rgb_to_hsv, validate_leaf_image, Hsv, LeafCoverage, LeafValidator, LeafVerdict, ValidatorConfig,
};

/// Shown when the leaf check rejects an upload
pub const NOT_A_LEAF_MESSAGE: &str = "The uploaded image does not appear to be a rice leaf. \
Please upload a clear image of a rice leaf for accurate disease detection.";

/// Shown when no model could be loaded
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "The disease classifier is temporarily unavailable. \
Please try again later.";
