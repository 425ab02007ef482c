//! Diagnosis pipeline: leaf check, then classification.
//!
//! Images that fail the leaf check never reach the model.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::predictor::{ClassificationOutcome, Classifier};
use super::validator::{LeafCoverage, LeafValidator};
use crate::utils::error::Result;

/// Outcome of running an upload through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Diagnosis {
    /// The image was rejected by the leaf check; the model was not run
    NotALeaf { coverage: Option<LeafCoverage> },
    /// The image was classified
    Classified(ClassificationOutcome),
}

impl Diagnosis {
    pub fn outcome(&self) -> Option<&ClassificationOutcome> {
        match self {
            Diagnosis::Classified(outcome) => Some(outcome),
            Diagnosis::NotALeaf { .. } => None,
        }
    }

    pub fn into_outcome(self) -> Option<ClassificationOutcome> {
        match self {
            Diagnosis::Classified(outcome) => Some(outcome),
            Diagnosis::NotALeaf { .. } => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Diagnosis::Classified(_))
    }
}

/// Validator and classifier wired together
#[derive(Debug, Clone)]
pub struct DiagnosisPipeline {
    validator: LeafValidator,
    classifier: Classifier,
}

impl DiagnosisPipeline {
    pub fn new(validator: LeafValidator, classifier: Classifier) -> Self {
        Self { validator, classifier }
    }

    pub fn validator(&self) -> &LeafValidator {
        &self.validator
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Check the image and classify it if it looks like a leaf.
    ///
    /// Only classifier errors (chiefly `ModelUnavailable`) are returned.
    pub fn diagnose(&self, image: &DynamicImage) -> Result<Diagnosis> {
        let verdict = self.validator.assess(image);
        if !verdict.leaf_like {
            info!(
                green_ratio = verdict.coverage.map(|c| c.green_ratio),
                "Image rejected by leaf check"
            );
            return Ok(Diagnosis::NotALeaf {
                coverage: verdict.coverage,
            });
        }

        self.classifier.classify_image(image).map(Diagnosis::Classified)
    }
}
