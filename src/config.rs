//! Application configuration
//!
//! One JSON file holds everything the service needs at startup: where the
//! model lives, the class labels in model output order, the leaf check band
//! and the knowledge base location. Every section is optional in the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::inference::{DiagnosisPipeline, LeafValidator, ValidatorConfig};
use crate::knowledge::KnowledgeBase;
use crate::labels::{LabelSet, CLASS_NAMES};
use crate::model::{load_classifier, ModelSettings};
use crate::utils::error::{Result, ResultExt, RiceLeafError};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model location and input size
    pub model: ModelSettings,
    /// Class labels in the order of the model's output
    pub labels: Vec<String>,
    /// Leaf check parameters
    pub validator: ValidatorConfig,
    /// External knowledge base; the embedded table is used when absent
    pub knowledge_base: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            labels: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            validator: ValidatorConfig::default(),
            knowledge_base: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RiceLeafError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate().map_err(RiceLeafError::Config)?;
        self.validator.validate()?;
        self.label_set()?;
        Ok(())
    }

    /// The configured labels as a validated set
    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(self.labels.iter().cloned())
    }

    /// Apply command-line overrides; a model path is tried before the
    /// configured candidates
    pub fn apply_overrides(
        &mut self,
        model: Option<PathBuf>,
        knowledge_base: Option<PathBuf>,
        threshold: Option<f64>,
    ) {
        if let Some(path) = model {
            self.model.prepend(path);
        }
        if let Some(path) = knowledge_base {
            self.knowledge_base = Some(path);
        }
        if let Some(threshold) = threshold {
            self.validator = self.validator.with_threshold(threshold);
        }
    }

    /// Load the knowledge base and model once and wire up the pipeline.
    ///
    /// Only configuration errors fail here; a missing model leaves the
    /// classifier unavailable.
    pub fn build_pipeline(&self) -> Result<DiagnosisPipeline> {
        self.validate()?;

        let labels = self.label_set()?;
        let knowledge = Arc::new(KnowledgeBase::load(self.knowledge_base.as_deref()));
        let classifier = load_classifier(&self.model, labels, knowledge);

        info!(
            "Pipeline ready (classifier {})",
            if classifier.is_available() { "available" } else { "unavailable" }
        );

        Ok(DiagnosisPipeline::new(
            LeafValidator::new(self.validator),
            classifier,
        ))
    }
}
