//! Loading trained weights into a ready-to-use model handle
//!
//! The model is loaded once at startup and shared; inference calls are
//! serialized on a lock around the module.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};
use tracing::{debug, error, info, warn};

use super::cnn::{RiceLeafNet, RiceLeafNetConfig};
use super::config::ModelSettings;
use crate::backend::{default_device, InferenceBackend};
use crate::inference::{Classifier, InferenceModel, InputTensor};
use crate::knowledge::KnowledgeBase;
use crate::labels::LabelSet;
use crate::utils::error::{Result, RiceLeafError};

/// Extension the compact recorder writes and reads
pub const WEIGHTS_EXTENSION: &str = "mpk";

/// A burn model loaded from disk
pub struct BurnModel<B: Backend = InferenceBackend> {
    model: Mutex<RiceLeafNet<B>>,
    config: RiceLeafNetConfig,
    device: B::Device,
    source: PathBuf,
}

impl<B: Backend> std::fmt::Debug for BurnModel<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BurnModel")
            .field("source", &self.source)
            .field("num_classes", &self.config.num_classes)
            .field("input_size", &self.config.input_size)
            .finish()
    }
}

impl<B: Backend> BurnModel<B> {
    /// Wrap an already built module
    pub fn from_module(
        model: RiceLeafNet<B>,
        config: RiceLeafNetConfig,
        device: B::Device,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model: Mutex::new(model),
            config,
            device,
            source: source.into(),
        }
    }

    /// Load weights from `weights`, reading the architecture from the sidecar
    /// JSON next to it (defaults when there is none).
    ///
    /// `expected_input_size` must match the sidecar's input size.
    pub fn load(weights: &Path, expected_input_size: u32, device: &B::Device) -> Result<Self> {
        let resolved = weights.with_extension(WEIGHTS_EXTENSION);
        if !resolved.exists() {
            return Err(RiceLeafError::PathNotFound(resolved));
        }

        let sidecar = ModelSettings::sidecar_path(weights);
        let config = if sidecar.exists() {
            RiceLeafNetConfig::load(&sidecar).map_err(|e| {
                RiceLeafError::Config(format!(
                    "Invalid model config {}: {:?}",
                    sidecar.display(),
                    e
                ))
            })?
        } else {
            debug!("No model config at {:?}, using defaults", sidecar);
            RiceLeafNetConfig::new()
        };

        if config.input_size != expected_input_size as usize {
            return Err(RiceLeafError::Config(format!(
                "Model at {} expects {}x{} input, configured for {}x{}",
                resolved.display(),
                config.input_size,
                config.input_size,
                expected_input_size,
                expected_input_size
            )));
        }

        let model = RiceLeafNet::new(&config, device)
            .load_file(resolved.clone(), &CompactRecorder::new(), device)
            .map_err(|e| {
                RiceLeafError::Inference(format!(
                    "Failed to load weights from {}: {:?}",
                    resolved.display(),
                    e
                ))
            })?;

        info!(
            "Loaded model from {:?} ({} classes, {}x{} input)",
            resolved, config.num_classes, config.input_size, config.input_size
        );

        Ok(Self::from_module(model, config, device.clone(), resolved))
    }

    pub fn config(&self) -> &RiceLeafNetConfig {
        &self.config
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl<B: Backend> InferenceModel for BurnModel<B> {
    fn input_size(&self) -> u32 {
        self.config.input_size as u32
    }

    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
        if input.size() != self.config.input_size {
            return Err(RiceLeafError::Inference(format!(
                "Input is {}x{}, model expects {}x{}",
                input.size(),
                input.size(),
                self.config.input_size,
                self.config.input_size
            )));
        }

        // NHWC -> NCHW
        let tensor = Tensor::<B, 1>::from_floats(input.as_slice(), &self.device)
            .reshape(input.shape())
            .permute([0, 3, 1, 2]);

        let output = {
            let model = self
                .model
                .lock()
                .map_err(|_| RiceLeafError::Inference("Model lock poisoned".to_string()))?;
            if self.config.apply_softmax {
                model.forward_softmax(tensor)
            } else {
                model.forward(tensor)
            }
        };

        output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| RiceLeafError::Inference(format!("Failed to read model output: {:?}", e)))
    }

    fn name(&self) -> String {
        format!("RiceLeafNet ({})", self.source.display())
    }
}

/// Try each candidate path in order on `device`; the first that loads wins
pub fn load_model_on<B: Backend>(
    settings: &ModelSettings,
    device: &B::Device,
) -> Result<BurnModel<B>> {
    let mut failures = Vec::new();

    for candidate in &settings.candidate_paths {
        match BurnModel::load(candidate, settings.input_size, device) {
            Ok(model) => return Ok(model),
            Err(e) => {
                warn!("Could not load model from {:?}: {}", candidate, e);
                failures.push(format!("{}: {}", candidate.display(), e));
            }
        }
    }

    let reason = if failures.is_empty() {
        "no model path configured".to_string()
    } else {
        failures.join("; ")
    };
    Err(RiceLeafError::ModelUnavailable(reason))
}

/// Try each candidate path in order on the default device
pub fn load_model(settings: &ModelSettings) -> Result<BurnModel> {
    load_model_on::<InferenceBackend>(settings, &default_device())
}

/// Build the classifier for `labels`.
///
/// Never fails: when no model can be loaded, or its output width does not
/// match the labels, the classifier is created unavailable and every
/// classification reports `ModelUnavailable`.
pub fn load_classifier(
    settings: &ModelSettings,
    labels: LabelSet,
    knowledge: Arc<KnowledgeBase>,
) -> Classifier {
    let model = match load_model(settings) {
        Ok(model) => model,
        Err(e) => {
            error!("Classifier unavailable: {}", e);
            return Classifier::unavailable(labels, knowledge, e.to_string());
        }
    };

    match Classifier::new(labels.clone(), Arc::new(model), knowledge.clone()) {
        Ok(classifier) => classifier,
        Err(e) => {
            error!("Classifier unavailable: {}", e);
            Classifier::unavailable(labels, knowledge, e.to_string())
        }
    }
}
