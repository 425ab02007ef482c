//! Model location settings
//!
//! Where to look for the weights and which input size the loaded model must
//! accept. The architecture itself is described by the sidecar
//! [`RiceLeafNetConfig`](super::cnn::RiceLeafNetConfig) saved next to the
//! weights.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default weights file name
pub const DEFAULT_MODEL_FILE: &str = "rice_leaf_model.mpk";

/// Default square input size of the deployed model
pub const DEFAULT_INPUT_SIZE: u32 = 256;

/// Settings for locating and checking the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Weight files tried in order; the first that loads wins
    pub candidate_paths: Vec<PathBuf>,

    /// Input size the model must accept (width and height)
    pub input_size: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            candidate_paths: vec![
                PathBuf::from("models").join(DEFAULT_MODEL_FILE),
                PathBuf::from(DEFAULT_MODEL_FILE),
            ],
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl ModelSettings {
    /// Settings that try a single weights file
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            candidate_paths: vec![path.into()],
            ..Default::default()
        }
    }

    /// Put `path` in front of the existing candidates
    pub fn prepend(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.candidate_paths.retain(|p| p != &path);
        self.candidate_paths.insert(0, path);
    }

    /// Sidecar config path for a weights file (`model.mpk` → `model.json`)
    pub fn sidecar_path(weights: &Path) -> PathBuf {
        weights.with_extension("json")
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.input_size == 0 {
            return Err("input_size must be greater than 0".to_string());
        }

        if self.candidate_paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err("candidate_paths must not contain empty paths".to_string());
        }

        Ok(())
    }
}
