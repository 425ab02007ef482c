//! Model module: the burn network behind the classifier
//!
//! This module provides:
//! - The CNN record layout the trained weights are loaded into
//! - Settings for where the weights live
//! - Loading with fallback paths and a shareable model handle
//!
//! Training is out of scope; weights are produced elsewhere and saved with
//! burn's `CompactRecorder` plus a JSON sidecar describing the architecture.

pub mod cnn;
pub mod config;
pub mod loader;

// Re-export main types for convenience
pub use cnn::{RiceLeafNet, RiceLeafNetConfig};
pub use config::{ModelSettings, DEFAULT_INPUT_SIZE, DEFAULT_MODEL_FILE};
pub use loader::{load_classifier, load_model, load_model_on, BurnModel};
