//! # Rice Leaf Classifier
//!
//! A Rust library for rice leaf disease classification using the Burn framework.
//! An upload is first checked for leaf-like green coverage, then classified
//! by a pre-trained CNN and paired with agronomic advice for the predicted
//! disease.
//!
//! ## Features
//!
//! - **Leaf check** rejects photos that are clearly not plant material before the model runs
//! - **Burn framework** for portable inference on CPU (NdArray) or GPU (CUDA)
//! - **Knowledge base** with symptoms, treatments and prevention for five rice leaf classes
//! - **Graceful degradation** when no model can be loaded
//!
//! ## Modules
//!
//! - `labels`: The ordered class label set
//! - `knowledge`: Disease knowledge base and lookups
//! - `inference`: Leaf validator, classifier adapter and diagnosis pipeline
//! - `model`: CNN record layout and model loading
//! - `config`: Application configuration
//! - `utils`: Logging, errors and helper functions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rice_leaf_classifier::{AppConfig, Diagnosis};
//!
//! let pipeline = AppConfig::default().build_pipeline()?;
//! let image = rice_leaf_classifier::utils::load_image("leaf.jpg".as_ref())?;
//!
//! match pipeline.diagnose(&image)? {
//!     Diagnosis::Classified(outcome) => println!("{}", outcome.display()),
//!     Diagnosis::NotALeaf { .. } => println!("{}", rice_leaf_classifier::inference::NOT_A_LEAF_MESSAGE),
//! }
//! ```

pub mod backend;
pub mod config;
pub mod inference;
pub mod knowledge;
pub mod labels;
pub mod model;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::AppConfig;
pub use inference::{
    ClassificationOutcome, Classifier, Diagnosis, DiagnosisPipeline, InferenceModel, LeafValidator,
    ValidatorConfig,
};
pub use knowledge::{DiseaseRecord, KnowledgeBase};
pub use labels::{LabelSet, CLASS_NAMES, NUM_CLASSES};
pub use model::{load_model, BurnModel, ModelSettings, RiceLeafNet};
pub use utils::error::{Result, RiceLeafError};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
