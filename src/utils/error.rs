//! Error Handling Module
//!
//! Defines the error taxonomy for the rice leaf classifier.
//! Uses thiserror for ergonomic error definitions.
//!
//! Only [`RiceLeafError::ModelUnavailable`] is expected to reach callers of the
//! classification pipeline. `ValidationInconclusive` and `UnknownLabel` exist so
//! internal faults can be named and logged before they are absorbed.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for rice leaf classification
#[derive(Error, Debug)]
pub enum RiceLeafError {
    /// No inference handle could be initialized
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The leaf check could not reach a verdict (always resolved to "proceed")
    #[error("Leaf validation inconclusive: {0}")]
    ValidationInconclusive(String),

    /// A label has no entry in the knowledge base (always resolved to an empty record)
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    /// Model output width does not match the label set
    #[error("Label set has {expected} classes but the model produces {actual}")]
    LabelMismatch { expected: usize, actual: usize },

    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoadError(PathBuf, String),

    /// Error while running the model
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl RiceLeafError {
    /// Message suitable for showing to an end user.
    ///
    /// Model problems are reported as a temporary service condition rather than
    /// an internal failure.
    pub fn user_message(&self) -> String {
        match self {
            RiceLeafError::ModelUnavailable(_) => crate::inference::MODEL_UNAVAILABLE_MESSAGE.to_string(),
            RiceLeafError::ImageLoadError(..) => {
                "The uploaded file could not be read as an image. Please upload a JPEG or PNG photo.".to_string()
            }
            other => format!("Classification failed: {}", other),
        }
    }

    /// Whether this error means the classifier cannot run at all
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, RiceLeafError::ModelUnavailable(_))
    }
}

impl From<serde_json::Error> for RiceLeafError {
    fn from(err: serde_json::Error) -> Self {
        RiceLeafError::Serialization(err.to_string())
    }
}

/// Convenience Result type for rice leaf operations
pub type Result<T> = std::result::Result<T, RiceLeafError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| RiceLeafError::Config(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| RiceLeafError::Config(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| RiceLeafError::Config(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| RiceLeafError::Config(f()))
    }
}
