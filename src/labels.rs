//! Rice disease label set
//!
//! The classifier's raw output is a vector whose position *i* belongs to label
//! *i* of this sequence. The order must be exactly the order the model was
//! trained with; a reordering does not fail, it silently mislabels every
//! prediction. [`LabelSet::ensure_width`] turns the length half of that
//! contract into a checked error.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, RiceLeafError};

/// Number of rice leaf classes in the current deployment
pub const NUM_CLASSES: usize = 5;

/// Class names in model output order
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Bacterial Leaf Blight", // 0
    "Brown Spot",            // 1
    "Healthy Rice Leaf",     // 2
    "Leaf Blast",            // 3
    "Sheath Blight",         // 4
];

/// Label of the healthy class
pub const HEALTHY_LABEL: &str = "Healthy Rice Leaf";

/// Get the class name for a given output index
pub fn class_name(index: usize) -> Option<&'static str> {
    CLASS_NAMES.get(index).copied()
}

/// Get the output index for a given class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

/// Check if a class represents a healthy leaf
pub fn is_healthy_class(index: usize) -> bool {
    class_name(index).map(|name| name == HEALTHY_LABEL).unwrap_or(false)
}

/// Ordered, validated sequence of class names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Build a label set, rejecting empty sets, blank names and duplicates
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        if labels.is_empty() {
            return Err(RiceLeafError::Config("label set must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                return Err(RiceLeafError::Config("label names must not be blank".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(RiceLeafError::Config(format!("duplicate label '{}'", label)));
            }
        }

        Ok(Self { labels })
    }

    /// The rice disease labels the deployed model was trained on
    pub fn rice() -> Self {
        Self {
            labels: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label at an output position
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Output position of a label
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// Check that a model output width matches this label set
    pub fn ensure_width(&self, width: usize) -> Result<()> {
        if width != self.labels.len() {
            return Err(RiceLeafError::LabelMismatch {
                expected: self.labels.len(),
                actual: width,
            });
        }
        Ok(())
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::rice()
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = RiceLeafError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(set: LabelSet) -> Self {
        set.labels
    }
}

impl std::fmt::Display for LabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, label) in self.labels.iter().enumerate() {
            writeln!(f, "{:>2}  {}", i, label)?;
        }
        Ok(())
    }
}
