//! Disease Knowledge Base
//!
//! Static agronomic reference data keyed by class label: symptoms, causes,
//! prevention and treatment options for each disease, and upkeep advice for
//! healthy leaves.
//!
//! The table is read once at startup from a JSON file. When that file is
//! missing (or unreadable) the copy compiled into the binary is used instead,
//! so both sources always have the same shape. Lookups never fail: a label
//! without an entry yields [`DiseaseRecord::Empty`], which keeps a drift
//! between the model's taxonomy and this table from breaking a request.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::labels::LabelSet;
use crate::utils::error::{Result, RiceLeafError};

/// Knowledge base compiled into the binary
const EMBEDDED_KNOWLEDGE_BASE: &str = include_str!("../data/rice_disease_info.json");

/// Default file name looked up next to the working directory
pub const DEFAULT_KNOWLEDGE_BASE_FILE: &str = "rice_disease_info.json";

/// An organic or biological treatment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicCure {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub examples: Vec<String>,
    pub application: String,
    pub cost: String,
}

/// A chemical control product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChemicalPesticide {
    pub name: String,
    pub dosage: String,
    pub application: String,
    /// Minimum interval between the last spray and harvest
    pub safety_period: String,
    pub cost: String,
}

/// Reference entry for a disease class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseProfile {
    pub disease_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default)]
    pub prevention_methods: Vec<String>,
    #[serde(default)]
    pub organic_cures: Vec<OrganicCure>,
    #[serde(default)]
    pub chemical_pesticides: Vec<ChemicalPesticide>,
    #[serde(default)]
    pub cultural_controls: Vec<String>,
}

/// Reference entry for the healthy class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthyProfile {
    pub disease_name: String,
    pub characteristics: Vec<String>,
    #[serde(default)]
    pub maintenance_practices: Vec<String>,
    #[serde(default)]
    pub monitoring_recommendations: Vec<String>,
}

/// Placeholder returned for labels without an entry; serializes as `{}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyRecord {}

/// A knowledge-base entry.
///
/// Untagged so the JSON file keeps the flat layout of the reference data:
/// entries with `symptoms` are diseases, entries with `characteristics` are
/// the healthy class. Any other object is rejected when parsing; `Empty` is
/// only produced by lookups of unknown labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiseaseRecord {
    Disease(DiseaseProfile),
    Healthy(HealthyProfile),
    #[serde(skip_deserializing)]
    Empty(EmptyRecord),
}

impl Default for DiseaseRecord {
    fn default() -> Self {
        DiseaseRecord::Empty(EmptyRecord {})
    }
}

impl DiseaseRecord {
    /// Human-readable name, `None` for the empty record
    pub fn disease_name(&self) -> Option<&str> {
        match self {
            DiseaseRecord::Disease(profile) => Some(&profile.disease_name),
            DiseaseRecord::Healthy(profile) => Some(&profile.disease_name),
            DiseaseRecord::Empty(_) => None,
        }
    }

    pub fn scientific_name(&self) -> Option<&str> {
        match self {
            DiseaseRecord::Disease(profile) => profile.scientific_name.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DiseaseRecord::Empty(_))
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DiseaseRecord::Healthy(_))
    }

    pub fn as_disease(&self) -> Option<&DiseaseProfile> {
        match self {
            DiseaseRecord::Disease(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn as_healthy(&self) -> Option<&HealthyProfile> {
        match self {
            DiseaseRecord::Healthy(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Label → record table, immutable after loading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    records: BTreeMap<String, DiseaseRecord>,
}

impl KnowledgeBase {
    /// Parse a knowledge base from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: BTreeMap<String, DiseaseRecord> = serde_json::from_str(json)?;
        Ok(Self { records })
    }

    /// Load a knowledge base from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RiceLeafError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The table compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_json_str(EMBEDDED_KNOWLEDGE_BASE)
    }

    /// Load from `path` if given and readable, otherwise use the embedded table.
    ///
    /// Never fails: an unusable external file is logged and replaced.
    pub fn load(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match Self::from_file(path) {
                Ok(kb) => {
                    info!("Loaded knowledge base from {:?} ({} entries)", path, kb.len());
                    return kb;
                }
                Err(RiceLeafError::PathNotFound(_)) => {
                    info!("Knowledge base file {:?} not found, using embedded table", path);
                }
                Err(e) => {
                    warn!("Could not load knowledge base from {:?}: {}. Using embedded table", path, e);
                }
            }
        }

        match Self::embedded() {
            Ok(kb) => kb,
            Err(e) => {
                warn!("Embedded knowledge base is invalid: {}", e);
                Self::default()
            }
        }
    }

    /// Look up the record for a label; unknown labels give an empty record
    pub fn lookup(&self, label: &str) -> DiseaseRecord {
        match self.records.get(label) {
            Some(record) => record.clone(),
            None => {
                debug!("{}", RiceLeafError::UnknownLabel(label.to_string()));
                DiseaseRecord::default()
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&DiseaseRecord> {
        self.records.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.records.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Labels of `labels` that have no entry here, each logged as a warning
    pub fn missing_labels(&self, labels: &LabelSet) -> Vec<String> {
        let missing: Vec<String> = labels
            .iter()
            .filter(|label| !self.records.contains_key(*label))
            .map(str::to_string)
            .collect();

        for label in &missing {
            warn!("Label '{}' has no knowledge base entry; lookups will return an empty record", label);
        }

        missing
    }

    /// Serialize the table back to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }
}

/// The embedded table, parsed on first use
fn embedded_table() -> &'static KnowledgeBase {
    static TABLE: OnceLock<KnowledgeBase> = OnceLock::new();
    TABLE.get_or_init(|| KnowledgeBase::load(None))
}

/// Convenience lookup against the embedded table
pub fn lookup(label: &str) -> DiseaseRecord {
    embedded_table().lookup(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{CLASS_NAMES, HEALTHY_LABEL};

    #[test]
    fn test_embedded_covers_every_label() {
        let kb = KnowledgeBase::embedded().unwrap();
        assert_eq!(kb.len(), CLASS_NAMES.len());
        assert!(kb.missing_labels(&LabelSet::rice()).is_empty());

        for label in CLASS_NAMES {
            let record = kb.lookup(label);
            assert_eq!(record.disease_name(), Some(label));
        }
    }

    #[test]
    fn test_healthy_has_its_own_shape() {
        let kb = KnowledgeBase::embedded().unwrap();
        let healthy = kb.lookup(HEALTHY_LABEL);
        assert!(healthy.is_healthy());
        let profile = healthy.as_healthy().unwrap();
        assert_eq!(profile.characteristics.len(), 4);
        assert!(healthy.scientific_name().is_none());
    }

    #[test]
    fn test_disease_record_fields() {
        let kb = KnowledgeBase::embedded().unwrap();
        let blast = kb.lookup("Leaf Blast");
        let profile = blast.as_disease().unwrap();
        assert_eq!(profile.scientific_name.as_deref(), Some("Pyricularia oryzae"));
        assert_eq!(profile.organic_cures[0].kind, "Bio-fungicide");
        assert_eq!(profile.chemical_pesticides[0].name, "Tricyclazole");
        assert_eq!(profile.chemical_pesticides[0].safety_period, "30 days");
    }

    #[test]
    fn test_unknown_label_gives_empty_record() {
        let kb = KnowledgeBase::embedded().unwrap();
        let record = kb.lookup("Rice Tungro");
        assert!(record.is_empty());
        assert_eq!(record.disease_name(), None);
        assert_eq!(serde_json::to_string(&record).unwrap(), "{}");
    }

    #[test]
    fn test_missing_labels_reports_drift() {
        let kb = KnowledgeBase::from_json_str(
            r#"{"Brown Spot": {"disease_name": "Brown Spot", "symptoms": ["spots"]}}"#,
        )
        .unwrap();
        let missing = kb.missing_labels(&LabelSet::rice());
        assert_eq!(missing.len(), 4);
        assert!(!missing.contains(&"Brown Spot".to_string()));
    }

    #[test]
    fn test_record_roundtrip_keeps_shape() {
        let kb = KnowledgeBase::embedded().unwrap();
        let json = kb.to_json_string().unwrap();
        let reparsed = KnowledgeBase::from_json_str(&json).unwrap();
        assert_eq!(kb, reparsed);
        assert!(!json.contains("\"kind\""));
    }

    #[test]
    fn test_load_prefers_external_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"{"Brown Spot": {"disease_name": "Brown Spot (field notes)", "symptoms": ["spots"]}}"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(Some(&path));
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.lookup("Brown Spot").disease_name(), Some("Brown Spot (field notes)"));
    }

    #[test]
    fn test_load_falls_back_when_missing_or_invalid() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("absent.json");
        assert_eq!(KnowledgeBase::load(Some(&missing)), KnowledgeBase::embedded().unwrap());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert_eq!(KnowledgeBase::load(Some(&broken)), KnowledgeBase::embedded().unwrap());
    }

    #[test]
    fn test_misshapen_record_rejected() {
        let json = r#"{"Brown Spot": {"diseas_name": "Brown Spot", "symptom": ["spots"]}}"#;
        assert!(KnowledgeBase::from_json_str(json).is_err());
        assert!(KnowledgeBase::from_json_str(r#"{"Brown Spot": {}}"#).is_err());
    }

    #[test]
    fn test_load_falls_back_on_misshapen_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.json");
        std::fs::write(
            &path,
            r#"{"Brown Spot": {"disease_name": "Brown Spot", "symptom": ["spots"]}}"#,
        )
        .unwrap();

        let kb = KnowledgeBase::load(Some(&path));
        assert_eq!(kb, KnowledgeBase::embedded().unwrap());
        assert!(kb.lookup("Brown Spot").as_disease().is_some());
        assert!(kb.missing_labels(&LabelSet::rice()).is_empty());
    }

    #[test]
    fn test_free_lookup() {
        assert_eq!(lookup("Sheath Blight").disease_name(), Some("Sheath Blight"));
        assert!(lookup("").is_empty());
    }
}
