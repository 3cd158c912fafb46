//! Versioned artifact stores
//!
//! Datasets and models are stored as immutable, content-hashed versions.
//! Two backends implement the same contract: JSON files under a root
//! directory (`fs`) and an in-memory map (`memory`). Misses are typed
//! errors, never empty collections, and a version can only ever be
//! re-saved with identical content.

pub mod canonical;
pub mod fs;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{quality_report, FeatureRow, QualityReport};
use crate::train::{NaiveBayesModel, ThresholdMetrics};

pub use canonical::{canonical_json, content_hash, FeatureSchema, FieldDescriptor, SCHEMA_VERSION};
pub use fs::{FsFeatureStore, FsModelStore};
pub use memory::{InMemoryFeatureStore, InMemoryModelStore};

/// Metadata document stored next to each dataset version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub row_count: u64,
    pub content_hash: String,
    pub schema_hash: String,
    pub schema_version: u32,
    pub quality: QualityReport,
}

impl DatasetMetadata {
    /// Compute metadata (hashes, counts, quality) for a row set.
    pub fn for_rows(dataset_name: &str, version: &str, rows: &[FeatureRow]) -> Result<Self> {
        Ok(DatasetMetadata {
            dataset_name: dataset_name.to_string(),
            version: version.to_string(),
            created_at: Utc::now(),
            row_count: rows.len() as u64,
            content_hash: content_hash(&rows)?,
            schema_hash: FeatureSchema::current().hash()?,
            schema_version: SCHEMA_VERSION,
            quality: quality_report(rows),
        })
    }
}

/// Metadata document stored next to each model version. `schema_hash` is
/// the feature schema captured at train time; scoring re-checks it against
/// the live schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub trained_on_dataset: String,
    pub trained_on_version: String,
    pub train_rows: u64,
    pub test_rows: u64,
    pub content_hash: String,
    pub schema_hash: String,
    pub schema_version: u32,
    /// Calibration objective in its configuration form.
    pub objective: String,
    pub threshold: f64,
    pub target_met: bool,
    pub metrics: ThresholdMetrics,
}

/// Versioned storage for feature datasets.
///
/// `load`/`load_metadata`/`list_versions` fail with `DatasetNotFound` for
/// names never written and `VersionNotFound` for missing versions.
/// `list_versions` returns lexicographically sorted names.
pub trait FeatureStore: Send {
    fn save_with_metadata(
        &mut self,
        dataset: &str,
        version: &str,
        rows: &[FeatureRow],
        metadata: &DatasetMetadata,
    ) -> Result<()>;

    fn load(&self, dataset: &str, version: &str) -> Result<Vec<FeatureRow>>;

    fn load_metadata(&self, dataset: &str, version: &str) -> Result<DatasetMetadata>;

    fn list_versions(&self, dataset: &str) -> Result<Vec<String>>;
}

/// Versioned storage for trained models, same miss contract as
/// `FeatureStore`.
pub trait ModelStore: Send {
    fn save_model(
        &mut self,
        model_name: &str,
        version: &str,
        model: &NaiveBayesModel,
        metadata: &ModelMetadata,
    ) -> Result<()>;

    fn load_model(&self, model_name: &str, version: &str) -> Result<NaiveBayesModel>;

    fn load_model_metadata(&self, model_name: &str, version: &str) -> Result<ModelMetadata>;

    fn list_model_versions(&self, model_name: &str) -> Result<Vec<String>>;
}

/// Reject empty names and anything that could escape a storage directory.
pub(crate) fn check_name(kind: &str, value: &str) -> Result<()> {
    if value.is_empty()
        || value.contains('/')
        || value.contains('\\')
        || value.contains("..")
        || value.contains('\0')
    {
        return Err(Error::Validation(format!("invalid {kind}: {value:?}")));
    }
    Ok(())
}

/// Append-only guard shared by both backends: identical content is an
/// idempotent no-op (`Ok(true)` means "already stored, skip"), different
/// content under an existing version is rejected.
pub(crate) fn check_resave(
    existing_hash: Option<&str>,
    incoming_hash: &str,
    what: &str,
    version: &str,
) -> Result<bool> {
    match existing_hash {
        None => Ok(false),
        Some(hash) if hash == incoming_hash => Ok(true),
        Some(_) => Err(Error::Validation(format!(
            "{what} version {version} already exists with different content"
        ))),
    }
}
