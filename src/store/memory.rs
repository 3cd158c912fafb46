//! In-memory store backends
//!
//! Map-backed implementations of the store traits, used by tests and by
//! embedders that do not want files. Same miss and append-only contract
//! as the file backend.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::features::FeatureRow;
use crate::store::{
    check_name, check_resave, content_hash, DatasetMetadata, FeatureStore, ModelMetadata,
    ModelStore,
};
use crate::train::NaiveBayesModel;

#[derive(Debug, Clone)]
struct DatasetVersion {
    rows: Vec<FeatureRow>,
    metadata: DatasetMetadata,
}

/// Feature store over nested maps: dataset -> version -> payload.
#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    datasets: BTreeMap<String, BTreeMap<String, DatasetVersion>>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn dataset(&self, dataset: &str) -> Result<&BTreeMap<String, DatasetVersion>> {
        self.datasets
            .get(dataset)
            .ok_or_else(|| Error::DatasetNotFound(dataset.to_string()))
    }
}

impl FeatureStore for InMemoryFeatureStore {
    fn save_with_metadata(
        &mut self,
        dataset: &str,
        version: &str,
        rows: &[FeatureRow],
        metadata: &DatasetMetadata,
    ) -> Result<()> {
        check_name("dataset name", dataset)?;
        check_name("version", version)?;
        let payload_hash = content_hash(&rows)?;
        if payload_hash != metadata.content_hash {
            return Err(Error::Validation(format!(
                "metadata content_hash {} does not match payload {payload_hash}",
                metadata.content_hash
            )));
        }
        let versions = self.datasets.entry(dataset.to_string()).or_default();
        let existing = versions
            .get(version)
            .map(|v| v.metadata.content_hash.as_str());
        if check_resave(existing, &payload_hash, "dataset", version)? {
            return Ok(());
        }
        versions.insert(
            version.to_string(),
            DatasetVersion {
                rows: rows.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    fn load(&self, dataset: &str, version: &str) -> Result<Vec<FeatureRow>> {
        let versions = self.dataset(dataset)?;
        versions
            .get(version)
            .map(|v| v.rows.clone())
            .ok_or_else(|| Error::VersionNotFound {
                name: dataset.to_string(),
                version: version.to_string(),
            })
    }

    fn load_metadata(&self, dataset: &str, version: &str) -> Result<DatasetMetadata> {
        let versions = self.dataset(dataset)?;
        versions
            .get(version)
            .map(|v| v.metadata.clone())
            .ok_or_else(|| Error::VersionNotFound {
                name: dataset.to_string(),
                version: version.to_string(),
            })
    }

    fn list_versions(&self, dataset: &str) -> Result<Vec<String>> {
        // BTreeMap keys are already sorted.
        Ok(self.dataset(dataset)?.keys().cloned().collect())
    }
}

#[derive(Debug, Clone)]
struct ModelVersion {
    model: NaiveBayesModel,
    metadata: ModelMetadata,
}

/// Model store over nested maps: model name -> version -> payload.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    models: BTreeMap<String, BTreeMap<String, ModelVersion>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn model(&self, model_name: &str) -> Result<&BTreeMap<String, ModelVersion>> {
        self.models
            .get(model_name)
            .ok_or_else(|| Error::DatasetNotFound(model_name.to_string()))
    }
}

impl ModelStore for InMemoryModelStore {
    fn save_model(
        &mut self,
        model_name: &str,
        version: &str,
        model: &NaiveBayesModel,
        metadata: &ModelMetadata,
    ) -> Result<()> {
        check_name("model name", model_name)?;
        check_name("version", version)?;
        let payload_hash = content_hash(model)?;
        if payload_hash != metadata.content_hash {
            return Err(Error::Validation(format!(
                "metadata content_hash {} does not match payload {payload_hash}",
                metadata.content_hash
            )));
        }
        let versions = self.models.entry(model_name.to_string()).or_default();
        let existing = versions
            .get(version)
            .map(|v| v.metadata.content_hash.as_str());
        if check_resave(existing, &payload_hash, "model", version)? {
            return Ok(());
        }
        versions.insert(
            version.to_string(),
            ModelVersion {
                model: model.clone(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    fn load_model(&self, model_name: &str, version: &str) -> Result<NaiveBayesModel> {
        let versions = self.model(model_name)?;
        versions
            .get(version)
            .map(|v| v.model.clone())
            .ok_or_else(|| Error::VersionNotFound {
                name: model_name.to_string(),
                version: version.to_string(),
            })
    }

    fn load_model_metadata(&self, model_name: &str, version: &str) -> Result<ModelMetadata> {
        let versions = self.model(model_name)?;
        versions
            .get(version)
            .map(|v| v.metadata.clone())
            .ok_or_else(|| Error::VersionNotFound {
                name: model_name.to_string(),
                version: version.to_string(),
            })
    }

    fn list_model_versions(&self, model_name: &str) -> Result<Vec<String>> {
        Ok(self.model(model_name)?.keys().cloned().collect())
    }
}
