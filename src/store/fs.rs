//! JSON-file store backends
//!
//! Each dataset or model lives in its own directory under the store root,
//! one trio of documents per version:
//!
//! ```text
//! <root>/<dataset>/<version>.json            feature rows
//! <root>/<dataset>/<version>.schema.json     schema descriptor at save time
//! <root>/<dataset>/<version>.metadata.json   metadata, written last
//! <root>/<model>/<version>.model.json        model parameters
//! <root>/<model>/<version>.metadata.json     metadata, written last
//! ```
//!
//! Every document is published atomically (write to a sibling temp file,
//! then rename). Metadata goes last, so a version only becomes visible
//! once all of its documents are in place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::features::FeatureRow;
use crate::store::{
    check_name, check_resave, content_hash, DatasetMetadata, FeatureSchema, FeatureStore,
    ModelMetadata, ModelStore,
};
use crate::train::NaiveBayesModel;

const METADATA_SUFFIX: &str = ".metadata.json";

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Validation(format!("invalid store path {}", path.display())))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    // Temp file sits next to the target so the rename cannot cross filesystems.
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    write_atomic(path, &text)
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::Validation(format!("{what} at {}: {e}", path.display())))
}

fn list_metadata_stems(dir: &Path) -> Result<Vec<String>> {
    let mut versions = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(METADATA_SUFFIX)) {
            versions.push(stem.to_string());
        }
    }
    versions.sort();
    Ok(versions)
}

/// Feature store rooted at a directory of JSON documents.
#[derive(Debug, Clone)]
pub struct FsFeatureStore {
    root: PathBuf,
}

impl FsFeatureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset)
    }

    fn payload_path(&self, dataset: &str, version: &str) -> PathBuf {
        self.dataset_dir(dataset).join(format!("{version}.json"))
    }

    fn schema_path(&self, dataset: &str, version: &str) -> PathBuf {
        self.dataset_dir(dataset)
            .join(format!("{version}.schema.json"))
    }

    fn metadata_path(&self, dataset: &str, version: &str) -> PathBuf {
        self.dataset_dir(dataset)
            .join(format!("{version}{METADATA_SUFFIX}"))
    }

    fn require_version(&self, dataset: &str, version: &str) -> Result<()> {
        if !self.dataset_dir(dataset).is_dir() {
            return Err(Error::DatasetNotFound(dataset.to_string()));
        }
        if !self.metadata_path(dataset, version).is_file() {
            return Err(Error::VersionNotFound {
                name: dataset.to_string(),
                version: version.to_string(),
            });
        }
        Ok(())
    }
}

impl FeatureStore for FsFeatureStore {
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
        let metadata_path = self.metadata_path(dataset, version);
        let existing = if metadata_path.is_file() {
            Some(read_json::<DatasetMetadata>(&metadata_path, "dataset metadata")?)
        } else {
            None
        };
        if check_resave(
            existing.as_ref().map(|m| m.content_hash.as_str()),
            &payload_hash,
            "dataset",
            version,
        )? {
            return Ok(());
        }
        fs::create_dir_all(self.dataset_dir(dataset))?;
        write_json(&self.payload_path(dataset, version), &rows)?;
        write_json(&self.schema_path(dataset, version), &FeatureSchema::current())?;
        // Metadata last: its presence marks the version as published.
        write_json(&metadata_path, metadata)
    }

    fn load(&self, dataset: &str, version: &str) -> Result<Vec<FeatureRow>> {
        self.require_version(dataset, version)?;
        read_json(&self.payload_path(dataset, version), "dataset payload")
    }

    fn load_metadata(&self, dataset: &str, version: &str) -> Result<DatasetMetadata> {
        self.require_version(dataset, version)?;
        read_json(&self.metadata_path(dataset, version), "dataset metadata")
    }

    fn list_versions(&self, dataset: &str) -> Result<Vec<String>> {
        let dir = self.dataset_dir(dataset);
        if !dir.is_dir() {
            return Err(Error::DatasetNotFound(dataset.to_string()));
        }
        list_metadata_stems(&dir)
    }
}

/// Model store rooted at a directory of JSON documents.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_dir(&self, model_name: &str) -> PathBuf {
        self.root.join(model_name)
    }

    fn payload_path(&self, model_name: &str, version: &str) -> PathBuf {
        self.model_dir(model_name)
            .join(format!("{version}.model.json"))
    }

    fn metadata_path(&self, model_name: &str, version: &str) -> PathBuf {
        self.model_dir(model_name)
            .join(format!("{version}{METADATA_SUFFIX}"))
    }

    fn require_version(&self, model_name: &str, version: &str) -> Result<()> {
        if !self.model_dir(model_name).is_dir() {
            return Err(Error::DatasetNotFound(model_name.to_string()));
        }
        if !self.metadata_path(model_name, version).is_file() {
            return Err(Error::VersionNotFound {
                name: model_name.to_string(),
                version: version.to_string(),
            });
        }
        Ok(())
    }
}

impl ModelStore for FsModelStore {
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
        let metadata_path = self.metadata_path(model_name, version);
        let existing = if metadata_path.is_file() {
            Some(read_json::<ModelMetadata>(&metadata_path, "model metadata")?)
        } else {
            None
        };
        if check_resave(
            existing.as_ref().map(|m| m.content_hash.as_str()),
            &payload_hash,
            "model",
            version,
        )? {
            return Ok(());
        }
        fs::create_dir_all(self.model_dir(model_name))?;
        write_json(&self.payload_path(model_name, version), model)?;
        write_json(&metadata_path, metadata)
    }

    fn load_model(&self, model_name: &str, version: &str) -> Result<NaiveBayesModel> {
        self.require_version(model_name, version)?;
        read_json(&self.payload_path(model_name, version), "model payload")
    }

    fn load_model_metadata(&self, model_name: &str, version: &str) -> Result<ModelMetadata> {
        self.require_version(model_name, version)?;
        read_json(&self.metadata_path(model_name, version), "model metadata")
    }

    fn list_model_versions(&self, model_name: &str) -> Result<Vec<String>> {
        let dir = self.model_dir(model_name);
        if !dir.is_dir() {
            return Err(Error::DatasetNotFound(model_name.to_string()));
        }
        list_metadata_stems(&dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{build_row, FeatureInput};
    use crate::store::SCHEMA_VERSION;
    use crate::train::{metrics_at_threshold, proxy_label};
    use chrono::Utc;

    fn rows() -> Vec<FeatureRow> {
        (0..6)
            .map(|i| {
                build_row(&FeatureInput {
                    id: format!("fs-{i}"),
                    duration_min: 20 + i,
                    start_hour: 9,
                    weekday: 2,
                    notes_len: 10,
                    status: if i % 2 == 0 { "atendida" } else { "no_show" }.to_string(),
                    has_incidents: i == 5,
                    start_ts: Some(1_700_000_000 + i * 60),
                })
            })
            .collect()
    }

    fn saved_store(dir: &Path) -> (FsFeatureStore, Vec<FeatureRow>) {
        let mut store = FsFeatureStore::new(dir);
        let data = rows();
        let metadata = DatasetMetadata::for_rows("citas", "v1", &data).unwrap();
        store
            .save_with_metadata("citas", "v1", &data, &metadata)
            .unwrap();
        (store, data)
    }

    #[test]
    fn test_save_writes_three_documents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (store, _) = saved_store(temp_dir.path());
        assert!(store.payload_path("citas", "v1").is_file());
        assert!(store.schema_path("citas", "v1").is_file());
        assert!(store.metadata_path("citas", "v1").is_file());
        // No temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(store.dataset_dir("citas"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_round_trip_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (_, data) = saved_store(temp_dir.path());

        let reopened = FsFeatureStore::new(temp_dir.path());
        assert_eq!(reopened.load("citas", "v1").unwrap(), data);
        let metadata = reopened.load_metadata("citas", "v1").unwrap();
        assert_eq!(metadata.row_count, 6);
        assert_eq!(metadata.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_unknown_dataset_and_version() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (store, _) = saved_store(temp_dir.path());
        assert!(matches!(
            store.load("nadie", "v1"),
            Err(Error::DatasetNotFound(_))
        ));
        assert!(matches!(
            store.load("citas", "v9"),
            Err(Error::VersionNotFound { .. })
        ));
        assert!(matches!(
            store.list_versions("nadie"),
            Err(Error::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_idempotent_resave() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut store, data) = saved_store(temp_dir.path());
        let metadata = DatasetMetadata::for_rows("citas", "v1", &data).unwrap();
        assert!(store.save_with_metadata("citas", "v1", &data, &metadata).is_ok());
        assert_eq!(store.list_versions("citas").unwrap(), vec!["v1"]);
    }

    #[test]
    fn test_conflicting_resave_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (mut store, data) = saved_store(temp_dir.path());
        let smaller = &data[..3];
        let metadata = DatasetMetadata::for_rows("citas", "v1", smaller).unwrap();
        let err = store
            .save_with_metadata("citas", "v1", smaller, &metadata)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.load("citas", "v1").unwrap().len(), 6);
    }

    #[test]
    fn test_versions_sorted_and_strays_ignored() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FsFeatureStore::new(temp_dir.path());
        let data = rows();
        for version in ["v3", "v1", "v2"] {
            let metadata = DatasetMetadata::for_rows("citas", version, &data).unwrap();
            store
                .save_with_metadata("citas", version, &data, &metadata)
                .unwrap();
        }
        std::fs::write(store.dataset_dir("citas").join("notes.txt"), "scratch").unwrap();
        assert_eq!(store.list_versions("citas").unwrap(), vec!["v1", "v2", "v3"]);
    }

    #[test]
    fn test_tampered_payload_is_validation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let (store, _) = saved_store(temp_dir.path());
        std::fs::write(store.payload_path("citas", "v1"), "{\"garbage\":1}").unwrap();
        let err = store.load("citas", "v1").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("dataset payload"));
    }

    #[test]
    fn test_model_store_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = FsModelStore::new(temp_dir.path());
        let data = rows();
        let model = NaiveBayesModel::fit(&data, 1.0).unwrap();
        let scores: Vec<f64> = data.iter().map(|r| model.score(r)).collect();
        let labels: Vec<bool> = data.iter().map(proxy_label).collect();
        let metadata = ModelMetadata {
            model_name: "ausencias".to_string(),
            version: "m1".to_string(),
            created_at: Utc::now(),
            trained_on_dataset: "citas".to_string(),
            trained_on_version: "v1".to_string(),
            train_rows: data.len() as u64,
            test_rows: 0,
            content_hash: content_hash(&model).unwrap(),
            schema_hash: FeatureSchema::current().hash().unwrap(),
            schema_version: SCHEMA_VERSION,
            objective: "f1_max".to_string(),
            threshold: 0.5,
            target_met: true,
            metrics: metrics_at_threshold(&scores, &labels, 0.5),
        };
        store.save_model("ausencias", "m1", &model, &metadata).unwrap();

        let reopened = FsModelStore::new(temp_dir.path());
        let loaded = reopened.load_model("ausencias", "m1").unwrap();
        assert_eq!(
            content_hash(&loaded).unwrap(),
            content_hash(&model).unwrap()
        );
        let loaded_meta = reopened.load_model_metadata("ausencias", "m1").unwrap();
        assert_eq!(loaded_meta.trained_on_version, "v1");
        assert_eq!(reopened.list_model_versions("ausencias").unwrap(), vec!["m1"]);
    }

    #[test]
    fn test_model_store_misses() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FsModelStore::new(temp_dir.path());
        assert!(matches!(
            store.load_model("ausencias", "m1"),
            Err(Error::DatasetNotFound(_))
        ));
        assert!(matches!(
            store.list_model_versions("ausencias"),
            Err(Error::DatasetNotFound(_))
        ));
    }
}
