//! Batch scoring over stored datasets
//!
//! A [`Scorer`] loads a dataset version from the feature store, picks a
//! predictor, and returns per-appointment scores. Trained models are
//! checked against the live feature schema before any row is scored, so
//! a model trained under an older schema is rejected instead of silently
//! producing garbage.
//!
//! # Example
//!
//! ```
//! use prever::config::PipelineConfig;
//! use prever::features::FeatureInput;
//! use prever::pipeline::Pipeline;
//! use prever::score::{PredictorKind, ScoreRequest};
//! use prever::store::{InMemoryFeatureStore, InMemoryModelStore};
//!
//! let config = PipelineConfig::default();
//! let mut pipeline = Pipeline::new(
//!     InMemoryFeatureStore::new(),
//!     InMemoryModelStore::new(),
//!     config,
//! ).unwrap();
//!
//! let inputs: Vec<FeatureInput> = (0..12)
//!     .map(|i| FeatureInput {
//!         id: format!("c-{i}"),
//!         duration_min: 30,
//!         start_hour: 9,
//!         weekday: (i % 5) as u8,
//!         notes_len: 5,
//!         status: if i % 4 == 0 { "no_show" } else { "atendida" }.to_string(),
//!         has_incidents: i % 4 == 0,
//!         start_ts: Some(1_700_000_000 + i * 3_600),
//!     })
//!     .collect();
//! let rows = pipeline.build_features(&inputs).unwrap();
//! pipeline.save_snapshot(Some("v1"), &rows).unwrap();
//!
//! let result = pipeline
//!     .score(&ScoreRequest::baseline("v1"))
//!     .unwrap();
//! assert_eq!(result.total, 12);
//! assert_eq!(result.items.len(), 12);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::{FeatureSchema, FeatureStore, ModelMetadata, ModelStore};
use crate::train::{BaselinePredictor, NaiveBayesModel, Prediction, Predictor, RiskLabel};

/// Which predictor a scoring request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictorKind {
    /// Hand-tuned additive scorer, available without any trained model.
    Baseline,
    /// Stored naive Bayes model.
    Trained,
}

/// Parameters for one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Dataset version to score.
    pub dataset_version: String,
    pub predictor: PredictorKind,
    /// Model version for [`PredictorKind::Trained`]; `None` means the
    /// latest stored version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Cap on returned items; `total` still reports the full count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ScoreRequest {
    pub fn baseline(dataset_version: impl Into<String>) -> Self {
        Self {
            dataset_version: dataset_version.into(),
            predictor: PredictorKind::Baseline,
            model_version: None,
            limit: None,
        }
    }

    pub fn trained(dataset_version: impl Into<String>) -> Self {
        Self {
            dataset_version: dataset_version.into(),
            predictor: PredictorKind::Trained,
            model_version: None,
            limit: None,
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Score for a single appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    pub id: String,
    pub score: f64,
    pub label: RiskLabel,
    pub reasons: Vec<String>,
}

/// Outcome of a scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResult {
    /// Dataset version that was scored.
    pub version: String,
    /// Model version used, `None` for the baseline predictor.
    pub model_version: Option<String>,
    /// Row count of the dataset before any `limit` was applied.
    pub total: u64,
    pub items: Vec<ScoredItem>,
}

struct CacheEntry {
    model_name: String,
    version: String,
    model: NaiveBayesModel,
    metadata: ModelMetadata,
}

/// Single-slot cache for the most recently used trained model.
///
/// Repeated scoring against the same model version skips the store
/// round-trip and the integrity re-check. Training a new version calls
/// [`PredictorCache::invalidate`] so the next request reloads.
#[derive(Default)]
pub struct PredictorCache {
    entry: Option<CacheEntry>,
}

impl PredictorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached model, forcing the next lookup to hit the store.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// True if the cache currently holds the given model version.
    pub fn holds(&self, model_name: &str, version: &str) -> bool {
        matches!(
            &self.entry,
            Some(e) if e.model_name == model_name && e.version == version
        )
    }

    fn get_or_load<M: ModelStore>(
        &mut self,
        store: &M,
        model_name: &str,
        version: &str,
    ) -> Result<(&NaiveBayesModel, &ModelMetadata)> {
        // Take the slot before deciding, so the borrow of a kept entry and
        // the write of a fresh one never overlap.
        let entry = match self.entry.take() {
            Some(entry) if entry.model_name == model_name && entry.version == version => entry,
            _ => {
                let model = store.load_model(model_name, version)?;
                model.validate()?;
                let metadata = store.load_model_metadata(model_name, version)?;
                CacheEntry {
                    model_name: model_name.to_string(),
                    version: version.to_string(),
                    model,
                    metadata,
                }
            }
        };
        let entry = self.entry.insert(entry);
        Ok((&entry.model, &entry.metadata))
    }
}

/// One scoring run against borrowed stores.
pub struct Scorer<'a, F: FeatureStore, M: ModelStore> {
    features: &'a F,
    models: &'a M,
    cache: &'a mut PredictorCache,
    dataset_name: &'a str,
    model_name: &'a str,
}

impl<'a, F: FeatureStore, M: ModelStore> Scorer<'a, F, M> {
    pub fn new(
        features: &'a F,
        models: &'a M,
        cache: &'a mut PredictorCache,
        dataset_name: &'a str,
        model_name: &'a str,
    ) -> Self {
        Self {
            features,
            models,
            cache,
            dataset_name,
            model_name,
        }
    }

    pub fn execute(&mut self, request: &ScoreRequest) -> Result<ScoringResult> {
        let rows = self.features.load(self.dataset_name, &request.dataset_version)?;
        let total = rows.len() as u64;
        let limit = request.limit.unwrap_or(rows.len());

        let (model_version, items) = match request.predictor {
            PredictorKind::Baseline => {
                let predictor = BaselinePredictor;
                let items = rows
                    .iter()
                    .take(limit)
                    .map(|row| scored_item(row.id.clone(), predictor.predict(row)))
                    .collect();
                (None, items)
            }
            PredictorKind::Trained => {
                let version = self.resolve_model_version(request)?;
                let (model, metadata) =
                    self.cache.get_or_load(self.models, self.model_name, &version)?;
                let expected = FeatureSchema::current().hash()?;
                if metadata.schema_hash != expected {
                    return Err(Error::SchemaMismatch {
                        expected,
                        got: metadata.schema_hash.clone(),
                    });
                }
                let items = rows
                    .iter()
                    .take(limit)
                    .map(|row| scored_item(row.id.clone(), model.predict(row)))
                    .collect();
                (Some(version), items)
            }
        };

        Ok(ScoringResult {
            version: request.dataset_version.clone(),
            model_version,
            total,
            items,
        })
    }

    fn resolve_model_version(&self, request: &ScoreRequest) -> Result<String> {
        if let Some(version) = &request.model_version {
            return Ok(version.clone());
        }
        // Versions sort lexicographically and stamps are zero-padded, so
        // the last entry is the newest.
        let mut versions = self.models.list_model_versions(self.model_name)?;
        versions.pop().ok_or_else(|| Error::VersionNotFound {
            name: self.model_name.to_string(),
            version: "latest".to_string(),
        })
    }
}

fn scored_item(id: String, prediction: Prediction) -> ScoredItem {
    ScoredItem {
        id,
        score: prediction.score,
        label: prediction.label,
        reasons: prediction.reasons,
    }
}
