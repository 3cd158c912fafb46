//! End-to-end orchestration
//!
//! [`Pipeline`] wires the feature builder, temporal splitter, trainer,
//! calibrator, drift monitor and scorer over one feature store and one
//! model store. It owns the stores and the predictor cache; the config
//! fixes names and hyperparameters for the lifetime of the pipeline.
//!
//! # Example
//!
//! ```
//! use prever::config::PipelineConfig;
//! use prever::features::FeatureInput;
//! use prever::pipeline::Pipeline;
//! use prever::score::ScoreRequest;
//! use prever::store::{InMemoryFeatureStore, InMemoryModelStore};
//!
//! let config = PipelineConfig::default().with_min_train(5);
//! let mut pipeline = Pipeline::new(
//!     InMemoryFeatureStore::new(),
//!     InMemoryModelStore::new(),
//!     config,
//! ).unwrap();
//!
//! let inputs: Vec<FeatureInput> = (0..20)
//!     .map(|i| FeatureInput {
//!         id: format!("c-{i}"),
//!         duration_min: 30,
//!         start_hour: 9,
//!         weekday: (i % 5) as u8,
//!         notes_len: 12,
//!         status: if i % 4 == 0 { "no_show" } else { "atendida" }.to_string(),
//!         has_incidents: i % 4 == 0,
//!         start_ts: Some(1_700_000_000 + i * 86_400),
//!     })
//!     .collect();
//!
//! let rows = pipeline.build_features(&inputs).unwrap();
//! pipeline.save_snapshot(Some("v1"), &rows).unwrap();
//! let outcome = pipeline.train("v1", Some("m1")).unwrap();
//! assert!(outcome.threshold > 0.0);
//!
//! let result = pipeline.score(&ScoreRequest::trained("v1")).unwrap();
//! assert_eq!(result.total, 20);
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::drift::DriftReport;
use crate::error::Result;
use crate::features::{self, FeatureInput, FeatureRow};
use crate::score::{PredictorCache, ScoreRequest, Scorer, ScoringResult};
use crate::split;
use crate::store::{
    content_hash, DatasetMetadata, FeatureSchema, FeatureStore, ModelMetadata, ModelStore,
    SCHEMA_VERSION,
};
use crate::train::{calibrate, proxy_label, NaiveBayesModel, ThresholdMetrics};

/// Result of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub model_version: String,
    pub threshold: f64,
    pub target_met: bool,
    /// Test-tail metrics at the calibrated threshold.
    pub metrics: ThresholdMetrics,
}

/// Orchestrates the whole no-show workflow over a pair of stores.
pub struct Pipeline<F: FeatureStore, M: ModelStore> {
    features: F,
    models: M,
    config: PipelineConfig,
    cache: PredictorCache,
}

impl<F: FeatureStore, M: ModelStore> Pipeline<F, M> {
    /// Validates the config before anything runs.
    pub fn new(features: F, models: M, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            features,
            models,
            config,
            cache: PredictorCache::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn feature_store(&self) -> &F {
        &self.features
    }

    pub fn model_store(&self) -> &M {
        &self.models
    }

    /// Pure delegation to the feature builder; nothing is persisted.
    pub fn build_features(&self, inputs: &[FeatureInput]) -> Result<Vec<FeatureRow>> {
        features::build_features(inputs)
    }

    /// Validate and persist a feature snapshot, returning its metadata.
    ///
    /// Without an explicit version a UTC stamp is generated; stamps are
    /// zero-padded so lexicographic order matches chronological order.
    pub fn save_snapshot(
        &mut self,
        version: Option<&str>,
        rows: &[FeatureRow],
    ) -> Result<DatasetMetadata> {
        features::validate_rows(rows)?;
        let version = match version {
            Some(v) => v.to_string(),
            None => generate_version(),
        };
        let metadata = DatasetMetadata::for_rows(&self.config.dataset_name, &version, rows)?;
        self.features
            .save_with_metadata(&self.config.dataset_name, &version, rows, &metadata)?;
        Ok(metadata)
    }

    /// Train and calibrate a model on a stored dataset version.
    ///
    /// Splits chronologically, fits on the earlier rows, calibrates the
    /// decision threshold on the held-out tail, then persists model and
    /// metadata. The schema hash captured in the metadata is the live
    /// one at train time; scoring re-checks it.
    pub fn train(
        &mut self,
        dataset_version: &str,
        model_version: Option<&str>,
    ) -> Result<TrainOutcome> {
        let rows = self.features.load(&self.config.dataset_name, dataset_version)?;
        let split = split::train_test_split(&rows, self.config.test_ratio, self.config.min_train)?;
        let model = NaiveBayesModel::fit(&split.train, self.config.alpha)?;

        let scores: Vec<f64> = split.test.iter().map(|row| model.score(row)).collect();
        let labels: Vec<bool> = split.test.iter().map(proxy_label).collect();
        let policy = self.config.policy()?;
        let calibration = calibrate(&scores, &labels, &policy)?;

        let version = match model_version {
            Some(v) => v.to_string(),
            None => generate_version(),
        };
        let metadata = ModelMetadata {
            model_name: self.config.model_name.clone(),
            version: version.clone(),
            created_at: Utc::now(),
            trained_on_dataset: self.config.dataset_name.clone(),
            trained_on_version: dataset_version.to_string(),
            train_rows: split.train.len() as u64,
            test_rows: split.test.len() as u64,
            content_hash: content_hash(&model)?,
            schema_hash: FeatureSchema::current().hash()?,
            schema_version: SCHEMA_VERSION,
            objective: policy.objective_str().to_string(),
            threshold: calibration.threshold,
            target_met: calibration.target_met,
            metrics: calibration.metrics,
        };
        self.models
            .save_model(&self.config.model_name, &version, &model, &metadata)?;
        // The next scoring request must see the new version.
        self.cache.invalidate();

        Ok(TrainOutcome {
            model_version: version,
            threshold: calibration.threshold,
            target_met: calibration.target_met,
            metrics: calibration.metrics,
        })
    }

    /// Score a stored dataset version with the baseline or a trained model.
    ///
    /// Takes `&mut self` for the predictor cache. A request without an
    /// explicit `limit` falls back to the config's `score_limit`.
    pub fn score(&mut self, request: &ScoreRequest) -> Result<ScoringResult> {
        let mut request = request.clone();
        if request.limit.is_none() {
            request.limit = self.config.score_limit;
        }
        let mut scorer = Scorer::new(
            &self.features,
            &self.models,
            &mut self.cache,
            &self.config.dataset_name,
            &self.config.model_name,
        );
        scorer.execute(&request)
    }

    /// Compare two stored dataset versions feature by feature.
    pub fn drift(&self, from_version: &str, to_version: &str) -> Result<DriftReport> {
        let from = self.features.load(&self.config.dataset_name, from_version)?;
        let to = self.features.load(&self.config.dataset_name, to_version)?;
        Ok(DriftReport::compare(from_version, to_version, &from, &to))
    }
}

/// UTC stamp, millisecond precision, safe as a file name.
fn generate_version() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string()
}
