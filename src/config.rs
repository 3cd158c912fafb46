//! Pipeline configuration
//!
//! Dataset and model names, training hyperparameters, and the threshold
//! calibration objective, loadable from YAML. Parsing and validation are
//! separate steps: [`PipelineConfig::from_yaml_str`] only deserializes,
//! [`PipelineConfig::validate`] checks ranges and names.
//!
//! # Example
//!
//! ```
//! use prever::config::PipelineConfig;
//!
//! let yaml = r#"
//! dataset_name: citas
//! alpha: 0.5
//! objective: min_recall
//! objective_value: 0.8
//! "#;
//! let config = PipelineConfig::from_yaml_str(yaml).unwrap();
//! config.validate().unwrap();
//! assert_eq!(config.alpha, 0.5);
//! assert_eq!(config.model_name, "ausencias");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::check_name;
use crate::train::ThresholdPolicy;

/// Everything a [`crate::pipeline::Pipeline`] needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Dataset name used for feature snapshots.
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,

    /// Model name used for trained artifacts.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Additive smoothing strength for naive Bayes.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Fraction of rows held out as the chronological test tail.
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,

    /// Minimum rows the training side of a split must keep.
    #[serde(default = "default_min_train")]
    pub min_train: usize,

    /// Calibration objective: "f1_max" | "min_recall" | "min_precision".
    #[serde(default = "default_objective")]
    pub objective: String,

    /// Target value for the floor objectives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_value: Option<f64>,

    /// Default item cap for scoring runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_name: default_dataset_name(),
            model_name: default_model_name(),
            alpha: default_alpha(),
            test_ratio: default_test_ratio(),
            min_train: default_min_train(),
            objective: default_objective(),
            objective_value: None,
            score_limit: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = name.into();
        self
    }

    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_test_ratio(mut self, test_ratio: f64) -> Self {
        self.test_ratio = test_ratio;
        self
    }

    pub fn with_min_train(mut self, min_train: usize) -> Self {
        self.min_train = min_train;
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>, value: Option<f64>) -> Self {
        self.objective = objective.into();
        self.objective_value = value;
        self
    }

    pub fn with_score_limit(mut self, limit: usize) -> Self {
        self.score_limit = Some(limit);
        self
    }

    /// Resolve the calibration policy from the objective fields.
    pub fn policy(&self) -> Result<ThresholdPolicy> {
        ThresholdPolicy::parse(&self.objective, self.objective_value)
    }

    pub fn validate(&self) -> Result<()> {
        check_name("dataset name", &self.dataset_name)?;
        check_name("model name", &self.model_name)?;
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(Error::Configuration(format!(
                "alpha must be finite and positive, got {}",
                self.alpha
            )));
        }
        if !self.test_ratio.is_finite() || self.test_ratio <= 0.0 || self.test_ratio >= 1.0 {
            return Err(Error::Configuration(format!(
                "test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.min_train == 0 {
            return Err(Error::Configuration(
                "min_train must be at least 1".to_string(),
            ));
        }
        self.policy()?;
        Ok(())
    }

    /// Deserialize from YAML without validating.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Configuration(format!("invalid pipeline config: {e}")))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }
}

fn default_dataset_name() -> String {
    "citas".to_string()
}

fn default_model_name() -> String {
    "ausencias".to_string()
}

fn default_alpha() -> f64 {
    1.0
}

fn default_test_ratio() -> f64 {
    0.2
}

fn default_min_train() -> usize {
    10
}

fn default_objective() -> String {
    "f1_max".to_string()
}
