//! Model training and calibration
//!
//! This module covers the supervised half of the pipeline:
//! - Naive Bayes fitting and prediction (`bayes`)
//! - Threshold metrics (`metrics`)
//! - Threshold calibration policies (`calibrate`)
//!
//! # Example
//!
//! ```
//! use prever::features::{build_features, FeatureInput};
//! use prever::train::{NaiveBayesModel, Predictor};
//!
//! let inputs: Vec<FeatureInput> = (0..8)
//!     .map(|i| FeatureInput {
//!         id: format!("a-{i}"),
//!         duration_min: 30,
//!         start_hour: 9,
//!         weekday: 1,
//!         notes_len: 10,
//!         status: "atendida".to_string(),
//!         has_incidents: i % 2 == 0,
//!         start_ts: Some(1_700_000_000 + i * 60),
//!     })
//!     .collect();
//! let rows = build_features(&inputs).unwrap();
//! let model = NaiveBayesModel::fit(&rows, 1.0).unwrap();
//! let prediction = model.predict(&rows[0]);
//! assert!(prediction.score > 0.0 && prediction.score < 1.0);
//! ```

mod bayes;
mod calibrate;
mod metrics;

pub use bayes::{
    proxy_label, stable_sigmoid, BaselinePredictor, NaiveBayesModel, Prediction, Predictor,
    RiskLabel, BASELINE_NO_SIGNAL, BAYES_FEATURES,
};
pub use calibrate::{
    calibrate, candidate_thresholds, Calibration, ThresholdPolicy, FALLBACK_THRESHOLD,
};
pub use metrics::{metrics_at_threshold, ThresholdMetrics};
