//! # Prever: No-Show Risk Prediction Pipeline
//!
//! Prever turns raw medical appointment records into calibrated no-show
//! risk scores: bucketed feature extraction, leakage-safe temporal splits,
//! additive-smoothed naive Bayes training, threshold calibration, and PSI
//! drift monitoring over versioned, content-hashed stores.
//!
//! ## Architecture
//!
//! - **features**: Appointment records to bucketed feature rows
//! - **split**: Chronological train/test splits and walk-forward folds
//! - **train**: Naive Bayes fitting, metrics, threshold calibration
//! - **score**: Batch scoring with schema checks and a predictor cache
//! - **drift**: Population Stability Index between dataset versions
//! - **store**: Versioned feature and model stores (in-memory, JSON files)
//! - **pipeline**: End-to-end orchestration over a pair of stores
//! - **config**: Declarative YAML configuration

pub mod config;
pub mod drift;
pub mod features;
pub mod pipeline;
pub mod score;
pub mod split;
pub mod store;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, TrainOutcome};
pub use score::{PredictorKind, ScoreRequest, ScoringResult};
