//! Categorical naive Bayes with additive smoothing
//!
//! The classifier works on token counts over six categorical channels.
//! Training labels come from a proxy (`has_incidents || is_suspicious`),
//! kept as an explicit function so the weak supervision is visible at the
//! call sites rather than buried in the fit loop.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{FeatureKind, FeatureRow};

/// Feature channels the classifier trains on, in fixed order.
pub const BAYES_FEATURES: [FeatureKind; 6] = [
    FeatureKind::DurationBucket,
    FeatureKind::NotesLenBucket,
    FeatureKind::IsWeekend,
    FeatureKind::StatusNorm,
    FeatureKind::HasIncidents,
    FeatureKind::IsSuspicious,
];

/// Maximum number of reason strings attached to a prediction.
const MAX_REASONS: usize = 3;

/// Proxy training label: an appointment counts as a no-show risk when it
/// carried incidents or was flagged suspicious.
pub fn proxy_label(row: &FeatureRow) -> bool {
    row.has_incidents || row.is_suspicious
}

/// Numerically stable logistic. Branches on sign so extreme log-odds
/// saturate at 0 or 1 instead of overflowing `exp`.
pub fn stable_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Presentation band for a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl RiskLabel {
    /// Band edges: below 0.34 low, below 0.67 medium, otherwise high.
    pub fn from_score(score: f64) -> Self {
        if score < 0.34 {
            RiskLabel::Low
        } else if score < 0.67 {
            RiskLabel::Medium
        } else {
            RiskLabel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "low",
            RiskLabel::Medium => "medium",
            RiskLabel::High => "high",
        }
    }
}

/// One scored row: probability, band, and short explanations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f64,
    pub label: RiskLabel,
    pub reasons: Vec<String>,
}

/// Anything that can score a feature row.
pub trait Predictor {
    fn name(&self) -> &'static str;
    fn predict(&self, row: &FeatureRow) -> Prediction;
}

/// Trained naive Bayes state. All maps are `BTreeMap` so serialized
/// payloads are key-ordered and content hashes stay deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    /// Additive smoothing constant, strictly positive.
    pub alpha: f64,
    pub trained_rows: u64,
    /// Rows per class, keys "0" (clean) and "1" (risk) once serialized.
    pub class_counts: BTreeMap<u8, u64>,
    /// feature name -> class -> token -> count.
    pub feature_counts: BTreeMap<String, BTreeMap<u8, BTreeMap<String, u64>>>,
    /// Distinct tokens seen per feature across both classes, floored at 1.
    pub feature_cardinality: BTreeMap<String, u64>,
}

impl NaiveBayesModel {
    /// Fit counts from labeled-by-proxy rows.
    pub fn fit(rows: &[FeatureRow], alpha: f64) -> Result<Self> {
        if !alpha.is_finite() || alpha <= 0.0 {
            return Err(Error::Configuration(format!(
                "smoothing alpha must be a positive finite number, got {alpha}"
            )));
        }
        if rows.is_empty() {
            return Err(Error::NotEnoughData(
                "cannot fit a model on zero rows".to_string(),
            ));
        }

        let mut class_counts: BTreeMap<u8, u64> = BTreeMap::from([(0, 0), (1, 0)]);
        let mut feature_counts: BTreeMap<String, BTreeMap<u8, BTreeMap<String, u64>>> =
            BTreeMap::new();
        let mut vocabulary: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for kind in BAYES_FEATURES {
            let mut per_class = BTreeMap::new();
            per_class.insert(0u8, BTreeMap::new());
            per_class.insert(1u8, BTreeMap::new());
            feature_counts.insert(kind.name().to_string(), per_class);
            vocabulary.insert(kind.name().to_string(), BTreeSet::new());
        }

        for row in rows {
            let class = u8::from(proxy_label(row));
            *class_counts.entry(class).or_insert(0) += 1;
            for kind in BAYES_FEATURES {
                let token = kind.token(row);
                let per_class = feature_counts.entry(kind.name().to_string()).or_default();
                let counts = per_class.entry(class).or_default();
                *counts.entry(token.clone()).or_insert(0) += 1;
                vocabulary
                    .entry(kind.name().to_string())
                    .or_default()
                    .insert(token);
            }
        }

        let feature_cardinality = vocabulary
            .into_iter()
            .map(|(name, tokens)| (name, tokens.len().max(1) as u64))
            .collect();

        Ok(NaiveBayesModel {
            alpha,
            trained_rows: rows.len() as u64,
            class_counts,
            feature_counts,
            feature_cardinality,
        })
    }

    /// Structural checks for deserialized models.
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(Error::Validation(format!(
                "model alpha must be positive and finite, got {}",
                self.alpha
            )));
        }
        if self.trained_rows == 0 {
            return Err(Error::Validation(
                "model reports zero training rows".to_string(),
            ));
        }
        let class_total: u64 = self.class_counts.values().sum();
        if class_total != self.trained_rows {
            return Err(Error::Validation(format!(
                "class counts sum to {class_total}, expected {}",
                self.trained_rows
            )));
        }
        if self.feature_cardinality.values().any(|&c| c == 0) {
            return Err(Error::Validation(
                "feature cardinality of zero".to_string(),
            ));
        }
        Ok(())
    }

    fn log_prior(&self, class: u8) -> f64 {
        let total: u64 = self.class_counts.values().sum();
        let count = self.class_counts.get(&class).copied().unwrap_or(0);
        ((count as f64 + self.alpha) / (total as f64 + 2.0 * self.alpha)).ln()
    }

    /// Smoothed log P(token | class) for one feature channel. Unseen
    /// tokens fall to the smoothing floor `alpha / (class_total + alpha * k)`.
    fn feature_log_prob(&self, feature: &str, class: u8, token: &str) -> f64 {
        let counts = self.feature_counts.get(feature).and_then(|m| m.get(&class));
        let token_count = counts.and_then(|m| m.get(token)).copied().unwrap_or(0);
        let class_total: u64 = counts.map(|m| m.values().sum()).unwrap_or(0);
        let cardinality = self
            .feature_cardinality
            .get(feature)
            .copied()
            .unwrap_or(1)
            .max(1);
        ((token_count as f64 + self.alpha)
            / (class_total as f64 + self.alpha * cardinality as f64))
            .ln()
    }

    /// Log-odds of the risk class for one row.
    pub fn log_odds(&self, row: &FeatureRow) -> f64 {
        let mut delta = self.log_prior(1) - self.log_prior(0);
        for kind in BAYES_FEATURES {
            let token = kind.token(row);
            delta += self.feature_log_prob(kind.name(), 1, &token)
                - self.feature_log_prob(kind.name(), 0, &token);
        }
        delta
    }

    /// Risk probability for one row.
    pub fn score(&self, row: &FeatureRow) -> f64 {
        stable_sigmoid(self.log_odds(row))
    }

    /// Tokens pushing this row toward the risk class, strongest first.
    fn reasons(&self, row: &FeatureRow) -> Vec<String> {
        let mut contributions: Vec<(f64, &'static str, String)> = Vec::new();
        for kind in BAYES_FEATURES {
            let token = kind.token(row);
            let llr = self.feature_log_prob(kind.name(), 1, &token)
                - self.feature_log_prob(kind.name(), 0, &token);
            if llr > 0.0 {
                contributions.push((llr, kind.name(), token));
            }
        }
        contributions.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(b.1)));
        contributions
            .into_iter()
            .take(MAX_REASONS)
            .map(|(_, name, token)| format!("{name}={token}"))
            .collect()
    }
}

impl Predictor for NaiveBayesModel {
    fn name(&self) -> &'static str {
        "naive_bayes"
    }

    fn predict(&self, row: &FeatureRow) -> Prediction {
        let score = self.score(row);
        Prediction {
            score,
            label: RiskLabel::from_score(score),
            reasons: self.reasons(row),
        }
    }
}

/// Model-free heuristic predictor: a fixed base risk plus increments for
/// the strong signals, capped below 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselinePredictor;

/// Reason reported by the baseline when nothing raises the score.
pub const BASELINE_NO_SIGNAL: &str = "no risk signals";

impl Predictor for BaselinePredictor {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn predict(&self, row: &FeatureRow) -> Prediction {
        let mut score: f64 = 0.05;
        let mut reasons = Vec::new();
        if row.has_incidents {
            score += 0.45;
            reasons.push("has_incidents=1".to_string());
        }
        if row.is_suspicious {
            score += 0.30;
            reasons.push("is_suspicious=1".to_string());
        }
        if row.status_norm == crate::features::STATUS_NO_SHOW {
            score += 0.15;
            reasons.push("status_norm=no_show".to_string());
        }
        let score = score.min(0.95);
        if reasons.is_empty() {
            reasons.push(BASELINE_NO_SIGNAL.to_string());
        }
        Prediction {
            score,
            label: RiskLabel::from_score(score),
            reasons,
        }
    }
}
