//! Classification metrics at a decision threshold

use serde::{Deserialize, Serialize};

/// Confusion counts and derived rates for one threshold.
///
/// Any rate whose denominator is zero reports 0.0 instead of NaN, so
/// degenerate label sets stay comparable during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMetrics {
    pub threshold: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

impl ThresholdMetrics {
    /// Total number of scored examples.
    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

/// Compute metrics for `scores` against `labels` at `threshold`.
///
/// A score counts as a positive prediction when `score >= threshold`.
/// Scores and labels are paired positionally and must have equal length.
///
/// # Example
///
/// ```
/// use prever::train::metrics_at_threshold;
///
/// let m = metrics_at_threshold(&[0.9, 0.2, 0.8], &[true, false, true], 0.5);
/// assert_eq!(m.accuracy, 1.0);
/// assert_eq!(m.true_positives, 2);
/// ```
pub fn metrics_at_threshold(scores: &[f64], labels: &[bool], threshold: f64) -> ThresholdMetrics {
    assert_eq!(
        scores.len(),
        labels.len(),
        "scores and labels must have equal length"
    );

    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut tn = 0u64;
    let mut fn_ = 0u64;
    for (score, label) in scores.iter().zip(labels.iter()) {
        let positive = *score >= threshold;
        match (positive, *label) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let accuracy = ratio(tp + tn, tp + fp + tn + fn_);
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    ThresholdMetrics {
        threshold,
        accuracy,
        precision,
        recall,
        f1,
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_,
    }
}
