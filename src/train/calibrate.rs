//! Decision threshold calibration
//!
//! Candidates always come from the observed score set, so calibration
//! adapts to whatever the model actually produced instead of sweeping a
//! hard-coded grid. Every policy returns a usable threshold; when a target
//! cannot be met the fallback chain picks the closest achievable one and
//! reports `target_met = false`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::train::metrics::{metrics_at_threshold, ThresholdMetrics};

/// Threshold used when no observed score qualifies as a candidate.
pub const FALLBACK_THRESHOLD: f64 = 0.5;

/// Calibration objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "objective", content = "value", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Maximize F1, ties broken by precision then lowest threshold.
    F1Max,
    /// Require recall >= value, then maximize precision and F1.
    MinRecall(f64),
    /// Require precision >= value, then maximize precision and F1.
    MinPrecision(f64),
}

impl ThresholdPolicy {
    /// Resolve a policy from its configuration form.
    ///
    /// `min_recall` and `min_precision` need a value in (0, 1]; `f1_max`
    /// takes none. Anything else is a configuration error.
    pub fn parse(objective: &str, value: Option<f64>) -> Result<Self> {
        match objective {
            "f1_max" => Ok(ThresholdPolicy::F1Max),
            "min_recall" | "min_precision" => {
                let v = value.ok_or_else(|| {
                    Error::Configuration(format!("objective {objective} requires a target value"))
                })?;
                if !v.is_finite() || v <= 0.0 || v > 1.0 {
                    return Err(Error::Configuration(format!(
                        "objective {objective} target must be in (0, 1], got {v}"
                    )));
                }
                if objective == "min_recall" {
                    Ok(ThresholdPolicy::MinRecall(v))
                } else {
                    Ok(ThresholdPolicy::MinPrecision(v))
                }
            }
            other => Err(Error::Configuration(format!(
                "unknown calibration objective: {other}"
            ))),
        }
    }

    pub fn objective_str(&self) -> &'static str {
        match self {
            ThresholdPolicy::F1Max => "f1_max",
            ThresholdPolicy::MinRecall(_) => "min_recall",
            ThresholdPolicy::MinPrecision(_) => "min_precision",
        }
    }
}

/// Chosen threshold with its metrics and whether the policy target held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub threshold: f64,
    pub metrics: ThresholdMetrics,
    pub target_met: bool,
}

/// Sorted distinct observed scores inside [0, 1]; `{0.5}` when none
/// qualify.
pub fn candidate_thresholds(scores: &[f64]) -> Vec<f64> {
    let mut candidates: Vec<f64> = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite() && (0.0..=1.0).contains(s))
        .collect();
    candidates.sort_by(f64::total_cmp);
    candidates.dedup();
    if candidates.is_empty() {
        candidates.push(FALLBACK_THRESHOLD);
    }
    candidates
}

// Lexicographic "strictly better" comparisons. Scanning candidates in
// ascending order with a strict comparison keeps the lowest threshold on
// exact ties.
fn better2(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 > b.0 || (a.0 == b.0 && a.1 > b.1)
}

fn better3(a: (f64, f64, f64), b: (f64, f64, f64)) -> bool {
    a.0 > b.0 || (a.0 == b.0 && better2((a.1, a.2), (b.1, b.2)))
}

/// Calibrate a decision threshold against observed scores and labels.
pub fn calibrate(scores: &[f64], labels: &[bool], policy: &ThresholdPolicy) -> Result<Calibration> {
    if scores.len() != labels.len() {
        return Err(Error::Validation(format!(
            "calibration needs matching lengths, got {} scores and {} labels",
            scores.len(),
            labels.len()
        )));
    }

    let evaluated: Vec<ThresholdMetrics> = candidate_thresholds(scores)
        .into_iter()
        .map(|t| metrics_at_threshold(scores, labels, t))
        .collect();

    let chosen = match policy {
        ThresholdPolicy::F1Max => {
            let mut best = &evaluated[0];
            for m in &evaluated[1..] {
                if better2((m.f1, m.precision), (best.f1, best.precision)) {
                    best = m;
                }
            }
            Calibration {
                threshold: best.threshold,
                metrics: *best,
                target_met: true,
            }
        }
        ThresholdPolicy::MinRecall(target) => {
            pick_with_floor(&evaluated, *target, |m| m.recall)
        }
        ThresholdPolicy::MinPrecision(target) => {
            pick_with_floor(&evaluated, *target, |m| m.precision)
        }
    };
    Ok(chosen)
}

/// Pick among thresholds keeping `target_of >= target`, maximizing
/// (precision, f1). When nothing is feasible, maximize
/// (target metric, precision, f1) instead and flag the miss.
fn pick_with_floor(
    evaluated: &[ThresholdMetrics],
    target: f64,
    target_of: impl Fn(&ThresholdMetrics) -> f64,
) -> Calibration {
    let mut best_feasible: Option<&ThresholdMetrics> = None;
    for m in evaluated {
        if target_of(m) >= target {
            let replace = match best_feasible {
                None => true,
                Some(current) => better2((m.precision, m.f1), (current.precision, current.f1)),
            };
            if replace {
                best_feasible = Some(m);
            }
        }
    }
    if let Some(best) = best_feasible {
        return Calibration {
            threshold: best.threshold,
            metrics: *best,
            target_met: true,
        };
    }

    let mut best = &evaluated[0];
    for m in &evaluated[1..] {
        if better3(
            (target_of(m), m.precision, m.f1),
            (target_of(best), best.precision, best.f1),
        ) {
            best = m;
        }
    }
    Calibration {
        threshold: best.threshold,
        metrics: *best,
        target_met: false,
    }
}
