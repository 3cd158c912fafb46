//! Dataset drift monitoring
//!
//! Compares token distributions of two dataset versions with the
//! Population Stability Index. PSI is computed per tracked feature over
//! the union of observed tokens, with proportions floored at a small
//! epsilon so tokens absent on one side stay finite.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::features::{FeatureKind, FeatureRow};

/// Proportion floor applied before the log-ratio.
pub const PSI_EPS: f64 = 1e-6;
/// PSI at or above this is a warning.
pub const PSI_AMBER: f64 = 0.1;
/// PSI at or above this flags drift.
pub const PSI_RED: f64 = 0.2;

/// Features whose distributions are tracked across versions.
pub const TRACKED_FEATURES: [FeatureKind; 5] = [
    FeatureKind::DurationBucket,
    FeatureKind::NotesLenBucket,
    FeatureKind::IsWeekend,
    FeatureKind::StatusNorm,
    FeatureKind::IsSuspicious,
];

/// Traffic-light band for a PSI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    Green,
    Amber,
    Red,
}

impl DriftSeverity {
    /// Below 0.1 green, below 0.2 amber, otherwise red.
    pub fn from_psi(psi: f64) -> Self {
        if psi < PSI_AMBER {
            DriftSeverity::Green
        } else if psi < PSI_RED {
            DriftSeverity::Amber
        } else {
            DriftSeverity::Red
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriftSeverity::Green => "green",
            DriftSeverity::Amber => "amber",
            DriftSeverity::Red => "red",
        }
    }
}

/// Token proportions of one feature over a row set. Empty input yields an
/// empty map.
pub fn distribution(rows: &[FeatureRow], feature: FeatureKind) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for row in rows {
        *counts.entry(feature.token(row)).or_insert(0) += 1;
    }
    let total = rows.len() as f64;
    counts
        .into_iter()
        .map(|(token, count)| (token, count as f64 / total))
        .collect()
}

/// Population Stability Index between two token distributions.
///
/// Sums `(q - p) * ln(q / p)` over the union of tokens, flooring each
/// proportion at `PSI_EPS`. Identical distributions give exactly 0.
pub fn psi(p: &BTreeMap<String, f64>, q: &BTreeMap<String, f64>) -> f64 {
    let tokens: BTreeSet<&String> = p.keys().chain(q.keys()).collect();
    tokens
        .into_iter()
        .map(|token| {
            let pi = p.get(token).copied().unwrap_or(0.0).max(PSI_EPS);
            let qi = q.get(token).copied().unwrap_or(0.0).max(PSI_EPS);
            (qi - pi) * (qi / pi).ln()
        })
        .sum()
}

/// Drift comparison between two dataset versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub from_version: String,
    pub to_version: String,
    pub total_from: u64,
    pub total_to: u64,
    /// feature -> token -> proportion delta (to minus from) over the union.
    pub feature_shifts: BTreeMap<String, BTreeMap<String, f64>>,
    pub psi_by_feature: BTreeMap<String, f64>,
    /// True when any tracked feature reaches the red band.
    pub overall_flag: bool,
}

impl DriftReport {
    /// Compare two row sets across all tracked features.
    pub fn compare(
        from_version: &str,
        to_version: &str,
        from_rows: &[FeatureRow],
        to_rows: &[FeatureRow],
    ) -> Self {
        let mut feature_shifts = BTreeMap::new();
        let mut psi_by_feature = BTreeMap::new();
        for feature in TRACKED_FEATURES {
            let p = distribution(from_rows, feature);
            let q = distribution(to_rows, feature);

            let tokens: BTreeSet<String> = p.keys().chain(q.keys()).cloned().collect();
            let shifts: BTreeMap<String, f64> = tokens
                .into_iter()
                .map(|token| {
                    let delta = q.get(&token).copied().unwrap_or(0.0)
                        - p.get(&token).copied().unwrap_or(0.0);
                    (token, delta)
                })
                .collect();

            feature_shifts.insert(feature.name().to_string(), shifts);
            psi_by_feature.insert(feature.name().to_string(), psi(&p, &q));
        }
        let overall_flag = psi_by_feature.values().any(|&v| v >= PSI_RED);
        DriftReport {
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            total_from: from_rows.len() as u64,
            total_to: to_rows.len() as u64,
            feature_shifts,
            psi_by_feature,
            overall_flag,
        }
    }

    /// Traffic-light band per tracked feature.
    pub fn severities(&self) -> BTreeMap<String, DriftSeverity> {
        self.psi_by_feature
            .iter()
            .map(|(name, &value)| (name.clone(), DriftSeverity::from_psi(value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{build_row, FeatureInput};
    use approx::assert_relative_eq;

    fn row(id: &str, duration: i64, status: &str) -> FeatureRow {
        build_row(&FeatureInput {
            id: id.to_string(),
            duration_min: duration,
            start_hour: 9,
            weekday: 1,
            notes_len: 10,
            status: status.to_string(),
            has_incidents: false,
            start_ts: Some(1_700_000_000),
        })
    }

    #[test]
    fn test_distribution_proportions() {
        let rows = vec![
            row("d-1", 5, "atendida"),
            row("d-2", 15, "atendida"),
            row("d-3", 15, "atendida"),
            row("d-4", 50, "atendida"),
        ];
        let dist = distribution(&rows, FeatureKind::DurationBucket);
        assert_relative_eq!(dist["0-10"], 0.25);
        assert_relative_eq!(dist["11-20"], 0.5);
        assert_relative_eq!(dist["41+"], 0.25);
        assert_relative_eq!(dist.values().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_distribution_empty_rows() {
        assert!(distribution(&[], FeatureKind::StatusNorm).is_empty());
    }

    #[test]
    fn test_psi_identical_is_zero() {
        let rows = vec![
            row("p-1", 5, "atendida"),
            row("p-2", 25, "no_show"),
            row("p-3", 50, "cancelada"),
        ];
        let p = distribution(&rows, FeatureKind::StatusNorm);
        assert_relative_eq!(psi(&p, &p), 0.0);
    }

    #[test]
    fn test_psi_detects_full_shift() {
        let from: Vec<FeatureRow> = (0..10).map(|i| row(&format!("f-{i}"), 5, "atendida")).collect();
        let to: Vec<FeatureRow> = (0..10).map(|i| row(&format!("t-{i}"), 60, "atendida")).collect();
        let p = distribution(&from, FeatureKind::DurationBucket);
        let q = distribution(&to, FeatureKind::DurationBucket);
        let value = psi(&p, &q);
        assert!(value > PSI_RED, "psi {value}");
        assert_eq!(DriftSeverity::from_psi(value), DriftSeverity::Red);
    }

    #[test]
    fn test_psi_union_handles_one_sided_tokens() {
        let mut p = BTreeMap::new();
        p.insert("a".to_string(), 1.0);
        let mut q = BTreeMap::new();
        q.insert("b".to_string(), 1.0);
        let value = psi(&p, &q);
        // Two symmetric terms of (1 - eps) * ln(1 / eps).
        let expected = 2.0 * (1.0 - PSI_EPS) * (1.0 / PSI_EPS).ln();
        assert_relative_eq!(value, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(DriftSeverity::from_psi(0.0), DriftSeverity::Green);
        assert_eq!(DriftSeverity::from_psi(0.099), DriftSeverity::Green);
        assert_eq!(DriftSeverity::from_psi(0.1), DriftSeverity::Amber);
        assert_eq!(DriftSeverity::from_psi(0.199), DriftSeverity::Amber);
        assert_eq!(DriftSeverity::from_psi(0.2), DriftSeverity::Red);
        assert_eq!(DriftSeverity::from_psi(3.0), DriftSeverity::Red);
        assert_eq!(DriftSeverity::Amber.as_str(), "amber");
    }

    #[test]
    fn test_report_stable_versions() {
        let rows = vec![row("r-1", 5, "atendida"), row("r-2", 25, "no_show")];
        let report = DriftReport::compare("v1", "v2", &rows, &rows);
        assert!(!report.overall_flag);
        assert_eq!(report.total_from, 2);
        assert_eq!(report.total_to, 2);
        for value in report.psi_by_feature.values() {
            assert_relative_eq!(*value, 0.0);
        }
        for severity in report.severities().values() {
            assert_eq!(*severity, DriftSeverity::Green);
        }
    }

    #[test]
    fn test_report_flags_bucket_migration() {
        let from: Vec<FeatureRow> =
            (0..20).map(|i| row(&format!("f-{i}"), 15, "atendida")).collect();
        let to: Vec<FeatureRow> =
            (0..20).map(|i| row(&format!("t-{i}"), 90, "atendida")).collect();
        let report = DriftReport::compare("v1", "v2", &from, &to);
        assert!(report.overall_flag);
        assert!(report.psi_by_feature["duration_bucket"] > PSI_RED);
        // Unshifted features stay green.
        assert_relative_eq!(report.psi_by_feature["status_norm"], 0.0);
        assert_eq!(
            report.severities()["duration_bucket"],
            DriftSeverity::Red
        );

        let shifts = &report.feature_shifts["duration_bucket"];
        assert_relative_eq!(shifts["11-20"], -1.0);
        assert_relative_eq!(shifts["41+"], 1.0);
    }

    #[test]
    fn test_report_tracks_five_features() {
        let rows = vec![row("r-1", 30, "atendida")];
        let report = DriftReport::compare("a", "b", &rows, &rows);
        assert_eq!(report.psi_by_feature.len(), 5);
        assert!(report.psi_by_feature.contains_key("duration_bucket"));
        assert!(report.psi_by_feature.contains_key("notes_len_bucket"));
        assert!(report.psi_by_feature.contains_key("is_weekend"));
        assert!(report.psi_by_feature.contains_key("status_norm"));
        assert!(report.psi_by_feature.contains_key("is_suspicious"));
        // has_incidents is deliberately not a drift channel.
        assert!(!report.psi_by_feature.contains_key("has_incidents"));
    }

    #[test]
    fn test_report_serializes() {
        let rows = vec![row("r-1", 30, "atendida")];
        let report = DriftReport::compare("a", "b", &rows, &rows);
        let json = serde_json::to_string(&report).unwrap();
        let back: DriftReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
