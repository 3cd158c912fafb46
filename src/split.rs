//! Leakage-safe temporal splitting
//!
//! Rows are ordered by their start timestamp and test windows always sit
//! strictly after the training window, so a model is never evaluated on
//! appointments that precede its training data.

use crate::error::{Error, Result};
use crate::features::FeatureRow;

/// Fixed (train_ratio, test_ratio) schedule for walk-forward validation.
pub const WALK_FORWARD_SCHEDULE: [(f64, f64); 3] = [(0.6, 0.2), (0.8, 0.2), (0.9, 0.1)];

/// Chronological holdout split: `train` strictly precedes `test`.
#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub train: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
}

/// One walk-forward fold with its position in the schedule.
#[derive(Debug, Clone)]
pub struct Fold {
    pub index: usize,
    pub train_ratio: f64,
    pub test_ratio: f64,
    pub train: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
}

/// Sort rows ascending by `start_ts`. Stable, so rows sharing a timestamp
/// keep their input order.
fn sorted_by_time(rows: &[FeatureRow]) -> Result<Vec<FeatureRow>> {
    if rows.is_empty() {
        return Err(Error::NotEnoughData("no rows to split".to_string()));
    }
    for row in rows {
        if row.start_ts.is_none() {
            return Err(Error::NotEnoughData(format!(
                "row {} has no start_ts; temporal ordering requires one",
                row.id
            )));
        }
    }
    let mut sorted = rows.to_vec();
    sorted.sort_by_key(|row| row.start_ts);
    Ok(sorted)
}

/// Split rows into a chronological train/test pair.
///
/// The test set is the last `max(1, floor(n * test_ratio))` rows by time.
/// Fails with `NotEnoughData` when the input is empty, any row lacks a
/// timestamp, or the remaining train part is smaller than `min_train`.
pub fn train_test_split(
    rows: &[FeatureRow],
    test_ratio: f64,
    min_train: usize,
) -> Result<TemporalSplit> {
    let sorted = sorted_by_time(rows)?;
    let n = sorted.len();
    let test_size = ((n as f64) * test_ratio).floor() as usize;
    let test_size = test_size.clamp(1, n);
    let train_size = n - test_size;
    if train_size < min_train {
        return Err(Error::NotEnoughData(format!(
            "train size {train_size} below minimum {min_train} ({n} rows, test_ratio {test_ratio})"
        )));
    }
    let mut train = sorted;
    let test = train.split_off(train_size);
    Ok(TemporalSplit { train, test })
}

/// Build walk-forward folds over the fixed schedule, truncated to
/// `n_folds`.
///
/// Fold k trains on the first `floor(n * train_ratio)` rows and tests on
/// the `floor(n * test_ratio)` rows immediately after them (capped at the
/// end of the data). Folds with short train parts or empty test windows
/// are dropped; if none survive, `NotEnoughData`.
pub fn walk_forward_folds(
    rows: &[FeatureRow],
    n_folds: usize,
    min_train: usize,
) -> Result<Vec<Fold>> {
    let sorted = sorted_by_time(rows)?;
    let n = sorted.len();
    let mut folds = Vec::new();
    for (index, (train_ratio, test_ratio)) in
        WALK_FORWARD_SCHEDULE.iter().take(n_folds).enumerate()
    {
        let train_end = ((n as f64) * train_ratio).floor() as usize;
        let test_len = ((n as f64) * test_ratio).floor() as usize;
        let test_end = (train_end + test_len).min(n);
        if train_end < min_train || test_end <= train_end {
            continue;
        }
        folds.push(Fold {
            index,
            train_ratio: *train_ratio,
            test_ratio: *test_ratio,
            train: sorted[..train_end].to_vec(),
            test: sorted[train_end..test_end].to_vec(),
        });
    }
    if folds.is_empty() {
        return Err(Error::NotEnoughData(format!(
            "no usable folds from {n} rows (min_train {min_train})"
        )));
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{build_row, FeatureInput};

    fn rows(n: usize) -> Vec<FeatureRow> {
        (0..n)
            .map(|i| {
                build_row(&FeatureInput {
                    id: format!("r-{i}"),
                    duration_min: 30,
                    start_hour: 9,
                    weekday: 1,
                    notes_len: 5,
                    status: "atendida".to_string(),
                    has_incidents: false,
                    start_ts: Some(1_700_000_000 + i as i64 * 3600),
                })
            })
            .collect()
    }

    #[test]
    fn test_split_30_rows() {
        let split = train_test_split(&rows(30), 0.2, 20).unwrap();
        assert_eq!(split.train.len(), 24);
        assert_eq!(split.test.len(), 6);
        // Test rows are the latest by time.
        let max_train = split.train.iter().map(|r| r.start_ts).max().unwrap();
        let min_test = split.test.iter().map(|r| r.start_ts).min().unwrap();
        assert!(max_train <= min_test);
    }

    #[test]
    fn test_split_too_few_rows() {
        let err = train_test_split(&rows(10), 0.2, 20).unwrap_err();
        assert!(matches!(err, Error::NotEnoughData(_)));
    }

    #[test]
    fn test_split_empty_input() {
        let err = train_test_split(&[], 0.2, 1).unwrap_err();
        assert!(matches!(err, Error::NotEnoughData(_)));
    }

    #[test]
    fn test_split_missing_timestamp() {
        let mut data = rows(5);
        data[2].start_ts = None;
        let err = train_test_split(&data, 0.2, 1).unwrap_err();
        match err {
            Error::NotEnoughData(msg) => assert!(msg.contains("r-2")),
            other => panic!("expected NotEnoughData, got {other:?}"),
        }
    }

    #[test]
    fn test_split_test_size_at_least_one() {
        // floor(5 * 0.1) = 0, clamped up to 1
        let split = train_test_split(&rows(5), 0.1, 1).unwrap();
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.train.len(), 4);
    }

    #[test]
    fn test_split_sorts_unordered_input() {
        let mut data = rows(10);
        data.reverse();
        let split = train_test_split(&data, 0.2, 2).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.test[1].id, "r-9");
        assert_eq!(split.train[0].id, "r-0");
    }

    #[test]
    fn test_walk_forward_schedule() {
        let folds = walk_forward_folds(&rows(100), 3, 10).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].train.len(), 60);
        assert_eq!(folds[0].test.len(), 20);
        assert_eq!(folds[1].train.len(), 80);
        assert_eq!(folds[1].test.len(), 20);
        assert_eq!(folds[2].train.len(), 90);
        assert_eq!(folds[2].test.len(), 10);
        for fold in &folds {
            let max_train = fold.train.iter().map(|r| r.start_ts).max().unwrap();
            let min_test = fold.test.iter().map(|r| r.start_ts).min().unwrap();
            assert!(max_train <= min_test);
        }
    }

    #[test]
    fn test_walk_forward_truncates_to_n_folds() {
        let folds = walk_forward_folds(&rows(100), 2, 10).unwrap();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[1].train_ratio, 0.8);
    }

    #[test]
    fn test_walk_forward_drops_short_folds() {
        // 10 rows: fold trains of 6, 8 and 9; min_train 7 drops the first.
        let folds = walk_forward_folds(&rows(10), 3, 7).unwrap();
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].index, 1);
    }

    #[test]
    fn test_walk_forward_all_folds_dropped() {
        let err = walk_forward_folds(&rows(10), 3, 50).unwrap_err();
        assert!(matches!(err, Error::NotEnoughData(_)));
    }

    #[test]
    fn test_walk_forward_zero_folds_requested() {
        let err = walk_forward_folds(&rows(100), 0, 10).unwrap_err();
        assert!(matches!(err, Error::NotEnoughData(_)));
    }
}
