//! Feature building, validation and quality reporting
//!
//! `build_features` is the only path that turns raw inputs into
//! `FeatureRow`s; it always validates before handing rows back, so
//! downstream consumers can rely on the row invariants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{
    is_suspicious, normalize_status, DurationBucket, FeatureInput, FeatureRow, NotesBucket,
    STATUS_CANCELLED, STATUS_UNKNOWN,
};

/// Build a single feature row. Does not validate; `build_features` does.
pub fn build_row(input: &FeatureInput) -> FeatureRow {
    let status_norm = normalize_status(&input.status);
    let suspicious = is_suspicious(input.duration_min, &status_norm);
    FeatureRow {
        id: input.id.clone(),
        duration_min: input.duration_min,
        duration_bucket: DurationBucket::from_minutes(input.duration_min),
        start_hour: input.start_hour,
        weekday: input.weekday,
        is_weekend: input.weekday >= 5,
        notes_len: input.notes_len,
        notes_len_bucket: NotesBucket::from_len(input.notes_len),
        has_incidents: input.has_incidents,
        status_norm,
        is_suspicious: suspicious,
        start_ts: input.start_ts,
    }
}

/// Build and validate feature rows from pre-derived inputs.
///
/// Fails on the first invalid row with a `Validation` error naming the
/// offending id, so a bad batch never produces a partial dataset.
pub fn build_features(inputs: &[FeatureInput]) -> Result<Vec<FeatureRow>> {
    let rows: Vec<FeatureRow> = inputs.iter().map(build_row).collect();
    validate_rows(&rows)?;
    Ok(rows)
}

/// Validate row invariants, failing fast on the first violation.
///
/// Checks ranges (`start_hour`, `weekday`, `notes_len`), derived-field
/// consistency (both buckets and the weekend flag) and the rule that only
/// cancelled appointments may have a non-positive duration.
pub fn validate_rows(rows: &[FeatureRow]) -> Result<()> {
    for row in rows {
        if row.start_hour > 23 {
            return Err(Error::Validation(format!(
                "row {}: start_hour {} out of range 0-23",
                row.id, row.start_hour
            )));
        }
        if row.weekday > 6 {
            return Err(Error::Validation(format!(
                "row {}: weekday {} out of range 0-6",
                row.id, row.weekday
            )));
        }
        if row.notes_len < 0 {
            return Err(Error::Validation(format!(
                "row {}: negative notes_len {}",
                row.id, row.notes_len
            )));
        }
        if row.duration_bucket != DurationBucket::from_minutes(row.duration_min) {
            return Err(Error::Validation(format!(
                "row {}: duration_bucket {} inconsistent with duration_min {}",
                row.id,
                row.duration_bucket.as_str(),
                row.duration_min
            )));
        }
        if row.notes_len_bucket != NotesBucket::from_len(row.notes_len) {
            return Err(Error::Validation(format!(
                "row {}: notes_len_bucket {} inconsistent with notes_len {}",
                row.id,
                row.notes_len_bucket.as_str(),
                row.notes_len
            )));
        }
        if row.is_weekend != (row.weekday >= 5) {
            return Err(Error::Validation(format!(
                "row {}: is_weekend inconsistent with weekday {}",
                row.id, row.weekday
            )));
        }
        if row.duration_min <= 0 && row.status_norm != STATUS_CANCELLED {
            return Err(Error::Validation(format!(
                "row {}: non-positive duration {} with status {}",
                row.id, row.duration_min, row.status_norm
            )));
        }
    }
    Ok(())
}

/// Aggregate counts describing a row set. Purely informational; computing a
/// report never mutates or filters the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total: u64,
    pub suspicious: u64,
    pub cancelled: u64,
    pub unknown_status: u64,
    pub weekend: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Counts keyed by the bucket labels ("0-10" .. "41+").
    pub by_duration_bucket: BTreeMap<String, u64>,
    /// Counts keyed by the bucket labels ("0" .. "101+").
    pub by_notes_bucket: BTreeMap<String, u64>,
}

/// Count suspicious / cancelled / unknown-status / weekend rows and the
/// breakdowns by status and by both bucketed fields.
pub fn quality_report(rows: &[FeatureRow]) -> QualityReport {
    let mut report = QualityReport {
        total: rows.len() as u64,
        ..QualityReport::default()
    };
    for row in rows {
        if row.is_suspicious {
            report.suspicious += 1;
        }
        if row.status_norm == STATUS_CANCELLED {
            report.cancelled += 1;
        }
        if row.status_norm == STATUS_UNKNOWN {
            report.unknown_status += 1;
        }
        if row.is_weekend {
            report.weekend += 1;
        }
        *report.by_status.entry(row.status_norm.clone()).or_insert(0) += 1;
        *report
            .by_duration_bucket
            .entry(row.duration_bucket.as_str().to_string())
            .or_insert(0) += 1;
        *report
            .by_notes_bucket
            .entry(row.notes_len_bucket.as_str().to_string())
            .or_insert(0) += 1;
    }
    report
}
