//! Appointment feature model
//!
//! Canonical feature rows plus the deterministic transforms that produce
//! them: duration/notes bucketing, status normalization and the
//! suspicious-record rule.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod builder;

pub use builder::{build_features, build_row, quality_report, validate_rows, QualityReport};

/// Raw appointment as produced by the upstream read source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAppointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    /// Scheduled start, UTC.
    pub start: DateTime<Utc>,
    /// Scheduled end, UTC. Missing end yields a zero duration.
    pub end: Option<DateTime<Utc>>,
    /// Free-form status string, normalized downstream.
    pub status: String,
    pub notes: String,
    pub has_incidents: bool,
}

/// Read boundary for raw appointments. Implementations live outside this
/// crate (database, export files); only the interface is fixed here.
pub trait AppointmentSource {
    fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<RawAppointment>>;
}

/// Pre-derived record handed to the feature builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureInput {
    pub id: String,
    /// Appointment length in minutes. May be zero or negative in dirty data.
    pub duration_min: i64,
    /// Hour of day, 0-23.
    pub start_hour: u8,
    /// Day of week, Monday = 0 .. Sunday = 6.
    pub weekday: u8,
    /// Note text length in characters.
    pub notes_len: i64,
    pub status: String,
    pub has_incidents: bool,
    /// Epoch seconds of the scheduled start, used for temporal ordering.
    pub start_ts: Option<i64>,
}

impl FeatureInput {
    /// Derive the builder input from a raw appointment.
    pub fn from_appointment(raw: &RawAppointment) -> Self {
        let duration_min = raw
            .end
            .map(|end| (end - raw.start).num_minutes())
            .unwrap_or(0);
        FeatureInput {
            id: raw.id.clone(),
            duration_min,
            start_hour: raw.start.hour() as u8,
            weekday: raw.start.weekday().num_days_from_monday() as u8,
            notes_len: raw.notes.chars().count() as i64,
            status: raw.status.clone(),
            has_incidents: raw.has_incidents,
            start_ts: Some(raw.start.timestamp()),
        }
    }
}

/// Duration bucket with fixed breakpoints at 10, 20 and 40 minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationBucket {
    #[serde(rename = "0-10")]
    UpTo10,
    #[serde(rename = "11-20")]
    UpTo20,
    #[serde(rename = "21-40")]
    UpTo40,
    #[serde(rename = "41+")]
    Over40,
}

impl DurationBucket {
    /// Bucket a duration in minutes. Total: non-positive values land in "0-10".
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes <= 10 {
            DurationBucket::UpTo10
        } else if minutes <= 20 {
            DurationBucket::UpTo20
        } else if minutes <= 40 {
            DurationBucket::UpTo40
        } else {
            DurationBucket::Over40
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationBucket::UpTo10 => "0-10",
            DurationBucket::UpTo20 => "11-20",
            DurationBucket::UpTo40 => "21-40",
            DurationBucket::Over40 => "41+",
        }
    }
}

/// Notes-length bucket: empty, short, medium, long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotesBucket {
    #[serde(rename = "0")]
    Empty,
    #[serde(rename = "1-20")]
    Short,
    #[serde(rename = "21-100")]
    Medium,
    #[serde(rename = "101+")]
    Long,
}

impl NotesBucket {
    pub fn from_len(len: i64) -> Self {
        if len <= 0 {
            NotesBucket::Empty
        } else if len <= 20 {
            NotesBucket::Short
        } else if len <= 100 {
            NotesBucket::Medium
        } else {
            NotesBucket::Long
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotesBucket::Empty => "0",
            NotesBucket::Short => "1-20",
            NotesBucket::Medium => "21-100",
            NotesBucket::Long => "101+",
        }
    }
}

/// Normalized form of the cancelled status.
pub const STATUS_CANCELLED: &str = "cancelada";
/// Normalized form of the no-show status.
pub const STATUS_NO_SHOW: &str = "no_show";
/// Status assigned to blank input.
pub const STATUS_UNKNOWN: &str = "desconocido";

/// Normalize a raw status string: trim, lowercase, spaces to underscores,
/// then collapse known aliases. Blank input becomes "desconocido".
pub fn normalize_status(raw: &str) -> String {
    let token = raw.trim().to_lowercase().replace(' ', "_");
    match token.as_str() {
        "" => STATUS_UNKNOWN.to_string(),
        "cancelado" => STATUS_CANCELLED.to_string(),
        "noshow" | "no_show" => STATUS_NO_SHOW.to_string(),
        _ => token,
    }
}

/// Suspicious-record rule: a non-cancelled appointment with a non-positive
/// duration, or any appointment longer than four hours.
pub fn is_suspicious(duration_min: i64, status_norm: &str) -> bool {
    (duration_min <= 0 && status_norm != STATUS_CANCELLED) || duration_min > 240
}

/// Categorical feature channels used by training and drift monitoring.
///
/// Every channel tokenizes to a short string; booleans become "0"/"1" so
/// count maps stay uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    DurationBucket,
    NotesLenBucket,
    IsWeekend,
    StatusNorm,
    HasIncidents,
    IsSuspicious,
}

impl FeatureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::DurationBucket => "duration_bucket",
            FeatureKind::NotesLenBucket => "notes_len_bucket",
            FeatureKind::IsWeekend => "is_weekend",
            FeatureKind::StatusNorm => "status_norm",
            FeatureKind::HasIncidents => "has_incidents",
            FeatureKind::IsSuspicious => "is_suspicious",
        }
    }

    /// Token for this channel on one row.
    pub fn token(&self, row: &FeatureRow) -> String {
        fn bit(flag: bool) -> String {
            if flag { "1" } else { "0" }.to_string()
        }
        match self {
            FeatureKind::DurationBucket => row.duration_bucket.as_str().to_string(),
            FeatureKind::NotesLenBucket => row.notes_len_bucket.as_str().to_string(),
            FeatureKind::IsWeekend => bit(row.is_weekend),
            FeatureKind::StatusNorm => row.status_norm.clone(),
            FeatureKind::HasIncidents => bit(row.has_incidents),
            FeatureKind::IsSuspicious => bit(row.is_suspicious),
        }
    }
}

/// Canonical feature row. Stored payloads must deserialize to exactly these
/// fields; anything extra or missing is rejected at the store boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureRow {
    pub id: String,
    pub duration_min: i64,
    pub duration_bucket: DurationBucket,
    /// Hour of day, 0-23.
    pub start_hour: u8,
    /// Day of week, Monday = 0 .. Sunday = 6.
    pub weekday: u8,
    /// Derived: weekday >= 5.
    pub is_weekend: bool,
    pub notes_len: i64,
    pub notes_len_bucket: NotesBucket,
    pub has_incidents: bool,
    pub status_norm: String,
    pub is_suspicious: bool,
    /// Epoch seconds, present when the source carried a usable start time.
    pub start_ts: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_duration_bucket_breakpoints() {
        assert_eq!(DurationBucket::from_minutes(-5), DurationBucket::UpTo10);
        assert_eq!(DurationBucket::from_minutes(0), DurationBucket::UpTo10);
        assert_eq!(DurationBucket::from_minutes(10), DurationBucket::UpTo10);
        assert_eq!(DurationBucket::from_minutes(11), DurationBucket::UpTo20);
        assert_eq!(DurationBucket::from_minutes(20), DurationBucket::UpTo20);
        assert_eq!(DurationBucket::from_minutes(21), DurationBucket::UpTo40);
        assert_eq!(DurationBucket::from_minutes(40), DurationBucket::UpTo40);
        assert_eq!(DurationBucket::from_minutes(41), DurationBucket::Over40);
        assert_eq!(DurationBucket::from_minutes(500), DurationBucket::Over40);
    }

    #[test]
    fn test_notes_bucket_breakpoints() {
        assert_eq!(NotesBucket::from_len(0), NotesBucket::Empty);
        assert_eq!(NotesBucket::from_len(1), NotesBucket::Short);
        assert_eq!(NotesBucket::from_len(20), NotesBucket::Short);
        assert_eq!(NotesBucket::from_len(21), NotesBucket::Medium);
        assert_eq!(NotesBucket::from_len(100), NotesBucket::Medium);
        assert_eq!(NotesBucket::from_len(101), NotesBucket::Long);
    }

    #[test]
    fn test_bucket_serde_forms() {
        let json = serde_json::to_string(&DurationBucket::UpTo40).unwrap();
        assert_eq!(json, "\"21-40\"");
        let back: DurationBucket = serde_json::from_str("\"41+\"").unwrap();
        assert_eq!(back, DurationBucket::Over40);

        let json = serde_json::to_string(&NotesBucket::Empty).unwrap();
        assert_eq!(json, "\"0\"");
        let back: NotesBucket = serde_json::from_str("\"101+\"").unwrap();
        assert_eq!(back, NotesBucket::Long);
    }

    #[test]
    fn test_normalize_status_aliases() {
        assert_eq!(normalize_status("Cancelado"), "cancelada");
        assert_eq!(normalize_status("cancelada"), "cancelada");
        assert_eq!(normalize_status("NO SHOW"), "no_show");
        assert_eq!(normalize_status("noshow"), "no_show");
        assert_eq!(normalize_status("no_show"), "no_show");
        assert_eq!(normalize_status(""), "desconocido");
        assert_eq!(normalize_status("   "), "desconocido");
        assert_eq!(normalize_status("Atendida"), "atendida");
        assert_eq!(normalize_status("En Espera"), "en_espera");
    }

    #[test]
    fn test_is_suspicious_rule() {
        assert!(is_suspicious(0, "atendida"));
        assert!(is_suspicious(-15, "desconocido"));
        assert!(!is_suspicious(0, STATUS_CANCELLED));
        assert!(is_suspicious(241, "atendida"));
        assert!(is_suspicious(300, STATUS_CANCELLED));
        assert!(!is_suspicious(240, "atendida"));
        assert!(!is_suspicious(30, "atendida"));
    }

    #[test]
    fn test_feature_input_from_appointment() {
        // Wednesday 2025-06-04 14:30 UTC, 45 minute slot
        let start = Utc.with_ymd_and_hms(2025, 6, 4, 14, 30, 0).unwrap();
        let raw = RawAppointment {
            id: "a-1".to_string(),
            patient_id: "p-1".to_string(),
            doctor_id: "d-1".to_string(),
            start,
            end: Some(start + chrono::Duration::minutes(45)),
            status: "Atendida".to_string(),
            notes: "paciente llegó tarde".to_string(),
            has_incidents: false,
        };
        let input = FeatureInput::from_appointment(&raw);
        assert_eq!(input.duration_min, 45);
        assert_eq!(input.start_hour, 14);
        assert_eq!(input.weekday, 2);
        assert_eq!(input.notes_len, 20);
        assert_eq!(input.start_ts, Some(start.timestamp()));
    }

    #[test]
    fn test_feature_input_missing_end() {
        let start = Utc.with_ymd_and_hms(2025, 6, 7, 9, 0, 0).unwrap();
        let raw = RawAppointment {
            id: "a-2".to_string(),
            patient_id: "p-2".to_string(),
            doctor_id: "d-1".to_string(),
            start,
            end: None,
            status: "cancelado".to_string(),
            notes: String::new(),
            has_incidents: false,
        };
        let input = FeatureInput::from_appointment(&raw);
        assert_eq!(input.duration_min, 0);
        // 2025-06-07 is a Saturday
        assert_eq!(input.weekday, 5);
    }

    #[test]
    fn test_feature_kind_tokens() {
        let row = FeatureRow {
            id: "t-1".to_string(),
            duration_min: 35,
            duration_bucket: DurationBucket::UpTo40,
            start_hour: 16,
            weekday: 6,
            is_weekend: true,
            notes_len: 0,
            notes_len_bucket: NotesBucket::Empty,
            has_incidents: false,
            status_norm: "no_show".to_string(),
            is_suspicious: false,
            start_ts: None,
        };
        assert_eq!(FeatureKind::DurationBucket.token(&row), "21-40");
        assert_eq!(FeatureKind::NotesLenBucket.token(&row), "0");
        assert_eq!(FeatureKind::IsWeekend.token(&row), "1");
        assert_eq!(FeatureKind::StatusNorm.token(&row), "no_show");
        assert_eq!(FeatureKind::HasIncidents.token(&row), "0");
        assert_eq!(FeatureKind::IsSuspicious.token(&row), "0");
    }

    #[test]
    fn test_feature_row_rejects_unknown_fields() {
        let json = r#"{
            "id": "x", "duration_min": 30, "duration_bucket": "21-40",
            "start_hour": 9, "weekday": 1, "is_weekend": false,
            "notes_len": 0, "notes_len_bucket": "0", "has_incidents": false,
            "status_norm": "atendida", "is_suspicious": false,
            "start_ts": null, "extra": 1
        }"#;
        let parsed: std::result::Result<FeatureRow, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
