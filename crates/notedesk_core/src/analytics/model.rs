//! Serializable analytics output shapes.

use crate::model::activity::{ActivityEvent, TimeWindow};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;

/// Login/logout derived totals for one roster identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionActivity {
    pub total_sessions: u64,
    pub total_time_seconds: i64,
    pub total_time_formatted: String,
    pub login_count: u64,
    pub logout_count: u64,
    pub avg_session_seconds: f64,
    pub last_activity: Option<DateTime<FixedOffset>>,
}

impl Default for SessionActivity {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            total_time_seconds: 0,
            total_time_formatted: crate::time::format_duration(0),
            login_count: 0,
            logout_count: 0,
            avg_session_seconds: 0.0,
            last_activity: None,
        }
    }
}

/// Page-view derived totals for one roster identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyActivity {
    pub total_study_seconds: i64,
    pub total_study_formatted: String,
    pub study_sessions: u64,
    pub pages_visited: u64,
    pub avg_study_seconds: f64,
}

impl Default for StudyActivity {
    fn default() -> Self {
        Self {
            total_study_seconds: 0,
            total_study_formatted: crate::time::format_duration(0),
            study_sessions: 0,
            pages_visited: 0,
            avg_study_seconds: 0.0,
        }
    }
}

/// Event counts for one civil day.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub logins: u64,
    pub logouts: u64,
    pub study_sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveIdentity {
    pub identity: String,
    pub total_time_seconds: i64,
    pub total_time_formatted: String,
}

/// Chart projection of the most-active ranking.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityChart {
    pub labels: Vec<String>,
    pub data: Vec<i64>,
    pub formatted_data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// One civil-day bucket; `date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerNoteCount {
    pub identity: String,
    pub note_count: u64,
}

/// Records skipped while aggregating.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub out_of_roster_events: u64,
    pub malformed_study_events: u64,
}

/// Full analytics dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub window: TimeWindow,
    pub generated_at: DateTime<FixedOffset>,
    pub roster: Vec<String>,
    pub login_logout_activity: BTreeMap<String, SessionActivity>,
    pub study_activity: BTreeMap<String, StudyActivity>,
    pub daily_activity: BTreeMap<String, DailyActivity>,
    pub most_active: Vec<ActiveIdentity>,
    pub most_active_chart: ActivityChart,
    pub top_tags: Vec<TagCount>,
    pub notes_per_day: Vec<DayCount>,
    pub top_owners: Vec<OwnerNoteCount>,
    pub data_quality: DataQuality,
}

/// Raw event log overview for troubleshooting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogSummary {
    pub window: TimeWindow,
    pub total_records: u64,
    pub login_logout_records: u64,
    pub study_records: u64,
    pub roster: Vec<String>,
    /// Most recent login/logout records, newest first.
    pub recent_login_logout: Vec<ActivityEvent>,
}

/// Result of submitting one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Accepted { seq: i64 },
    Skipped { reason: String },
}

impl RecordOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}
