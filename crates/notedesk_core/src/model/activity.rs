//! Activity event model.
//!
//! # Invariants
//! - Events are immutable once recorded; the log is append-only.
//! - `time_spent_seconds` is only meaningful for `EventKind::PageView`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Login,
    Logout,
    PageView,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PageView => "page_view",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "page_view" => Some(Self::PageView),
            _ => None,
        }
    }
}

/// Inclusive time range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Builds a window, swapping bounds given in reverse order.
    pub fn new(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> Self {
        if to < from {
            Self { from: to, to: from }
        } else {
            Self { from, to }
        }
    }

    /// Window ending at `to` and spanning `span` before it.
    pub fn trailing(to: DateTime<FixedOffset>, span: chrono::Duration) -> Self {
        Self::new(to - span, to)
    }

    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        *instant >= self.from && *instant <= self.to
    }
}

/// A recorded activity event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Insertion sequence; breaks timestamp ties.
    pub seq: i64,
    pub identity: String,
    pub kind: EventKind,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<i64>,
}

/// Event submitted for recording.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityEvent {
    pub identity: String,
    pub kind: EventKind,
    pub timestamp: DateTime<FixedOffset>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub time_spent_seconds: Option<i64>,
}

impl NewActivityEvent {
    pub fn login(identity: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self::bare(identity, EventKind::Login, timestamp)
    }

    pub fn logout(identity: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self::bare(identity, EventKind::Logout, timestamp)
    }

    pub fn page_view(
        identity: impl Into<String>,
        timestamp: DateTime<FixedOffset>,
        page: impl Into<String>,
        time_spent_seconds: i64,
    ) -> Self {
        Self {
            identity: identity.into(),
            kind: EventKind::PageView,
            timestamp,
            page: Some(page.into()),
            time_spent_seconds: Some(time_spent_seconds),
        }
    }

    fn bare(
        identity: impl Into<String>,
        kind: EventKind,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            identity: identity.into(),
            kind,
            timestamp,
            page: None,
            time_spent_seconds: None,
        }
    }

    /// Returns the reason this event must not be recorded, if any.
    pub fn rejection_reason(&self) -> Option<&'static str> {
        if self.identity.trim().is_empty() {
            return Some("empty_identity");
        }
        match (self.kind, self.time_spent_seconds) {
            (EventKind::PageView, Some(spent)) if spent < 0 => Some("negative_time_spent"),
            (EventKind::Login | EventKind::Logout, Some(_)) => Some("time_spent_on_non_page_view"),
            _ => None,
        }
    }
}
