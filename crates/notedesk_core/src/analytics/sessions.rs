//! Session reconstruction from login/logout events.
//!
//! Scan per identity in ascending time with a single pending-login slot:
//! - `login` overwrites the slot; an earlier unterminated login is dropped
//!   from duration accounting.
//! - `logout` with a pending login closes a session and clears the slot.
//! - `logout` without a pending login is ignored.
//!
//! A login still pending after the scan is an open session. Its duration is
//! measured against the `now` supplied at query time and is never cached.

use crate::model::activity::{ActivityEvent, EventKind};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;

/// A closed `(login, logout)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub login: DateTime<FixedOffset>,
    pub logout: DateTime<FixedOffset>,
}

impl Session {
    pub fn duration_seconds(&self) -> i64 {
        self.logout
            .signed_duration_since(self.login)
            .num_seconds()
            .max(0)
    }
}

/// Everything derived for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLedger {
    pub closed: Vec<Session>,
    pub open_since: Option<DateTime<FixedOffset>>,
    pub login_count: u64,
    pub logout_count: u64,
    pub last_activity: Option<DateTime<FixedOffset>>,
}

impl SessionLedger {
    pub fn closed_seconds(&self) -> i64 {
        self.closed
            .iter()
            .map(Session::duration_seconds)
            .fold(0, i64::saturating_add)
    }

    /// Live duration of the open session, if any.
    pub fn open_seconds(&self, now: DateTime<FixedOffset>) -> i64 {
        self.open_since
            .map(|since| now.signed_duration_since(since).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn total_seconds(&self, now: DateTime<FixedOffset>) -> i64 {
        self.closed_seconds().saturating_add(self.open_seconds(now))
    }

    /// Closed sessions plus the open one.
    pub fn session_count(&self) -> u64 {
        self.closed.len() as u64 + u64::from(self.open_since.is_some())
    }

    fn observe(&mut self, event: &ActivityEvent) {
        match event.kind {
            EventKind::Login => {
                self.login_count += 1;
                self.open_since = Some(event.timestamp);
            }
            EventKind::Logout => {
                self.logout_count += 1;
                if let Some(login) = self.open_since.take() {
                    self.closed.push(Session {
                        login,
                        logout: event.timestamp,
                    });
                }
            }
            EventKind::PageView => return,
        }
        self.last_activity = Some(match self.last_activity {
            Some(previous) if previous > event.timestamp => previous,
            _ => event.timestamp,
        });
    }
}

/// Rebuilds per-identity session ledgers.
///
/// Input order does not matter; events are scanned by `(timestamp, seq)`.
/// Page views are ignored.
pub fn reconstruct_sessions(events: &[ActivityEvent]) -> BTreeMap<String, SessionLedger> {
    let mut ordered: Vec<&ActivityEvent> = events
        .iter()
        .filter(|event| matches!(event.kind, EventKind::Login | EventKind::Logout))
        .collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.seq.cmp(&b.seq)));

    let mut ledgers: BTreeMap<String, SessionLedger> = BTreeMap::new();
    for event in ordered {
        ledgers
            .entry(event.identity.clone())
            .or_default()
            .observe(event);
    }
    ledgers
}
