//! Append-only activity event log and its SQLite implementation.
//!
//! # Invariants
//! - Events are never updated or deleted through this contract.
//! - `query_window` returns events ascending by timestamp, then insertion
//!   order.
//! - Rows that cannot be decoded are skipped with a warning, never fatal.

use super::{ensure_tables, RepoResult};
use crate::model::activity::{ActivityEvent, EventKind, NewActivityEvent, TimeWindow};
use crate::time::CivilZone;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

/// Filter for window queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Empty means every kind.
    pub kinds: Vec<EventKind>,
    /// `None` means every identity.
    pub identities: Option<Vec<String>>,
    pub window: TimeWindow,
}

impl EventQuery {
    pub fn all_in(window: TimeWindow) -> Self {
        Self {
            kinds: Vec::new(),
            identities: None,
            window,
        }
    }
}

pub trait EventLog {
    /// Appends one event and returns its sequence number.
    fn append(&self, event: &NewActivityEvent) -> RepoResult<i64>;
    fn query_window(&self, query: &EventQuery) -> RepoResult<Vec<ActivityEvent>>;
}

/// SQLite-backed event log.
pub struct SqliteEventLog<'conn> {
    conn: &'conn Connection,
    zone: CivilZone,
}

impl<'conn> SqliteEventLog<'conn> {
    pub fn try_new(conn: &'conn Connection, zone: CivilZone) -> RepoResult<Self> {
        ensure_tables(conn, &["activity_events"])?;
        Ok(Self { conn, zone })
    }
}

impl EventLog for SqliteEventLog<'_> {
    fn append(&self, event: &NewActivityEvent) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO activity_events (
                identity,
                kind,
                occurred_at,
                page,
                time_spent_seconds
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                event.identity.trim(),
                event.kind.as_str(),
                CivilZone::to_millis(&event.timestamp),
                event.page.as_deref(),
                event.time_spent_seconds,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query_window(&self, query: &EventQuery) -> RepoResult<Vec<ActivityEvent>> {
        let mut sql = String::from(
            "SELECT id, identity, kind, occurred_at, page, time_spent_seconds
             FROM activity_events
             WHERE occurred_at >= ? AND occurred_at <= ?",
        );
        let mut bind_values = vec![
            Value::Integer(CivilZone::to_millis(&query.window.from)),
            Value::Integer(CivilZone::to_millis(&query.window.to)),
        ];

        if !query.kinds.is_empty() {
            sql.push_str(&format!(" AND kind IN ({})", placeholders(query.kinds.len())));
            bind_values.extend(
                query
                    .kinds
                    .iter()
                    .map(|kind| Value::Text(kind.as_str().to_string())),
            );
        }

        if let Some(identities) = query.identities.as_ref() {
            if identities.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(
                " AND identity IN ({})",
                placeholders(identities.len())
            ));
            bind_values.extend(identities.iter().cloned().map(Value::Text));
        }

        sql.push_str(" ORDER BY occurred_at ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let seq: i64 = row.get("id")?;
            let kind_text: String = row.get("kind")?;
            let Some(kind) = EventKind::parse(&kind_text) else {
                warn!("event=event_log_read module=repo status=skip seq={seq} reason=unknown_kind");
                continue;
            };
            let occurred_at: i64 = row.get("occurred_at")?;
            let Some(timestamp) = self.zone.from_millis(occurred_at) else {
                warn!(
                    "event=event_log_read module=repo status=skip seq={seq} reason=bad_timestamp"
                );
                continue;
            };
            events.push(ActivityEvent {
                seq,
                identity: row.get("identity")?,
                kind,
                timestamp,
                page: row.get("page")?,
                time_spent_seconds: row.get("time_spent_seconds")?,
            });
        }
        Ok(events)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
