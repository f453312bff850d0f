//! Core domain logic for NoteDesk: access control, collaborative sharing and
//! activity analytics over a SQLite store.
//! This crate is the single source of truth for business invariants.

pub mod access;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod time;

pub use access::{AccessPolicy, Decision, DenyReason, Operation};
pub use analytics::model::{AnalyticsReport, EventLogSummary, RecordOutcome};
pub use analytics::ActivityAggregator;
pub use auth::{AuthError, IdentityResolver, StaticTokenResolver};
pub use config::{ConfigError, CoreConfig, LoggingConfig, StoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use error::{CoreError, CoreResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::activity::{ActivityEvent, EventKind, NewActivityEvent, TimeWindow};
pub use model::note::{
    Note, NoteDraft, NoteId, NoteUpdate, PermissionLevel, PublicNoteView, ShareEntry,
    ShareRequest,
};
pub use repo::event_log::{EventLog, EventQuery, SqliteEventLog};
pub use repo::note_repo::{NoteCorpus, NoteRepository, SqliteNoteRepository};
pub use repo::{RepoError, RepoResult};
pub use service::note_service::{NoteListQuery, NoteService, NotesPage};
pub use service::sharing_service::SharingManager;
pub use time::{format_duration, CivilClock, CivilZone, Clock, ManualClock, SystemClock};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
