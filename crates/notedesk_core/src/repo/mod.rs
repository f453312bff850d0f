//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the store contracts the core consumes (note repository, note
//!   corpus projections, activity event log).
//! - Keep SQL details behind those contracts.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`,
//!   `Unavailable`) in addition to DB transport errors.
//! - Lock contention surfaces as `Unavailable`, never as a hang.

use crate::db::{is_busy_error, DbError};
use crate::model::note::NoteId;
use rusqlite::Connection;

pub mod event_log;
pub mod note_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0}")]
    Db(DbError),
    #[error("note not found: {0}")]
    NotFound(NoteId),
    /// Compare-and-set precondition failed; another writer got there first.
    #[error("note {0} was modified concurrently")]
    Conflict(NoteId),
    /// Transient store condition (lock held past the busy timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("missing required table `{0}`")]
    MissingRequiredTable(&'static str),
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_busy() {
            return Self::Unavailable(value.to_string());
        }
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if is_busy_error(&value) {
            return Self::Unavailable(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
