#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use notedesk_core::{
    open_db_in_memory, AccessPolicy, ActivityAggregator, CivilClock, CivilZone, ManualClock,
    NoteDraft, NoteService, SharingManager, SqliteEventLog, SqliteNoteRepository, StoreConfig,
};
use rusqlite::Connection;
use std::sync::Arc;

pub const ADMIN: &str = "admin@notedesk.test";

/// In-memory store plus a manual clock pinned to 2024-06-07 10:00 +05:30.
pub struct Fixture {
    pub conn: Connection,
    pub zone: CivilZone,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        let zone = CivilZone::new(FixedOffset::east_opt(330 * 60).unwrap());
        let start = Utc.with_ymd_and_hms(2024, 6, 7, 4, 30, 0).unwrap();
        Self {
            conn: open_db_in_memory(&StoreConfig::default()).unwrap(),
            zone,
            clock: Arc::new(ManualClock::new(start)),
        }
    }

    pub fn civil_clock(&self) -> CivilClock {
        CivilClock::new(self.zone, self.clock.clone())
    }

    pub fn repo(&self) -> SqliteNoteRepository<'_> {
        SqliteNoteRepository::try_new(&self.conn, self.zone).unwrap()
    }

    pub fn notes(&self) -> NoteService<SqliteNoteRepository<'_>> {
        NoteService::new(
            self.repo(),
            AccessPolicy::new(Some(ADMIN.to_string())),
            self.civil_clock(),
        )
    }

    pub fn sharing(&self) -> SharingManager<SqliteNoteRepository<'_>> {
        SharingManager::new(
            self.repo(),
            AccessPolicy::new(Some(ADMIN.to_string())),
            self.civil_clock(),
        )
    }

    pub fn analytics(&self) -> ActivityAggregator<SqliteEventLog<'_>, SqliteNoteRepository<'_>> {
        ActivityAggregator::new(
            SqliteEventLog::try_new(&self.conn, self.zone).unwrap(),
            self.repo(),
            self.civil_clock(),
        )
    }

    /// Civil-time instant on the fixture's offset.
    pub fn at(&self, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        self.zone
            .offset()
            .with_ymd_and_hms(2024, 6, day, hour, minute, second)
            .unwrap()
    }

    /// Creates a note owned by `owner` and returns its id string.
    pub fn note_owned_by(&self, owner: &str, tags: &[&str]) -> String {
        let draft = NoteDraft {
            title: format!("{owner} note"),
            content: "body".to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            shared_with: Vec::new(),
        };
        self.notes().create_note(owner, draft).unwrap().id.to_string()
    }
}
