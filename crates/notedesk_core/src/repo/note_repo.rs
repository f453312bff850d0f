//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist note documents (row + ordered tags + ordered collaborators).
//! - Provide read-only corpus projections used by analytics.
//!
//! # Invariants
//! - `update_fields` applies only allow-listed fields (title, content, tags,
//!   shared_with, is_archived, updated_at) inside one IMMEDIATE transaction,
//!   so concurrent writers never interleave partial documents.
//! - Stored `updated_at` never precedes `created_at` and strictly increases
//!   on every update, so it doubles as the compare-and-set version.
//! - List order is `updated_at DESC, id ASC`.

use super::{ensure_tables, RepoError, RepoResult};
use crate::model::note::{Note, NoteId, PermissionLevel, ShareEntry};
use crate::time::CivilZone;
use chrono::{DateTime, FixedOffset};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};

const NOTES_DEFAULT_LIMIT: u32 = 10;
const NOTES_LIMIT_MAX: u32 = 50;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    owner,
    title,
    content,
    is_archived,
    created_at,
    updated_at
FROM notes";

/// Allow-listed partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub shared_with: Option<Vec<ShareEntry>>,
    pub is_archived: Option<bool>,
    pub updated_at: DateTime<FixedOffset>,
    /// Compare-and-set guard: the `updated_at` the caller last observed.
    pub expected_updated_at: Option<DateTime<FixedOffset>>,
}

impl NoteFields {
    pub fn touch(updated_at: DateTime<FixedOffset>) -> Self {
        Self {
            title: None,
            content: None,
            tags: None,
            shared_with: None,
            is_archived: None,
            updated_at,
            expected_updated_at: None,
        }
    }

    pub fn guarded_by(mut self, observed: DateTime<FixedOffset>) -> Self {
        self.expected_updated_at = Some(observed);
        self
    }
}

/// Visibility filter for list queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteFilter {
    /// Notes owned by or shared with this identity.
    pub identity: String,
    /// Case-insensitive substring over title, content and tags.
    pub search: Option<String>,
    pub include_archived: bool,
}

/// 1-based pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    /// Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn applied_limit(&self) -> u32 {
        normalize_note_limit(self.limit)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.applied_limit())
    }
}

/// Repository interface for note documents.
pub trait NoteRepository {
    fn find_by_id(&self, id: NoteId) -> RepoResult<Option<Note>>;
    fn insert(&self, note: &Note) -> RepoResult<NoteId>;
    /// Returns `None` when the id does not resolve.
    fn update_fields(&self, id: NoteId, fields: &NoteFields) -> RepoResult<Option<Note>>;
    /// Returns whether a row was removed.
    fn delete(&self, id: NoteId) -> RepoResult<bool>;
    fn query_by_owner_or_sharing(
        &self,
        filter: &NoteFilter,
        page: Pagination,
    ) -> RepoResult<Vec<Note>>;
}

/// Read-only, unwindowed projections over all notes.
pub trait NoteCorpus {
    /// Tag lists in note creation order (`created_at ASC, id ASC`).
    fn tag_lists(&self) -> RepoResult<Vec<Vec<String>>>;
    /// Creation instants at or after `since`, ascending.
    fn created_since(&self, since: DateTime<FixedOffset>)
        -> RepoResult<Vec<DateTime<FixedOffset>>>;
    /// `(owner, count)` sorted by count descending, then owner ascending.
    fn note_counts_by_owner(&self) -> RepoResult<Vec<(String, u64)>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
    zone: CivilZone,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection, zone: CivilZone) -> RepoResult<Self> {
        ensure_tables(conn, &["notes", "note_tags", "note_shares"])?;
        Ok(Self { conn, zone })
    }

    fn load_note(&self, conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(self.parse_note_row(conn, row)?)),
            None => Ok(None),
        }
    }

    fn parse_note_row(&self, conn: &Connection, row: &Row<'_>) -> RepoResult<Note> {
        let id_text: String = row.get("id")?;
        let id: NoteId = id_text.parse().map_err(|_| {
            RepoError::InvalidData(format!("invalid note id `{id_text}` in notes.id"))
        })?;

        let is_archived = match row.get::<_, i64>("is_archived")? {
            0 => false,
            1 => true,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid is_archived value `{other}` in notes.is_archived"
                )));
            }
        };

        Ok(Note {
            id,
            owner: row.get("owner")?,
            title: row.get("title")?,
            content: row.get("content")?,
            tags: load_tags(conn, &id_text)?,
            shared_with: load_shares(conn, &id_text)?,
            is_archived,
            created_at: self.timestamp(row.get("created_at")?, "notes.created_at")?,
            updated_at: self.timestamp(row.get("updated_at")?, "notes.updated_at")?,
        })
    }

    fn timestamp(&self, millis: i64, column: &str) -> RepoResult<DateTime<FixedOffset>> {
        self.zone.from_millis(millis).ok_or_else(|| {
            RepoError::InvalidData(format!("timestamp `{millis}` out of range in {column}"))
        })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn find_by_id(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.load_note(self.conn, id)
    }

    fn insert(&self, note: &Note) -> RepoResult<NoteId> {
        if note.updated_at < note.created_at {
            return Err(RepoError::InvalidData(
                "updated_at must not precede created_at".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = note.id.to_string();
        tx.execute(
            "INSERT INTO notes (
                id,
                owner,
                title,
                content,
                is_archived,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id_text.as_str(),
                note.owner.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                bool_to_int(note.is_archived),
                CivilZone::to_millis(&note.created_at),
                CivilZone::to_millis(&note.updated_at),
            ],
        )?;
        replace_tags(&tx, &id_text, &note.tags)?;
        replace_shares(&tx, &id_text, &note.shared_with)?;
        tx.commit()?;

        Ok(note.id)
    }

    fn update_fields(&self, id: NoteId, fields: &NoteFields) -> RepoResult<Option<Note>> {
        let id_text = id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let current_updated_at: Option<i64> = tx
            .query_row(
                "SELECT updated_at FROM notes WHERE id = ?1;",
                [id_text.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current_updated_at) = current_updated_at else {
            return Ok(None);
        };
        if let Some(expected) = fields.expected_updated_at.as_ref() {
            if CivilZone::to_millis(expected) != current_updated_at {
                return Err(RepoError::Conflict(id));
            }
        }

        tx.execute(
            "UPDATE notes
             SET
                title = COALESCE(?2, title),
                content = COALESCE(?3, content),
                is_archived = COALESCE(?4, is_archived),
                updated_at = MAX(?5, created_at, updated_at + 1)
             WHERE id = ?1;",
            params![
                id_text.as_str(),
                fields.title.as_deref(),
                fields.content.as_deref(),
                fields.is_archived.map(bool_to_int),
                CivilZone::to_millis(&fields.updated_at),
            ],
        )?;
        if let Some(tags) = fields.tags.as_ref() {
            replace_tags(&tx, &id_text, tags)?;
        }
        if let Some(shares) = fields.shared_with.as_ref() {
            replace_shares(&tx, &id_text, shares)?;
        }

        let updated = self.load_note(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, id: NoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn query_by_owner_or_sharing(
        &self,
        filter: &NoteFilter,
        page: Pagination,
    ) -> RepoResult<Vec<Note>> {
        let mut sql = format!(
            "{NOTE_SELECT_SQL}
             WHERE (
                owner = ?
                OR EXISTS (
                    SELECT 1
                    FROM note_shares s
                    WHERE s.note_id = notes.id
                      AND s.identity = ?
                )
             )"
        );
        let mut bind_values: Vec<Value> = vec![
            Value::Text(filter.identity.clone()),
            Value::Text(filter.identity.clone()),
        ];

        if !filter.include_archived {
            sql.push_str(" AND is_archived = 0");
        }

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            sql.push_str(
                " AND (
                    title LIKE ? ESCAPE '\\'
                    OR content LIKE ? ESCAPE '\\'
                    OR EXISTS (
                        SELECT 1
                        FROM note_tags t
                        WHERE t.note_id = notes.id
                          AND t.tag LIKE ? ESCAPE '\\'
                    )
                )",
            );
            let pattern = like_pattern(search);
            for _ in 0..3 {
                bind_values.push(Value::Text(pattern.clone()));
            }
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(page.applied_limit())));
        bind_values.push(Value::Integer(
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(self.parse_note_row(self.conn, row)?);
        }
        Ok(notes)
    }
}

impl NoteCorpus for SqliteNoteRepository<'_> {
    fn tag_lists(&self) -> RepoResult<Vec<Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.note_id, t.tag
             FROM note_tags t
             INNER JOIN notes n ON n.id = t.note_id
             ORDER BY n.created_at ASC, n.id ASC, t.position ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut lists: Vec<Vec<String>> = Vec::new();
        let mut current_note: Option<String> = None;
        while let Some(row) = rows.next()? {
            let note_id: String = row.get(0)?;
            let tag: String = row.get(1)?;
            if current_note.as_deref() != Some(note_id.as_str()) {
                lists.push(Vec::new());
                current_note = Some(note_id);
            }
            if let Some(list) = lists.last_mut() {
                list.push(tag);
            }
        }
        Ok(lists)
    }

    fn created_since(
        &self,
        since: DateTime<FixedOffset>,
    ) -> RepoResult<Vec<DateTime<FixedOffset>>> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at
             FROM notes
             WHERE created_at >= ?1
             ORDER BY created_at ASC;",
        )?;
        let mut rows = stmt.query([CivilZone::to_millis(&since)])?;
        let mut created = Vec::new();
        while let Some(row) = rows.next()? {
            created.push(self.timestamp(row.get(0)?, "notes.created_at")?);
        }
        Ok(created)
    }

    fn note_counts_by_owner(&self) -> RepoResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner, COUNT(*) AS note_count
             FROM notes
             GROUP BY owner
             ORDER BY note_count DESC, owner ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            let owner: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.push((owner, u64::try_from(count).unwrap_or(0)));
        }
        Ok(counts)
    }
}

/// Normalizes list limit according to notes contract.
pub fn normalize_note_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTES_DEFAULT_LIMIT,
        Some(value) if value > NOTES_LIMIT_MAX => NOTES_LIMIT_MAX,
        Some(value) => value,
    }
}

fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn replace_tags(conn: &Connection, note_id: &str, tags: &[String]) -> RepoResult<()> {
    conn.execute("DELETE FROM note_tags WHERE note_id = ?1;", [note_id])?;
    let mut stmt =
        conn.prepare("INSERT INTO note_tags (note_id, position, tag) VALUES (?1, ?2, ?3);")?;
    for (position, tag) in tags.iter().enumerate() {
        stmt.execute(params![note_id, position_to_db(position), tag.as_str()])?;
    }
    Ok(())
}

fn replace_shares(conn: &Connection, note_id: &str, shares: &[ShareEntry]) -> RepoResult<()> {
    conn.execute("DELETE FROM note_shares WHERE note_id = ?1;", [note_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO note_shares (note_id, position, identity, permission)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    for (position, entry) in shares.iter().enumerate() {
        stmt.execute(params![
            note_id,
            position_to_db(position),
            entry.identity.as_str(),
            entry.permission.as_str(),
        ])?;
    }
    Ok(())
}

fn load_tags(conn: &Connection, note_id: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT tag
         FROM note_tags
         WHERE note_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        tags.push(row.get(0)?);
    }
    Ok(tags)
}

fn load_shares(conn: &Connection, note_id: &str) -> RepoResult<Vec<ShareEntry>> {
    let mut stmt = conn.prepare(
        "SELECT identity, permission
         FROM note_shares
         WHERE note_id = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut shares = Vec::new();
    while let Some(row) = rows.next()? {
        let identity: String = row.get(0)?;
        let permission_text: String = row.get(1)?;
        let permission = PermissionLevel::parse(&permission_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid permission `{permission_text}` in note_shares.permission"
            ))
        })?;
        shares.push(ShareEntry::new(identity, permission));
    }
    Ok(shares)
}

fn position_to_db(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{like_pattern, normalize_note_limit, Pagination};

    #[test]
    fn limit_defaults_to_10_and_caps_at_50() {
        assert_eq!(normalize_note_limit(None), 10);
        assert_eq!(normalize_note_limit(Some(0)), 10);
        assert_eq!(normalize_note_limit(Some(25)), 25);
        assert_eq!(normalize_note_limit(Some(500)), 50);
    }

    #[test]
    fn pagination_is_one_based() {
        let first = Pagination {
            page: 0,
            limit: Some(5),
        };
        let third = Pagination {
            page: 3,
            limit: Some(5),
        };
        assert_eq!(first.offset(), 0);
        assert_eq!(third.offset(), 10);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
