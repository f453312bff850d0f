//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its collaborator list.
//! - Normalize tag and sharing input before it reaches persistence.
//!
//! # Invariants
//! - `id` and `owner` never change after creation.
//! - `owner` never appears in its own `shared_with` list.
//! - An identity appears at most once in `shared_with`.
//! - `updated_at >= created_at`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Opaque, immutable note identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raised when a caller-supplied id is not a well-formed note id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed note id `{0}`")]
pub struct MalformedNoteId(pub String);

impl FromStr for NoteId {
    type Err = MalformedNoteId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| MalformedNoteId(value.to_string()))
    }
}

impl From<Uuid> for NoteId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Permission granted to a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    Write,
}

impl PermissionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }
}

/// One normalized collaborator entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEntry {
    pub identity: String,
    pub permission: PermissionLevel,
}

impl ShareEntry {
    pub fn new(identity: impl Into<String>, permission: PermissionLevel) -> Self {
        Self {
            identity: identity.into(),
            permission,
        }
    }
}

/// Unvalidated collaborator entry as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    #[serde(alias = "email")]
    pub identity: String,
    #[serde(alias = "level")]
    pub permission: String,
}

impl ShareRequest {
    pub fn new(identity: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            permission: permission.into(),
        }
    }
}

impl From<&ShareEntry> for ShareRequest {
    fn from(value: &ShareEntry) -> Self {
        Self::new(value.identity.clone(), value.permission.as_str())
    }
}

/// Why a sharing list was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareValidationError {
    #[error("sharing entry {position} has an empty identity")]
    EmptyIdentity { position: usize },
    #[error("sharing entry {position} has unknown permission level `{value}`")]
    UnknownPermission { position: usize, value: String },
    #[error("sharing entry {position} names the note owner")]
    OwnerListed { position: usize },
}

/// Validates and normalizes a requested collaborator list.
///
/// Identities are trimmed. Every entry is validated before any collapsing,
/// so one bad entry rejects the whole list. Duplicate identities collapse
/// to the last occurrence, which keeps its own position in the list.
pub fn normalize_sharing(
    owner: &str,
    requested: &[ShareRequest],
) -> Result<Vec<ShareEntry>, ShareValidationError> {
    let mut validated = Vec::with_capacity(requested.len());
    for (position, request) in requested.iter().enumerate() {
        let identity = request.identity.trim();
        if identity.is_empty() {
            return Err(ShareValidationError::EmptyIdentity { position });
        }
        let permission = PermissionLevel::parse(&request.permission).ok_or_else(|| {
            ShareValidationError::UnknownPermission {
                position,
                value: request.permission.clone(),
            }
        })?;
        if identity == owner {
            return Err(ShareValidationError::OwnerListed { position });
        }
        validated.push(ShareEntry::new(identity, permission));
    }

    let mut normalized: Vec<ShareEntry> = Vec::with_capacity(validated.len());
    for entry in validated {
        normalized.retain(|existing| existing.identity != entry.identity);
        normalized.push(entry);
    }
    Ok(normalized)
}

/// Trims tags and drops blanks. Order and repeats are kept; tag frequency
/// counts every occurrence.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub owner: String,
    pub title: String,
    pub content: String,
    /// Display order is preserved; membership is what queries use.
    pub tags: Vec<String>,
    pub shared_with: Vec<ShareEntry>,
    pub is_archived: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Note {
    pub fn is_owner(&self, identity: &str) -> bool {
        self.owner == identity
    }

    /// Permission held by a collaborator, if listed.
    pub fn permission_of(&self, identity: &str) -> Option<PermissionLevel> {
        self.shared_with
            .iter()
            .find(|entry| entry.identity == identity)
            .map(|entry| entry.permission)
    }

    /// Next `updated_at` value that keeps `updated_at >= created_at`.
    pub fn next_updated_at(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        if now < self.created_at {
            self.created_at
        } else {
            now
        }
    }
}

/// Caller input for note creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub shared_with: Vec<ShareRequest>,
}

/// Caller input for content/metadata mutation. Sharing is not accepted here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_archived: Option<bool>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.is_archived.is_none()
    }
}

/// Unauthenticated projection of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicNoteView {
    pub title: String,
    pub content: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<Note> for PublicNoteView {
    fn from(note: Note) -> Self {
        Self {
            title: note.title,
            content: note.content,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}
