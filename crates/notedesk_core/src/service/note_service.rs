//! Note use-case service.
//!
//! # Responsibility
//! - Provide note create/get/update/delete/list APIs behind the access table.
//! - Normalize tags and initial sharing input on creation.
//!
//! # Invariants
//! - `update_note` never touches `shared_with`; sharing changes go through
//!   `SharingManager` only.
//! - Every mutation rewrites `updated_at` with a value `>= created_at`.
//! - Mutations are compare-and-set against the `updated_at` read for the
//!   permission check.

use super::{authorized_note, parse_note_id};
use crate::access::{AccessPolicy, Operation};
use crate::error::{CoreError, CoreResult};
use crate::model::note::{
    normalize_sharing, normalize_tags, Note, NoteDraft, NoteId, NoteUpdate, PublicNoteView,
};
use crate::repo::note_repo::{NoteFields, NoteFilter, NoteRepository, Pagination};
use crate::repo::RepoError;
use crate::time::CivilClock;
use log::info;

/// List options for `list_notes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    pub search: Option<String>,
    pub include_archived: bool,
    /// 1-based page number.
    pub page: u32,
    pub limit: Option<u32>,
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesPage {
    pub items: Vec<Note>,
    pub page: u32,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Note service facade over repository implementations.
pub struct NoteService<R: NoteRepository> {
    repo: R,
    policy: AccessPolicy,
    clock: CivilClock,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R, policy: AccessPolicy, clock: CivilClock) -> Self {
        Self {
            repo,
            policy,
            clock,
        }
    }

    /// Creates a note owned by `owner`.
    pub fn create_note(&self, owner: &str, draft: NoteDraft) -> CoreResult<Note> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(CoreError::ValidationFailed(
                "owner identity must not be empty".to_string(),
            ));
        }

        let shared_with = normalize_sharing(owner, &draft.shared_with)?;
        let now = self.clock.now();
        let note = Note {
            id: NoteId::new(),
            owner: owner.to_string(),
            title: draft.title,
            content: draft.content,
            tags: normalize_tags(&draft.tags),
            shared_with,
            is_archived: false,
            created_at: now,
            updated_at: now,
        };

        let id = self.repo.insert(&note)?;
        info!("event=note_create module=service status=ok note_id={id}");
        self.repo.find_by_id(id)?.ok_or_else(|| {
            CoreError::Storage(RepoError::InvalidData(
                "created note not found in read-back".to_string(),
            ))
        })
    }

    /// Gets one note the requester may read.
    pub fn get_note(&self, id: &str, requester: &str) -> CoreResult<Note> {
        authorized_note(&self.repo, &self.policy, id, requester, Operation::Read)
    }

    /// Applies allow-listed content/metadata changes.
    pub fn update_note(&self, id: &str, requester: &str, update: NoteUpdate) -> CoreResult<Note> {
        if update.is_empty() {
            return Err(CoreError::ValidationFailed(
                "update contains no fields".to_string(),
            ));
        }

        let note = authorized_note(&self.repo, &self.policy, id, requester, Operation::Write)?;
        let fields = NoteFields {
            title: update.title,
            content: update.content,
            tags: update.tags.map(|tags| normalize_tags(&tags)),
            is_archived: update.is_archived,
            ..NoteFields::touch(note.next_updated_at(self.clock.now()))
        }
        .guarded_by(note.updated_at);

        let updated = self
            .repo
            .update_fields(note.id, &fields)?
            .ok_or(CoreError::NotFound(note.id))?;
        info!("event=note_update module=service status=ok note_id={}", note.id);
        Ok(updated)
    }

    /// Deletes a note; allowed for the owner and the configured administrator.
    pub fn delete_note(&self, id: &str, requester: &str) -> CoreResult<()> {
        let note = authorized_note(&self.repo, &self.policy, id, requester, Operation::Delete)?;
        if !self.repo.delete(note.id)? {
            return Err(CoreError::NotFound(note.id));
        }
        info!("event=note_delete module=service status=ok note_id={}", note.id);
        Ok(())
    }

    /// Lists notes owned by or shared with the requester.
    pub fn list_notes(&self, requester: &str, query: NoteListQuery) -> CoreResult<NotesPage> {
        let pagination = Pagination {
            page: query.page.max(1),
            limit: query.limit,
        };
        let filter = NoteFilter {
            identity: requester.trim().to_string(),
            search: query.search,
            include_archived: query.include_archived,
        };
        let items = self.repo.query_by_owner_or_sharing(&filter, pagination)?;
        Ok(NotesPage {
            items,
            page: pagination.page,
            applied_limit: pagination.applied_limit(),
        })
    }

    /// Restricted projection for unauthenticated viewers.
    pub fn public_view(&self, id: &str) -> CoreResult<PublicNoteView> {
        let id = parse_note_id(id)?;
        let note = self.repo.find_by_id(id)?.ok_or(CoreError::NotFound(id))?;
        Ok(PublicNoteView::from(note))
    }
}
