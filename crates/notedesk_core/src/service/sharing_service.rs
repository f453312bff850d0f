//! Sharing manager: the only path that changes a note's collaborator list.
//!
//! # Responsibility
//! - Replace, extend or shrink `shared_with` under owner-only authority.
//! - Validate and normalize collaborator entries.
//!
//! # Invariants
//! - Authorization is checked before validation, so non-owners learn
//!   nothing about list validity.
//! - A rejected list is never partially applied.
//! - Every accepted change rewrites `updated_at`.

use super::authorized_note;
use crate::access::{AccessPolicy, Operation};
use crate::error::{CoreError, CoreResult};
use crate::model::note::{normalize_sharing, Note, ShareEntry, ShareRequest};
use crate::repo::note_repo::{NoteFields, NoteRepository};
use crate::time::CivilClock;
use log::info;

pub struct SharingManager<R: NoteRepository> {
    repo: R,
    policy: AccessPolicy,
    clock: CivilClock,
}

impl<R: NoteRepository> SharingManager<R> {
    pub fn new(repo: R, policy: AccessPolicy, clock: CivilClock) -> Self {
        Self {
            repo,
            policy,
            clock,
        }
    }

    /// Atomically replaces the collaborator list.
    ///
    /// Duplicate identities collapse to their last occurrence.
    pub fn set_sharing(
        &self,
        id: &str,
        requester: &str,
        requested: &[ShareRequest],
    ) -> CoreResult<Note> {
        self.modify_sharing(id, requester, |_| requested.to_vec())
    }

    /// Returns the current list; owner only.
    pub fn get_sharing(&self, id: &str, requester: &str) -> CoreResult<Vec<ShareEntry>> {
        let note = authorized_note(
            &self.repo,
            &self.policy,
            id,
            requester,
            Operation::ManageSharing,
        )?;
        Ok(note.shared_with)
    }

    /// Adds or re-levels one collaborator.
    pub fn grant(&self, id: &str, requester: &str, entry: ShareRequest) -> CoreResult<Note> {
        self.modify_sharing(id, requester, |current| {
            let mut next: Vec<ShareRequest> = current.iter().map(ShareRequest::from).collect();
            next.push(entry);
            next
        })
    }

    /// Removes one collaborator. Removing an absent identity still succeeds.
    pub fn revoke(&self, id: &str, requester: &str, identity: &str) -> CoreResult<Note> {
        let identity = identity.trim();
        self.modify_sharing(id, requester, |current| {
            current
                .iter()
                .filter(|entry| entry.identity != identity)
                .map(ShareRequest::from)
                .collect()
        })
    }

    fn modify_sharing(
        &self,
        id: &str,
        requester: &str,
        next_list: impl FnOnce(&[ShareEntry]) -> Vec<ShareRequest>,
    ) -> CoreResult<Note> {
        let note = authorized_note(
            &self.repo,
            &self.policy,
            id,
            requester,
            Operation::ManageSharing,
        )?;
        let requested = next_list(&note.shared_with);
        let normalized = normalize_sharing(&note.owner, &requested)?;

        let fields = NoteFields {
            shared_with: Some(normalized),
            ..NoteFields::touch(note.next_updated_at(self.clock.now()))
        }
        .guarded_by(note.updated_at);

        let updated = self
            .repo
            .update_fields(note.id, &fields)?
            .ok_or(CoreError::NotFound(note.id))?;
        info!(
            "event=sharing_update module=sharing status=ok note_id={} collaborators={}",
            note.id,
            updated.shared_with.len()
        );
        Ok(updated)
    }
}
