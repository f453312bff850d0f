//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Route every note access through the single `AccessPolicy` table.
//!
//! # Invariants
//! - Collaborators (repository, policy, clock) are injected; services hold
//!   no process-wide handles.
//! - Failures surface as typed `CoreError`s; nothing is swallowed.

pub mod note_service;
pub mod sharing_service;

use crate::access::{AccessPolicy, Decision, Operation};
use crate::error::{CoreError, CoreResult};
use crate::model::note::{Note, NoteId};
use crate::repo::note_repo::NoteRepository;
use log::info;

/// Parses a caller-supplied id, mapping malformed input to `InvalidId`.
pub fn parse_note_id(raw: &str) -> CoreResult<NoteId> {
    Ok(raw.parse::<NoteId>()?)
}

/// Resolves a note and checks `operation` for `requester`.
///
/// Missing notes yield `NotFound` before any permission check; an existing
/// note the requester may not touch yields `Denied`.
pub(crate) fn authorized_note<R: NoteRepository>(
    repo: &R,
    policy: &AccessPolicy,
    raw_id: &str,
    requester: &str,
    operation: Operation,
) -> CoreResult<Note> {
    let id = parse_note_id(raw_id)?;
    let note = repo.find_by_id(id)?.ok_or(CoreError::NotFound(id))?;
    match policy.authorize(&note, requester, operation) {
        Decision::Allow => Ok(note),
        Decision::Deny(reason) => {
            info!(
                "event=note_access module=access status=denied op={} note_id={id}",
                operation.as_str()
            );
            Err(CoreError::Denied(reason))
        }
    }
}
