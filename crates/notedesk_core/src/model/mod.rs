//! Domain model for notes, collaborators and activity events.
//!
//! # Responsibility
//! - Define canonical data structures used by access control, sharing and
//!   analytics.
//! - Own input normalization rules (tags, sharing lists).
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - All timestamps carry the configured civil offset.

pub mod activity;
pub mod note;
