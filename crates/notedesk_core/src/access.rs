//! Access control decision table.
//!
//! # Responsibility
//! - Decide, for a note, an identity and an operation, whether the operation
//!   is permitted. Every note path calls through here.
//!
//! # Invariants
//! - Pure: no I/O, no mutation.
//! - `ManageSharing` is granted to the owner and nobody else.
//! - Denial reasons never reveal which rule was evaluated.

use crate::model::note::{Note, PermissionLevel};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Operations gated by the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Write,
    ManageSharing,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ManageSharing => "manage_sharing",
            Self::Delete => "delete",
        }
    }
}

/// Human-readable denial reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    InsufficientPermission,
    NotOwner,
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientPermission => write!(f, "insufficient permission"),
            Self::NotOwner => write!(f, "not owner"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decision table over supplied note state.
///
/// Rules, first match wins:
/// 1. owner: every operation;
/// 2. `Delete` by the configured administrator;
/// 3. `Read` by any listed collaborator;
/// 4. `Write` by a collaborator listed with `write`;
/// 5. deny.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    administrator: Option<String>,
}

impl AccessPolicy {
    pub fn new(administrator: Option<String>) -> Self {
        let administrator = administrator
            .map(|identity| identity.trim().to_string())
            .filter(|identity| !identity.is_empty());
        Self { administrator }
    }

    pub fn administrator(&self) -> Option<&str> {
        self.administrator.as_deref()
    }

    pub fn authorize(&self, note: &Note, identity: &str, operation: Operation) -> Decision {
        if note.is_owner(identity) {
            return Decision::Allow;
        }

        let allowed = match operation {
            Operation::ManageSharing => return Decision::Deny(DenyReason::NotOwner),
            Operation::Delete => self.administrator.as_deref() == Some(identity),
            Operation::Read => note.permission_of(identity).is_some(),
            Operation::Write => note.permission_of(identity) == Some(PermissionLevel::Write),
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::InsufficientPermission)
        }
    }
}
