mod common;

use chrono::Duration;
use common::Fixture;
use notedesk_core::{CoreError, DenyReason, PermissionLevel, ShareEntry, ShareRequest};

const OWNER: &str = "owner@notedesk.test";
const ALICE: &str = "alice@notedesk.test";
const BOB: &str = "bob@notedesk.test";

#[test]
fn set_then_get_round_trips() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);
    let sharing = fixture.sharing();

    sharing
        .set_sharing(
            &id,
            OWNER,
            &[ShareRequest::new(ALICE, "read"), ShareRequest::new(BOB, "write")],
        )
        .unwrap();

    assert_eq!(
        sharing.get_sharing(&id, OWNER).unwrap(),
        vec![
            ShareEntry::new(ALICE, PermissionLevel::Read),
            ShareEntry::new(BOB, PermissionLevel::Write),
        ]
    );
}

#[test]
fn duplicate_identities_collapse_to_last_occurrence() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);

    let note = fixture
        .sharing()
        .set_sharing(
            &id,
            OWNER,
            &[
                ShareRequest::new(ALICE, "read"),
                ShareRequest::new(BOB, "read"),
                ShareRequest::new(ALICE, "write"),
            ],
        )
        .unwrap();

    assert_eq!(
        note.shared_with,
        vec![
            ShareEntry::new(BOB, PermissionLevel::Read),
            ShareEntry::new(ALICE, PermissionLevel::Write),
        ]
    );
}

#[test]
fn invalid_entries_reject_the_whole_list() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);
    let sharing = fixture.sharing();
    sharing
        .set_sharing(&id, OWNER, &[ShareRequest::new(ALICE, "read")])
        .unwrap();

    for bad in [
        vec![ShareRequest::new(BOB, "write"), ShareRequest::new(OWNER, "read")],
        vec![ShareRequest::new("  ", "read")],
        vec![ShareRequest::new(BOB, "admin")],
    ] {
        let err = sharing.set_sharing(&id, OWNER, &bad).unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed(_)), "{err}");
    }

    assert_eq!(
        sharing.get_sharing(&id, OWNER).unwrap(),
        vec![ShareEntry::new(ALICE, PermissionLevel::Read)]
    );
}

#[test]
fn non_owners_are_denied_even_with_write_permission() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);
    let sharing = fixture.sharing();
    sharing
        .set_sharing(&id, OWNER, &[ShareRequest::new(ALICE, "write")])
        .unwrap();

    let set = sharing
        .set_sharing(&id, ALICE, &[ShareRequest::new(BOB, "read")])
        .unwrap_err();
    assert!(matches!(set, CoreError::Denied(DenyReason::NotOwner)));
    assert_eq!(set.to_string(), "denied: not owner");

    let get = sharing.get_sharing(&id, ALICE).unwrap_err();
    assert!(matches!(get, CoreError::Denied(DenyReason::NotOwner)));

    // Authorization is decided before validation.
    let bad_list = sharing
        .set_sharing(&id, BOB, &[ShareRequest::new("", "bogus")])
        .unwrap_err();
    assert!(matches!(bad_list, CoreError::Denied(DenyReason::NotOwner)));
}

#[test]
fn malformed_and_missing_ids_surface_distinct_errors() {
    let fixture = Fixture::new();
    let sharing = fixture.sharing();

    let invalid = sharing.set_sharing("xyz", OWNER, &[]).unwrap_err();
    assert!(matches!(invalid, CoreError::InvalidId(_)));

    let missing = sharing
        .get_sharing("6f1c2b1e-8a43-4c53-9f0e-3c1f1e2d4a5b", OWNER)
        .unwrap_err();
    assert!(matches!(missing, CoreError::NotFound(_)));
}

#[test]
fn every_accepted_change_rewrites_updated_at() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);
    let sharing = fixture.sharing();

    fixture.clock.advance(Duration::seconds(30));
    let first = sharing
        .set_sharing(&id, OWNER, &[ShareRequest::new(ALICE, "read")])
        .unwrap();
    assert_eq!(first.updated_at, fixture.at(7, 10, 0, 30));

    // Same instant again: still strictly newer.
    let second = sharing.set_sharing(&id, OWNER, &[]).unwrap();
    assert!(second.updated_at > first.updated_at);
    assert!(second.shared_with.is_empty());
}

#[test]
fn grant_upserts_and_revoke_removes() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);
    let sharing = fixture.sharing();

    sharing
        .grant(&id, OWNER, ShareRequest::new(ALICE, "read"))
        .unwrap();
    sharing.grant(&id, OWNER, ShareRequest::new(BOB, "read")).unwrap();
    let relevelled = sharing
        .grant(&id, OWNER, ShareRequest::new(ALICE, "WRITE"))
        .unwrap();
    assert_eq!(
        relevelled.shared_with,
        vec![
            ShareEntry::new(BOB, PermissionLevel::Read),
            ShareEntry::new(ALICE, PermissionLevel::Write),
        ]
    );

    let revoked = sharing.revoke(&id, OWNER, BOB).unwrap();
    assert_eq!(
        revoked.shared_with,
        vec![ShareEntry::new(ALICE, PermissionLevel::Write)]
    );
    let absent = sharing.revoke(&id, OWNER, "nobody@notedesk.test").unwrap();
    assert_eq!(absent.shared_with.len(), 1);

    let self_grant = sharing
        .grant(&id, OWNER, ShareRequest::new(OWNER, "read"))
        .unwrap_err();
    assert!(matches!(self_grant, CoreError::ValidationFailed(_)));
}

#[test]
fn revoked_collaborator_loses_read_access() {
    let fixture = Fixture::new();
    let id = fixture.note_owned_by(OWNER, &[]);
    fixture
        .sharing()
        .grant(&id, OWNER, ShareRequest::new(ALICE, "read"))
        .unwrap();
    assert!(fixture.notes().get_note(&id, ALICE).is_ok());

    fixture.sharing().revoke(&id, OWNER, ALICE).unwrap();
    assert!(matches!(
        fixture.notes().get_note(&id, ALICE),
        Err(CoreError::Denied(_))
    ));
}
