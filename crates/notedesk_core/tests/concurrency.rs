use chrono::FixedOffset;
use notedesk_core::repo::note_repo::NoteFields;
use notedesk_core::{
    open_db, AccessPolicy, CivilClock, CivilZone, CoreError, NoteDraft, NoteId, NoteRepository,
    NoteService, RepoError, ShareRequest, SharingManager, SqliteNoteRepository, StoreConfig,
};
use std::path::Path;
use std::thread;

const OWNER: &str = "owner@notedesk.test";

fn zone() -> CivilZone {
    CivilZone::new(FixedOffset::east_opt(330 * 60).unwrap())
}

fn create_note(path: &Path) -> String {
    let conn = open_db(path, &StoreConfig::default()).unwrap();
    let repo = SqliteNoteRepository::try_new(&conn, zone()).unwrap();
    let service = NoteService::new(repo, AccessPolicy::default(), CivilClock::system(zone()));
    service
        .create_note(OWNER, NoteDraft::default())
        .unwrap()
        .id
        .to_string()
}

#[test]
fn stale_compare_and_set_is_rejected_as_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cas.sqlite3");
    let id = create_note(&path);
    let note_id: NoteId = id.parse().unwrap();

    let conn = open_db(&path, &StoreConfig::default()).unwrap();
    let repo = SqliteNoteRepository::try_new(&conn, zone()).unwrap();
    let observed = repo.find_by_id(note_id).unwrap().unwrap();

    let sharing = SharingManager::new(
        SqliteNoteRepository::try_new(&conn, zone()).unwrap(),
        AccessPolicy::default(),
        CivilClock::system(zone()),
    );
    sharing
        .grant(&id, OWNER, ShareRequest::new("alice@notedesk.test", "read"))
        .unwrap();

    let stale = NoteFields {
        title: Some("overwrite".to_string()),
        ..NoteFields::touch(observed.updated_at)
    }
    .guarded_by(observed.updated_at);
    let err = repo.update_fields(note_id, &stale).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(conflicted) if conflicted == note_id));
    assert!(CoreError::from(err).is_retryable());

    let current = repo.find_by_id(note_id).unwrap().unwrap();
    assert_eq!(current.title, "");
    assert_eq!(current.shared_with.len(), 1);
}

#[test]
fn concurrent_grants_on_one_note_are_never_lost() {
    const WORKERS: usize = 4;
    const GRANTS_PER_WORKER: usize = 10;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.sqlite3");
    let id = create_note(&path);

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let path = path.clone();
            let id = id.clone();
            thread::spawn(move || {
                let conn = open_db(&path, &StoreConfig::default()).unwrap();
                let sharing = SharingManager::new(
                    SqliteNoteRepository::try_new(&conn, zone()).unwrap(),
                    AccessPolicy::default(),
                    CivilClock::system(zone()),
                );
                for grant in 0..GRANTS_PER_WORKER {
                    let identity = format!("w{worker}-g{grant}@notedesk.test");
                    loop {
                        let request = ShareRequest::new(identity.clone(), "read");
                        match sharing.grant(&id, OWNER, request) {
                            Ok(_) => break,
                            Err(err) if err.is_retryable() => thread::yield_now(),
                            Err(err) => panic!("grant failed: {err}"),
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path, &StoreConfig::default()).unwrap();
    let sharing = SharingManager::new(
        SqliteNoteRepository::try_new(&conn, zone()).unwrap(),
        AccessPolicy::default(),
        CivilClock::system(zone()),
    );
    let entries = sharing.get_sharing(&id, OWNER).unwrap();
    assert_eq!(entries.len(), WORKERS * GRANTS_PER_WORKER);
}
