mod helpers;

use helpers::{titles, wait_for};
use noteboard::backends::{DocumentBackend, SqliteBackend};
use noteboard::{BackendError, CollectionId, Database, Note, NoteError, NoteKind, NoteStore};
use tempfile::TempDir;

fn db_path(dir: &TempDir) -> String {
    dir.path().join("notes.db").to_string_lossy().into_owned()
}

#[tokio::test]
async fn store_over_sqlite_keeps_lists_live() {
    let store = NoteStore::new(Database::new(SqliteBackend::open_in_memory().unwrap()));

    store
        .add_note(&Note::new("B", "x"), CollectionId::Notes)
        .await;
    let normal = wait_for(store.normal_notes(), |notes| notes.len() == 1).await;

    store.update_note(&normal[0].clone().with_marked(true)).await;
    wait_for(store.normal_marked_notes(), |notes| notes.len() == 1).await;
    assert!(store.normal_notes().is_empty());

    for title in ["Zeta", "Alpha"] {
        let note = Note::new(title, "").with_kind(NoteKind::Trash);
        store.add_note(&note, CollectionId::Trash).await;
    }
    let trash = wait_for(store.trash_notes(), |notes| notes.len() == 2).await;
    assert_eq!(titles(&trash), ["Alpha", "Zeta"]);

    store.teardown();
}

#[tokio::test]
async fn notes_survive_reopening_the_database_file() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    {
        let store = NoteStore::new(Database::new(SqliteBackend::open(&path).unwrap()));
        store
            .add_note(&Note::new("persisted", "body").with_marked(true), CollectionId::Notes)
            .await;
        wait_for(store.normal_marked_notes(), |notes| notes.len() == 1).await;
        store.teardown();
    }

    let store = NoteStore::new(Database::new(SqliteBackend::open(&path).unwrap()));
    let marked = wait_for(store.normal_marked_notes(), |notes| notes.len() == 1).await;
    assert_eq!(marked[0].title, "persisted");
    assert_eq!(marked[0].content, "body");
    store.teardown();
}

#[test]
fn update_merges_and_missing_documents_are_not_found() {
    let mut backend = SqliteBackend::open_in_memory().unwrap();
    let id = backend
        .insert("notes", Note::new("t", "c").fields())
        .unwrap();

    let mut patch = noteboard::Fields::new();
    patch.insert("title".into(), "renamed".into());
    backend.update("notes", &id, patch.clone()).unwrap();

    let stored = backend.get("notes", &id).unwrap().unwrap();
    let note = Note::from_document(&stored);
    assert_eq!(note.title, "renamed");
    assert_eq!(note.content, "c");

    let missing = backend.update("trash", &id, patch);
    assert!(matches!(
        missing,
        Err(NoteError::Backend(BackendError::DocumentNotFound { .. }))
    ));

    backend.delete("notes", &id).unwrap();
    backend.delete("notes", &id).unwrap();
    assert!(backend.get("notes", &id).unwrap().is_none());
}

#[test]
fn opening_a_non_database_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    std::fs::write(&path, b"definitely not sqlite, just some bytes padded out ...............................................").unwrap();

    let result = SqliteBackend::open(&path);
    assert!(result.is_err());
}
