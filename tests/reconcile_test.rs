// tests/reconcile_test.rs
use copany::db_utils::Database;
use copany::merge::merge_text;
use copany::models::Document;
use copany::reconciler::{EditAttempt, SaveOutcome, UpdateReconciler};
use copany::sqlite_store::SqliteDocumentStore;
use copany::store::{VersionedDocumentStore, WriteOutcome};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn sqlite_store() -> (TempDir, SqliteDocumentStore) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path().join("copany.db"), Duration::from_secs(5)).unwrap();
    (temp_dir, SqliteDocumentStore::new(db))
}

/// Bring a fresh document up to the requested version
fn document_at(store: &SqliteDocumentStore, title: &str, description: Option<&str>, version: i64) -> Document {
    let mut doc = store.create(title, description).unwrap();
    while doc.version < version {
        doc = match store.write_if_version(&doc.id, doc.version, title, description).unwrap() {
            WriteOutcome::Written(d) => d,
            WriteOutcome::Conflict(d) => panic!("unexpected conflict at {}", d.version),
        };
    }
    doc
}

#[test]
fn test_concurrent_writers_only_one_wins() {
    let (_temp_dir, store) = sqlite_store();
    let doc = store.create("Fix bug", None).unwrap();

    let writers = 6;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            let id = doc.id.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .write_if_version(&id, 1, &format!("writer {}", i), None)
                    .unwrap()
            })
        })
        .collect();

    let outcomes: Vec<WriteOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&Document> = outcomes
        .iter()
        .filter_map(|o| match o {
            WriteOutcome::Written(d) => Some(d),
            WriteOutcome::Conflict(_) => None,
        })
        .collect();
    assert_eq!(winners.len(), 1, "exactly one writer may hold version 1");

    let winner_title = winners[0].title.clone();
    for outcome in &outcomes {
        if let WriteOutcome::Conflict(current) = outcome {
            assert_eq!(current.version, 2);
            assert_eq!(current.title, winner_title);
        }
    }
    assert_eq!(store.read(&doc.id).unwrap().version, 2);
}

#[test]
fn test_conflicting_titles_are_returned_not_written() {
    // A fetched version 3, B saved "Fix crash" as version 4, A then saves
    // "Fix bug urgently" against version 3.
    let (_temp_dir, store) = sqlite_store();
    let doc = document_at(&store, "Fix bug", None, 3);
    assert_eq!(doc.version, 3);

    store.write_if_version(&doc.id, 3, "Fix crash", None).unwrap();

    let reconciler = UpdateReconciler::new(store.clone());
    let outcome = reconciler
        .reconcile(&EditAttempt {
            id: doc.id.clone(),
            version: 3,
            base_title: "Fix bug".to_string(),
            base_description: None,
            new_title: "Fix bug urgently".to_string(),
            new_description: None,
        })
        .unwrap();

    let expected = merge_text("Fix bug", "Fix crash", "Fix bug urgently");
    match &outcome {
        SaveOutcome::Conflicted {
            title,
            description,
            current,
        } => {
            assert_eq!(title, &expected);
            assert!(title.had_conflict);
            let marked = title.text.as_deref().unwrap();
            assert!(marked.contains("Fix crash"));
            assert!(marked.contains("Fix bug urgently"));
            assert!(!description.had_conflict);
            assert_eq!(current.version, 4);
            assert_eq!(current.title, "Fix crash");
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    // Nothing was applied on A's behalf
    let stored = store.read(&doc.id).unwrap();
    assert_eq!(stored.version, 4);
    assert_eq!(stored.title, "Fix crash");

    let payload = outcome.conflict_payload().unwrap();
    assert_eq!(payload.current_version, 4);

    // A resolves by hand and resubmits against version 4
    let resolved = reconciler
        .reconcile(&EditAttempt {
            id: doc.id.clone(),
            version: payload.current_version,
            base_title: payload.current_title.clone(),
            base_description: payload.current_description.clone(),
            new_title: "Fix crash urgently".to_string(),
            new_description: None,
        })
        .unwrap();
    match resolved {
        SaveOutcome::Committed { document, merged } => {
            assert!(!merged);
            assert_eq!(document.version, 5);
            assert_eq!(document.title, "Fix crash urgently");
        }
        other => panic!("expected commit, got {:?}", other),
    }
}

#[test]
fn test_disjoint_field_edits_merge_and_retry() {
    let (_temp_dir, store) = sqlite_store();
    let doc = store.create("Draft", Some("Draft")).unwrap();

    // Remote changes only the description
    store
        .write_if_version(&doc.id, 1, "Draft", Some("Draft v2"))
        .unwrap();

    // Local changes only the title, still based on version 1
    let reconciler = UpdateReconciler::new(store.clone());
    let outcome = reconciler
        .reconcile(&EditAttempt {
            id: doc.id.clone(),
            version: 1,
            base_title: "Draft".to_string(),
            base_description: Some("Draft".to_string()),
            new_title: "Final".to_string(),
            new_description: Some("Draft".to_string()),
        })
        .unwrap();

    match outcome {
        SaveOutcome::Committed { document, merged } => {
            assert!(merged);
            assert_eq!(document.version, 3);
            assert_eq!(document.title, "Final");
            assert_eq!(document.description.as_deref(), Some("Draft v2"));
        }
        other => panic!("expected merged commit, got {:?}", other),
    }
}

#[test]
fn test_convergent_edit_commits_without_conflict() {
    let (_temp_dir, store) = sqlite_store();
    let doc = store.create("Fix bug", Some("old")).unwrap();
    store
        .write_if_version(&doc.id, 1, "Fix crash", Some("old"))
        .unwrap();

    let reconciler = UpdateReconciler::new(store.clone());
    let outcome = reconciler
        .reconcile(&EditAttempt {
            id: doc.id.clone(),
            version: 1,
            base_title: "Fix bug".to_string(),
            base_description: Some("old".to_string()),
            new_title: "Fix crash".to_string(),
            new_description: Some("old".to_string()),
        })
        .unwrap();

    assert!(outcome.is_committed());
    assert_eq!(store.read(&doc.id).unwrap().version, 3);
}
