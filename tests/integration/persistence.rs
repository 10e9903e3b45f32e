//! Snapshot round trips through the store.

use crate::common::{sample_papers::*, settings_in, test_settings};
use scholarmap::CorpusStore;
use scholarmap::storage::{CorpusSnapshot, SnapshotStore};

#[test]
fn test_reopen_restores_documents_and_matrix() {
    let (settings, temp) = test_settings();
    let before = {
        let store = CorpusStore::open(settings).unwrap();
        for (name, text) in [("a.txt", PROTEIN_A), ("b.txt", PROTEIN_B), ("g.txt", GALAXY)] {
            store
                .add_document(text, scholarmap::DocumentMetadata::from_filename(name), false)
                .unwrap();
        }
        let report = store.recompute().unwrap();
        assert!(report.persisted);
        (store.documents(), store.similarity_edges())
    };

    let reopened = CorpusStore::open(settings_in(temp.path())).unwrap();
    assert_eq!(reopened.documents(), before.0);
    assert!(reopened.has_matrix());
    assert_eq!(reopened.similarity_edges(), before.1);
}

#[test]
fn test_mismatched_vectors_load_without_matrix() {
    let (settings, _temp) = test_settings();
    let snapshot_path = settings.snapshot_path();
    let documents = {
        let store = CorpusStore::open(settings.clone()).unwrap();
        store
            .add_document(PROTEIN_A, scholarmap::DocumentMetadata::from_filename("a.txt"), false)
            .unwrap();
        store
            .add_document(GALAXY, scholarmap::DocumentMetadata::from_filename("g.txt"), true)
            .unwrap();
        store.documents()
    };

    // Drop one row so vectors no longer line up with papers
    let snapshots = SnapshotStore::new(&snapshot_path);
    let loaded = snapshots.load().unwrap().expect("snapshot exists");
    let mut vectors = loaded.vectors.clone();
    vectors.pop();
    let broken = CorpusSnapshot::new(loaded.papers.clone(), Some(vectors));
    snapshots.save(&broken).unwrap();

    let store = CorpusStore::open(settings).unwrap();
    assert_eq!(store.documents(), documents);
    assert!(!store.has_matrix());
    assert!(store.similarity_edges().is_empty());

    // The next recompute re-embeds and restores the matrix
    store.recompute().unwrap();
    assert!(store.has_matrix());
}

#[test]
fn test_corrupt_snapshot_is_backed_up_and_store_starts_empty() {
    let (settings, _temp) = test_settings();
    let snapshot_path = settings.snapshot_path();
    std::fs::create_dir_all(snapshot_path.parent().unwrap()).unwrap();
    std::fs::write(&snapshot_path, "{ not json").unwrap();

    let store = CorpusStore::open(settings).unwrap();
    assert!(store.is_empty());
    let backup = snapshot_path.with_extension("json.bak");
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
}

#[test]
fn test_snapshot_without_version_or_timestamp_still_loads() {
    let (settings, _temp) = test_settings();
    let snapshot_path = settings.snapshot_path();
    std::fs::create_dir_all(snapshot_path.parent().unwrap()).unwrap();
    std::fs::write(
        &snapshot_path,
        r#"{"papers": [{"id": "abc123", "filename": "old.txt", "field": "Topic 2", "cluster": 1}], "vectors": [[0.6, 0.8]]}"#,
    )
    .unwrap();

    let store = CorpusStore::open(settings).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.has_matrix());
    let doc = &store.documents()[0];
    assert_eq!(doc.cluster, 1);
    assert_eq!(doc.field, "Topic 2");
}
