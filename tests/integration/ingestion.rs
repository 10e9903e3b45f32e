//! File and directory ingestion.

use crate::common::{FailingEmbedder, sample_papers::*, test_settings, write_file};
use scholarmap::text::PlainTextExtractor;
use scholarmap::{CorpusError, CorpusStore};

#[test]
fn test_add_file_keeps_a_copy_of_the_source() {
    let (settings, temp) = test_settings();
    let store = CorpusStore::open(settings).unwrap();
    let source = write_file(&temp.path().join("incoming"), "folding.txt", PROTEIN_A);

    let id = store.add_file(&source, true).unwrap();
    let stored = store.stored_file(&id).expect("source copy should exist");
    assert_eq!(stored, store.files_dir().join(format!("{id}.txt")));
    assert_eq!(std::fs::read_to_string(&stored).unwrap(), PROTEIN_A);

    let doc = store.document(&id).unwrap();
    assert_eq!(doc.filename, "folding.txt");
    assert_eq!(doc.display_title, "folding");

    store.remove_document(&id, false).unwrap();
    assert!(!stored.exists());
}

#[test]
fn test_add_file_rejects_unsupported_types() {
    let (settings, temp) = test_settings();
    let store = CorpusStore::open(settings).unwrap();
    let source = write_file(temp.path(), "scan.tiff", PROTEIN_A);

    let error = store.add_file(&source, true).unwrap_err();
    assert!(matches!(error, CorpusError::UnsupportedFileType { .. }));
    assert_eq!(error.status_code(), "UNSUPPORTED_FILE_TYPE");
    assert!(store.is_empty());
}

#[test]
fn test_add_missing_file_is_a_read_error() {
    let (settings, temp) = test_settings();
    let store = CorpusStore::open(settings).unwrap();
    let error = store
        .add_file(&temp.path().join("missing.txt"), true)
        .unwrap_err();
    assert!(matches!(error, CorpusError::FileRead { .. }));
}

#[test]
fn test_ingest_inbox_adds_new_files_once() {
    let (settings, _temp) = test_settings();
    let inbox = settings.inbox_dir();
    write_file(&inbox, "a.txt", PROTEIN_A);
    write_file(&inbox, "b.md", PROTEIN_B);
    write_file(&inbox, "galaxy.txt", GALAXY);
    write_file(&inbox, "stub.txt", TOO_SHORT);
    write_file(&inbox, "figure.png", "not text");

    let store = CorpusStore::open(settings).unwrap();
    assert_eq!(store.ingest_inbox().unwrap(), 3);
    assert_eq!(store.len(), 3);
    assert!(store.has_matrix());
    assert!(store.documents().iter().all(|d| d.field != "Processing..."));

    // Known filenames are skipped
    assert_eq!(store.ingest_inbox().unwrap(), 0);

    write_file(&inbox, "contracts.txt", CONTRACTS);
    assert_eq!(store.ingest_inbox().unwrap(), 1);
    assert_eq!(store.len(), 4);
}

#[test]
fn test_ingest_missing_directory_is_empty() {
    let (settings, temp) = test_settings();
    let store = CorpusStore::open(settings).unwrap();
    assert_eq!(store.ingest_directory(&temp.path().join("nowhere")).unwrap(), 0);
    assert!(store.is_empty());
}

#[test]
fn test_ingest_stops_when_model_is_unavailable() {
    let (settings, _temp) = test_settings();
    let inbox = settings.inbox_dir();
    write_file(&inbox, "a.txt", PROTEIN_A);
    write_file(&inbox, "g.txt", GALAXY);

    let store = CorpusStore::with_components(
        settings,
        Box::new(FailingEmbedder),
        Box::new(PlainTextExtractor),
    );
    let error = store.ingest_inbox().unwrap_err();

    assert!(matches!(error, CorpusError::ModelUnavailable { .. }));
    assert!(store.is_empty());
}
