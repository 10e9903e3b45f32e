//! Real fastembed model. Downloads weights on first run.

use crate::common::{sample_papers::*, test_settings};
use scholarmap::CorpusStore;
use scholarmap::config::EmbeddingBackend;

#[test]
#[ignore = "downloads the embedding model"]
fn test_fastembed_corpus_groups_related_papers() {
    let (mut settings, _temp) = test_settings();
    settings.embedding.backend = EmbeddingBackend::Fastembed;
    let store = CorpusStore::open(settings).unwrap();

    for (name, text) in [
        ("a.txt", PROTEIN_A),
        ("b.txt", PROTEIN_B),
        ("c.txt", PROTEIN_C),
        ("g.txt", GALAXY),
        ("k.txt", CONTRACTS),
    ] {
        store
            .add_document(text, scholarmap::DocumentMetadata::from_filename(name), false)
            .unwrap();
    }
    store.recompute().unwrap();

    let documents = store.documents();
    assert_eq!(documents[0].cluster, documents[1].cluster);
    assert_eq!(documents[1].cluster, documents[2].cluster);
    assert!(store.similarity_edges().len() >= 3);
}
