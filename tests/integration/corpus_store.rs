//! Recompute cycle behaviour of the corpus store.

use crate::common::{FailingEmbedder, sample_papers::*, settings_in, test_settings};
use scholarmap::text::PlainTextExtractor;
use scholarmap::{CorpusError, CorpusStore, DocumentMetadata, Position};
use std::collections::HashSet;
use std::sync::Arc;

fn meta(name: &str) -> DocumentMetadata {
    DocumentMetadata::from_filename(name)
}

fn store_with(papers: &[(&str, &str)]) -> (CorpusStore, tempfile::TempDir) {
    let (settings, temp_dir) = test_settings();
    let store = CorpusStore::open(settings).expect("hash embedder always opens");
    for (name, text) in papers {
        store
            .add_document(text, meta(name), false)
            .expect("Failed to add document");
    }
    (store, temp_dir)
}

#[test]
fn test_single_document_is_its_own_topic() {
    let (store, _temp) = store_with(&[("protein.txt", PROTEIN_A)]);
    let report = store.recompute().unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.clusters, 1);

    let doc = &store.documents()[0];
    assert_eq!(doc.cluster, 0);
    assert_eq!(doc.field, "Topic 1");
    assert!((doc.confidence - 1.0).abs() < 1e-5);
    assert_eq!(doc.position, Position::ORIGIN);
    assert!((doc.size - 8.0).abs() < 1e-4);
}

#[test]
fn test_empty_corpus_recompute_persists_empty_snapshot() {
    let (settings, _temp) = test_settings();
    let snapshot = settings.snapshot_path();
    let store = CorpusStore::open(settings).unwrap();

    let report = store.recompute().unwrap();
    assert_eq!(report.documents, 0);
    assert_eq!(report.clusters, 0);
    assert!(report.persisted);
    assert!(!store.has_matrix());

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(snapshot).unwrap()).unwrap();
    assert_eq!(saved["papers"].as_array().map(Vec::len), Some(0));
    assert_eq!(saved["vectors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_every_document_gets_cluster_confidence_and_position() {
    let (store, _temp) = store_with(&[
        ("a.txt", PROTEIN_A),
        ("b.txt", PROTEIN_B),
        ("c.txt", PROTEIN_C),
        ("galaxy.txt", GALAXY),
        ("contracts.txt", CONTRACTS),
    ]);
    let report = store.recompute().unwrap();
    assert!(report.reembedded);

    let documents = store.documents();
    assert_eq!(documents.len(), 5);
    for doc in &documents {
        assert!(doc.cluster < report.clusters);
        assert!((0.0..=1.0).contains(&doc.confidence));
        assert!(doc.position.x.is_finite() && doc.position.y.is_finite());
        assert!(doc.position.z.is_finite());
        assert_eq!(doc.field, format!("Topic {}", doc.cluster + 1));
    }

    // Projection keeps every coordinate within its radius, so a member can
    // sit at most 2 * radius from its centroid before contraction.
    let analysis = &store.settings().analysis;
    let bound =
        analysis.layout_radius + 2.0 * analysis.projection_radius * analysis.contraction + 1e-3;
    for doc in &documents {
        assert!(
            doc.position.max_abs() <= bound,
            "{} at {:?} exceeds {bound}",
            doc.id,
            doc.position
        );
    }

    let visualization = store.visualization();
    assert_eq!(visualization.nodes.len(), 5);
    let counted: usize = visualization.fields.iter().map(|f| f.count).sum();
    assert_eq!(counted, 5);
}

#[test]
fn test_recompute_is_deterministic() {
    let papers = [
        ("a.txt", PROTEIN_A),
        ("galaxy.txt", GALAXY),
        ("b.txt", PROTEIN_B),
        ("contracts.txt", CONTRACTS),
        ("c.txt", PROTEIN_C),
    ];
    let (first, _t1) = store_with(&papers);
    let (second, _t2) = store_with(&papers);
    first.recompute().unwrap();
    second.recompute().unwrap();

    for (a, b) in first.documents().iter().zip(second.documents().iter()) {
        assert_eq!(a.cluster, b.cluster);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.position, b.position);
    }
}

#[test]
fn test_similar_documents_form_a_triangle() {
    let (store, _temp) = store_with(&[
        ("a.txt", PROTEIN_A),
        ("b.txt", PROTEIN_B),
        ("c.txt", PROTEIN_C),
    ]);
    store.recompute().unwrap();

    let edges = store.similarity_edges();
    assert_eq!(edges.len(), 3);

    let threshold = store.settings().graph.threshold;
    let mut pairs = HashSet::new();
    for edge in &edges {
        assert_ne!(edge.source, edge.target);
        assert!(edge.weight > threshold);
        let pair = if edge.source < edge.target {
            (edge.source.clone(), edge.target.clone())
        } else {
            (edge.target.clone(), edge.source.clone())
        };
        assert!(pairs.insert(pair), "duplicate edge {edge:?}");
    }
}

#[test]
fn test_no_edges_without_matrix() {
    let (store, _temp) = store_with(&[]);
    assert!(store.similarity_edges().is_empty());
}

#[test]
fn test_model_unavailable_on_add_leaves_corpus_unchanged() {
    let (settings, _temp) = test_settings();
    let store = CorpusStore::with_components(
        settings,
        Box::new(FailingEmbedder),
        Box::new(PlainTextExtractor),
    );

    let result = store.add_document(PROTEIN_A, meta("a.txt"), true);
    assert!(matches!(result, Err(CorpusError::ModelUnavailable { .. })));
    assert!(store.is_empty());
}

#[test]
fn test_model_unavailable_on_recompute_keeps_previous_results() {
    let (settings, temp) = test_settings();
    let before = {
        let store = CorpusStore::open(settings).unwrap();
        for (name, text) in [("a.txt", PROTEIN_A), ("g.txt", GALAXY), ("c.txt", CONTRACTS)] {
            store.add_document(text, meta(name), false).unwrap();
        }
        store.recompute().unwrap();
        store.documents()
    };

    let store = CorpusStore::with_components(
        settings_in(temp.path()),
        Box::new(FailingEmbedder),
        Box::new(PlainTextExtractor),
    );
    let error = store.recompute().unwrap_err();

    assert!(matches!(error, CorpusError::ModelUnavailable { .. }));
    assert!(error.is_retryable());
    assert_eq!(store.documents(), before);
    assert!(store.has_matrix());
}

#[test]
fn test_short_text_is_rejected() {
    let (store, _temp) = store_with(&[]);
    let result = store.add_document(TOO_SHORT, meta("short.txt"), true);
    assert!(matches!(result, Err(CorpusError::InvalidDocument { .. })));
    assert!(store.is_empty());
}

#[test]
fn test_metadata_is_derived_from_text() {
    let (store, _temp) = store_with(&[]);
    let id = store
        .add_document(PROTEIN_A, meta("folding_paper.txt"), false)
        .unwrap();
    let doc = store.document(&id).unwrap();

    assert_eq!(doc.display_title, "folding_paper");
    assert!(!doc.title.is_empty());
    assert!(doc.abstract_text.starts_with("Protein folding prediction"));
    assert_eq!(
        doc.keywords,
        vec!["protein folding", "structure prediction", "attention"]
    );
    // Not recomputed yet
    assert_eq!(doc.field, "Processing...");
}

#[test]
fn test_explicit_metadata_wins() {
    let (store, _temp) = store_with(&[]);
    let metadata = DocumentMetadata {
        filename: "x.txt".to_string(),
        title: Some("A Given Title".to_string()),
        abstract_text: None,
        keywords: vec!["given".to_string()],
    };
    let id = store.add_document(GALAXY, metadata, false).unwrap();
    let doc = store.document(&id).unwrap();
    assert_eq!(doc.title, "A Given Title");
    assert_eq!(doc.keywords, vec!["given"]);
}

#[test]
fn test_remove_document() {
    let (store, _temp) = store_with(&[
        ("a.txt", PROTEIN_A),
        ("g.txt", GALAXY),
        ("c.txt", CONTRACTS),
    ]);
    store.recompute().unwrap();
    let victim = store.documents()[1].id.clone();

    let removed = store.remove_document(&victim, true).unwrap();
    assert_eq!(removed.filename, "g.txt");
    assert_eq!(store.len(), 2);
    assert!(store.has_matrix());
    assert!(matches!(
        store.document(&victim),
        Err(CorpusError::DocumentNotFound { .. })
    ));
    assert!(matches!(
        store.remove_document(&victim, false),
        Err(CorpusError::DocumentNotFound { .. })
    ));
}

#[test]
fn test_removing_last_document_clears_matrix() {
    let (store, _temp) = store_with(&[("a.txt", PROTEIN_A)]);
    let id = store.documents()[0].id.clone();
    store.remove_document(&id, true).unwrap();
    assert!(store.is_empty());
    assert!(!store.has_matrix());
}

#[test]
fn test_analyze_returns_visualization() {
    let (store, _temp) = store_with(&[("a.txt", PROTEIN_A), ("g.txt", GALAXY)]);
    let outcome = store.analyze().unwrap();
    assert_eq!(outcome.report.documents, 2);
    let visualization = outcome.visualization;
    assert_eq!(visualization.nodes.len(), 2);
    let ids: HashSet<_> = store.documents().into_iter().map(|d| d.id).collect();
    assert!(visualization.nodes.iter().all(|n| ids.contains(&n.id)));
}

#[tokio::test]
async fn test_recompute_in_background() {
    let (store, _temp) = store_with(&[("a.txt", PROTEIN_A), ("b.txt", PROTEIN_B)]);
    let store = Arc::new(store);

    let report = Arc::clone(&store)
        .recompute_in_background()
        .await
        .expect("task panicked")
        .unwrap();
    assert_eq!(report.documents, 2);
    assert!(store.documents().iter().all(|d| d.field != "Processing..."));
}
