//! Core data model: documents, edges and the visualization payload.
//!
//! Every persisted field has a serde default so snapshots written by older
//! versions (or hand-edited ones) load without absent-key special cases.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Colors assigned to clusters, indexed by `cluster % PALETTE.len()`.
pub const PALETTE: [&str; 10] = [
    "#60a5fa", "#f59e0b", "#10b981", "#a78bfa", "#f472b6", "#22c55e", "#38bdf8", "#fb7185",
    "#eab308", "#14b8a6",
];

/// Topic label of a document that has not been through a recompute yet.
pub const PENDING_FIELD: &str = "Processing...";

/// Display size of a document before its first recompute.
pub const BASE_SIZE: f32 = 3.0;

/// Opaque, stable document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh 10 hex character document id.
pub fn generate_document_id() -> DocumentId {
    let mut rng = rand::rng();
    let id: String = (0..10)
        .map(|_| char::from_digit(rng.random_range(0..16), 16).unwrap_or('0'))
        .collect();
    DocumentId(id)
}

/// Point in the 3-D layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Largest absolute coordinate.
    #[must_use]
    pub fn max_abs(&self) -> f32 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }
}

impl From<[f32; 3]> for Position {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Position> for [f32; 3] {
    fn from(p: Position) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Deterministic pseudo-random position in `[-7, 7)^3` derived from an id.
///
/// Used for documents that have never been laid out.
pub fn fallback_position(id: &DocumentId) -> Position {
    let digest = Sha256::digest(id.as_str().as_bytes());
    let coord = |offset: usize| {
        let bytes = [
            digest[offset],
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ];
        let unit = u32::from_le_bytes(bytes) as f64 / 4_294_967_296.0;
        ((unit - 0.5) * 14.0) as f32
    };
    Position::new(coord(0), coord(4), coord(8))
}

/// Caller-supplied metadata for a new document.
///
/// Fields left empty are derived from the document text.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub filename: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Vec<String>,
}

impl DocumentMetadata {
    pub fn from_filename(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }
}

/// A document record. Its embedding lives in the corpus matrix at the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub display_title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub first_sentence: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(default)]
    pub cluster: usize,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default, rename = "pos")]
    pub position: Position,
    #[serde(default = "default_size")]
    pub size: f32,
}

fn default_field() -> String {
    PENDING_FIELD.to_string()
}

fn default_color() -> String {
    PALETTE[0].to_string()
}

fn default_size() -> f32 {
    BASE_SIZE
}

impl Document {
    /// Create a document with placeholder analysis fields.
    pub fn new(id: DocumentId, filename: impl Into<String>) -> Self {
        Self {
            id,
            title: String::new(),
            display_title: String::new(),
            abstract_text: String::new(),
            first_sentence: String::new(),
            keywords: Vec::new(),
            filename: filename.into(),
            field: default_field(),
            cluster: 0,
            confidence: 0.0,
            color: default_color(),
            position: Position::ORIGIN,
            size: BASE_SIZE,
        }
    }

    /// Text fed to the embedder: abstract followed by keywords.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.abstract_text, self.keywords.join(" "))
            .trim()
            .to_string()
    }

    /// Overwrite the cluster-derived fields.
    pub fn assign_cluster(&mut self, cluster: usize) {
        self.cluster = cluster;
        self.field = topic_label(cluster);
        self.color = cluster_color(cluster).to_string();
    }
}

/// Human-readable label for a cluster.
pub fn topic_label(cluster: usize) -> String {
    format!("Topic {}", cluster + 1)
}

/// Palette color for a cluster.
pub fn cluster_color(cluster: usize) -> &'static str {
    PALETTE[cluster % PALETTE.len()]
}

/// Whether an edge stays inside one cluster or bridges two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Intra,
    Bridge,
}

/// Undirected similarity edge; `source <= target` by id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub source: DocumentId,
    pub target: DocumentId,
    pub weight: f32,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

/// One point of the visualization payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: DocumentId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub field: String,
}

/// Per-topic document count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub name: String,
    pub count: usize,
}

/// Read-side payload: layout nodes plus topic summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub nodes: Vec<VisualNode>,
    pub fields: Vec<FieldSummary>,
}

impl Visualization {
    /// Build nodes and per-cluster field counts in first-seen cluster order.
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut fields: Vec<(usize, FieldSummary)> = Vec::new();
        let nodes = documents
            .iter()
            .map(|doc| {
                match fields.iter_mut().find(|(cluster, _)| *cluster == doc.cluster) {
                    Some((_, summary)) => summary.count += 1,
                    None => fields.push((
                        doc.cluster,
                        FieldSummary {
                            name: doc.field.clone(),
                            count: 1,
                        },
                    )),
                }
                VisualNode {
                    id: doc.id.clone(),
                    x: doc.position.x,
                    y: doc.position.y,
                    z: doc.position.z,
                    field: doc.field.clone(),
                }
            })
            .collect();

        Self {
            nodes,
            fields: fields.into_iter().map(|(_, summary)| summary).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex() {
        let id = generate_document_id();
        assert_eq!(id.as_str().len(), 10);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fallback_position_is_deterministic_and_bounded() {
        let id = DocumentId::new("abc123");
        let a = fallback_position(&id);
        let b = fallback_position(&id);
        assert_eq!(a, b);
        assert!(a.max_abs() <= 7.0);
        assert_ne!(a, fallback_position(&DocumentId::new("other")));
    }

    #[test]
    fn test_document_defaults_on_sparse_json() {
        let doc: Document = serde_json::from_str(r#"{"id": "x1"}"#).unwrap();
        assert_eq!(doc.field, PENDING_FIELD);
        assert_eq!(doc.color, PALETTE[0]);
        assert_eq!(doc.position, Position::ORIGIN);
        assert!((doc.size - BASE_SIZE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_position_serializes_as_array() {
        let mut doc = Document::new(DocumentId::new("p"), "p.txt");
        doc.position = Position::new(1.0, -2.0, 0.5);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["pos"], serde_json::json!([1.0, -2.0, 0.5]));
        assert_eq!(json["abstract"], serde_json::json!(""));
    }

    #[test]
    fn test_assign_cluster_wraps_palette() {
        let mut doc = Document::new(DocumentId::new("p"), "p.txt");
        doc.assign_cluster(11);
        assert_eq!(doc.field, "Topic 12");
        assert_eq!(doc.color, PALETTE[1]);
    }

    #[test]
    fn test_visualization_groups_fields() {
        let mut docs: Vec<Document> = (0..4)
            .map(|i| Document::new(DocumentId::new(format!("d{i}")), "f.txt"))
            .collect();
        docs[0].assign_cluster(1);
        docs[1].assign_cluster(0);
        docs[2].assign_cluster(1);
        docs[3].assign_cluster(1);

        let vis = Visualization::from_documents(&docs);
        assert_eq!(vis.nodes.len(), 4);
        assert_eq!(
            vis.fields,
            vec![
                FieldSummary {
                    name: "Topic 2".to_string(),
                    count: 3
                },
                FieldSummary {
                    name: "Topic 1".to_string(),
                    count: 1
                },
            ]
        );
    }
}
