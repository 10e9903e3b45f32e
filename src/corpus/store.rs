//! The corpus store: documents, their embedding matrix and the recompute cycle.
//!
//! A single `parking_lot::Mutex` guards the document list and the matrix.
//! Every mutation, every recompute and every read snapshot holds it for its
//! full duration, so readers observe either the state before a recompute or
//! the state after it, never a mix.
//!
//! # Recompute
//!
//! `Embedding → Clustering → Projecting → Arranging → Scoring → Persisting`.
//! New vectors and document fields are committed only after every stage has
//! succeeded. A failed embedding leaves all documents untouched and surfaces
//! [`CorpusError::ModelUnavailable`]. A failed snapshot write is logged and
//! does not fail the recompute.

use crate::analysis::{
    AnalysisPipeline, ProjectionOutcome, RecomputeStage, SelectionOutcome, SimilarityGraphBuilder,
};
use crate::config::Settings;
use crate::error::{CorpusError, CorpusResult};
use crate::storage::{CorpusSnapshot, SnapshotStore};
use crate::text::{
    KEYWORD_LIMIT, MIN_TEXT_CHARS, PlainTextExtractor, TextExtractor, clean_text,
    extract_abstract, extract_keywords, extract_title, first_sentence, frequent_terms, safe_stem,
};
use crate::types::{
    Document, DocumentId, DocumentMetadata, SimilarityEdge, Visualization, fallback_position,
    generate_document_id,
};
use crate::vector::{Embedder, VectorError, create_embedder};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Mutable corpus state; only touched with the store lock held.
#[derive(Debug, Default)]
struct CorpusState {
    documents: Vec<Document>,
    /// Row `i` is the embedding of `documents[i]`. `None` when the corpus is
    /// empty or the rows are stale and must be recomputed.
    matrix: Option<Vec<Vec<f32>>>,
}

/// Summary of one completed recompute.
#[derive(Debug, Clone)]
pub struct RecomputeReport {
    pub documents: usize,
    pub clusters: usize,
    /// Whether the whole corpus was re-embedded.
    pub reembedded: bool,
    pub selection: Option<SelectionOutcome>,
    pub projection: Option<ProjectionOutcome>,
    /// Whether the snapshot write succeeded.
    pub persisted: bool,
    pub elapsed: Duration,
}

/// Result of [`CorpusStore::analyze`].
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    pub report: RecomputeReport,
    pub visualization: Visualization,
}

pub struct CorpusStore {
    state: Mutex<CorpusState>,
    embedder: Box<dyn Embedder>,
    extractor: Box<dyn TextExtractor>,
    pipeline: AnalysisPipeline,
    graph: SimilarityGraphBuilder,
    snapshots: SnapshotStore,
    settings: Settings,
}

impl std::fmt::Debug for CorpusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusStore")
            .field("model", &self.embedder.model_name())
            .field("snapshot", &self.snapshots.path())
            .finish_non_exhaustive()
    }
}

impl CorpusStore {
    /// Open the store described by `settings` with the configured embedder.
    pub fn open(settings: Settings) -> CorpusResult<Self> {
        let embedder = create_embedder(&settings.embedding).map_err(|e| match e {
            VectorError::UnknownModel(_) | VectorError::InvalidDimension { .. } => {
                CorpusError::ConfigError {
                    reason: e.to_string(),
                }
            }
            other => CorpusError::ModelUnavailable {
                model: settings.embedding.model.clone(),
                reason: other.to_string(),
            },
        })?;
        Ok(Self::with_components(
            settings,
            embedder,
            Box::new(PlainTextExtractor),
        ))
    }

    /// Open the store with explicit collaborators.
    ///
    /// An existing snapshot is loaded. An unreadable one is copied aside and
    /// the store starts empty.
    pub fn with_components(
        settings: Settings,
        embedder: Box<dyn Embedder>,
        extractor: Box<dyn TextExtractor>,
    ) -> Self {
        let snapshots = SnapshotStore::new(settings.snapshot_path());

        let state = match snapshots.load() {
            Ok(Some(snapshot)) => {
                let (documents, matrix) = snapshot.into_parts();
                tracing::info!(
                    "Loaded {} documents from {}",
                    documents.len(),
                    snapshots.path().display()
                );
                CorpusState { documents, matrix }
            }
            Ok(None) => CorpusState::default(),
            Err(e) => {
                tracing::warn!("{e}");
                match snapshots.back_up() {
                    Ok(backup) => {
                        tracing::warn!("Kept unreadable snapshot at {}", backup.display())
                    }
                    Err(backup_err) => tracing::warn!("{backup_err}"),
                }
                CorpusState::default()
            }
        };

        Self {
            state: Mutex::new(state),
            embedder,
            extractor,
            pipeline: AnalysisPipeline::from_config(&settings.analysis),
            graph: SimilarityGraphBuilder::from_config(&settings.graph),
            snapshots,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.state.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().documents.is_empty()
    }

    /// Whether an embedding matrix aligned with the documents is held.
    pub fn has_matrix(&self) -> bool {
        self.state.lock().matrix.is_some()
    }

    /// Directory holding copies of ingested source files.
    pub fn files_dir(&self) -> PathBuf {
        self.settings.data_dir.join("files")
    }

    /// Stored copy of the source file a document was ingested from.
    pub fn stored_file(&self, id: &DocumentId) -> Option<PathBuf> {
        let document = self.document(id).ok()?;
        let extension = Path::new(&document.filename).extension()?.to_str()?.to_string();
        let path = self.files_dir().join(format!("{id}.{extension}"));
        path.exists().then_some(path)
    }

    /// Add a document from raw text and embed it.
    ///
    /// Metadata fields left empty are derived from the text. With `recompute`
    /// the whole corpus is re-analyzed before returning; otherwise the
    /// document keeps placeholder topic fields until the next recompute.
    pub fn add_document(
        &self,
        text: &str,
        metadata: DocumentMetadata,
        recompute: bool,
    ) -> CorpusResult<DocumentId> {
        let document = self.prepare_document(text, metadata)?;
        let row = self.embed_one(&document)?;
        self.insert(document, row, recompute, None)
    }

    /// Extract, add and embed a source file.
    ///
    /// A copy of the file is kept under [`files_dir`](Self::files_dir).
    pub fn add_file(&self, path: &Path, recompute: bool) -> CorpusResult<DocumentId> {
        let text = self.extractor.extract(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let document = self.prepare_document(&text, DocumentMetadata::from_filename(filename))?;
        let row = self.embed_one(&document)?;
        self.insert(document, row, recompute, Some(path))
    }

    /// Add every supported file in `dir` whose filename is not in the corpus
    /// yet, then recompute once if anything was added.
    ///
    /// Files that cannot be read or are rejected are logged and skipped. An
    /// unavailable embedding model stops the batch and is returned; files
    /// added before it stay in the corpus. Returns how many were added.
    pub fn ingest_directory(&self, dir: &Path) -> CorpusResult<usize> {
        if !dir.is_dir() {
            tracing::debug!("Ingest directory {} does not exist", dir.display());
            return Ok(0);
        }

        let known: HashSet<String> = {
            let state = self.state.lock();
            state.documents.iter().map(|d| d.filename.clone()).collect()
        };

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| self.extractor.supports(path))
            .collect();
        paths.sort();

        let mut added = 0;
        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if known.contains(&name) {
                continue;
            }

            match self.add_file(&path, false) {
                Ok(id) => {
                    added += 1;
                    tracing::info!("Ingested {name} as {id}");
                }
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => tracing::warn!("Skipping {name}: {e}"),
            }
        }

        if added > 0 {
            self.recompute()?;
        }
        Ok(added)
    }

    /// [`ingest_directory`](Self::ingest_directory) on the configured inbox.
    pub fn ingest_inbox(&self) -> CorpusResult<usize> {
        self.ingest_directory(&self.settings.inbox_dir())
    }

    /// Remove a document and its matrix row.
    pub fn remove_document(&self, id: &DocumentId, recompute: bool) -> CorpusResult<Document> {
        let mut state = self.state.lock();
        let index = state
            .documents
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| CorpusError::DocumentNotFound { id: id.to_string() })?;

        let document = state.documents.remove(index);
        if let Some(matrix) = state.matrix.as_mut() {
            matrix.remove(index);
        }
        if state.documents.is_empty() {
            state.matrix = None;
        }

        if let Some(extension) = Path::new(&document.filename).extension() {
            let stored = self
                .files_dir()
                .join(format!("{id}.{}", extension.to_string_lossy()));
            if stored.exists() {
                if let Err(e) = std::fs::remove_file(&stored) {
                    tracing::warn!("Failed to remove {}: {e}", stored.display());
                }
            }
        }

        self.finish_edit(&mut state, recompute)?;
        Ok(document)
    }

    /// Re-run the full analysis cycle over the corpus.
    pub fn recompute(&self) -> CorpusResult<RecomputeReport> {
        let mut state = self.state.lock();
        self.recompute_locked(&mut state)
    }

    /// Run [`recompute`](Self::recompute) on Tokio's blocking pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn recompute_in_background(
        self: Arc<Self>,
    ) -> tokio::task::JoinHandle<CorpusResult<RecomputeReport>> {
        tokio::task::spawn_blocking(move || self.recompute())
    }

    /// Recompute, then return the visualization payload taken under the
    /// same lock.
    pub fn analyze(&self) -> CorpusResult<AnalyzeOutcome> {
        let mut state = self.state.lock();
        let report = self.recompute_locked(&mut state)?;
        Ok(AnalyzeOutcome {
            report,
            visualization: Visualization::from_documents(&state.documents),
        })
    }

    /// Layout nodes and per-topic counts as of the last recompute.
    pub fn visualization(&self) -> Visualization {
        let state = self.state.lock();
        Visualization::from_documents(&state.documents)
    }

    /// Copy of every document record, in corpus order.
    pub fn documents(&self) -> Vec<Document> {
        self.state.lock().documents.clone()
    }

    pub fn document(&self, id: &DocumentId) -> CorpusResult<Document> {
        self.state
            .lock()
            .documents
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| CorpusError::DocumentNotFound { id: id.to_string() })
    }

    /// Similarity graph over the live matrix. Empty without a matrix.
    pub fn similarity_edges(&self) -> Vec<SimilarityEdge> {
        let state = self.state.lock();
        match state.matrix.as_deref() {
            Some(matrix) => self.graph.build(&state.documents, matrix),
            None => Vec::new(),
        }
    }

    fn prepare_document(&self, text: &str, metadata: DocumentMetadata) -> CorpusResult<Document> {
        let cleaned = clean_text(text);
        let length = cleaned.chars().count();
        if length < MIN_TEXT_CHARS {
            return Err(CorpusError::InvalidDocument {
                name: metadata.filename,
                reason: format!(
                    "only {length} characters of text, need at least {MIN_TEXT_CHARS}"
                ),
            });
        }

        let display_title = safe_stem(&metadata.filename);
        let title = metadata
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| extract_title(&cleaned, &display_title));
        let abstract_text = metadata
            .abstract_text
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| extract_abstract(&cleaned));
        let keywords = if metadata.keywords.is_empty() {
            let declared = extract_keywords(&cleaned);
            if declared.is_empty() {
                frequent_terms(&format!("{title}\n{abstract_text}"), KEYWORD_LIMIT)
            } else {
                declared
            }
        } else {
            metadata.keywords
        };

        let mut document = Document::new(generate_document_id(), metadata.filename);
        document.position = fallback_position(&document.id);
        document.first_sentence = first_sentence(&cleaned);
        document.display_title = display_title;
        document.title = title;
        document.abstract_text = abstract_text;
        document.keywords = keywords;
        Ok(document)
    }

    fn insert(
        &self,
        mut document: Document,
        row: Vec<f32>,
        recompute: bool,
        source: Option<&Path>,
    ) -> CorpusResult<DocumentId> {
        let mut state = self.state.lock();
        while state.documents.iter().any(|d| d.id == document.id) {
            document.id = generate_document_id();
            document.position = fallback_position(&document.id);
        }
        let id = document.id.clone();

        if let Some(source) = source {
            self.store_source_file(&id, source);
        }

        let aligned = state.matrix.as_ref().is_some_and(|m| {
            m.len() == state.documents.len() && m.first().is_none_or(|r| r.len() == row.len())
        });
        if aligned {
            if let Some(matrix) = state.matrix.as_mut() {
                matrix.push(row);
            }
        } else if state.documents.is_empty() {
            state.matrix = Some(vec![row]);
        } else {
            // Stale or missing rows: the next recompute re-embeds everything
            state.matrix = None;
        }
        state.documents.push(document);
        tracing::debug!("Added document {id} ({} total)", state.documents.len());

        self.finish_edit(&mut state, recompute)?;
        Ok(id)
    }

    fn store_source_file(&self, id: &DocumentId, source: &Path) {
        let Some(extension) = source.extension() else {
            return;
        };
        let files_dir = self.files_dir();
        let target = files_dir.join(format!("{id}.{}", extension.to_string_lossy()));

        let result =
            std::fs::create_dir_all(&files_dir).and_then(|_| std::fs::copy(source, &target));
        if let Err(e) = result {
            tracing::warn!("Failed to keep a copy of {}: {e}", source.display());
        }
    }

    /// Recompute or just persist after an edit. A failed recompute still
    /// persists the edit before its error is returned.
    fn finish_edit(&self, state: &mut CorpusState, recompute: bool) -> CorpusResult<()> {
        if recompute {
            if let Err(e) = self.recompute_locked(state) {
                self.persist(state);
                return Err(e);
            }
        } else {
            self.persist(state);
        }
        Ok(())
    }

    fn recompute_locked(&self, state: &mut CorpusState) -> CorpusResult<RecomputeReport> {
        let started = Instant::now();
        let n = state.documents.len();

        if n == 0 {
            state.matrix = None;
            tracing::debug!("recompute stage: {}", RecomputeStage::Persisting);
            let persisted = self.persist(state);
            return Ok(RecomputeReport {
                documents: 0,
                clusters: 0,
                reembedded: false,
                selection: None,
                projection: None,
                persisted,
                elapsed: started.elapsed(),
            });
        }

        let reuse = !self.settings.analysis.full_reembed
            && state.matrix.as_ref().is_some_and(|m| m.len() == n);
        let fresh = if reuse {
            None
        } else {
            tracing::debug!("recompute stage: {}", RecomputeStage::Embedding);
            let texts: Vec<String> = state.documents.iter().map(Document::embedding_text).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            Some(self.embed_texts(&refs)?)
        };

        let result = {
            let vectors: &[Vec<f32>] = match (&fresh, &state.matrix) {
                (Some(fresh), _) => fresh.as_slice(),
                (None, Some(matrix)) => matrix.as_slice(),
                (None, None) => &[],
            };
            self.pipeline
                .run_observed(vectors, |stage| {
                    tracing::debug!("recompute stage: {stage}");
                })?
        };

        if let Some(fresh) = fresh {
            state.matrix = Some(fresh);
        }
        for (i, document) in state.documents.iter_mut().enumerate() {
            document.assign_cluster(result.assignments[i]);
            document.confidence = result.memberships[i].confidence.get();
            document.size = result.memberships[i].size;
            document.position = result.positions[i];
        }

        tracing::debug!("recompute stage: {}", RecomputeStage::Persisting);
        let persisted = self.persist(state);
        tracing::debug!("recompute stage: {}", RecomputeStage::Idle);

        let report = RecomputeReport {
            documents: n,
            clusters: result.cluster_count,
            reembedded: !reuse,
            selection: Some(result.selection),
            projection: Some(result.projection),
            persisted,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Recomputed {n} documents into {} topics in {:.2?}",
            report.clusters,
            report.elapsed
        );
        Ok(report)
    }

    /// Write the snapshot; failures are logged, never propagated.
    fn persist(&self, state: &CorpusState) -> bool {
        let snapshot = CorpusSnapshot::new(state.documents.clone(), state.matrix.clone());
        match self.snapshots.save(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }

    fn embed_one(&self, document: &Document) -> CorpusResult<Vec<f32>> {
        let text = document.embedding_text();
        self.embed_texts(&[text.as_str()])?
            .pop()
            .ok_or_else(|| self.model_unavailable("no vector returned".to_string()))
    }

    /// Embed and check the shape of the result.
    fn embed_texts(&self, texts: &[&str]) -> CorpusResult<Vec<Vec<f32>>> {
        let vectors = self
            .embedder
            .embed(texts)
            .map_err(|e| self.model_unavailable(e.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(self.model_unavailable(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let dimension = vectors.first().map_or(0, Vec::len);
        if vectors.iter().any(|v| v.len() != dimension || v.is_empty()) {
            return Err(self.model_unavailable("inconsistent vector dimensions".to_string()));
        }
        Ok(vectors)
    }

    fn model_unavailable(&self, reason: String) -> CorpusError {
        CorpusError::ModelUnavailable {
            model: self.embedder.model_name().to_string(),
            reason,
        }
    }
}
