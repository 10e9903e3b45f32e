//! Embedding generation for corpus documents.
//!
//! The [`Embedder`] trait is the seam between the analysis pipeline and the
//! text-encoding model. [`FastEmbedder`] wraps fastembed and loads its model
//! lazily on first use; [`HashEmbedder`] is a deterministic, model-free
//! backend used for offline runs and tests.
//!
//! # Model loading
//!
//! The fastembed model is loaded at most once. The preferred path downloads
//! (or reuses) the model through fastembed's cache. If that fails, the same
//! model is loaded from files already on disk: `local_model_dir` when set,
//! otherwise the snapshot fastembed left in its hf-hub cache. When both fail
//! the error is returned and the next call tries again.

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::vector::{VectorDimension, VectorError, normalize_vector};
use fastembed::{
    EmbeddingModel, InitOptions, InitOptionsUserDefined, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Trait for turning document text into unit-length vectors.
///
/// Implementations must return one vector per input text, all of the same
/// length, each L2-normalized.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for multiple texts.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Identity of the underlying model, for logs and error messages.
    fn model_name(&self) -> &str;
}

/// Create the embedder selected by configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, VectorError> {
    match config.backend {
        EmbeddingBackend::Fastembed => Ok(Box::new(FastEmbedder::from_config(config)?)),
        EmbeddingBackend::Hash => {
            let dimension = VectorDimension::new(config.hash_dimension)?;
            Ok(Box::new(HashEmbedder::new(dimension)))
        }
    }
}

/// Parse a configured model name into a fastembed model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" => Ok(EmbeddingModel::BGEBaseENV15),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        other => Err(VectorError::UnknownModel(other.to_string())),
    }
}

/// Where a loaded model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelSource {
    Remote,
    Local,
}

/// fastembed-backed embedder with lazy, load-once initialization.
pub struct FastEmbedder {
    model: Mutex<Option<TextEmbedding>>,
    kind: EmbeddingModel,
    name: String,
    cache_dir: PathBuf,
    local_model_dir: Option<PathBuf>,
    offline: bool,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("name", &self.name)
            .field("loaded", &self.model.lock().is_some())
            .field("offline", &self.offline)
            .finish()
    }
}

impl FastEmbedder {
    /// Build an embedder; the model itself is loaded on the first `embed` call.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, VectorError> {
        Ok(Self {
            model: Mutex::new(None),
            kind: parse_embedding_model(&config.model)?,
            name: config.model.clone(),
            cache_dir: config.resolved_cache_dir(),
            local_model_dir: config.local_model_dir.clone(),
            offline: config.offline,
        })
    }

    /// Whether the model has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.lock().is_some()
    }

    fn load(&self) -> Result<(TextEmbedding, ModelSource), VectorError> {
        if self.offline {
            return self.load_local().map(|m| (m, ModelSource::Local));
        }

        match self.load_remote() {
            Ok(model) => Ok((model, ModelSource::Remote)),
            Err(remote_err) => {
                tracing::warn!(
                    "Network-backed load of {} failed ({remote_err}); trying local files",
                    self.name
                );
                self.load_local()
                    .map(|m| (m, ModelSource::Local))
                    .map_err(|local_err| {
                        VectorError::ModelLoad(format!("{remote_err}; local fallback: {local_err}"))
                    })
            }
        }
    }

    fn load_remote(&self) -> Result<TextEmbedding, VectorError> {
        TextEmbedding::try_new(
            InitOptions::new(self.kind.clone())
                .with_cache_dir(self.cache_dir.clone())
                .with_show_download_progress(false),
        )
        .map_err(|e| VectorError::ModelLoad(e.to_string()))
    }

    /// Directory and ONNX file name for local-only loading.
    fn local_files(&self) -> Result<(PathBuf, String), VectorError> {
        if let Some(dir) = &self.local_model_dir {
            return Ok((dir.clone(), "model.onnx".to_string()));
        }

        let info = TextEmbedding::get_model_info(&self.kind)
            .map_err(|e| VectorError::ModelLoad(e.to_string()))?;
        let dir = cached_model_dir(&self.cache_dir, &info.model_code, &info.model_file)
            .ok_or_else(|| {
                VectorError::ModelLoad(format!(
                    "{} is not in the model cache at {}",
                    info.model_code,
                    self.cache_dir.display()
                ))
            })?;
        Ok((dir, info.model_file.clone()))
    }

    fn load_local(&self) -> Result<TextEmbedding, VectorError> {
        let (dir, model_file) = self.local_files()?;
        let onnx = read_model_file(&dir, &model_file)?;
        let tokenizer_files = TokenizerFiles {
            tokenizer_file: read_model_file(&dir, "tokenizer.json")?,
            config_file: read_model_file(&dir, "config.json")?,
            special_tokens_map_file: read_model_file(&dir, "special_tokens_map.json")?,
            tokenizer_config_file: read_model_file(&dir, "tokenizer_config.json")?,
        };
        let mut model = UserDefinedEmbeddingModel::new(onnx, tokenizer_files)
            .with_quantization(TextEmbedding::get_quantization_mode(&self.kind));
        if let Some(pooling) = TextEmbedding::get_default_pooling_method(&self.kind) {
            model = model.with_pooling(pooling);
        }

        TextEmbedding::try_new_from_user_defined(model, InitOptionsUserDefined::default())
            .map_err(|e| VectorError::ModelLoad(e.to_string()))
    }
}

/// Snapshot directory of `model_code` in an hf-hub cache, as written by
/// fastembed's download.
///
/// The revision named by `refs/main` wins. Without it, the first snapshot
/// (by name) that holds `model_file` is used.
pub fn cached_model_dir(cache_dir: &Path, model_code: &str, model_file: &str) -> Option<PathBuf> {
    let repo = cache_dir.join(format!("models--{}", model_code.replace('/', "--")));
    let snapshots = repo.join("snapshots");

    if let Ok(revision) = std::fs::read_to_string(repo.join("refs").join("main")) {
        let dir = snapshots.join(revision.trim());
        if dir.join(model_file).is_file() {
            return Some(dir);
        }
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&snapshots)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|dir| dir.join(model_file).is_file())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn read_model_file(dir: &Path, name: &str) -> Result<Vec<u8>, VectorError> {
    let path = dir.join(name);
    std::fs::read(&path).map_err(|e| VectorError::ModelLoad(format!("{}: {e}", path.display())))
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self.model.lock();
        if guard.is_none() {
            let (model, source) = self.load()?;
            tracing::info!("Loaded embedding model {} ({source:?})", self.name);
            *guard = Some(model);
        }
        let model = guard
            .as_mut()
            .ok_or_else(|| VectorError::ModelLoad("model missing after load".to_string()))?;

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        let mut embeddings = model
            .embed(text_strings, None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;

        let Some(dimension) = embeddings.first().map(Vec::len) else {
            return Err(VectorError::EmbeddingFailed("model returned no vectors".to_string()));
        };
        for embedding in embeddings.iter_mut() {
            if embedding.len() != dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            normalize_vector(embedding);
        }

        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Deterministic hashed bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed to a signed bucket; the bucket
/// counts are normalized. Texts sharing vocabulary get high cosine similarity,
/// which is enough for offline use and for exercising the pipeline in tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: VectorDimension,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(VectorDimension::dimension_384())
    }
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let raw = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);
        let index = (raw % self.dimension.get() as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension.get()];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = self.bucket(token);
            embedding[index] += sign;
        }

        if embedding.iter().all(|v| *v == 0.0) {
            let (index, _) = self.bucket("");
            embedding[index] = 1.0;
        }

        normalize_vector(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}
