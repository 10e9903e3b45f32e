//! Configuration module for the corpus analysis system.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SM_` and use double underscores
//! to separate nested levels:
//! - `SM_EMBEDDING__OFFLINE=true` sets `embedding.offline`
//! - `SM_ANALYSIS__SEED=7` sets `analysis.seed`
//! - `SM_GRAPH__THRESHOLD=0.3` sets `graph.threshold`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory holding the settings file, searched upward from the cwd.
pub const CONFIG_DIR: &str = ".scholarmap";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the corpus snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory scanned by batch ingestion (defaults to `<data_dir>/inbox`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_dir: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Embedding backend settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Clustering, projection and layout settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Similarity graph settings
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// fastembed ONNX model
    Fastembed,
    /// Deterministic hashed bag-of-words, no model download
    Hash,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_backend")]
    pub backend: EmbeddingBackend,

    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Skip the network-backed load and only use local model files
    #[serde(default = "default_false")]
    pub offline: bool,

    /// Download cache for fastembed models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Directory with `model.onnx` and tokenizer files. Overrides the
    /// fastembed cache when loading locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_model_dir: Option<PathBuf>,

    /// Vector length produced by the hash backend
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// Seed shared by clustering and projection
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Upper bound of the cluster-count search
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,

    /// Seeded k-means restarts per candidate k
    #[serde(default = "default_kmeans_restarts")]
    pub kmeans_restarts: usize,

    /// Smallest corpus that attempts the manifold projection
    #[serde(default = "default_manifold_min_points")]
    pub manifold_min_points: usize,

    /// Neighbor count cap for the manifold projection
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,

    /// Max absolute coordinate after projection rescaling
    #[serde(default = "default_projection_radius")]
    pub projection_radius: f32,

    /// Radius of the circle clusters are arranged on
    #[serde(default = "default_layout_radius")]
    pub layout_radius: f32,

    /// Factor members are pulled toward their cluster centroid
    #[serde(default = "default_contraction")]
    pub contraction: f32,

    /// Re-embed every document on each recompute
    #[serde(default = "default_true")]
    pub full_reembed: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GraphConfig {
    /// Neighbors considered per document
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum (exclusive) cosine similarity for an edge
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("data")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_backend() -> EmbeddingBackend {
    EmbeddingBackend::Fastembed
}
fn default_embedding_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_hash_dimension() -> usize {
    384
}
fn default_seed() -> u64 {
    42
}
fn default_max_clusters() -> usize {
    8
}
fn default_kmeans_restarts() -> usize {
    4
}
fn default_manifold_min_points() -> usize {
    5
}
fn default_max_neighbors() -> usize {
    10
}
fn default_projection_radius() -> f32 {
    5.5
}
fn default_layout_radius() -> f32 {
    5.0
}
fn default_contraction() -> f32 {
    0.6
}
fn default_top_k() -> usize {
    4
}
fn default_threshold() -> f32 {
    0.28
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            inbox_dir: None,
            debug: false,
            embedding: EmbeddingConfig::default(),
            analysis: AnalysisConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_embedding_model(),
            offline: false,
            cache_dir: None,
            local_model_dir: None,
            hash_dimension: default_hash_dimension(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            max_clusters: default_max_clusters(),
            kmeans_restarts: default_kmeans_restarts(),
            manifold_min_points: default_manifold_min_points(),
            max_neighbors: default_max_neighbors(),
            projection_radius: default_projection_radius(),
            layout_radius: default_layout_radius(),
            contraction: default_contraction(),
            full_reembed: true,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
        }
    }
}

impl EmbeddingConfig {
    /// Model download cache, falling back to the user cache directory.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
                .join("scholarmap")
                .join("models")
        })
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore stays
            .merge(Env::prefixed("SM_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Path of the persisted corpus snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("papers.json")
    }

    /// Directory scanned by batch ingestion
    pub fn inbox_dir(&self) -> PathBuf {
        self.inbox_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("inbox"))
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# scholarmap configuration

version = 1

# Where papers.json lives
data_dir = ".scholarmap/data"

# Batch ingestion source (defaults to <data_dir>/inbox)
# inbox_dir = ".scholarmap/data/inbox"

debug = false

[embedding]
# "fastembed" (ONNX model) or "hash" (deterministic, no download)
backend = "fastembed"
model = "AllMiniLML6V2"

# Only load the model from files already on disk (the fastembed cache,
# or local_model_dir when set)
offline = false

# local_model_dir = "/path/to/all-MiniLM-L6-v2"

[analysis]
seed = 42
max_clusters = 8
kmeans_restarts = 4
manifold_min_points = 5
max_neighbors = 10
projection_radius = 5.5
layout_radius = 5.0
contraction = 0.6
full_reembed = true

[graph]
top_k = 4
threshold = 0.28
"#;

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.analysis.seed, 42);
        assert_eq!(settings.analysis.max_clusters, 8);
        assert_eq!(settings.graph.top_k, 4);
        assert!((settings.graph.threshold - 0.28).abs() < f32::EPSILON);
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Fastembed);
        assert_eq!(settings.inbox_dir(), settings.data_dir.join("inbox"));
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
[embedding]
backend = "hash"
hash_dimension = 64

[graph]
threshold = 0.5
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        assert_eq!(settings.embedding.backend, EmbeddingBackend::Hash);
        assert_eq!(settings.embedding.hash_dimension, 64);
        assert!((settings.graph.threshold - 0.5).abs() < f32::EPSILON);
        // Untouched sections keep their defaults
        assert_eq!(settings.graph.top_k, 4);
        assert_eq!(settings.embedding.model, "AllMiniLML6V2");
        assert!(settings.analysis.full_reembed);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.analysis.seed = 7;
        settings.embedding.offline = true;

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.analysis.seed, 7);
        assert!(loaded.embedding.offline);
    }
}
