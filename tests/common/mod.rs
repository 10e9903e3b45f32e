#![allow(dead_code)]

use scholarmap::Settings;
use scholarmap::config::EmbeddingBackend;
use scholarmap::vector::{Embedder, VectorError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Settings rooted in a fresh temp dir, using the hash embedder so no model
/// download is needed.
pub fn test_settings() -> (Settings, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = settings_in(temp_dir.path());
    (settings, temp_dir)
}

pub fn settings_in(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.data_dir = root.join("data");
    settings.inbox_dir = Some(root.join("inbox"));
    settings.embedding.backend = EmbeddingBackend::Hash;
    settings.embedding.hash_dimension = 256;
    settings
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create dir");
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write file");
    path
}

/// Embedder whose model can never be loaded.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Err(VectorError::ModelLoad("model files missing".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

pub mod sample_papers {
    pub const PROTEIN_A: &str = "Abstract\nProtein folding prediction with deep networks. \
        We predict protein structure from amino acid sequences using attention over residue pairs.\n\
        Keywords: protein folding; structure prediction; attention";

    pub const PROTEIN_B: &str = "Abstract\nProtein folding prediction with deep networks. \
        We predict protein structure from amino acid sequences using attention over residue contacts.\n\
        Keywords: protein folding; structure prediction; contacts";

    pub const PROTEIN_C: &str = "Abstract\nProtein folding prediction with deep networks. \
        We predict protein structure from amino acid sequences using attention over residue distances.\n\
        Keywords: protein folding; structure prediction; distances";

    pub const GALAXY: &str = "Abstract\nGalaxy rotation curves and dark matter halos. \
        Spectroscopic surveys of spiral galaxies constrain halo density profiles at large radii.\n\
        Keywords: galaxies; dark matter; rotation curves";

    pub const CONTRACTS: &str = "Abstract\nIncomplete contracts and firm boundaries. \
        We model bargaining between suppliers and buyers when investment is relationship specific.\n\
        Keywords: contracts; bargaining; theory of the firm";

    pub const TOO_SHORT: &str = "A title only.";
}
