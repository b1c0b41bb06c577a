use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::MemoryError;
use crate::paths::StoreLayout;

/// Configuration for a memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding the index, sidecar and SQLite files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Embedding model identity (recorded for operators, not interpreted)
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Fixed vector dimension for the index
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Flush the vector index after this many insertions (0 = only on persist)
    #[serde(default = "default_save_every")]
    pub save_every: usize,

    #[serde(default)]
    pub context: ContextConfig,
}

/// Knobs for context assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Semantic hits to include
    #[serde(default = "default_semantic_hits")]
    pub semantic_hits: usize,

    /// Recent turns to include
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Per-field character limit for recent turns
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/memory")
}

fn default_embedding_model() -> String {
    "hash-bow-v1".into()
}

fn default_embedding_dim() -> usize {
    384 // all-MiniLM-L6-v2 compatible
}

fn default_save_every() -> usize {
    10
}

fn default_semantic_hits() -> usize {
    3
}

fn default_recent_turns() -> usize {
    3
}

fn default_snippet_chars() -> usize {
    100
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            semantic_hits: default_semantic_hits(),
            recent_turns: default_recent_turns(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            save_every: default_save_every(),
            context: ContextConfig::default(),
        }
    }
}

impl MemoryConfig {
    /// Default configuration rooted at `data_dir`
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::load_from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse memory configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.embedding_dim == 0 {
            return Err(MemoryError::Config(
                "embedding_dim must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.data_dir)
    }
}
