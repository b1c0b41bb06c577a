//! Command implementations for the `memoria` binary
//!
//! Each subcommand opens the store, does one thing, and flushes the vector
//! index before returning so the next invocation sees it.

pub mod maintain;
pub mod recall;
pub mod record;
pub mod registry;

use anyhow::{Context, Result};
use memoria::embeddings::HashEmbedder;
use memoria::paths;
use memoria::{MemoryConfig, MemoryStore};
use std::path::PathBuf;

/// Where the store and its configuration live
#[derive(Debug, Clone, clap::Args)]
pub struct StoreArgs {
    /// Store directory (overrides `data_dir` from the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.memoria/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl StoreArgs {
    pub fn load_config(&self) -> Result<MemoryConfig> {
        let mut config = match &self.config {
            Some(path) => MemoryConfig::load(path)?,
            None => MemoryConfig::load_or_default(paths::config_path())?,
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        Ok(config)
    }

    pub fn open(&self) -> Result<MemoryStore> {
        let config = self.load_config()?;
        let data_dir = config.data_dir.clone();
        let embedder = HashEmbedder::new(config.embedding_dim);

        MemoryStore::open(config, Some(Box::new(embedder)))
            .with_context(|| format!("Failed to open memory store at {}", data_dir.display()))
    }
}
