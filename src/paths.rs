//! Single source of truth for the memoria filesystem layout.
//!
//! This module defines WHERE data lives. It has no I/O and no validation.
//!
//! # User-Level Paths (~/.memoria/)
//!
//! ```text
//! ~/.memoria/
//! └── config.toml              # Global config
//! ```
//!
//! # Store Directory (one per memory store)
//!
//! ```text
//! <data_dir>/
//! ├── vectors.mvix             # Flat vector index (insertion order)
//! ├── vectors.meta.json        # Per-ordinal metadata, index aligned
//! └── memory.db                # SQLite: conversations, documents, tasks
//! ```

use std::path::{Path, PathBuf};

/// User's memoria home directory: `~/.memoria/`
pub fn memoria_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memoria")
}

/// Global config file: `~/.memoria/config.toml`
pub fn config_path() -> PathBuf {
    memoria_home().join("config.toml")
}

/// File locations inside a single store directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vector index file: `<data_dir>/vectors.mvix`
    pub fn index_file(&self) -> PathBuf {
        self.root.join("vectors.mvix")
    }

    /// Metadata sidecar: `<data_dir>/vectors.meta.json`
    pub fn metadata_file(&self) -> PathBuf {
        self.root.join("vectors.meta.json")
    }

    /// Structured log: `<data_dir>/memory.db`
    pub fn database_file(&self) -> PathBuf {
        self.root.join("memory.db")
    }
}
