//! Local conversational memory for an assistant
//!
//! A [`MemoryStore`] pairs an append-only SQLite turn log with a
//! squared-L2 vector index (USearch HNSW, with an exact scan as fallback)
//! so that past exchanges can be recalled both by recency and by semantic
//! similarity.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod memory;
pub mod paths;
pub mod storage;

// Re-export commonly used types
pub use config::{ContextConfig, MemoryConfig};
pub use embeddings::{Embedder, HashEmbedder};
pub use error::{MemoryError, Result};
pub use memory::{MemoryStats, MemoryStore, Recorded};
