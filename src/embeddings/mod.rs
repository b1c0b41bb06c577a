//! Embeddings module - turn text into fixed-length vectors
//!
//! The store treats the embedder as an external collaborator: a pure function
//! of (model identity, text). Neural backends implement [`Embedder`]; the crate
//! ships [`HashEmbedder`] so a store works without a model download.

mod hashing;
mod similarity;

pub use hashing::HashEmbedder;
pub use similarity::{distance_to_similarity, l2_normalize, squared_euclidean};

use anyhow::Result;

/// Trait for embedding generation engines
///
/// Requires Send + Sync so one embedder can serve a shared store.
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimension (e.g., 384 for all-MiniLM-L6-v2)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}
