//! Feature-hashing bag-of-words embedder
//!
//! Each lowercase alphanumeric token is hashed with SHA-256; the first eight
//! bytes pick a bucket, the ninth picks a sign. The accumulated vector is L2
//! normalized, so squared L2 distance ranks like cosine similarity.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

use super::{l2_normalize, Embedder};

pub struct HashEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_name: "hash-bow-v1".to_string(),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(head) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            bail!("HashEmbedder configured with zero dimension");
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let (bucket, sign) = self.bucket(&token);
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
