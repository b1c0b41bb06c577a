//! Vector index: USearch HNSW for search, flat vector copy for persistence
//!
//! Ordinals are assigned in insertion order and double as USearch keys. The
//! flat copy is the on-disk format and the exact-search fallback.
//!
//! # File format (little-endian)
//!
//! ```text
//! magic  b"MVIX"
//! u32    format version (1)
//! u32    dimension
//! u64    count
//! f32 x (count * dimension), insertion order
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::embeddings::squared_euclidean;
use crate::error::{MemoryError, Result};

const MAGIC: &[u8; 4] = b"MVIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const RESERVE_CHUNK: usize = 1024;

/// Dense vectors with ordinal identity and squared-L2 k-NN search
pub struct VectorIndex {
    dimension: usize,
    ann: Index,
    vectors: Vec<f32>,
}

fn backend_error(err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Backend(err.to_string())
}

impl VectorIndex {
    /// Create an empty index of fixed `dimension`
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MemoryError::Config(
                "vector index dimension must be greater than zero".into(),
            ));
        }

        let options = IndexOptions {
            dimensions: dimension,
            metric: MetricKind::L2sq, // squared Euclidean, no normalization
            quantization: ScalarKind::F32,
            ..Default::default()
        };

        let ann = Index::new(&options).map_err(backend_error)?;
        ann.reserve(RESERVE_CHUNK).map_err(backend_error)?;

        Ok(Self {
            dimension,
            ann,
            vectors: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn count(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Insert a vector and return its ordinal
    ///
    /// A rejected vector leaves the index unchanged.
    pub fn insert(&mut self, vector: &[f32]) -> Result<u64> {
        self.check_dimension(vector)?;

        let ordinal = self.count() as u64;
        if self.ann.size() >= self.ann.capacity() {
            self.ann
                .reserve(self.ann.capacity() + RESERVE_CHUNK)
                .map_err(backend_error)?;
        }
        self.ann.add(ordinal, vector).map_err(backend_error)?;
        self.vectors.extend_from_slice(vector);

        Ok(ordinal)
    }

    /// Stored vector for `ordinal`
    pub fn vector(&self, ordinal: u64) -> Option<&[f32]> {
        let start = (ordinal as usize).checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// k nearest neighbours as `(ordinal, squared distance)`, closest first
    ///
    /// Returns `min(k, count)` results; an empty index yields an empty list.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        let wanted = k.min(self.count());
        if wanted == 0 {
            return Ok(vec![]);
        }
        self.check_dimension(query)?;

        let matches = self.ann.search(query, wanted).map_err(backend_error)?;
        let mut hits: Vec<(u64, f32)> = matches
            .keys
            .into_iter()
            .zip(matches.distances)
            .collect();

        // HNSW may under-fill on tiny or degenerate graphs
        if hits.len() < wanted {
            hits = self.exact_search(query, wanted);
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(wanted);
        Ok(hits)
    }

    fn exact_search(&self, query: &[f32], k: usize) -> Vec<(u64, f32)> {
        let mut hits: Vec<(u64, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(ordinal, v)| (ordinal as u64, squared_euclidean(query, v)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        hits
    }

    /// Write the index to `path`, replacing any previous file atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("mvix.tmp");

        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            out.write_all(MAGIC)?;
            out.write_all(&FORMAT_VERSION.to_le_bytes())?;
            out.write_all(&(self.dimension as u32).to_le_bytes())?;
            out.write_all(&(self.count() as u64).to_le_bytes())?;
            for value in &self.vectors {
                out.write_all(&value.to_le_bytes())?;
            }
            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load an index written by [`VectorIndex::save`]
    ///
    /// Any header or length disagreement is `CorruptIndex`; nothing is truncated.
    pub fn load<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let corrupt = |why: String| MemoryError::CorruptIndex(format!("{}: {why}", path.display()));

        if bytes.len() < HEADER_LEN {
            return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
        }
        if &bytes[0..4] != MAGIC {
            return Err(corrupt("bad magic".into()));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(format!("unsupported format version {version}")));
        }

        let stored_dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if stored_dim != dimension {
            return Err(corrupt(format!(
                "dimension {stored_dim} does not match configured {dimension}"
            )));
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..HEADER_LEN]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let payload = &bytes[HEADER_LEN..];
        let expected_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt(format!("count {count} overflows")))?;
        if payload.len() != expected_len {
            return Err(corrupt(format!(
                "payload is {} bytes, expected {expected_len}",
                payload.len()
            )));
        }

        let mut index = Self::new(dimension)?;
        index
            .ann
            .reserve(count.max(RESERVE_CHUNK))
            .map_err(backend_error)?;

        let vectors: Vec<f32> = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        for vector in vectors.chunks_exact(dimension) {
            index.insert(vector)?;
        }

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn axis(dim: usize, hot: usize, value: f32) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = value;
        v
    }

    #[test]
    fn test_empty_index_search() -> Result<()> {
        let index = VectorIndex::new(8)?;
        assert_eq!(index.count(), 0);
        assert!(index.search(&[0.0; 8], 5)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_insert_assigns_sequential_ordinals() -> Result<()> {
        let mut index = VectorIndex::new(4)?;
        assert_eq!(index.insert(&axis(4, 0, 1.0))?, 0);
        assert_eq!(index.insert(&axis(4, 1, 1.0))?, 1);
        assert_eq!(index.insert(&axis(4, 2, 1.0))?, 2);
        assert_eq!(index.count(), 3);
        assert_eq!(index.vector(1), Some(&axis(4, 1, 1.0)[..]));
        assert_eq!(index.vector(3), None);
        Ok(())
    }

    #[test]
    fn test_wrong_dimension_rejected() -> Result<()> {
        let mut index = VectorIndex::new(4)?;
        index.insert(&[1.0, 0.0, 0.0, 0.0])?;

        let err = index.insert(&[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
        assert_eq!(index.count(), 1);
        Ok(())
    }

    #[test]
    fn test_wrong_length_query_rejected() -> Result<()> {
        let mut index = VectorIndex::new(4)?;
        index.insert(&axis(4, 0, 1.0))?;

        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        Ok(())
    }

    #[test]
    fn test_exact_scan_matches_search_and_breaks_ties_by_ordinal() -> Result<()> {
        let mut index = VectorIndex::new(3)?;
        index.insert(&[2.0, 0.0, 0.0])?;
        index.insert(&[0.0, 1.0, 0.0])?;
        index.insert(&[0.0, 1.0, 0.0])?;
        index.insert(&[0.0, 0.0, 5.0])?;

        let query = [0.0, 0.0, 0.0];
        let exact = index.exact_search(&query, 10);
        assert_eq!(exact.len(), 4);
        let ordinals: Vec<u64> = exact.iter().map(|h| h.0).collect();
        assert_eq!(ordinals, vec![1, 2, 0, 3]);
        approx::assert_relative_eq!(exact[0].1, 1.0, epsilon = 1e-6);
        approx::assert_relative_eq!(exact[2].1, 4.0, epsilon = 1e-6);
        approx::assert_relative_eq!(exact[3].1, 25.0, epsilon = 1e-6);

        let searched = index.search(&query, 3)?;
        let searched_ordinals: Vec<u64> = searched.iter().map(|h| h.0).collect();
        assert_eq!(searched_ordinals, ordinals[..3].to_vec());
        assert_eq!(index.exact_search(&query, 2).len(), 2);
        Ok(())
    }

    #[test]
    fn test_search_fewer_than_k() -> Result<()> {
        let mut index = VectorIndex::new(4)?;
        index.insert(&axis(4, 0, 1.0))?;
        index.insert(&axis(4, 1, 1.0))?;

        let hits = index.search(&axis(4, 0, 1.0), 10)?;
        assert_eq!(hits.len(), 2);
        Ok(())
    }

    #[test]
    fn test_search_ranking_and_squared_distance() -> Result<()> {
        let mut index = VectorIndex::new(3)?;
        index.insert(&[0.0, 0.0, 0.0])?;
        index.insert(&[3.0, 4.0, 0.0])?;
        index.insert(&[1.0, 0.0, 0.0])?;

        let hits = index.search(&[0.0, 0.0, 0.0], 3)?;
        let ordinals: Vec<u64> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ordinals, vec![0, 2, 1]);
        approx::assert_relative_eq!(hits[2].1, 25.0, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_save_load_roundtrip_preserves_ranking() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("vectors.mvix");

        let mut index = VectorIndex::new(16)?;
        for i in 0..16 {
            index.insert(&axis(16, i, 1.0 + i as f32 * 0.1))?;
        }
        let query = axis(16, 3, 1.2);
        let before = index.search(&query, 5)?;
        index.save(&path)?;

        let loaded = VectorIndex::load(&path, 16)?;
        assert_eq!(loaded.count(), index.count());
        let after = loaded.search(&query, 5)?;

        let order = |hits: &[(u64, f32)]| hits.iter().map(|h| h.0).collect::<Vec<_>>();
        assert_eq!(order(&before), order(&after));
        Ok(())
    }

    #[test]
    fn test_load_dimension_mismatch_is_corrupt() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("vectors.mvix");

        let mut index = VectorIndex::new(4)?;
        index.insert(&[1.0, 2.0, 3.0, 4.0])?;
        index.save(&path)?;

        let err = VectorIndex::load(&path, 8).err().expect("load should fail");
        assert!(matches!(err, MemoryError::CorruptIndex(_)));
        Ok(())
    }

    #[test]
    fn test_load_truncated_payload_is_corrupt() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("vectors.mvix");

        let mut index = VectorIndex::new(4)?;
        index.insert(&[1.0, 2.0, 3.0, 4.0])?;
        index.insert(&[5.0, 6.0, 7.0, 8.0])?;
        index.save(&path)?;

        let bytes = fs::read(&path)?;
        fs::write(&path, &bytes[..bytes.len() - 3])?;

        let err = VectorIndex::load(&path, 4).err().expect("load should fail");
        assert!(matches!(err, MemoryError::CorruptIndex(_)));
        Ok(())
    }

    #[test]
    fn test_load_garbage_is_corrupt() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("vectors.mvix");
        fs::write(&path, b"definitely not an index file")?;

        let err = VectorIndex::load(&path, 4).err().expect("load should fail");
        assert!(matches!(err, MemoryError::CorruptIndex(_)));
        Ok(())
    }
}
