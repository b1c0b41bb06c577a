//! Vector index plus its index-aligned metadata sidecar
//!
//! The pair is one unit: an insert touches both or neither, and the sidecar
//! entry at position `i` always describes ordinal `i`.
//!
//! `save` renames the sidecar into place first and the index file last, so
//! the index file is the commit point. The sidecar only ever grows, which
//! means a crash between the two renames leaves a sidecar whose prefix is
//! the previous committed pair. `open` falls back to that prefix.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

use crate::embeddings::distance_to_similarity;
use crate::error::{MemoryError, Result};
use crate::paths::StoreLayout;
use crate::storage::types::{EntryKind, ScoredEntry, VectorEntry};
use crate::storage::vector_index::VectorIndex;

pub struct SemanticIndex {
    index: VectorIndex,
    entries: Vec<VectorEntry>,
}

impl SemanticIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        Ok(Self {
            index: VectorIndex::new(dimension)?,
            entries: Vec::new(),
        })
    }

    /// Load the last committed pair, or start empty when neither file exists
    ///
    /// Sidecar entries beyond the index count are an interrupted save and
    /// are dropped. An index without a sidecar, a sidecar shorter than the
    /// index, or misnumbered entries are `CorruptIndex`.
    pub fn open(layout: &StoreLayout, dimension: usize) -> Result<Self> {
        let index_path = layout.index_file();
        let meta_path = layout.metadata_file();

        let index = match (index_path.exists(), meta_path.exists()) {
            (false, false) => return Self::new(dimension),
            (true, false) => {
                return Err(MemoryError::CorruptIndex(format!(
                    "{} exists without metadata sidecar",
                    index_path.display()
                )))
            }
            // First save stopped before the index rename
            (false, true) => VectorIndex::new(dimension)?,
            (true, true) => VectorIndex::load(&index_path, dimension)?,
        };
        let mut entries = read_sidecar(&meta_path)?;

        if entries.len() < index.count() {
            return Err(MemoryError::CorruptIndex(format!(
                "sidecar has {} entries but index has {} vectors",
                entries.len(),
                index.count()
            )));
        }
        if let Some((pos, entry)) = entries
            .iter()
            .enumerate()
            .find(|(pos, e)| e.ordinal != *pos as u64)
        {
            return Err(MemoryError::CorruptIndex(format!(
                "sidecar entry {pos} claims ordinal {}",
                entry.ordinal
            )));
        }

        if entries.len() > index.count() {
            warn!(
                sidecar = entries.len(),
                vectors = index.count(),
                "Interrupted save detected; using last committed vector index"
            );
            entries.truncate(index.count());
        }

        Ok(Self { index, entries })
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn count(&self) -> usize {
        self.index.count()
    }

    pub fn entries(&self) -> &[VectorEntry] {
        &self.entries
    }

    /// Highest turn id referenced by any entry
    pub fn max_correlated_id(&self) -> Option<i64> {
        self.entries.iter().map(|e| e.correlated_id).max()
    }

    /// Insert a vector and its metadata together
    pub fn insert(
        &mut self,
        vector: &[f32],
        kind: EntryKind,
        correlated_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<u64> {
        let ordinal = self.index.insert(vector)?;
        self.entries.push(VectorEntry {
            ordinal,
            kind,
            correlated_id,
            timestamp,
        });
        debug_assert_eq!(self.entries.len(), self.index.count());
        Ok(ordinal)
    }

    /// Nearest entries with similarity scores
    ///
    /// Ordinals without metadata are skipped rather than indexed out of range.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let hits = self.index.search(query, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(ordinal, distance)| {
                self.entries.get(ordinal as usize).map(|entry| ScoredEntry {
                    entry: entry.clone(),
                    distance,
                    similarity: distance_to_similarity(distance),
                })
            })
            .collect())
    }

    /// Write index and sidecar to the layout's files
    pub fn save(&self, layout: &StoreLayout) -> Result<()> {
        fs::create_dir_all(layout.root())?;
        write_sidecar(&layout.metadata_file(), &self.entries)?;
        self.index.save(layout.index_file())?;
        Ok(())
    }
}

fn read_sidecar(path: &Path) -> Result<Vec<VectorEntry>> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        MemoryError::CorruptIndex(format!("{}: unreadable sidecar: {e}", path.display()))
    })
}

fn write_sidecar(path: &Path, entries: &[VectorEntry]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut out, entries)?;
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
