//! Conversational memory: one coordinator over the turn log and vector index
//!
//! `record` writes the turn to SQLite first. Embedding and indexing come
//! after and may fail without losing the turn; such failures are returned
//! as warnings on [`Recorded`]. `assemble_context` never fails.

pub mod context;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::embeddings::Embedder;
use crate::error::{MemoryError, Result};
use crate::paths::StoreLayout;
use crate::storage::{
    DocumentRecord, EntryKind, NewTurn, ScoredEntry, SemanticIndex, TaskRecord, Turn, TurnLog,
};

pub use context::{render_context, NO_CONTEXT, RECENT_HEADER, SEMANTIC_HEADER};

/// Outcome of a successful `record`
#[derive(Debug)]
pub struct Recorded {
    pub turn_id: i64,
    /// Ordinal in the vector index, `None` when the turn is log-only
    pub ordinal: Option<u64>,
    /// Semantic-layer failures that did not prevent logging the turn
    pub warnings: Vec<MemoryError>,
}

impl Recorded {
    pub fn is_indexed(&self) -> bool {
        self.ordinal.is_some()
    }
}

/// Counts across both halves of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub turns: usize,
    pub documents: usize,
    pub vectors: usize,
    pub metadata_entries: usize,
    pub unsaved_vectors: usize,
    pub dimension: usize,
}

/// Vector index with its metadata sidecar plus the unsaved-insert counter
struct VectorState {
    semantic: SemanticIndex,
    unsaved: usize,
}

/// Hybrid memory store owned by the caller
pub struct MemoryStore {
    config: MemoryConfig,
    layout: StoreLayout,
    embedder: Option<Box<dyn Embedder>>,
    log: TurnLog,
    vectors: Mutex<VectorState>,
}

impl MemoryStore {
    /// Open or create the store in `config.data_dir`
    ///
    /// Without an embedder the store runs log-only: turns are recorded and
    /// listed, semantic retrieval is empty.
    pub fn open(config: MemoryConfig, embedder: Option<Box<dyn Embedder>>) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();
        std::fs::create_dir_all(layout.root())?;

        let log = TurnLog::open(layout.database_file())?;
        let semantic = SemanticIndex::open(&layout, config.embedding_dim)?;

        if let Some(referenced) = semantic.max_correlated_id() {
            let logged = log.max_turn_id()?;
            if logged.map_or(true, |max| referenced > max) {
                return Err(MemoryError::CorruptIndex(format!(
                    "vector metadata references turn {referenced} but the log ends at {logged:?}"
                )));
            }
        }

        match &embedder {
            Some(e) if e.dimension() != config.embedding_dim => warn!(
                model = e.model_name(),
                embedder_dim = e.dimension(),
                index_dim = config.embedding_dim,
                "Embedder dimension differs from index; semantic inserts will be rejected"
            ),
            None => warn!("No embedder configured; memory store is log-only"),
            _ => {}
        }

        info!(
            data_dir = %layout.root().display(),
            vectors = semantic.count(),
            dimension = semantic.dimension(),
            "Opened memory store"
        );

        Ok(Self {
            config,
            layout,
            embedder,
            log,
            vectors: Mutex::new(VectorState {
                semantic,
                unsaved: 0,
            }),
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Record one completed exchange
    pub fn record(
        &self,
        user_text: &str,
        agent_text: &str,
        tools_used: Vec<String>,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Result<Recorded> {
        let mut turn = NewTurn::new(user_text, agent_text).with_tools(tools_used);
        turn.metadata = metadata;
        self.record_turn(turn)
    }

    /// Record a prepared turn; only a log failure is an error
    pub fn record_turn(&self, turn: NewTurn) -> Result<Recorded> {
        let turn_id = self.log.append(&turn)?;
        debug!(turn_id, tools = ?turn.tools_used, "Logged turn");

        let mut warnings = Vec::new();
        let ordinal = match self.index_turn(turn_id, &turn.embedding_text(), turn.timestamp) {
            Ok((ordinal, flush_warning)) => {
                warnings.extend(flush_warning);
                Some(ordinal)
            }
            Err(err) => {
                warn!(turn_id, error = %err, "Turn recorded without semantic index entry");
                warnings.push(err);
                None
            }
        };

        Ok(Recorded {
            turn_id,
            ordinal,
            warnings,
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| MemoryError::EmbeddingUnavailable("no embedder configured".into()))?;

        embedder
            .embed(text)
            .map_err(|e| MemoryError::EmbeddingUnavailable(format!("{e:#}")))
    }

    /// Embed and index one turn; a failed batched flush comes back as a warning
    fn index_turn(
        &self,
        turn_id: i64,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(u64, Option<MemoryError>)> {
        let vector = self.embed(text)?;

        let mut state = self.vectors.lock();
        let ordinal = state
            .semantic
            .insert(&vector, EntryKind::Conversation, turn_id, timestamp)?;
        state.unsaved += 1;

        let mut flush_warning = None;
        if self.config.save_every > 0 && state.unsaved >= self.config.save_every {
            match state.semantic.save(&self.layout) {
                Ok(()) => {
                    debug!(vectors = state.semantic.count(), "Batched vector index flush");
                    state.unsaved = 0;
                }
                Err(err) => {
                    warn!(error = %err, "Batched vector index flush failed");
                    flush_warning = Some(err);
                }
            }
        }

        Ok((ordinal, flush_warning))
    }

    /// Semantic search over recorded turns, best first
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredEntry>> {
        if k == 0 || self.vectors.lock().semantic.count() == 0 {
            return Ok(vec![]);
        }

        let query_vector = self.embed(query)?;
        let state = self.vectors.lock();
        state.semantic.search(&query_vector, k)
    }

    /// The `limit` most recent turns, oldest first
    pub fn recent_turns(&self, limit: usize) -> Result<Vec<Turn>> {
        self.log.list_recent(limit)
    }

    pub fn turn(&self, id: i64) -> Result<Option<Turn>> {
        self.log.get_turn(id)
    }

    /// Build the prompt context for `query`; degrades instead of failing
    pub fn assemble_context(&self, query: &str) -> String {
        let ctx = &self.config.context;

        let hits = self.retrieve(query, ctx.semantic_hits).unwrap_or_else(|err| {
            warn!(error = %err, "Semantic retrieval unavailable for context");
            vec![]
        });

        let recent = self.recent_turns(ctx.recent_turns).unwrap_or_else(|err| {
            warn!(error = %err, "Recent history unavailable for context");
            vec![]
        });

        render_context(&hits, &recent, ctx.snippet_chars)
    }

    /// Flush the vector index and its sidecar to disk
    pub fn persist(&self) -> Result<()> {
        let mut state = self.vectors.lock();
        state.semantic.save(&self.layout)?;
        state.unsaved = 0;

        debug!(vectors = state.semantic.count(), "Persisted vector index");
        Ok(())
    }

    /// Register a document, replacing any earlier registration of the path
    pub fn upsert_document<P: AsRef<Path>>(
        &self,
        path: P,
        summary: Option<String>,
    ) -> Result<DocumentRecord> {
        let record = DocumentRecord::from_path(path, summary);
        self.log.upsert_document(&record)?;
        Ok(record)
    }

    pub fn document(&self, path: &str) -> Result<Option<DocumentRecord>> {
        self.log.get_document(path)
    }

    pub fn documents(&self) -> Result<Vec<DocumentRecord>> {
        self.log.list_documents()
    }

    pub fn record_task(
        &self,
        description: &str,
        status: Option<&str>,
        result: Option<&str>,
    ) -> Result<i64> {
        self.log.append_task(description, status, result)
    }

    pub fn recent_tasks(&self, limit: usize) -> Result<Vec<TaskRecord>> {
        self.log.list_recent_tasks(limit)
    }

    /// Embed every logged turn that has no vector entry
    ///
    /// Recovers vectors lost when the process stopped before a flush and
    /// turns whose embedding failed when they were recorded. Run while no
    /// other caller is recording. Returns the number of turns indexed.
    pub fn reindex_unindexed(&self) -> Result<usize> {
        let indexed: HashSet<i64> = self
            .vectors
            .lock()
            .semantic
            .entries()
            .iter()
            .filter(|e| e.kind == EntryKind::Conversation)
            .map(|e| e.correlated_id)
            .collect();

        let missing: Vec<i64> = self
            .log
            .turn_ids()?
            .into_iter()
            .filter(|id| !indexed.contains(id))
            .collect();

        let mut reindexed = 0;
        for id in &missing {
            let Some(turn) = self.log.get_turn(*id)? else {
                continue;
            };
            let (_, flush_warning) =
                self.index_turn(turn.id, &turn.embedding_text(), turn.timestamp)?;
            if let Some(err) = flush_warning {
                warn!(error = %err, "Flush during reindex failed");
            }
            reindexed += 1;
        }

        if reindexed > 0 {
            info!(indexed = reindexed, "Reindexed turns missing from the vector index");
        }
        Ok(reindexed)
    }

    pub fn stats(&self) -> Result<MemoryStats> {
        let turns = self.log.count_turns()?;
        let documents = self.log.count_documents()?;
        let state = self.vectors.lock();

        Ok(MemoryStats {
            turns,
            documents,
            vectors: state.semantic.count(),
            metadata_entries: state.semantic.entries().len(),
            unsaved_vectors: state.unsaved,
            dimension: state.semantic.dimension(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir, save_every: usize) -> Result<MemoryStore> {
        let mut config = MemoryConfig::with_data_dir(temp.path());
        config.embedding_dim = 64;
        config.save_every = save_every;
        MemoryStore::open(config, Some(Box::new(HashEmbedder::new(64))))
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model server offline")
        }

        fn dimension(&self) -> usize {
            64
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_record_indexes_turn() -> Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp, 10)?;

        let recorded = store.record("What is X?", "X is a thing", vec!["search".into()], None)?;
        assert!(recorded.is_indexed());
        assert!(recorded.warnings.is_empty());

        let stats = store.stats()?;
        assert_eq!(stats.turns, 1);
        assert_eq!(stats.vectors, 1);
        assert_eq!(stats.metadata_entries, 1);
        assert_eq!(stats.unsaved_vectors, 1);
        Ok(())
    }

    /// Fails on any text containing "FAIL", hashes everything else
    struct FlakyEmbedder(HashEmbedder);

    impl Embedder for FlakyEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            if text.contains("FAIL") {
                anyhow::bail!("transient outage");
            }
            self.0.embed(text)
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    #[test]
    fn test_embedding_failure_keeps_turn() -> Result<()> {
        let temp = TempDir::new()?;
        let mut config = MemoryConfig::with_data_dir(temp.path());
        config.embedding_dim = 64;
        let store = MemoryStore::open(config, Some(Box::new(FailingEmbedder)))?;

        let recorded = store.record("hello", "hi", vec![], None)?;
        assert!(!recorded.is_indexed());
        assert_eq!(recorded.warnings.len(), 1);
        assert!(matches!(
            recorded.warnings[0],
            MemoryError::EmbeddingUnavailable(_)
        ));

        assert_eq!(store.recent_turns(10)?.len(), 1);
        assert_eq!(store.stats()?.vectors, 0);
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch_is_a_warning() -> Result<()> {
        let temp = TempDir::new()?;
        let mut config = MemoryConfig::with_data_dir(temp.path());
        config.embedding_dim = 32;
        let store = MemoryStore::open(config, Some(Box::new(HashEmbedder::new(64))))?;

        let recorded = store.record("hello", "hi", vec![], None)?;
        assert!(matches!(
            recorded.warnings[0],
            MemoryError::DimensionMismatch {
                expected: 32,
                actual: 64
            }
        ));
        let stats = store.stats()?;
        assert_eq!(stats.turns, 1);
        assert_eq!(stats.vectors, 0);
        assert_eq!(stats.metadata_entries, 0);
        Ok(())
    }

    #[test]
    fn test_log_only_store_retrieves_nothing() -> Result<()> {
        let temp = TempDir::new()?;
        let mut config = MemoryConfig::with_data_dir(temp.path());
        config.embedding_dim = 64;
        let store = MemoryStore::open(config, None)?;

        store.record("What is X?", "X is a thing", vec![], None)?;
        assert!(store.retrieve("X", 3)?.is_empty());

        let context = store.assemble_context("Tell me about X");
        assert!(!context.contains(SEMANTIC_HEADER));
        assert!(context.contains(RECENT_HEADER));
        Ok(())
    }

    #[test]
    fn test_batched_flush_every_n() -> Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp, 3)?;

        store.record("a", "1", vec![], None)?;
        store.record("b", "2", vec![], None)?;
        assert!(!store.layout().index_file().exists());

        store.record("c", "3", vec![], None)?;
        assert!(store.layout().index_file().exists());
        assert!(store.layout().metadata_file().exists());
        assert_eq!(store.stats()?.unsaved_vectors, 0);
        Ok(())
    }

    #[test]
    fn test_zero_save_every_disables_batching() -> Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp, 0)?;
        for i in 0..5 {
            store.record(&format!("q{i}"), "a", vec![], None)?;
        }
        assert!(!store.layout().index_file().exists());
        assert_eq!(store.stats()?.unsaved_vectors, 5);
        Ok(())
    }

    #[test]
    fn test_persist_is_idempotent() -> Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp, 10)?;
        store.record("a", "1", vec![], None)?;

        store.persist()?;
        store.persist()?;
        drop(store);

        let reopened = open_store(&temp, 10)?;
        assert_eq!(reopened.stats()?.vectors, 1);
        Ok(())
    }

    #[test]
    fn test_retrieve_maps_back_to_turns() -> Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp, 10)?;

        let rust = store.record(
            "Tell me about rust ownership",
            "Ownership moves values",
            vec![],
            None,
        )?;
        store.record("Best banana bread recipe", "Use ripe bananas", vec![], None)?;

        let hits = store.retrieve("rust ownership", 1)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.correlated_id, rust.turn_id);
        assert!(hits[0].similarity > 0.0 && hits[0].similarity <= 1.0);

        assert!(store.retrieve("anything", 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_documents_and_tasks() -> Result<()> {
        let temp = TempDir::new()?;
        let store = open_store(&temp, 10)?;

        store.upsert_document("/tmp/a.pdf", Some("first".into()))?;
        let doc = store.upsert_document("/tmp/a.pdf", Some("second".into()))?;
        assert_eq!(doc.file_name, "a.pdf");
        assert_eq!(store.documents()?.len(), 1);
        assert_eq!(
            store.document("/tmp/a.pdf")?.and_then(|d| d.summary).as_deref(),
            Some("second")
        );

        store.record_task("read a.pdf", Some("done"), None)?;
        assert_eq!(store.recent_tasks(5)?.len(), 1);
        assert_eq!(store.stats()?.documents, 1);
        Ok(())
    }

    #[test]
    fn test_dangling_vector_reference_is_corrupt() -> Result<()> {
        let temp = TempDir::new()?;
        {
            let store = open_store(&temp, 10)?;
            store.record("a", "1", vec![], None)?;
            store.persist()?;
        }
        let db = StoreLayout::new(temp.path()).database_file();
        for suffix in ["", "-wal", "-shm"] {
            let path = format!("{}{suffix}", db.display());
            if Path::new(&path).exists() {
                std::fs::remove_file(path)?;
            }
        }

        let err = open_store(&temp, 10).err().expect("open should fail");
        assert!(matches!(err, MemoryError::CorruptIndex(_)));
        Ok(())
    }

    #[test]
    fn test_reindex_fills_gaps_below_newest_vector() -> Result<()> {
        let temp = TempDir::new()?;
        {
            let mut config = MemoryConfig::with_data_dir(temp.path());
            config.embedding_dim = 64;
            let store =
                MemoryStore::open(config, Some(Box::new(FlakyEmbedder(HashEmbedder::new(64)))))?;

            store.record("one", "1", vec![], None)?;
            let failed = store.record("FAIL two", "2", vec![], None)?;
            store.record("three", "3", vec![], None)?;
            assert!(!failed.is_indexed());
            assert!(matches!(
                failed.warnings[0],
                MemoryError::EmbeddingUnavailable(_)
            ));

            assert_eq!(store.stats()?.vectors, 2);
            store.persist()?;
        }

        let store = open_store(&temp, 10)?;
        assert_eq!(store.reindex_unindexed()?, 1);
        assert_eq!(store.reindex_unindexed()?, 0);

        let stats = store.stats()?;
        assert_eq!(stats.turns, 3);
        assert_eq!(stats.vectors, 3);

        let mut ids: Vec<i64> = store
            .vectors
            .lock()
            .semantic
            .entries()
            .iter()
            .map(|e| e.correlated_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
        Ok(())
    }
}
