//! Storage for memoria: a SQLite turn log next to a USearch vector index
//!
//! The log is durable on every write. The vector index lives in memory
//! and reaches disk on batched flushes or an explicit persist.
//!
//! # Architecture
//!
//! [`TurnLog`] owns the SQLite file. [`SemanticIndex`] owns the vector index
//! and its metadata sidecar. The coordinator in `crate::memory` correlates them
//! through `VectorEntry::correlated_id`.
//!
//! # Example
//!
//! ```no_run
//! use memoria::storage::{NewTurn, TurnLog};
//!
//! let log = TurnLog::open("./data/memory/memory.db")?;
//! let id = log.append(&NewTurn::new("hello", "hi there"))?;
//! # Ok::<(), memoria::MemoryError>(())
//! ```

pub mod semantic;
pub mod turn_log;
pub mod types;
pub mod vector_index;

pub use semantic::SemanticIndex;
pub use turn_log::TurnLog;
pub use types::{
    exchange_text, DocumentRecord, EntryKind, NewTurn, ScoredEntry, TaskRecord, Turn, VectorEntry,
};
pub use vector_index::VectorIndex;
