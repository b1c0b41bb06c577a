//! Records shared by the turn log and the vector index
//!
//! Plain data. Column and file encodings live in `turn_log` and `semantic`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One recorded user/agent exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_text: String,
    pub agent_text: String,
    pub tools_used: Vec<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

/// A turn before the log has assigned its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub timestamp: DateTime<Utc>,
    pub user_text: String,
    pub agent_text: String,
    pub tools_used: Vec<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl NewTurn {
    pub fn new(user_text: impl Into<String>, agent_text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_text: user_text.into(),
            agent_text: agent_text.into(),
            tools_used: vec![],
            metadata: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_used = tools;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn embedding_text(&self) -> String {
        exchange_text(&self.user_text, &self.agent_text)
    }
}

impl Turn {
    pub fn embedding_text(&self) -> String {
        exchange_text(&self.user_text, &self.agent_text)
    }
}

/// Text handed to the embedder for one exchange
pub fn exchange_text(user_text: &str, agent_text: &str) -> String {
    format!("User: {user_text}\nAgent: {agent_text}")
}

/// A document registered by a document tool, keyed by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub processed_date: DateTime<Utc>,
    pub summary: Option<String>,
}

impl DocumentRecord {
    /// Derive name and type from the path; type keeps its leading dot.
    pub fn from_path<P: AsRef<Path>>(path: P, summary: Option<String>) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_type = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            file_path: path.to_string_lossy().into_owned(),
            file_name,
            file_type,
            processed_date: Utc::now(),
            summary,
        }
    }
}

/// Task/action history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub status: Option<String>,
    pub result: Option<String>,
}

/// What a vector was built from
///
/// Serialized as a bare string. Kinds this crate does not produce are kept
/// verbatim so a load/save cycle does not rewrite them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    Conversation,
    Other(String),
}

impl From<String> for EntryKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "conversation" => EntryKind::Conversation,
            _ => EntryKind::Other(kind),
        }
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Conversation => "conversation".to_string(),
            EntryKind::Other(kind) => kind,
        }
    }
}

/// Metadata for one ordinal of the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub ordinal: u64,
    pub kind: EntryKind,
    pub correlated_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// A retrieval hit with its human-readable score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: VectorEntry,
    pub distance: f32,
    pub similarity: f32,
}
