//! Conversation log using SQLite
//!
//! SQLite is the source of truth for conversation history. Every write is
//! its own committed transaction with `synchronous=FULL`, so a turn survives a
//! crash as soon as `append` returns. WAL mode lets the reader connection serve
//! queries while the writer holds a transaction.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;
use crate::storage::types::{DocumentRecord, NewTurn, TaskRecord, Turn};

const TURN_COLUMNS: &str = "id, timestamp, user_text, agent_text, tools_used, metadata";

/// Durable append-only store of turns, documents and tasks
pub struct TurnLog {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl TurnLog {
    /// Open or create the log at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = Connection::open(path)?;
        writer.busy_timeout(Duration::from_secs(5))?;
        let mode: String = writer.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        writer.pragma_update(None, "synchronous", "FULL")?;
        Self::init_schema(&writer)?;

        let reader = Connection::open(path)?;
        reader.busy_timeout(Duration::from_secs(5))?;

        debug!(path = %path.display(), journal_mode = %mode, "Opened turn log");

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    /// Initialize SQLite schema
    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                user_text TEXT NOT NULL,
                agent_text TEXT NOT NULL,
                tools_used TEXT,
                metadata TEXT
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT UNIQUE NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT,
                processed_date TEXT,
                summary TEXT
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT,
                result TEXT
            );",
        )?;

        Ok(())
    }

    /// Append a turn and return its id
    ///
    /// Ids come from `AUTOINCREMENT`, so they are never reused.
    pub fn append(&self, turn: &NewTurn) -> Result<i64> {
        let tools_json = serde_json::to_string(&turn.tools_used)?;
        let metadata_json = turn
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO conversations (timestamp, user_text, agent_text, tools_used, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
            params![
                turn.timestamp,
                &turn.user_text,
                &turn.agent_text,
                tools_json,
                metadata_json,
            ],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(id)
    }

    /// The `limit` most recent turns, oldest first
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Turn>> {
        let conn = self.reader.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TURN_COLUMNS} FROM conversations ORDER BY id DESC LIMIT ?1"
        ))?;

        let mut turns = stmt
            .query_map(params![limit as i64], turn_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        turns.reverse();

        Ok(turns)
    }

    /// Every turn id in the log, ascending
    pub fn turn_ids(&self) -> Result<Vec<i64>> {
        let conn = self.reader.lock();
        let mut stmt = conn.prepare("SELECT id FROM conversations ORDER BY id ASC")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;

        Ok(ids)
    }

    pub fn get_turn(&self, id: i64) -> Result<Option<Turn>> {
        let conn = self.reader.lock();
        let turn = conn
            .query_row(
                &format!("SELECT {TURN_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                turn_from_row,
            )
            .optional()?;

        Ok(turn)
    }

    pub fn count_turns(&self) -> Result<usize> {
        let count: i64 = self
            .reader
            .lock()
            .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Highest id handed out so far, if any turn exists
    pub fn max_turn_id(&self) -> Result<Option<i64>> {
        let id: Option<i64> = self
            .reader
            .lock()
            .query_row("SELECT MAX(id) FROM conversations", [], |row| row.get(0))?;
        Ok(id)
    }

    /// Insert or replace the registration for `record.file_path`
    pub fn upsert_document(&self, record: &DocumentRecord) -> Result<()> {
        self.writer.lock().execute(
            "INSERT INTO documents (file_path, file_name, file_type, processed_date, summary)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_path) DO UPDATE SET
                file_name = excluded.file_name,
                file_type = excluded.file_type,
                processed_date = excluded.processed_date,
                summary = excluded.summary",
            params![
                &record.file_path,
                &record.file_name,
                &record.file_type,
                record.processed_date,
                &record.summary,
            ],
        )?;

        Ok(())
    }

    pub fn get_document(&self, file_path: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.reader.lock();
        let doc = conn
            .query_row(
                "SELECT file_path, file_name, file_type, processed_date, summary
                 FROM documents WHERE file_path = ?1",
                params![file_path],
                document_from_row,
            )
            .optional()?;

        Ok(doc)
    }

    /// Registered documents, most recently processed first
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.reader.lock();
        let mut stmt = conn.prepare(
            "SELECT file_path, file_name, file_type, processed_date, summary
             FROM documents ORDER BY processed_date DESC, id DESC",
        )?;

        let docs = stmt
            .query_map([], document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(docs)
    }

    pub fn count_documents(&self) -> Result<usize> {
        let count: i64 = self
            .reader
            .lock()
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Record a task/action outcome
    pub fn append_task(
        &self,
        description: &str,
        status: Option<&str>,
        result: Option<&str>,
    ) -> Result<i64> {
        let id: i64 = self.writer.lock().query_row(
            "INSERT INTO tasks (timestamp, description, status, result)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
            params![Utc::now(), description, status, result],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    /// The `limit` most recent tasks, oldest first
    pub fn list_recent_tasks(&self, limit: usize) -> Result<Vec<TaskRecord>> {
        let conn = self.reader.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, description, status, result
             FROM tasks ORDER BY id DESC LIMIT ?1",
        )?;

        let mut tasks = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TaskRecord {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    description: row.get(2)?,
                    status: row.get(3)?,
                    result: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        tasks.reverse();

        Ok(tasks)
    }
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn turn_from_row(row: &Row) -> rusqlite::Result<Turn> {
    let timestamp: DateTime<Utc> = row.get(1)?;
    let tools_used: Option<Vec<String>> = json_column(row, 4)?;
    let metadata: Option<BTreeMap<String, String>> = json_column(row, 5)?;

    Ok(Turn {
        id: row.get(0)?,
        timestamp,
        user_text: row.get(2)?,
        agent_text: row.get(3)?,
        tools_used: tools_used.unwrap_or_default(),
        metadata,
    })
}

fn document_from_row(row: &Row) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        file_path: row.get(0)?,
        file_name: row.get(1)?,
        file_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        processed_date: row.get(3)?,
        summary: row.get(4)?,
    })
}
