use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use pilot_core::{PersistedMessage, PilotError, Result, Role, SubjectId, ToolCall};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::history::HistoryStore;

fn db_err(e: rusqlite::Error) -> PilotError {
    PilotError::History(e.to_string())
}

/// SQLite-backed history store.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open or create the history database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening history store");
        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;

        Self::init(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_calls TEXT,
                tool_call_id TEXT,
                tool_name TEXT,
                is_error INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_user ON chat_messages(user_id, id);
            ",
        )
        .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored records for a user.
    pub fn count(&self, subject_id: SubjectId) -> Result<usize> {
        let db = self.db.lock();
        let n: i64 = db
            .query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE user_id = ?1",
                [subject_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(n as usize)
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn fetch(&self, subject_id: SubjectId) -> Result<Vec<PersistedMessage>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT role, content, tool_calls, tool_call_id, tool_name, is_error
                 FROM chat_messages WHERE user_id = ?1 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([subject_id], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                let tool_calls: Option<String> = row.get(2)?;
                let tool_call_id: Option<String> = row.get(3)?;
                let tool_name: Option<String> = row.get(4)?;
                let is_error: bool = row.get(5)?;
                Ok((role, content, tool_calls, tool_call_id, tool_name, is_error))
            })
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (role, content, tool_calls, tool_call_id, tool_name, is_error) =
                row.map_err(db_err)?;
            let role: Role = role.parse()?;
            let tool_calls: Vec<ToolCall> = match tool_calls {
                Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                    PilotError::History(format!("corrupt tool_calls column: {e}"))
                })?,
                None => vec![],
            };
            records.push(PersistedMessage {
                role,
                content,
                tool_calls,
                tool_call_id,
                tool_name,
                is_error,
            });
        }
        debug!(subject = subject_id, count = records.len(), "fetched history");
        Ok(records)
    }

    async fn append(&self, subject_id: SubjectId, records: &[PersistedMessage]) -> Result<()> {
        let mut db = self.db.lock();
        // One transaction so a turn's records land together or not at all.
        let tx = db.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chat_messages
                     (user_id, role, content, tool_calls, tool_call_id, tool_name, is_error, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(db_err)?;
            for record in records {
                let tool_calls = if record.tool_calls.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&record.tool_calls)?)
                };
                stmt.execute(rusqlite::params![
                    subject_id,
                    record.role.as_str(),
                    &record.content,
                    tool_calls,
                    &record.tool_call_id,
                    &record.tool_name,
                    record.is_error,
                    Utc::now().to_rfc3339(),
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        debug!(subject = subject_id, count = records.len(), "appended history");
        Ok(())
    }
}
