//! Session checkpoints taken at the human-review boundary.
//!
//! A checkpoint is the whole [`ResearchState`] serialized as one JSON
//! document. [`SqliteCheckpointStore`] keeps one row per session in a local
//! libsql database; [`InMemoryCheckpointStore`] backs tests and one-shot runs.

use crate::research::state::{ResearchState, Stage};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libsql::{Builder, Connection};
use parking_lot::RwLock;
use std::collections::HashMap;

/// One line of `sessions` output.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub question: String,
    pub stage: Stage,
    pub iteration: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&ResearchState> for SessionSummary {
    fn from(state: &ResearchState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            question: state.question.clone(),
            stage: state.stage,
            iteration: state.iteration,
            updated_at: state.updated_at,
        }
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Insert or overwrite the checkpoint for `state.session_id`.
    async fn save(&self, state: &ResearchState) -> Result<()>;

    async fn load(&self, session_id: &str) -> Result<Option<ResearchState>>;

    /// All sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>>;

    async fn delete(&self, session_id: &str) -> Result<()>;
}

fn db_err(context: &str) -> impl Fn(libsql::Error) -> AppError + '_ {
    move |e| AppError::Checkpoint(format!("{}: {}", context, e))
}

pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Open a database file (or `:memory:`) and make sure the schema exists.
    pub async fn open(path: &str) -> Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        AppError::Checkpoint(format!("Failed to create checkpoint directory: {}", e))
                    })?;
                }
            }
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(db_err("Failed to open checkpoint database"))?;
        // An in-memory database lives as long as its connection, so keep one.
        let conn = db.connect().map_err(db_err("Failed to get connection"))?;

        let store = Self { conn };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS checkpoints (
                    session_id TEXT PRIMARY KEY,
                    question TEXT NOT NULL,
                    stage TEXT NOT NULL,
                    iteration INTEGER NOT NULL,
                    state TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                (),
            )
            .await
            .map_err(db_err("Failed to create checkpoints table"))?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, state: &ResearchState) -> Result<()> {
        let document = serde_json::to_string(state)
            .map_err(|e| AppError::Checkpoint(format!("Failed to serialize state: {}", e)))?;

        self.conn
            .execute(
                "INSERT INTO checkpoints (session_id, question, stage, iteration, state, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(session_id) DO UPDATE SET
                    stage = excluded.stage,
                    iteration = excluded.iteration,
                    state = excluded.state,
                    updated_at = excluded.updated_at",
                (
                    state.session_id.as_str(),
                    state.question.as_str(),
                    state.stage.name(),
                    i64::from(state.iteration),
                    document,
                    state.updated_at.timestamp_millis(),
                ),
            )
            .await
            .map_err(db_err("Failed to save checkpoint"))?;

        tracing::debug!(session_id = %state.session_id, stage = %state.stage, "Checkpoint saved");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ResearchState>> {
        let mut rows = self
            .conn
            .query(
                "SELECT state FROM checkpoints WHERE session_id = ?",
                [session_id],
            )
            .await
            .map_err(db_err("Failed to query checkpoint"))?;

        let Some(row) = rows.next().await.map_err(db_err("Failed to read row"))? else {
            return Ok(None);
        };

        let document: String = row.get(0).map_err(db_err("Failed to read state column"))?;
        let state = serde_json::from_str(&document)
            .map_err(|e| AppError::Checkpoint(format!("Corrupt checkpoint '{}': {}", session_id, e)))?;
        Ok(Some(state))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT session_id, question, stage, iteration, updated_at
                 FROM checkpoints ORDER BY updated_at DESC",
                (),
            )
            .await
            .map_err(db_err("Failed to list checkpoints"))?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err("Failed to read row"))? {
            let stage: String = row.get(2).map_err(db_err("Failed to read stage"))?;
            let stage = serde_json::from_value(serde_json::Value::String(stage.clone()))
                .map_err(|_| AppError::Checkpoint(format!("Unknown stage '{}'", stage)))?;
            let iteration: i64 = row.get(3).map_err(db_err("Failed to read iteration"))?;
            let updated_at: i64 = row.get(4).map_err(db_err("Failed to read timestamp"))?;

            sessions.push(SessionSummary {
                session_id: row.get(0).map_err(db_err("Failed to read session id"))?,
                question: row.get(1).map_err(db_err("Failed to read question"))?,
                stage,
                iteration: u32::try_from(iteration).unwrap_or(0),
                updated_at: Utc
                    .timestamp_millis_opt(updated_at)
                    .single()
                    .unwrap_or_else(Utc::now),
            });
        }
        Ok(sessions)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM checkpoints WHERE session_id = ?", [session_id])
            .await
            .map_err(db_err("Failed to delete checkpoint"))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<String, ResearchState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &ResearchState) -> Result<()> {
        self.states
            .write()
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<ResearchState>> {
        Ok(self.states.read().get(session_id).cloned())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut sessions: Vec<SessionSummary> =
            self.states.read().values().map(SessionSummary::from).collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.states.write().remove(session_id);
        Ok(())
    }
}
