use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::task::{Inputs, Task, TaskOutput};

/// Kickoff log error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Connection failed: {0}")]
    ConnectionError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// One task output of the latest kickoff, as stored for replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickoffRecord {
    pub task_index: usize,
    pub task_id: String,
    pub task_name: String,
    pub expected_output: String,
    pub output: TaskOutput,
    pub inputs: Inputs,
    pub was_replayed: bool,
    pub timestamp: DateTime<Utc>,
}

impl KickoffRecord {
    pub fn new(task_index: usize, task: &Task, output: &TaskOutput, inputs: &Inputs, was_replayed: bool) -> Self {
        Self {
            task_index,
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            expected_output: task.expected_output.clone(),
            output: output.clone(),
            inputs: inputs.clone(),
            was_replayed,
            timestamp: Utc::now(),
        }
    }
}

/// SQLite log of the task outputs of the latest kickoff
pub struct KickoffTaskOutputsStorage {
    pool: sqlx::sqlite::SqlitePool,
}

impl KickoffTaskOutputsStorage {
    pub async fn new(database_path: &Path) -> Result<Self, StorageError> {
        use sqlx::sqlite::SqliteConnectOptions;

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::ConnectionError(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = sqlx::sqlite::SqlitePool::connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS latest_kickoff_task_outputs (
                task_index INTEGER PRIMARY KEY,
                task_id TEXT NOT NULL,
                task_name TEXT NOT NULL,
                expected_output TEXT NOT NULL,
                output TEXT NOT NULL,
                inputs TEXT NOT NULL,
                was_replayed INTEGER NOT NULL,
                timestamp DATETIME NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Forget the previous kickoff
    pub async fn reset(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM latest_kickoff_task_outputs")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn add(&self, record: &KickoffRecord) -> Result<(), StorageError> {
        let output_json = serde_json::to_string(&record.output)?;
        let inputs_json = serde_json::to_string(&record.inputs)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO latest_kickoff_task_outputs
            (task_index, task_id, task_name, expected_output, output, inputs, was_replayed, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.task_index as i64)
        .bind(&record.task_id)
        .bind(&record.task_name)
        .bind(&record.expected_output)
        .bind(output_json)
        .bind(inputs_json)
        .bind(record.was_replayed)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Drop the record at `task_index` and everything after it
    pub async fn delete_from(&self, task_index: usize) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM latest_kickoff_task_outputs WHERE task_index >= ?")
            .bind(task_index as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// All records in task order
    pub async fn load(&self) -> Result<Vec<KickoffRecord>, StorageError> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, String, bool, DateTime<Utc>)>(
            "SELECT task_index, task_id, task_name, expected_output, output, inputs, was_replayed, timestamp
             FROM latest_kickoff_task_outputs ORDER BY task_index ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for (task_index, task_id, task_name, expected_output, output_json, inputs_json, was_replayed, timestamp) in rows {
            records.push(KickoffRecord {
                task_index: task_index as usize,
                task_id,
                task_name,
                expected_output,
                output: serde_json::from_str(&output_json)?,
                inputs: serde_json::from_str(&inputs_json)?,
                was_replayed,
                timestamp,
            });
        }
        Ok(records)
    }
}
