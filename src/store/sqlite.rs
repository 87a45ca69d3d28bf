//! Durable task store on SQLite.
//!
//! Rows are keyed by task id with indexed `context_id`, `status_state`, and
//! `updated_at` columns for filtering; the task body itself is stored as
//! serialized JSON, which stays the source of truth. The schema is created
//! idempotently on first use. Composite read-modify-write operations run in
//! transactions so concurrent writers serialize per task.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{KairosError, Result};
use crate::types::{Artifact, Message, Task, TaskPage, TaskState, TaskStatus};

use super::{
    apply_view, cancelled_task, check_mutable, decode_page_token, encode_page_token, new_task,
    prepare_history_append, touch, TaskFilter, TaskStore,
};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS tasks (
    id           TEXT PRIMARY KEY,
    context_id   TEXT NOT NULL,
    status_state INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL,
    task_json    BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_context_id ON tasks(context_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status_state ON tasks(status_state);
CREATE INDEX IF NOT EXISTS idx_tasks_updated_at ON tasks(updated_at);
";

/// Durable [`TaskStore`] backed by SQLite.
pub struct SqliteTaskStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open (and create if missing) a database at `url`, e.g.
    /// `sqlite:kairos.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| KairosError::storage("connect", "-", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // An in-memory database exists per connection; cap the pool at one
        // so every caller sees the same database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| KairosError::storage("connect", "-", e))?;

        Self::with_pool(pool, Arc::new(SystemClock)).await
    }

    /// Wrap an existing pool with an injected clock. Creates the schema
    /// idempotently.
    pub async fn with_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| KairosError::storage("init_schema", "-", e))?;
        Ok(Self { pool, clock })
    }

    fn missing(task_id: &str) -> KairosError {
        KairosError::not_found(format!("task {:?} not found", task_id))
            .with_context("task_id", task_id)
    }

    fn decode(task_id: &str, json: &[u8]) -> Result<Task> {
        serde_json::from_slice(json).map_err(|e| KairosError::storage("decode_task", task_id, e))
    }

    async fn load_for_update(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        task_id: &str,
    ) -> Result<Task> {
        let row = sqlx::query("SELECT task_json FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| KairosError::storage("load_task", task_id, e))?
            .ok_or_else(|| Self::missing(task_id))?;
        let json: Vec<u8> = row
            .try_get("task_json")
            .map_err(|e| KairosError::storage("load_task", task_id, e))?;
        Self::decode(task_id, &json)
    }

    async fn persist(tx: &mut sqlx::Transaction<'_, Sqlite>, task: &Task) -> Result<()> {
        let json = serde_json::to_vec(task)
            .map_err(|e| KairosError::storage("encode_task", &task.id, e))?;
        sqlx::query(
            "INSERT INTO tasks (id, context_id, status_state, updated_at, task_json) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             context_id = excluded.context_id, \
             status_state = excluded.status_state, \
             updated_at = excluded.updated_at, \
             task_json = excluded.task_json",
        )
        .bind(&task.id)
        .bind(&task.context_id)
        .bind(task.status.state.code())
        .bind(task.updated_at.timestamp_millis())
        .bind(json)
        .execute(&mut **tx)
        .await
        .map_err(|e| KairosError::storage("persist_task", &task.id, e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'_, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| KairosError::storage("begin_tx", "-", e))
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TaskFilter) {
        let mut separator = " WHERE ";
        if let Some(context_id) = &filter.context_id {
            builder.push(separator).push("context_id = ").push_bind(context_id.clone());
            separator = " AND ";
        }
        if let Some(state) = filter.status {
            builder.push(separator).push("status_state = ").push_bind(state.code());
            separator = " AND ";
        }
        if let Some(after) = filter.last_updated_after {
            builder
                .push(separator)
                .push("updated_at > ")
                .push_bind(after.timestamp_millis());
        }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create_task(&self, message: Message) -> Result<Task> {
        let task = new_task(message, self.clock.now())?;
        let mut tx = self.begin().await?;
        Self::persist(&mut tx, &task).await?;
        tx.commit()
            .await
            .map_err(|e| KairosError::storage("create_task", &task.id, e))?;
        debug!(task_id = %task.id, context_id = %task.context_id, "task created");
        Ok(task)
    }

    async fn append_history(&self, task_id: &str, message: Message) -> Result<Task> {
        let mut tx = self.begin().await?;
        let mut task = Self::load_for_update(&mut tx, task_id).await?;
        check_mutable(&task)?;
        let message = prepare_history_append(&task, message)?;
        task.history.get_or_insert_with(Vec::new).push(message);
        touch(&mut task, self.clock.now());
        Self::persist(&mut tx, &task).await?;
        tx.commit()
            .await
            .map_err(|e| KairosError::storage("append_history", task_id, e))?;
        Ok(task)
    }

    async fn update_status(&self, task_id: &str, mut status: TaskStatus) -> Result<Task> {
        let mut tx = self.begin().await?;
        let mut task = Self::load_for_update(&mut tx, task_id).await?;

        if task.status.state.is_terminal() {
            if task.status.state == TaskState::Cancelled && status.state == TaskState::Cancelled {
                return Ok(task);
            }
            return Err(KairosError::failed_precondition(format!(
                "task {} is in terminal state {}",
                task.id, task.status.state
            ))
            .with_context("task_id", task.id.clone()));
        }

        let now = self.clock.now();
        if status.timestamp.is_none() {
            status.timestamp = Some(now.to_rfc3339());
        }
        task.status = status;
        touch(&mut task, now);
        Self::persist(&mut tx, &task).await?;
        tx.commit()
            .await
            .map_err(|e| KairosError::storage("update_status", task_id, e))?;
        debug!(task_id = %task.id, state = %task.status.state, "status updated");
        Ok(task)
    }

    async fn add_artifacts(&self, task_id: &str, artifacts: Vec<Artifact>) -> Result<Task> {
        let mut tx = self.begin().await?;
        let mut task = Self::load_for_update(&mut tx, task_id).await?;
        check_mutable(&task)?;
        task.artifacts.get_or_insert_with(Vec::new).extend(artifacts);
        touch(&mut task, self.clock.now());
        Self::persist(&mut tx, &task).await?;
        tx.commit()
            .await
            .map_err(|e| KairosError::storage("add_artifacts", task_id, e))?;
        Ok(task)
    }

    async fn get_task(
        &self,
        task_id: &str,
        history_length: u32,
        include_artifacts: bool,
    ) -> Result<Task> {
        let row = sqlx::query("SELECT task_json FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KairosError::storage("get_task", task_id, e))?
            .ok_or_else(|| Self::missing(task_id))?;
        let json: Vec<u8> = row
            .try_get("task_json")
            .map_err(|e| KairosError::storage("get_task", task_id, e))?;
        let mut task = Self::decode(task_id, &json)?;
        apply_view(&mut task, history_length, include_artifacts);
        Ok(task)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage> {
        let offset = match &filter.page_token {
            Some(token) => decode_page_token(token)?,
            None => 0,
        };
        let page_size = filter.effective_page_size();

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) AS total FROM tasks");
        Self::push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| KairosError::storage("list_tasks", "-", e))?
            .try_get("total")
            .map_err(|e| KairosError::storage("list_tasks", "-", e))?;

        let mut page_query = QueryBuilder::new("SELECT task_json FROM tasks");
        Self::push_filters(&mut page_query, filter);
        page_query
            .push(" ORDER BY updated_at DESC, id ASC LIMIT ")
            .push_bind(page_size as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows = page_query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KairosError::storage("list_tasks", "-", e))?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let json: Vec<u8> = row
                .try_get("task_json")
                .map_err(|e| KairosError::storage("list_tasks", "-", e))?;
            let mut task = Self::decode("-", &json)?;
            apply_view(&mut task, filter.history_length, filter.include_artifacts);
            tasks.push(task);
        }

        let next_page_token = if offset + tasks.len() < total as usize {
            Some(encode_page_token(offset + tasks.len()))
        } else {
            None
        };

        Ok(TaskPage {
            tasks,
            total_size: total as i32,
            page_size: page_size as i32,
            next_page_token,
        })
    }

    async fn cancel_task(&self, task_id: &str) -> Result<Task> {
        let mut tx = self.begin().await?;
        let task = Self::load_for_update(&mut tx, task_id).await?;

        match cancelled_task(&task, self.clock.as_ref()) {
            Some(cancelled) => {
                Self::persist(&mut tx, &cancelled).await?;
                tx.commit()
                    .await
                    .map_err(|e| KairosError::storage("cancel_task", task_id, e))?;
                debug!(task_id = %task_id, "task cancelled");
                Ok(cancelled)
            }
            None => Ok(task),
        }
    }

    async fn delete_task(&self, task_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| KairosError::storage("delete_task", task_id, e))?;
        Ok(())
    }
}
