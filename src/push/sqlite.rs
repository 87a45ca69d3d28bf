//! Durable push config store on SQLite.
//!
//! Composite primary key `(task_id, config_id)`; the config body is stored
//! as serialized JSON.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

use crate::error::{KairosError, Result};
use crate::types::TaskPushNotificationConfig;

use super::{effective_list_size, PushConfigStore};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS push_configs (
    task_id     TEXT NOT NULL,
    config_id   TEXT NOT NULL,
    config_json BLOB NOT NULL,
    PRIMARY KEY (task_id, config_id)
);
";

/// Durable [`PushConfigStore`] backed by SQLite.
pub struct SqlitePushConfigStore {
    pool: SqlitePool,
}

impl SqlitePushConfigStore {
    /// Open (and create if missing) a database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| KairosError::storage("connect", "-", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| KairosError::storage("connect", "-", e))?;

        Self::with_pool(pool).await
    }

    /// Wrap an existing pool. Creates the schema idempotently.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| KairosError::storage("init_schema", "-", e))?;
        Ok(Self { pool })
    }

    fn missing(task_id: &str, config_id: &str) -> KairosError {
        KairosError::not_found(format!(
            "push config {:?} not found for task {:?}",
            config_id, task_id
        ))
        .with_context("task_id", task_id)
    }

    fn decode(json: &[u8]) -> Result<TaskPushNotificationConfig> {
        serde_json::from_slice(json).map_err(|e| KairosError::storage("decode_push_config", "-", e))
    }
}

#[async_trait]
impl PushConfigStore for SqlitePushConfigStore {
    async fn set(&self, config: TaskPushNotificationConfig) -> Result<TaskPushNotificationConfig> {
        let config_id = config
            .push_notification_config
            .id
            .clone()
            .ok_or_else(|| KairosError::internal("push config id must be assigned before set"))?;
        let json = serde_json::to_vec(&config)
            .map_err(|e| KairosError::storage("set_push_config", &config.task_id, e))?;

        sqlx::query(
            "INSERT INTO push_configs (task_id, config_id, config_json) VALUES (?, ?, ?) \
             ON CONFLICT(task_id, config_id) DO UPDATE SET config_json = excluded.config_json",
        )
        .bind(&config.task_id)
        .bind(&config_id)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| KairosError::storage("set_push_config", &config.task_id, e))?;

        debug!(task_id = %config.task_id, config_id = %config_id, "push config set");
        Ok(config)
    }

    async fn get(&self, task_id: &str, config_id: &str) -> Result<TaskPushNotificationConfig> {
        let row = sqlx::query(
            "SELECT config_json FROM push_configs WHERE task_id = ? AND config_id = ?",
        )
        .bind(task_id)
        .bind(config_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KairosError::storage("get_push_config", task_id, e))?
        .ok_or_else(|| Self::missing(task_id, config_id))?;

        let json: Vec<u8> = row
            .try_get("config_json")
            .map_err(|e| KairosError::storage("get_push_config", task_id, e))?;
        Self::decode(&json)
    }

    async fn list(
        &self,
        task_id: &str,
        page_size: usize,
    ) -> Result<Vec<TaskPushNotificationConfig>> {
        let rows = sqlx::query(
            "SELECT config_json FROM push_configs WHERE task_id = ? \
             ORDER BY config_id ASC LIMIT ?",
        )
        .bind(task_id)
        .bind(effective_list_size(page_size) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KairosError::storage("list_push_configs", task_id, e))?;

        rows.iter()
            .map(|row| {
                let json: Vec<u8> = row
                    .try_get("config_json")
                    .map_err(|e| KairosError::storage("list_push_configs", task_id, e))?;
                Self::decode(&json)
            })
            .collect()
    }

    async fn delete(&self, task_id: &str, config_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM push_configs WHERE task_id = ? AND config_id = ?")
            .bind(task_id)
            .bind(config_id)
            .execute(&self.pool)
            .await
            .map_err(|e| KairosError::storage("delete_push_config", task_id, e))?;

        if result.rows_affected() == 0 {
            return Err(Self::missing(task_id, config_id));
        }
        Ok(())
    }

    async fn delete_for_task(&self, task_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM push_configs WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| KairosError::storage("delete_push_configs", task_id, e))?;
        Ok(())
    }
}
