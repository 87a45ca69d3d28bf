//! Durable approval store on SQLite.
//!
//! One row per record; the captured message is stored as serialized JSON.
//! `expires_at` is epoch milliseconds with `0` meaning "no expiry", so the
//! sweeper's `expiring_before` predicate is a single indexed range check.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{KairosError, Result};
use crate::types::{ApprovalRecord, ApprovalStatus, Message};

use super::{ApprovalFilter, ApprovalStore};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS approvals (
    id           TEXT PRIMARY KEY,
    task_id      TEXT NOT NULL,
    context_id   TEXT NOT NULL,
    status       TEXT NOT NULL,
    reason       TEXT NOT NULL,
    created_at   INTEGER NOT NULL,
    updated_at   INTEGER NOT NULL,
    message_json BLOB NOT NULL,
    expires_at   INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_approvals_task_id ON approvals(task_id);
CREATE INDEX IF NOT EXISTS idx_approvals_status ON approvals(status);
CREATE INDEX IF NOT EXISTS idx_approvals_expires_at ON approvals(expires_at);
";

/// Durable [`ApprovalStore`] backed by SQLite.
pub struct SqliteApprovalStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteApprovalStore {
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

    fn missing(approval_id: &str) -> KairosError {
        KairosError::not_found(format!("approval {:?} not found", approval_id))
    }

    fn status_from_str(status: &str) -> Result<ApprovalStatus> {
        match status {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(KairosError::internal(format!(
                "unknown approval status {:?} in database",
                other
            ))),
        }
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalRecord> {
        let map_err = |e: sqlx::Error| KairosError::storage("decode_approval", "-", e);

        let status_text: String = row.try_get("status").map_err(map_err)?;
        let message_json: Vec<u8> = row.try_get("message_json").map_err(map_err)?;
        let message: Message = serde_json::from_slice(&message_json)
            .map_err(|e| KairosError::storage("decode_approval", "-", e))?;
        let expires_ms: i64 = row.try_get("expires_at").map_err(map_err)?;

        Ok(ApprovalRecord {
            id: row.try_get("id").map_err(map_err)?,
            task_id: row.try_get("task_id").map_err(map_err)?,
            context_id: row.try_get("context_id").map_err(map_err)?,
            status: Self::status_from_str(&status_text)?,
            reason: row.try_get("reason").map_err(map_err)?,
            created_at: millis_to_datetime(row.try_get("created_at").map_err(map_err)?),
            updated_at: millis_to_datetime(row.try_get("updated_at").map_err(map_err)?),
            expires_at: match expires_ms {
                0 => None,
                ms => Some(millis_to_datetime(ms)),
            },
            message,
        })
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

#[async_trait]
impl ApprovalStore for SqliteApprovalStore {
    async fn create(&self, mut record: ApprovalRecord) -> Result<ApprovalRecord> {
        let now = self.clock.now();
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        if record.created_at == DateTime::UNIX_EPOCH {
            record.created_at = now;
        }
        if record.updated_at == DateTime::UNIX_EPOCH {
            record.updated_at = now;
        }

        let message_json = serde_json::to_vec(&record.message)
            .map_err(|e| KairosError::storage("create_approval", &record.task_id, e))?;

        sqlx::query(
            "INSERT INTO approvals \
             (id, task_id, context_id, status, reason, created_at, updated_at, message_json, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.task_id)
        .bind(&record.context_id)
        .bind(record.status.to_string())
        .bind(&record.reason)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .bind(message_json)
        .bind(record.expires_at.map_or(0, |t| t.timestamp_millis()))
        .execute(&self.pool)
        .await
        .map_err(|e| KairosError::storage("create_approval", &record.task_id, e))?;

        debug!(approval_id = %record.id, task_id = %record.task_id, "approval created");
        Ok(record)
    }

    async fn get(&self, approval_id: &str) -> Result<ApprovalRecord> {
        let row = sqlx::query("SELECT * FROM approvals WHERE id = ?")
            .bind(approval_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KairosError::storage("get_approval", "-", e))?
            .ok_or_else(|| Self::missing(approval_id))?;
        Self::from_row(&row)
    }

    async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRecord>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM approvals");
        let mut separator = " WHERE ";
        if let Some(task_id) = &filter.task_id {
            query.push(separator).push("task_id = ").push_bind(task_id.clone());
            separator = " AND ";
        }
        if let Some(context_id) = &filter.context_id {
            query.push(separator).push("context_id = ").push_bind(context_id.clone());
            separator = " AND ";
        }
        if let Some(status) = filter.status {
            query.push(separator).push("status = ").push_bind(status.to_string());
            separator = " AND ";
        }
        if let Some(before) = filter.expiring_before {
            query
                .push(separator)
                .push("expires_at > 0 AND expires_at <= ")
                .push_bind(before.timestamp_millis());
        }
        query.push(" ORDER BY created_at ASC, id ASC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KairosError::storage("list_approvals", "-", e))?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn update_status(
        &self,
        approval_id: &str,
        status: ApprovalStatus,
        reason: &str,
    ) -> Result<ApprovalRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| KairosError::storage("update_approval", "-", e))?;

        let row = sqlx::query("SELECT * FROM approvals WHERE id = ?")
            .bind(approval_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| KairosError::storage("update_approval", "-", e))?
            .ok_or_else(|| Self::missing(approval_id))?;
        let mut record = Self::from_row(&row)?;

        if record.status != ApprovalStatus::Pending {
            return Err(KairosError::failed_precondition(format!(
                "approval {} is already {}",
                approval_id, record.status
            )));
        }

        record.status = status;
        record.reason = reason.to_string();
        record.updated_at = self.clock.now();

        sqlx::query("UPDATE approvals SET status = ?, reason = ?, updated_at = ? WHERE id = ?")
            .bind(record.status.to_string())
            .bind(&record.reason)
            .bind(record.updated_at.timestamp_millis())
            .bind(approval_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| KairosError::storage("update_approval", "-", e))?;

        tx.commit()
            .await
            .map_err(|e| KairosError::storage("update_approval", "-", e))?;

        debug!(approval_id = %approval_id, status = %status, "approval resolved");
        Ok(record)
    }
}
