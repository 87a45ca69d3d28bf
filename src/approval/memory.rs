//! In-memory approval store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{KairosError, Result};
use crate::types::{ApprovalRecord, ApprovalStatus};

use super::{matches_filter, ApprovalFilter, ApprovalStore};

/// In-memory [`ApprovalStore`] backed by a `HashMap`.
pub struct InMemoryApprovalStore {
    records: RwLock<HashMap<String, ApprovalRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryApprovalStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn missing(approval_id: &str) -> KairosError {
        KairosError::not_found(format!("approval {:?} not found", approval_id))
    }
}

impl Default for InMemoryApprovalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn create(&self, mut record: ApprovalRecord) -> Result<ApprovalRecord> {
        let now = self.clock.now();
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        if record.created_at == chrono::DateTime::UNIX_EPOCH {
            record.created_at = now;
        }
        if record.updated_at == chrono::DateTime::UNIX_EPOCH {
            record.updated_at = now;
        }

        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record.clone());
        debug!(approval_id = %record.id, task_id = %record.task_id, "approval created");
        Ok(record)
    }

    async fn get(&self, approval_id: &str) -> Result<ApprovalRecord> {
        let records = self.records.read().await;
        records
            .get(approval_id)
            .cloned()
            .ok_or_else(|| Self::missing(approval_id))
    }

    async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<ApprovalRecord> = records
            .values()
            .filter(|record| matches_filter(record, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn update_status(
        &self,
        approval_id: &str,
        status: ApprovalStatus,
        reason: &str,
    ) -> Result<ApprovalRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(approval_id)
            .ok_or_else(|| Self::missing(approval_id))?;

        if record.status != ApprovalStatus::Pending {
            return Err(KairosError::failed_precondition(format!(
                "approval {} is already {}",
                approval_id, record.status
            )));
        }

        record.status = status;
        record.reason = reason.to_string();
        record.updated_at = self.clock.now();
        debug!(approval_id = %approval_id, status = %status, "approval resolved");
        Ok(record.clone())
    }
}
