//! Approval persistence and expiry.
//!
//! An [`ApprovalRecord`](crate::types::ApprovalRecord) is created when policy
//! defers an action to a human. [`ApprovalStore`] is the persistence
//! contract ([`InMemoryApprovalStore`] and [`SqliteApprovalStore`] both
//! satisfy it); [`ApprovalExpirer`](expirer::ApprovalExpirer) is the
//! background sweeper that rejects stale pending records.

mod expirer;
mod memory;
mod sqlite;

pub use expirer::{ApprovalExpirer, ExpirerConfig, ExpirerHandle, SweepStats};
pub use memory::InMemoryApprovalStore;
pub use sqlite::SqliteApprovalStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{ApprovalRecord, ApprovalStatus};

/// Filter for [`ApprovalStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ApprovalFilter {
    /// Only records gating this task.
    pub task_id: Option<String>,

    /// Only records in this context.
    pub context_id: Option<String>,

    /// Only records in this status.
    pub status: Option<ApprovalStatus>,

    /// Cap on the number of returned records.
    pub limit: Option<usize>,

    /// Only records with a set expiry at or before this instant.
    pub expiring_before: Option<DateTime<Utc>>,
}

/// Contract for persisting approval records.
///
/// Implementations are internally thread-safe and clone on return.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Persist a new record. Assigns the id and timestamps when the caller
    /// left them empty.
    async fn create(&self, record: ApprovalRecord) -> Result<ApprovalRecord>;

    /// Fetch a record by id.
    async fn get(&self, approval_id: &str) -> Result<ApprovalRecord>;

    /// List records matching the filter, ordered by creation time.
    async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRecord>>;

    /// Resolve a pending record. Only `pending -> approved` and
    /// `pending -> rejected` are legal; anything else is a failed
    /// precondition.
    async fn update_status(
        &self,
        approval_id: &str,
        status: ApprovalStatus,
        reason: &str,
    ) -> Result<ApprovalRecord>;
}

/// Whether a record passes the filter predicates. The durable backend
/// expresses the same predicates as SQL clauses.
pub(crate) fn matches_filter(record: &ApprovalRecord, filter: &ApprovalFilter) -> bool {
    filter
        .task_id
        .as_ref()
        .is_none_or(|task_id| record.task_id == *task_id)
        && filter
            .context_id
            .as_ref()
            .is_none_or(|context_id| record.context_id == *context_id)
        && filter.status.is_none_or(|status| record.status == status)
        && filter.expiring_before.is_none_or(|before| {
            record
                .expires_at
                .is_some_and(|expires_at| expires_at <= before)
        })
}
