//! Push notification config persistence.
//!
//! Configs are keyed by `(task_id, config_id)` and owned by their task: when
//! the task goes away, so do its configs. `set` is an upsert; listing sorts
//! by config id and caps at a page size without tokens.

mod memory;
mod sqlite;

pub use memory::InMemoryPushConfigStore;
pub use sqlite::SqlitePushConfigStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::TaskPushNotificationConfig;

/// Default number of configs per listing.
pub const DEFAULT_LIST_SIZE: usize = 50;

/// Contract for persisting push notification configs.
#[async_trait]
pub trait PushConfigStore: Send + Sync {
    /// Insert or replace a config. The config id must already be assigned.
    async fn set(&self, config: TaskPushNotificationConfig) -> Result<TaskPushNotificationConfig>;

    /// Fetch a config; not-found when absent.
    async fn get(&self, task_id: &str, config_id: &str) -> Result<TaskPushNotificationConfig>;

    /// List a task's configs ordered by config id, capped at `page_size`
    /// (`0` falls back to [`DEFAULT_LIST_SIZE`]).
    async fn list(&self, task_id: &str, page_size: usize)
        -> Result<Vec<TaskPushNotificationConfig>>;

    /// Delete a config; not-found when absent.
    async fn delete(&self, task_id: &str, config_id: &str) -> Result<()>;

    /// Drop every config owned by a task. Used when the task is deleted.
    async fn delete_for_task(&self, task_id: &str) -> Result<()>;
}

pub(crate) fn effective_list_size(page_size: usize) -> usize {
    if page_size == 0 {
        DEFAULT_LIST_SIZE
    } else {
        page_size
    }
}
