//! In-memory push config store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{KairosError, Result};
use crate::types::TaskPushNotificationConfig;

use super::{effective_list_size, PushConfigStore};

/// In-memory [`PushConfigStore`] keyed by `(task_id, config_id)`.
#[derive(Default)]
pub struct InMemoryPushConfigStore {
    configs: RwLock<HashMap<(String, String), TaskPushNotificationConfig>>,
}

impl InMemoryPushConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(task_id: &str, config_id: &str) -> KairosError {
        KairosError::not_found(format!(
            "push config {:?} not found for task {:?}",
            config_id, task_id
        ))
        .with_context("task_id", task_id)
    }
}

#[async_trait]
impl PushConfigStore for InMemoryPushConfigStore {
    async fn set(&self, config: TaskPushNotificationConfig) -> Result<TaskPushNotificationConfig> {
        let config_id = config
            .push_notification_config
            .id
            .clone()
            .ok_or_else(|| KairosError::internal("push config id must be assigned before set"))?;
        let mut configs = self.configs.write().await;
        configs.insert((config.task_id.clone(), config_id.clone()), config.clone());
        debug!(task_id = %config.task_id, config_id = %config_id, "push config set");
        Ok(config)
    }

    async fn get(&self, task_id: &str, config_id: &str) -> Result<TaskPushNotificationConfig> {
        let configs = self.configs.read().await;
        configs
            .get(&(task_id.to_string(), config_id.to_string()))
            .cloned()
            .ok_or_else(|| Self::missing(task_id, config_id))
    }

    async fn list(
        &self,
        task_id: &str,
        page_size: usize,
    ) -> Result<Vec<TaskPushNotificationConfig>> {
        let configs = self.configs.read().await;
        let mut matching: Vec<TaskPushNotificationConfig> = configs
            .iter()
            .filter(|((owner, _), _)| owner == task_id)
            .map(|(_, config)| config.clone())
            .collect();
        matching.sort_by(|a, b| {
            a.push_notification_config
                .id
                .cmp(&b.push_notification_config.id)
        });
        matching.truncate(effective_list_size(page_size));
        Ok(matching)
    }

    async fn delete(&self, task_id: &str, config_id: &str) -> Result<()> {
        let mut configs = self.configs.write().await;
        configs
            .remove(&(task_id.to_string(), config_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| Self::missing(task_id, config_id))
    }

    async fn delete_for_task(&self, task_id: &str) -> Result<()> {
        let mut configs = self.configs.write().await;
        configs.retain(|(owner, _), _| owner != task_id);
        Ok(())
    }
}
