//! In-memory task store.
//!
//! A keyed map behind a single readers-writer lock. Listing snapshots the
//! map and sorts in memory, so pagination is stable for a fixed snapshot.
//! Suitable for development, tests, and short-lived deployments; all data is
//! lost when the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{KairosError, Result};
use crate::types::{Artifact, Message, Task, TaskPage, TaskStatus};

use super::{
    apply_view, cancelled_task, check_mutable, decode_page_token, encode_page_token, new_task,
    prepare_history_append, touch, TaskFilter, TaskStore,
};

/// In-memory [`TaskStore`] backed by a `HashMap`.
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, Task>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on an injected clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            clock,
        }
    }

    fn missing(task_id: &str) -> KairosError {
        KairosError::not_found(format!("task {:?} not found", task_id))
            .with_context("task_id", task_id)
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, message: Message) -> Result<Task> {
        let task = new_task(message, self.clock.now())?;
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.clone(), task.clone());
        debug!(task_id = %task.id, context_id = %task.context_id, "task created");
        Ok(task)
    }

    async fn append_history(&self, task_id: &str, message: Message) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id).ok_or_else(|| Self::missing(task_id))?;
        check_mutable(task)?;
        let message = prepare_history_append(task, message)?;
        task.history.get_or_insert_with(Vec::new).push(message);
        touch(task, self.clock.now());
        Ok(task.clone())
    }

    async fn update_status(&self, task_id: &str, mut status: TaskStatus) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id).ok_or_else(|| Self::missing(task_id))?;

        if task.status.state.is_terminal() {
            // Cancelled -> Cancelled is an idempotent no-op.
            if task.status.state == crate::types::TaskState::Cancelled
                && status.state == crate::types::TaskState::Cancelled
            {
                return Ok(task.clone());
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
        touch(task, now);
        debug!(task_id = %task.id, state = %task.status.state, "status updated");
        Ok(task.clone())
    }

    async fn add_artifacts(&self, task_id: &str, artifacts: Vec<Artifact>) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id).ok_or_else(|| Self::missing(task_id))?;
        check_mutable(task)?;
        task.artifacts.get_or_insert_with(Vec::new).extend(artifacts);
        touch(task, self.clock.now());
        Ok(task.clone())
    }

    async fn get_task(
        &self,
        task_id: &str,
        history_length: u32,
        include_artifacts: bool,
    ) -> Result<Task> {
        let tasks = self.tasks.read().await;
        let mut task = tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| Self::missing(task_id))?;
        apply_view(&mut task, history_length, include_artifacts);
        Ok(task)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage> {
        let offset = match &filter.page_token {
            Some(token) => decode_page_token(token)?,
            None => 0,
        };
        let page_size = filter.effective_page_size();

        let tasks = self.tasks.read().await;
        let mut matching: Vec<Task> = tasks
            .values()
            .filter(|task| {
                filter
                    .context_id
                    .as_ref()
                    .is_none_or(|ctx| task.context_id == *ctx)
                    && filter.status.is_none_or(|state| task.status.state == state)
                    && filter
                        .last_updated_after
                        .is_none_or(|after| task.updated_at > after)
            })
            .cloned()
            .collect();
        drop(tasks);

        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len();
        let mut page: Vec<Task> = matching
            .into_iter()
            .skip(offset)
            .take(page_size)
            .collect();
        for task in &mut page {
            apply_view(task, filter.history_length, filter.include_artifacts);
        }

        let next_page_token = if offset + page.len() < total {
            Some(encode_page_token(offset + page.len()))
        } else {
            None
        };

        Ok(TaskPage {
            tasks: page,
            total_size: total as i32,
            page_size: page_size as i32,
            next_page_token,
        })
    }

    async fn cancel_task(&self, task_id: &str) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id).ok_or_else(|| Self::missing(task_id))?;

        match cancelled_task(task, self.clock.as_ref()) {
            Some(cancelled) => {
                *task = cancelled;
                debug!(task_id = %task.id, "task cancelled");
                Ok(task.clone())
            }
            None => Ok(task.clone()),
        }
    }

    async fn delete_task(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(task_id).is_some() {
            debug!(task_id = %task_id, "task deleted");
        }
        Ok(())
    }
}
