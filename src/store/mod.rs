//! Task persistence.
//!
//! [`TaskStore`] is the canonical contract both backends satisfy:
//! [`InMemoryTaskStore`] for development and tests, [`SqliteTaskStore`] for
//! durable deployments. Stores own their tasks outright — every read returns
//! a deep clone, and every write revalidates the lifecycle invariants
//! (terminal tasks are immutable, `updated_at` is monotonic per task).

mod memory;
mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{KairosError, Result};
use crate::types::{Artifact, Message, Task, TaskPage, TaskState, TaskStatus};

/// Default number of tasks per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Filter and view options for [`TaskStore::list_tasks`].
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Only tasks in this context.
    pub context_id: Option<String>,

    /// Only tasks in this state.
    pub status: Option<TaskState>,

    /// Only tasks updated strictly after this instant.
    pub last_updated_after: Option<DateTime<Utc>>,

    /// Page size; `0` falls back to [`DEFAULT_PAGE_SIZE`].
    pub page_size: usize,

    /// Opaque cursor from a previous page.
    pub page_token: Option<String>,

    /// History messages to keep per task; `0` keeps everything.
    pub history_length: u32,

    /// Whether artifacts survive into the returned clones.
    pub include_artifacts: bool,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            context_id: None,
            status: None,
            last_updated_after: None,
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
            history_length: 0,
            include_artifacts: true,
        }
    }
}

impl TaskFilter {
    pub(crate) fn effective_page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }
}

/// Contract for persisting and retrieving tasks.
///
/// Implementations are process-wide singletons, internally thread-safe, and
/// serialize reads/writes per task. All returned tasks are deep clones.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a task in `Submitted` state with the message as its first
    /// history entry. Generates the task id; adopts the message's context id
    /// or generates one.
    async fn create_task(&self, message: Message) -> Result<Task>;

    /// Append a message to a task's history. The message must carry the
    /// task's context id (it is filled in when absent) and a history-unique
    /// message id. Fails on terminal tasks.
    async fn append_history(&self, task_id: &str, message: Message) -> Result<Task>;

    /// Replace a task's status. Stamps the status timestamp when unset and
    /// advances `updated_at`. Fails on terminal tasks, except the idempotent
    /// `Cancelled -> Cancelled` no-op.
    async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<Task>;

    /// Append artifacts atomically, preserving production order. Fails on
    /// terminal tasks.
    async fn add_artifacts(&self, task_id: &str, artifacts: Vec<Artifact>) -> Result<Task>;

    /// Fetch a task. `history_length == 0` keeps the full history, `N > 0`
    /// keeps the most recent N messages. `include_artifacts == false` strips
    /// artifacts from the clone.
    async fn get_task(
        &self,
        task_id: &str,
        history_length: u32,
        include_artifacts: bool,
    ) -> Result<Task>;

    /// List tasks ordered `updated_at DESC, id ASC` with offset pagination.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<TaskPage>;

    /// Cancel a task. Idempotent on `Cancelled`; a no-op returning the
    /// current task on other terminal states; otherwise transitions to
    /// `Cancelled`, keeping the current status message as the cancellation
    /// message.
    async fn cancel_task(&self, task_id: &str) -> Result<Task>;

    /// Remove a task. Succeeds silently when absent.
    async fn delete_task(&self, task_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Shared backend helpers
// ---------------------------------------------------------------------------

/// Validate the structural message invariants shared by create and append.
pub(crate) fn validate_message(message: &Message) -> Result<()> {
    if message.message_id.is_empty() {
        return Err(KairosError::invalid_input("message id must not be empty"));
    }
    if message.parts.is_empty() {
        return Err(KairosError::invalid_input("message parts must not be empty"));
    }
    Ok(())
}

/// Build a fresh `Submitted` task from an initial message.
pub(crate) fn new_task(mut message: Message, now: DateTime<Utc>) -> Result<Task> {
    validate_message(&message)?;

    let task_id = Uuid::new_v4().to_string();
    let context_id = message
        .context_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    message.task_id = Some(task_id.clone());
    message.context_id = Some(context_id.clone());

    Ok(Task {
        id: task_id,
        context_id,
        kind: "task".to_string(),
        status: TaskStatus {
            state: TaskState::Submitted,
            message: None,
            timestamp: Some(now.to_rfc3339()),
        },
        artifacts: None,
        history: Some(vec![message]),
        updated_at: now,
        metadata: None,
    })
}

/// Validate and adopt a history append: context id must match, message id
/// must be history-unique.
pub(crate) fn prepare_history_append(task: &Task, mut message: Message) -> Result<Message> {
    validate_message(&message)?;

    match &message.context_id {
        Some(context_id) if *context_id != task.context_id => {
            return Err(KairosError::invalid_input(format!(
                "message context {:?} does not match task context {:?}",
                context_id, task.context_id
            )));
        }
        Some(_) => {}
        None => message.context_id = Some(task.context_id.clone()),
    }
    message.task_id = Some(task.id.clone());

    if let Some(history) = &task.history {
        if history.iter().any(|m| m.message_id == message.message_id) {
            return Err(KairosError::invalid_input(format!(
                "duplicate message id {:?} in task history",
                message.message_id
            )));
        }
    }
    Ok(message)
}

/// Guard a mutating write against the terminal-immutability invariant.
pub(crate) fn check_mutable(task: &Task) -> Result<()> {
    if task.status.state.is_terminal() {
        return Err(KairosError::failed_precondition(format!(
            "task {} is in terminal state {}",
            task.id, task.status.state
        ))
        .with_context("task_id", task.id.clone()));
    }
    Ok(())
}

/// Advance `updated_at` monotonically.
pub(crate) fn touch(task: &mut Task, now: DateTime<Utc>) {
    task.updated_at = task.updated_at.max(now);
}

/// Apply the read-side view options to a task clone.
pub(crate) fn apply_view(task: &mut Task, history_length: u32, include_artifacts: bool) {
    if history_length > 0 {
        if let Some(history) = &mut task.history {
            let keep = history_length as usize;
            if history.len() > keep {
                let start = history.len() - keep;
                *history = history.split_off(start);
            }
        }
    }
    if !include_artifacts {
        task.artifacts = None;
    }
}

/// Shared cancel transition used by both backends.
///
/// Returns `None` when the task is already terminal (caller returns the
/// stored task unchanged), otherwise the mutated task ready to persist.
pub(crate) fn cancelled_task(task: &Task, clock: &dyn Clock) -> Option<Task> {
    if task.status.state.is_terminal() {
        return None;
    }
    let mut cancelled = task.clone();
    let now = clock.now();
    cancelled.status = TaskStatus {
        state: TaskState::Cancelled,
        // The pre-cancellation status message becomes the cancellation message.
        message: task.status.message.clone(),
        timestamp: Some(now.to_rfc3339()),
    };
    touch(&mut cancelled, now);
    Some(cancelled)
}

// ---------------------------------------------------------------------------
// Page tokens
// ---------------------------------------------------------------------------

const PAGE_TOKEN_PREFIX: &str = "off:";

/// Encode an offset as an opaque page token.
pub(crate) fn encode_page_token(offset: usize) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .encode(format!("{}{}", PAGE_TOKEN_PREFIX, offset))
}

/// Decode a page token back to an offset; unknown tokens are invalid input.
pub(crate) fn decode_page_token(token: &str) -> Result<usize> {
    let invalid = || KairosError::invalid_input(format!("invalid page token {:?}", token));
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| invalid())?;
    let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;
    let offset = decoded.strip_prefix(PAGE_TOKEN_PREFIX).ok_or_else(invalid)?;
    offset.parse::<usize>().map_err(|_| invalid())
}
