//! The executor boundary — where agent logic plugs into the substrate.
//!
//! The handler calls [`Executor::run`] once per task step and wraps the call
//! in status transitions (`Working` before, `Completed`/`Failed` after).
//! Everything about *how* the response is produced — the reasoning loop, the
//! graph planner, tool calling — lives behind this trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Artifact, Message, Role};

/// Per-step execution context handed to the executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The task being executed.
    pub task_id: String,

    /// The context the task belongs to.
    pub context_id: String,

    /// Cancellation token; fires when the caller goes away. The executor
    /// should stop promptly, but the task itself stays resumable.
    pub cancel: CancellationToken,
}

/// What one executor step produced.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOutput {
    /// An explicit response message. Missing context/task ids are filled in
    /// during normalization.
    pub message: Option<Message>,

    /// Textual output, used when no explicit message is set; wrapped as a
    /// single text part.
    pub text: Option<String>,

    /// Artifacts produced by this step, in production order.
    pub artifacts: Vec<Artifact>,
}

impl ExecutorOutput {
    /// A plain text response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// An explicit message response.
    pub fn message(message: Message) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    /// Attach artifacts to the output.
    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Normalize the output into an agent message bound to the task.
    pub(crate) fn into_response(self, task_id: &str, context_id: &str) -> (Message, Vec<Artifact>) {
        let mut message = match self.message {
            Some(message) => message,
            None => Message::agent(
                Uuid::new_v4().to_string(),
                self.text.unwrap_or_default(),
            ),
        };
        message.role = Role::Agent;
        if message.message_id.is_empty() {
            message.message_id = Uuid::new_v4().to_string();
        }
        if message.task_id.is_none() {
            message.task_id = Some(task_id.to_string());
        }
        if message.context_id.is_none() {
            message.context_id = Some(context_id.to_string());
        }
        (message, self.artifacts)
    }
}

/// Produces a response (and optional artifacts) from an input message.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one step for the task in `ctx`, consuming `message`.
    ///
    /// An `Err` drives the task to `Failed`; retry policy is the executor's
    /// own business, the handler never retries.
    async fn run(&self, ctx: ExecutionContext, message: Message) -> Result<ExecutorOutput>;
}
